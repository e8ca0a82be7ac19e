//! Command handlers: one per recognized session command.
//!
//! Handlers format outbound frames and either push them straight down
//! the issuing connection (private responses) or hand them to the
//! registry coordinator (anything other players must see).

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::actors::{OutboundSender, PlayerSession, SYSTEM_SENDER};
use crate::errors::RoomError;
use crate::protocol::commands::SlashCommand;
use crate::protocol::{
    location_frame, player_frame, EventBody, ExitBody, GoodbyePayload, HelloPayload, LocationBody,
    RoomEventPayload, BROADCAST_TARGET, SUPPORTED_VERSIONS,
};

use super::SessionState;

/// Commands this room adds over the baseline set. They are advertised in
/// the hello response so the hub can extend its /help output.
const COMMANDS_WE_ADD: &[(&str, &str)] = &[("/wink", "(You wonder what this would do.)")];

/// A chunk of flavor text with a pre-send pause in milliseconds.
struct TimedText {
    pause_ms: u64,
    text: &'static str,
}

const LOOK_REMARKS: &[TimedText] = &[
    TimedText { pause_ms: 0, text: "*click*" },
    TimedText { pause_ms: 750, text: "*POP*!" },
    TimedText { pause_ms: 1500, text: "Hmmm. The light bulb has gone out." },
    TimedText { pause_ms: 2000, text: "Looking around is useless in an unlighted room." },
];

const INVENTORY_REMARKS: &[TimedText] = &[
    TimedText { pause_ms: 0, text: "Riddle me this." },
    TimedText { pause_ms: 750, text: "\"How many pockets could a pickpocket pick" },
    TimedText { pause_ms: 0, text: "if a pickpocket could pick pockets?\"" },
    TimedText { pause_ms: 2000, text: "(Enough, apparently. Your pockets are now empty.)" },
];

/// Handle a `hello` frame: the hub announces a player entering the room.
///
/// The protocol version is validated first; an unsupported version ends
/// the connection. On success the session is registered, the room hears
/// an entrance announcement, and the player receives a private welcome
/// followed by the location response.
///
/// # Errors
///
/// `RoomError::Version` for an unsupported protocol version.
pub async fn handle_hello(
    state: &SessionState,
    outbound: &OutboundSender,
    room_id: &str,
    req: HelloPayload,
) -> Result<(), RoomError> {
    info!(
        target: "room.session",
        room_id,
        user_id = %req.user_id,
        username = %req.username,
        version = req.version,
        "Player entering room"
    );

    if !SUPPORTED_VERSIONS.contains(&req.version) {
        return Err(RoomError::Version {
            requested: req.version,
        });
    }

    state.registry.add(PlayerSession {
        player_id: req.user_id.clone(),
        username: req.username.clone(),
        room_id: room_id.to_string(),
        outbound: outbound.clone(),
    });

    let room_name = &state.config.room_name;
    state.registry.broadcast(
        room_id,
        &format!("{} has entered {room_name}.", req.username),
        SYSTEM_SENDER,
        BROADCAST_TARGET,
    );

    let welcome = format!(
        "Welcome to {room_name}, {}. Take your time. Look around.",
        req.username
    );
    send_event(state, outbound, &req.user_id, &welcome)?;

    let location = LocationBody {
        kind: "location".to_string(),
        name: room_name.clone(),
        description: format!("This is {room_name}."),
        commands: COMMANDS_WE_ADD
            .iter()
            .map(|(cmd, desc)| ((*cmd).to_string(), (*desc).to_string()))
            .collect(),
    };
    send_frame(outbound, player_frame(&req.user_id, &location)?)
}

/// Handle a `goodbye` frame: remove the session and announce the exit.
pub fn handle_goodbye(
    state: &SessionState,
    _outbound: &OutboundSender,
    room_id: &str,
    req: &GoodbyePayload,
) {
    info!(
        target: "room.session",
        room_id,
        user_id = %req.user_id,
        username = %req.username,
        "Player leaving room"
    );

    state.registry.remove(&req.user_id, room_id);
    state.registry.broadcast(
        room_id,
        &format!("{} has left {}.", req.username, state.config.room_name),
        SYSTEM_SENDER,
        BROADCAST_TARGET,
    );
}

/// Handle a generic `room` event: slash command or chat.
///
/// # Errors
///
/// `RoomError::Content` for empty content or an unrecognized slash
/// command; the session continues either way.
pub async fn handle_room_event(
    state: &SessionState,
    outbound: &OutboundSender,
    room_id: &str,
    req: RoomEventPayload,
) -> Result<(), RoomError> {
    if req.content.is_empty() {
        return Err(RoomError::Content("there is no content".to_string()));
    }

    if req.content.starts_with('/') {
        return handle_slash_command(state, outbound, room_id, &req).await;
    }

    // Plain content is a chat broadcast to the room.
    state
        .registry
        .broadcast(room_id, &req.content, &req.username, BROADCAST_TARGET);
    Ok(())
}

/// Recognize and dispatch a slash command.
async fn handle_slash_command(
    state: &SessionState,
    outbound: &OutboundSender,
    room_id: &str,
    req: &RoomEventPayload,
) -> Result<(), RoomError> {
    let (command, arg) = match state.slash.parse(&req.content) {
        Ok(parsed) => parsed,
        Err(e) => {
            // The player only learns the command was not understood;
            // nobody else is affected.
            send_event(state, outbound, &req.user_id, "What? I didn't understand that.")?;
            return Err(e);
        }
    };

    debug!(
        target: "room.session",
        room_id,
        user_id = %req.user_id,
        ?command,
        arg,
        "Dispatching slash command"
    );

    match command {
        SlashCommand::Go => exit_room(state, outbound, &req.user_id, arg),
        SlashCommand::Look => timed_remarks(state, outbound, &req.user_id, LOOK_REMARKS).await,
        SlashCommand::Inventory => {
            timed_remarks(state, outbound, &req.user_id, INVENTORY_REMARKS).await
        }
        SlashCommand::Examine => examine_object(state, outbound, &req.user_id, arg),
        SlashCommand::Wink => wink(state, outbound, &req.user_id),
        SlashCommand::Help => help(state, outbound, &req.user_id),
    }
}

/// `/go <direction>`: banter for every direction, plus an exit frame for
/// the four the hub honors.
fn exit_room(
    state: &SessionState,
    outbound: &OutboundSender,
    user_id: &str,
    arg: &str,
) -> Result<(), RoomError> {
    let direction = arg.trim().to_ascii_lowercase();

    let (banter, exit_id) = match direction.as_str() {
        "n" | "north" => ("Going North!".to_string(), Some("n")),
        "s" | "south" => ("Going south! Later, Gator!!".to_string(), Some("s")),
        "e" | "east" => ("Going east!".to_string(), Some("e")),
        "w" | "west" => ("Going west, we think.".to_string(), Some("w")),
        "home" => ("You can't go home again.".to_string(), None),
        "away" => ("Never!".to_string(), None),
        other => (
            format!("'{other}'?!? There is no exit with that name. Try again."),
            None,
        ),
    };

    send_event(state, outbound, user_id, &banter)?;

    if let Some(exit_id) = exit_id {
        let body = ExitBody {
            kind: "exit".to_string(),
            exit_id: exit_id.to_string(),
            content: banter,
            bookmark: state.bookmark.next(),
        };
        send_frame(outbound, location_frame(user_id, &body)?)?;
    }
    Ok(())
}

/// Emit a sequence of flavor-text events with pauses between them.
async fn timed_remarks(
    state: &SessionState,
    outbound: &OutboundSender,
    user_id: &str,
    remarks: &[TimedText],
) -> Result<(), RoomError> {
    for remark in remarks {
        if remark.pause_ms > 0 {
            tokio::time::sleep(Duration::from_millis(remark.pause_ms)).await;
        }
        send_event(state, outbound, user_id, remark.text)?;
    }
    Ok(())
}

/// `/examine [object]`: there is never anything here.
fn examine_object(
    state: &SessionState,
    outbound: &OutboundSender,
    user_id: &str,
    arg: &str,
) -> Result<(), RoomError> {
    let room_name = &state.config.room_name;
    let object = arg.trim();
    let text = if object.is_empty() {
        format!("There is nothing here in {room_name}. Keep moving.")
    } else {
        let verb = if object.to_ascii_lowercase().ends_with('s') {
            "are"
        } else {
            "is"
        };
        format!("There {verb} no {object} here in {room_name}. Keep moving.")
    };
    send_event(state, outbound, user_id, &text)
}

/// `/wink`: the room responds in kind.
fn wink(state: &SessionState, outbound: &OutboundSender, user_id: &str) -> Result<(), RoomError> {
    let text = format!("{} winks at you. Slyly.", state.config.room_name);
    send_event(state, outbound, user_id, &text)
}

/// `/help`: list the commands this room understands.
fn help(state: &SessionState, outbound: &OutboundSender, user_id: &str) -> Result<(), RoomError> {
    let text = format!(
        "{} understands the following commands: {}.",
        state.config.room_name,
        state.slash.tokens().join(", ")
    );
    send_event(state, outbound, user_id, &text)
}

/// Send a private event to the player on their own connection.
fn send_event(
    state: &SessionState,
    outbound: &OutboundSender,
    user_id: &str,
    text: &str,
) -> Result<(), RoomError> {
    let body = EventBody::for_player(user_id, text, state.bookmark.next());
    send_frame(outbound, player_frame(user_id, &body)?)
}

/// Push a frame into the connection's outbound channel.
fn send_frame(outbound: &OutboundSender, frame: String) -> Result<(), RoomError> {
    outbound.send(frame).map_err(|_| {
        warn!(target: "room.session", "Outbound channel closed mid-session");
        RoomError::Internal("outbound channel closed".to_string())
    })
}
