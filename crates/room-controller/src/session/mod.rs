//! Session acceptor and per-connection loop.
//!
//! The hub connects to this room over a websocket. On upgrade the room
//! immediately sends an `ack` frame advertising the protocol versions it
//! supports, before reading anything. It then loops: block for the next
//! frame, decode, dispatch. Dispatch errors are logged and the loop
//! continues; the two ways a session ends are a read failure (the hub
//! went away) and a protocol version mismatch.
//!
//! Un-registration happens in the goodbye handler, not here: a goodbye
//! frame must arrive before closure for cleanup to occur. An abrupt
//! network failure without one leaves a stale registry entry; there is
//! no liveness sweep.

pub mod handlers;

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actors::{OutboundSender, RegistryHandle};
use crate::config::Config;
use crate::errors::RoomError;
use crate::protocol::commands::SlashTable;
use crate::protocol::{ack_frame, parse_frame, Bookmark, CMD_GOODBYE, CMD_HELLO, CMD_ROOM};

/// Shared state for every session task.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub config: Arc<Config>,
    pub registry: RegistryHandle,
    pub slash: Arc<SlashTable>,
    pub bookmark: Bookmark,
}

/// Build the websocket router serving hub callbacks.
pub fn session_router(state: SessionState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/room", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SessionState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

/// Run one session until the connection fails or a fatal dispatch error
/// occurs.
pub async fn run_session(socket: WebSocket, state: SessionState) {
    info!(target: "room.session", "Hub connection established");

    let (mut sink, mut stream) = socket.split();

    // All outbound traffic funnels through one channel so the registry
    // coordinator and the handlers share a single writer.
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                debug!(target: "room.session", error = %e, "Websocket send failed");
                break;
            }
        }
    });

    // Acknowledge the new websocket before reading anything.
    match ack_frame() {
        Ok(frame) => {
            if outbound_tx.send(frame).is_err() {
                warn!(target: "room.session", "Connection writer gone before ack");
                return;
            }
        }
        Err(e) => {
            warn!(target: "room.session", error = %e, "Failed to build ack frame");
            return;
        }
    }

    loop {
        let message = match stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                info!(target: "room.session", error = %e, "Unreadable message; closing session");
                break;
            }
            None => {
                info!(target: "room.session", "Hub closed the connection");
                break;
            }
        };

        let raw = match message {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!(target: "room.session", "Hub sent close frame");
                break;
            }
            // Ping/pong are handled by axum; binary traffic is not part
            // of the protocol.
            _ => continue,
        };

        match dispatch(&state, &outbound_tx, &raw).await {
            Ok(()) => {}
            Err(e) if e.closes_session() => {
                warn!(target: "room.session", error = %e, "Fatal session error; closing");
                break;
            }
            Err(e) => {
                warn!(target: "room.session", error = %e, "Frame handling failed; session continues");
            }
        }
    }

    // The registry may still hold a clone of the sender (no goodbye
    // arrived), so the writer is aborted rather than drained. The
    // socket is unusable at this point either way.
    drop(outbound_tx);
    writer.abort();
    info!(target: "room.session", "Session ended");
}

/// Decode a raw frame and route it to its command handler.
///
/// # Errors
///
/// `RoomError::Payload` for malformed frames and unrecognized commands,
/// `RoomError::Content` for invalid payload JSON, plus whatever the
/// handler returns. Only [`RoomError::closes_session`] errors should end
/// the session.
pub async fn dispatch(
    state: &SessionState,
    outbound: &OutboundSender,
    raw: &str,
) -> Result<(), RoomError> {
    let frame = parse_frame(raw)?;

    if state.config.debug {
        debug!(
            target: "room.session",
            command = frame.command,
            room_id = frame.room_id,
            payload = frame.payload,
            "Parsed frame"
        );
    }

    match frame.command {
        CMD_HELLO => {
            let payload = decode_payload(frame.payload)?;
            handlers::handle_hello(state, outbound, frame.room_id, payload).await
        }
        CMD_GOODBYE => {
            let payload = decode_payload(frame.payload)?;
            handlers::handle_goodbye(state, outbound, frame.room_id, &payload);
            Ok(())
        }
        CMD_ROOM => {
            let payload = decode_payload(frame.payload)?;
            handlers::handle_room_event(state, outbound, frame.room_id, payload).await
        }
        other => Err(RoomError::Payload(format!(
            "unrecognized command '{other}' in payload '{raw}'"
        ))),
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, RoomError> {
    serde_json::from_str(raw)
        .map_err(|e| RoomError::Content(format!("payload did not parse: {e}; offending JSON: {raw}")))
}
