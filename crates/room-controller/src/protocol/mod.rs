//! Session wire protocol: frame parsing, typed payloads, and outbound
//! message construction.
//!
//! Inbound frames are text triples `<command>,<roomId>,<jsonPayload>`.
//! The payload may itself contain commas, so splitting stops after the
//! second comma. Outbound frames are `<category>,<target>,<json>` where
//! category is [`CATEGORY_PLAYER`] or [`CATEGORY_PLAYER_LOCATION`] and
//! target is one player id or [`BROADCAST_TARGET`].
//!
//! Addressing is expressed in message content, not connection filtering:
//! a broadcast frame with target `*` still travels over each recipient's
//! own connection, mirroring the hub's convention.

pub mod commands;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::RoomError;

/// Protocol versions this room is willing to speak.
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Outbound category for player event/chat traffic.
pub const CATEGORY_PLAYER: &str = "player";

/// Outbound category for player location changes (exits).
pub const CATEGORY_PLAYER_LOCATION: &str = "playerLocation";

/// Target selector addressing everyone in the room.
pub const BROADCAST_TARGET: &str = "*";

/// Inbound connect command.
pub const CMD_HELLO: &str = "hello";
/// Inbound disconnect command.
pub const CMD_GOODBYE: &str = "goodbye";
/// Inbound generic room event command.
pub const CMD_ROOM: &str = "room";

// ---------------------------------------------------------------------------
// Bookmark
// ---------------------------------------------------------------------------

/// Process-wide monotonically increasing sequence number stamped on
/// outbound player-event messages.
///
/// There is exactly one counter per process, shared by the session
/// handlers and the registry coordinator; it is never per-room or
/// per-player, so consumers must not assume independent per-room
/// sequencing.
#[derive(Debug, Clone)]
pub struct Bookmark(Arc<AtomicU64>);

impl Bookmark {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }

    /// Take the next bookmark value.
    #[must_use]
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Bookmark {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Inbound frames
// ---------------------------------------------------------------------------

/// A parsed inbound frame. Borrows from the raw message; never persisted.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub command: &'a str,
    pub room_id: &'a str,
    pub payload: &'a str,
}

/// Split a raw frame into its command, room id and JSON payload.
///
/// Splitting stops after the second comma so commas embedded in the JSON
/// payload survive. Any additional validation (including whether the
/// payload is valid JSON) is left to the caller.
///
/// # Errors
///
/// Returns `RoomError::Payload` when fewer than three comma-delimited
/// parts are present.
pub fn parse_frame(raw: &str) -> Result<Frame<'_>, RoomError> {
    let mut parts = raw.splitn(3, ',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(command), Some(room_id), Some(payload)) => Ok(Frame {
            command,
            room_id,
            payload,
        }),
        _ => Err(RoomError::Payload(format!(
            "expected <command>,<roomId>,<json>, got '{raw}'"
        ))),
    }
}

fn default_protocol_version() -> u32 {
    1
}

/// Payload of a `hello` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct HelloPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    /// Absent versions are treated as 1, the lowest we advertise.
    #[serde(default = "default_protocol_version")]
    pub version: u32,
}

/// Payload of a `goodbye` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct GoodbyePayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
}

/// Payload of a generic `room` event frame.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomEventPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub content: String,
}

// ---------------------------------------------------------------------------
// Outbound bodies
// ---------------------------------------------------------------------------

/// Body of an event message: per-recipient text keyed by player id, or
/// `*` for text addressed to the whole room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: BTreeMap<String, String>,
    pub bookmark: u64,
}

impl EventBody {
    /// An event visible only to one player.
    #[must_use]
    pub fn for_player(user_id: &str, text: &str, bookmark: u64) -> Self {
        Self {
            kind: "event".to_string(),
            content: BTreeMap::from([(user_id.to_string(), text.to_string())]),
            bookmark,
        }
    }
}

/// Body of a chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub username: String,
    pub content: String,
    pub bookmark: u64,
}

impl ChatBody {
    #[must_use]
    pub fn new(username: &str, content: &str, bookmark: u64) -> Self {
        Self {
            kind: "chat".to_string(),
            username: username.to_string(),
            content: content.to_string(),
            bookmark,
        }
    }
}

/// Body of the location response sent after a successful hello. The
/// exits field is intentionally omitted so the registered door setup is
/// not overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    /// Room-specific commands beyond the baseline set, token to
    /// description.
    pub commands: BTreeMap<String, String>,
}

/// Body of an exit message emitted for a valid `/go`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitBody {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "exitId")]
    pub exit_id: String,
    pub content: String,
    pub bookmark: u64,
}

/// Body of the websocket acknowledgment sent before anything is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckBody {
    /// Protocol versions the room is willing to support.
    pub version: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Frame construction
// ---------------------------------------------------------------------------

fn build_frame<B: Serialize>(category: &str, target: &str, body: &B) -> Result<String, RoomError> {
    let json = serde_json::to_string(body)
        .map_err(|e| RoomError::Internal(format!("outbound serialization failed: {e}")))?;
    Ok(format!("{category},{target},{json}"))
}

/// Build a `player` frame addressed to `target`.
///
/// # Errors
///
/// Returns `RoomError::Internal` if the body does not serialize.
pub fn player_frame<B: Serialize>(target: &str, body: &B) -> Result<String, RoomError> {
    build_frame(CATEGORY_PLAYER, target, body)
}

/// Build a `playerLocation` frame addressed to `target`.
///
/// # Errors
///
/// Returns `RoomError::Internal` if the body does not serialize.
pub fn location_frame<B: Serialize>(target: &str, body: &B) -> Result<String, RoomError> {
    build_frame(CATEGORY_PLAYER_LOCATION, target, body)
}

/// Build the `ack` frame advertising the supported protocol versions.
///
/// # Errors
///
/// Returns `RoomError::Internal` if the body does not serialize.
pub fn ack_frame() -> Result<String, RoomError> {
    let body = AckBody {
        version: SUPPORTED_VERSIONS.to_vec(),
    };
    let json = serde_json::to_string(&body)
        .map_err(|e| RoomError::Internal(format!("ack serialization failed: {e}")))?;
    Ok(format!("ack,{json}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    // =====================================================================
    // Frame parsing
    // =====================================================================

    #[test]
    fn test_parse_frame_splits_triple() {
        let frame = parse_frame("cmd,room,{\"a\":1}").unwrap();
        assert_eq!(frame.command, "cmd");
        assert_eq!(frame.room_id, "room");
        assert_eq!(frame.payload, "{\"a\":1}");
    }

    #[test]
    fn test_parse_frame_rejects_two_fields() {
        let result = parse_frame("cmd,room");
        assert!(matches!(result, Err(RoomError::Payload(_))));
    }

    #[test]
    fn test_parse_frame_rejects_empty_input() {
        assert!(matches!(parse_frame(""), Err(RoomError::Payload(_))));
    }

    #[test]
    fn test_parse_frame_preserves_embedded_commas() {
        let frame = parse_frame("cmd,room,{\"a\":\"x,y\"}").unwrap();
        assert_eq!(frame.payload, "{\"a\":\"x,y\"}");
    }

    #[test]
    fn test_parse_frame_accepts_non_json_payload() {
        // Payload validation is the caller's job.
        let frame = parse_frame("cmd,room,{this is bad JSON").unwrap();
        assert_eq!(frame.payload, "{this is bad JSON");
    }

    // =====================================================================
    // Typed payloads
    // =====================================================================

    #[test]
    fn test_hello_payload_parses() {
        let payload: HelloPayload =
            serde_json::from_str(r#"{"userId":"u1","username":"Ann","version":1}"#).unwrap();
        assert_eq!(payload.user_id, "u1");
        assert_eq!(payload.username, "Ann");
        assert_eq!(payload.version, 1);
    }

    #[test]
    fn test_hello_payload_version_defaults_to_one() {
        let payload: HelloPayload =
            serde_json::from_str(r#"{"userId":"u1","username":"Ann"}"#).unwrap();
        assert_eq!(payload.version, 1);
    }

    #[test]
    fn test_hello_payload_requires_user_id() {
        let result: Result<HelloPayload, _> = serde_json::from_str(r#"{"username":"Ann"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_room_event_payload_content_defaults_empty() {
        let payload: RoomEventPayload =
            serde_json::from_str(r#"{"userId":"u1","username":"Ann"}"#).unwrap();
        assert_eq!(payload.content, "");
    }

    // =====================================================================
    // Bookmark
    // =====================================================================

    #[test]
    fn test_bookmark_is_monotonic() {
        let bookmark = Bookmark::new();
        let first = bookmark.next();
        let second = bookmark.next();
        let third = bookmark.next();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(third, 3);
    }

    #[test]
    fn test_bookmark_clones_share_the_counter() {
        let bookmark = Bookmark::new();
        let clone = bookmark.clone();
        assert_eq!(bookmark.next(), 1);
        assert_eq!(clone.next(), 2);
        assert_eq!(bookmark.next(), 3);
    }

    // =====================================================================
    // Outbound frames
    // =====================================================================

    #[test]
    fn test_player_frame_layout() {
        let body = EventBody::for_player("u1", "Welcome.", 7);
        let frame = player_frame("u1", &body).unwrap();

        let mut parts = frame.splitn(3, ',');
        assert_eq!(parts.next(), Some(CATEGORY_PLAYER));
        assert_eq!(parts.next(), Some("u1"));

        let json: serde_json::Value = serde_json::from_str(parts.next().unwrap()).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["content"]["u1"], "Welcome.");
        assert_eq!(json["bookmark"], 7);
    }

    #[test]
    fn test_chat_body_serializes() {
        let frame = player_frame(BROADCAST_TARGET, &ChatBody::new("Ann", "hi all", 3)).unwrap();
        let json_part = frame.splitn(3, ',').nth(2).unwrap();
        let json: serde_json::Value = serde_json::from_str(json_part).unwrap();

        assert_eq!(json["type"], "chat");
        assert_eq!(json["username"], "Ann");
        assert_eq!(json["content"], "hi all");
        assert_eq!(json["bookmark"], 3);
    }

    #[test]
    fn test_exit_frame_uses_player_location_category() {
        let body = ExitBody {
            kind: "exit".to_string(),
            exit_id: "n".to_string(),
            content: "Going North!".to_string(),
            bookmark: 4,
        };
        let frame = location_frame("u1", &body).unwrap();
        assert!(frame.starts_with("playerLocation,u1,"));

        let json_part = frame.splitn(3, ',').nth(2).unwrap();
        let json: serde_json::Value = serde_json::from_str(json_part).unwrap();
        assert_eq!(json["exitId"], "n");
    }

    #[test]
    fn test_ack_frame_advertises_supported_versions() {
        let frame = ack_frame().unwrap();
        let json_part = frame.strip_prefix("ack,").unwrap();
        let json: serde_json::Value = serde_json::from_str(json_part).unwrap();
        assert_eq!(json["version"], serde_json::json!([1]));
    }
}
