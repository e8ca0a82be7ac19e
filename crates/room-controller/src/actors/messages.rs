//! Message types for the player registry coordinator.

use std::fmt;

use tokio::sync::mpsc;

/// Sender half of a session's outbound frame channel. The writer task on
/// the other end forwards each frame into the websocket sink.
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// Sentinel sender id for announcements that come from the room itself.
/// The registry normalizes it to a numbered synthetic identity before
/// delivery.
pub const SYSTEM_SENDER: &str = "system.room";

/// Registry key: one player in one room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerKey {
    pub player_id: String,
    pub room_id: String,
}

impl PlayerKey {
    #[must_use]
    pub fn new(player_id: &str, room_id: &str) -> Self {
        Self {
            player_id: player_id.to_string(),
            room_id: room_id.to_string(),
        }
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.player_id, self.room_id)
    }
}

/// One player's live session. Exclusively owned by the registry
/// coordinator once added.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    pub player_id: String,
    pub username: String,
    pub room_id: String,
    pub outbound: OutboundSender,
}

impl PlayerSession {
    #[must_use]
    pub fn key(&self) -> PlayerKey {
        PlayerKey::new(&self.player_id, &self.room_id)
    }
}

/// Operations accepted by the registry coordinator. Each is delivered as
/// a mailbox message and processed strictly one at a time in arrival
/// order.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Insert or overwrite a session by its key.
    Add(PlayerSession),

    /// Delete a session if present; an absent key is a no-op.
    Remove { key: PlayerKey },

    /// Deliver a chat message to every session whose room matches (or
    /// whose room is empty, for global announcements). `receiver` is
    /// carried in the frame target, not used for connection filtering.
    Broadcast {
        room_id: String,
        message: String,
        sender: String,
        receiver: String,
    },

    /// Deliver idle flavor text to every tracked session regardless of
    /// room.
    Smalltalk { message: String, sender: String },
}
