//! Room controller error types.
//!
//! The taxonomy follows the failure domains of the service:
//! configuration problems are fatal at startup, directory problems are
//! fatal to the registration/deletion operation, and per-frame problems
//! are logged without ending the session. The single exception is a
//! protocol version mismatch, which ends the offending connection only.

use thiserror::Error;

use crate::config::ConfigError;

/// Room controller error type.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Bad or missing configuration. Fatal at startup, before any
    /// network activity.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A directory operation failed permanently (e.g. the hub rejected
    /// the request in a way that retrying cannot fix).
    #[error("Registration error: {0}")]
    Registration(String),

    /// The directory retry loop ran out of attempts.
    #[error("Registration retries exhausted after {attempts} attempts, last error: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// Malformed top-level session frame (not a command,room,json triple).
    #[error("Malformed frame: {0}")]
    Payload(String),

    /// A well-formed frame carried unrecognized or invalid content.
    #[error("Malformed content: {0}")]
    Content(String),

    /// The peer requested a protocol version we do not speak. Fatal to
    /// that one connection.
    #[error("Unsupported protocol version: {requested}")]
    Version { requested: u32 },

    /// Channel or serialization failure inside the process.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoomError {
    /// Whether this error must end the session it occurred on.
    ///
    /// Parse and content errors keep the connection alive; only a
    /// version mismatch makes the connection unusable.
    #[must_use]
    pub fn closes_session(&self) -> bool {
        matches!(self, RoomError::Version { .. })
    }
}
