//! Actor model implementation.
//!
//! The only coordination point in the system is the
//! [`registry::RegistryActor`], which runs as one always-on task and
//! exclusively owns the live session map. Everything else communicates
//! with it through fire-and-forget mailbox messages.

pub mod messages;
pub mod registry;

pub use messages::{OutboundSender, PlayerKey, PlayerSession, RegistryMessage, SYSTEM_SENDER};
pub use registry::{RegistryActor, RegistryHandle};
