//! Room Controller Library
//!
//! One "room" node in a multiplayer text-adventure hub. The room
//! registers its identity with the hub's central directory service,
//! authenticating every exchange with an HMAC-signed token scheme, and
//! then serves a long-lived websocket session protocol through which the
//! hub relays player actions and the room emits narrative responses.
//!
//! # Architecture
//!
//! ```text
//! main
//! ├── DirectoryClient ──► hub directory (signed register/query/delete)
//! ├── RegistryActor (singleton) ──► owns the live session map
//! ├── conversation task ──► periodic smalltalk via the registry
//! ├── health server ──► liveness/readiness probes
//! └── session server (one task per hub connection)
//!     └── read loop ──► dispatch ──► command handlers
//! ```
//!
//! The registry actor is the only coordination point: sessions and the
//! conversation task talk to it exclusively through fire-and-forget
//! mailbox messages, so the session map needs no locking.
//!
//! # Modules
//!
//! - [`actors`] - the registry coordinator and its message types
//! - [`config`] - service configuration from environment
//! - [`conversation`] - ambient smalltalk injection
//! - [`errors`] - error taxonomy
//! - [`hub`] - request signing and the directory client
//! - [`observability`] - health probes
//! - [`protocol`] - wire frames, typed payloads, slash commands
//! - [`session`] - websocket acceptor, per-connection loop, handlers

#![warn(clippy::pedantic)]

pub mod actors;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod hub;
pub mod observability;
pub mod protocol;
pub mod session;
