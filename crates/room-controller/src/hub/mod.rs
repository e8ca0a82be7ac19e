//! Hub directory integration: request signing and the directory client.

pub mod auth;
pub mod client;

pub use client::{DirectoryClient, RegistrationRecord, RoomDescriptor};
