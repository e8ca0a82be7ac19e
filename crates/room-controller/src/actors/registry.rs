//! `RegistryActor` - single owner of the live player session map.
//!
//! Exactly one registry actor runs per process. It exclusively owns the
//! map of sessions keyed by (player, room); external code never touches
//! the map directly. All four operations (add, remove, broadcast,
//! smalltalk) arrive as mailbox messages and are processed strictly one
//! at a time in arrival order, which removes the need for locking and
//! guarantees every broadcast observes a snapshot consistent with the
//! operations enqueued before it.
//!
//! Sends into the mailbox are fire-and-forget: the channel is unbounded,
//! producers never block on the coordinator and never observe its effect
//! synchronously. The cost is latency (operations queue); the gain is
//! freedom from data races.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::{PlayerKey, PlayerSession, RegistryMessage, SYSTEM_SENDER};
use crate::protocol::{player_frame, Bookmark, ChatBody, BROADCAST_TARGET};

/// Handle to the registry actor. Cloneable; all methods are
/// fire-and-forget.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    sender: mpsc::UnboundedSender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RegistryHandle {
    /// Track a session. Overwrites any session with the same key.
    pub fn add(&self, session: PlayerSession) {
        self.send(RegistryMessage::Add(session));
    }

    /// Stop tracking the session with this key, if present.
    pub fn remove(&self, player_id: &str, room_id: &str) {
        self.send(RegistryMessage::Remove {
            key: PlayerKey::new(player_id, room_id),
        });
    }

    /// Broadcast a chat message to the sessions of one room.
    ///
    /// Pass [`SYSTEM_SENDER`] as `sender` to have the message attributed
    /// to a synthetic room identity.
    pub fn broadcast(&self, room_id: &str, message: &str, sender: &str, receiver: &str) {
        self.send(RegistryMessage::Broadcast {
            room_id: room_id.to_string(),
            message: message.to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
        });
    }

    /// Inject idle flavor text into every tracked session.
    pub fn smalltalk(&self, message: &str, sender: &str) {
        self.send(RegistryMessage::Smalltalk {
            message: message.to_string(),
            sender: sender.to_string(),
        });
    }

    /// Cancel the registry actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    fn send(&self, message: RegistryMessage) {
        if self.sender.send(message).is_err() {
            warn!(
                target: "room.actor.registry",
                "Registry mailbox is closed; dropping operation"
            );
        }
    }
}

/// The registry actor implementation.
pub struct RegistryActor {
    /// Mailbox.
    receiver: mpsc::UnboundedReceiver<RegistryMessage>,
    /// Sessions by (player, room). Owned exclusively by this task.
    players: HashMap<PlayerKey, PlayerSession>,
    /// Shared process-wide bookmark counter.
    bookmark: Bookmark,
    /// Sequence for synthetic system sender identities.
    system_sender_seq: u64,
    /// Cancellation token (child of the process shutdown token).
    cancel_token: CancellationToken,
}

impl RegistryActor {
    /// Spawn the registry actor.
    ///
    /// Returns a handle and the task join handle. This should run before
    /// any session callbacks are enabled.
    pub fn spawn(bookmark: Bookmark, cancel_token: CancellationToken) -> (RegistryHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();

        let actor = Self {
            receiver,
            players: HashMap::new(),
            bookmark,
            system_sender_seq: 0,
            cancel_token: cancel_token.clone(),
        };

        let task_handle = tokio::spawn(actor.run());

        (
            RegistryHandle {
                sender,
                cancel_token,
            },
            task_handle,
        )
    }

    /// Run the actor message loop.
    async fn run(mut self) {
        info!(target: "room.actor.registry", "Registry actor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "room.actor.registry",
                        tracked = self.players.len(),
                        "Registry actor shutting down"
                    );
                    break;
                }
                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message),
                        None => {
                            info!(
                                target: "room.actor.registry",
                                "All registry handles dropped; stopping"
                            );
                            break;
                        }
                    }
                }
            }
        }
    }

    fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::Add(session) => {
                debug!(
                    target: "room.actor.registry",
                    player_id = %session.player_id,
                    room_id = %session.room_id,
                    "Tracking player"
                );
                self.players.insert(session.key(), session);
            }
            RegistryMessage::Remove { key } => {
                if self.players.remove(&key).is_some() {
                    debug!(target: "room.actor.registry", %key, "Untracked player");
                } else {
                    debug!(target: "room.actor.registry", %key, "Remove for unknown key");
                }
            }
            RegistryMessage::Broadcast {
                room_id,
                message,
                sender,
                receiver,
            } => {
                let sender = self.normalize_sender(&sender);
                self.broadcast(&room_id, &message, &sender, &receiver);
            }
            RegistryMessage::Smalltalk { message, sender } => {
                self.smalltalk(&message, &sender);
            }
        }
    }

    /// Deliver a chat message to every session in `room_id` or with an
    /// empty room id (global announcements).
    fn broadcast(&self, room_id: &str, message: &str, sender: &str, receiver: &str) {
        for session in self.players.values() {
            if !(session.room_id.is_empty() || session.room_id == room_id) {
                continue;
            }
            let body = ChatBody::new(sender, message, self.bookmark.next());
            match player_frame(receiver, &body) {
                Ok(frame) => self.deliver(session, frame),
                Err(e) => {
                    warn!(target: "room.actor.registry", error = %e, "Broadcast body failed to build");
                    return;
                }
            }
        }
    }

    /// Deliver flavor text to every tracked session regardless of room.
    fn smalltalk(&self, message: &str, sender: &str) {
        for session in self.players.values() {
            let body = ChatBody::new(sender, message, self.bookmark.next());
            match player_frame(BROADCAST_TARGET, &body) {
                Ok(frame) => self.deliver(session, frame),
                Err(e) => {
                    warn!(target: "room.actor.registry", error = %e, "Smalltalk body failed to build");
                    return;
                }
            }
        }
    }

    fn deliver(&self, session: &PlayerSession, frame: String) {
        if session.outbound.send(frame).is_err() {
            // The connection's writer is gone. The entry stays until a
            // goodbye frame arrives; there is no liveness sweep.
            debug!(
                target: "room.actor.registry",
                player_id = %session.player_id,
                room_id = %session.room_id,
                "Delivery failed; connection writer is gone"
            );
        }
    }

    /// Morph the system sender sentinel into a numbered synthetic
    /// identity; real usernames pass through untouched.
    fn normalize_sender(&mut self, sender: &str) -> String {
        if sender == SYSTEM_SENDER {
            self.system_sender_seq += 1;
            format!("room.{:04}", self.system_sender_seq)
        } else {
            sender.to_string()
        }
    }
}
