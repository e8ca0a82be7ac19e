//! Hub directory client.
//!
//! Registers, queries and deletes this room's directory entry. Every call
//! carries the signed headers from [`crate::hub::auth`] and classifies the
//! hub's response into one of three buckets:
//!
//! - **Success** — the operation is done.
//! - **Permanent** — retrying cannot help (conflict, forbidden, already
//!   gone); the retry loop stops immediately.
//! - **Transient** — any other status or a transport error; the retry
//!   loop sleeps and tries again, up to the configured attempt count.
//!
//! Registration is idempotent: an entry already present under
//! `(name, owner)` is treated as success without re-posting, so restarts
//! never create duplicate directory entries.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::RoomError;
use crate::hub::auth;

/// Directory API path for site registration.
const SITES_PATH: &str = "/map/v1/sites";

/// HTTP request timeout for directory calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout for the directory client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection details advertised in the directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDetails {
    /// Always "websocket" for this service.
    #[serde(rename = "type")]
    pub kind: String,
    /// Websocket URL the hub connects back to.
    pub target: String,
}

/// Per-direction door descriptions as they appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorDescriptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub n: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub s: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub e: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub w: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub u: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub d: String,
}

/// The room metadata submitted on registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDescriptor {
    pub name: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "connectionDetails")]
    pub connection_details: ConnectionDetails,
    pub doors: DoorDescriptions,
}

impl RoomDescriptor {
    /// Build the descriptor for this room from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.room_name.clone(),
            full_name: config.room_name.clone(),
            connection_details: ConnectionDetails {
                kind: "websocket".to_string(),
                target: config.callback_target(),
            },
            doors: DoorDescriptions {
                n: config.doors.north.clone(),
                s: config.doors.south.clone(),
                e: config.doors.east.clone(),
                w: config.doors.west.clone(),
                u: config.doors.up.clone(),
                d: config.doors.down.clone(),
            },
        }
    }
}

/// A directory entry as returned by the hub. The hub is authoritative;
/// the record is cached on first success and never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRecord {
    /// Hub-assigned site id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Document revision.
    #[serde(rename = "_rev", default)]
    pub revision: String,
    /// Owning identity id.
    #[serde(default)]
    pub owner: String,
    /// Echo of the submitted room metadata.
    #[serde(default)]
    pub info: Option<RoomDescriptor>,
}

/// Three-way outcome of a single directory attempt. This classification
/// is the contract every retry loop in this module follows.
enum Attempt<T> {
    Success(T),
    Permanent(String),
    Transient(String),
}

/// Client for the hub directory service.
pub struct DirectoryClient {
    http: reqwest::Client,
    config: Arc<Config>,
    /// Registration record cached after the first successful register.
    registration: OnceLock<RegistrationRecord>,
}

impl DirectoryClient {
    /// Create a directory client.
    ///
    /// Hub deployments commonly terminate TLS with self-signed
    /// certificates, so certificate validation is disabled for this
    /// client only.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::Internal` if the HTTP client cannot be built.
    pub fn new(config: Arc<Config>) -> Result<Self, RoomError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| RoomError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            registration: OnceLock::new(),
        })
    }

    /// The cached registration record, if one was obtained.
    #[must_use]
    pub fn registration(&self) -> Option<&RegistrationRecord> {
        self.registration.get()
    }

    /// Register this room, retrying transient failures.
    ///
    /// Attempts [`Self::register`] up to the configured count, sleeping
    /// the configured delay between attempts (skipped after the final
    /// one). Permanent failures abort immediately.
    ///
    /// # Errors
    ///
    /// `RoomError::Registration` on a permanent failure,
    /// `RoomError::RetriesExhausted` once the attempts run out.
    pub async fn register_with_retries(&self) -> Result<(), RoomError> {
        retry_loop(
            self.config.registration_retries,
            self.config.retry_delay,
            "registration",
            || self.register(),
        )
        .await
    }

    /// Delete the room with the given directory id, retrying transient
    /// failures.
    ///
    /// # Errors
    ///
    /// `RoomError::Registration` on a permanent failure (already gone,
    /// forbidden, not found), `RoomError::RetriesExhausted` once the
    /// attempts run out.
    pub async fn delete_with_retries(&self, room_id: &str) -> Result<(), RoomError> {
        retry_loop(
            self.config.registration_retries,
            self.config.retry_delay,
            "deletion",
            || self.delete_room(room_id),
        )
        .await
    }

    /// One registration attempt: query for an existing entry, create one
    /// only if absent.
    async fn register(&self) -> Attempt<()> {
        match self.query_existing().await {
            Attempt::Success(Some(record)) => {
                info!(
                    target: "room.hub.client",
                    site_id = %record.id,
                    "Room is already registered, skipping creation"
                );
                let _ = self.registration.set(record);
                Attempt::Success(())
            }
            Attempt::Success(None) => match self.create_registration().await {
                Attempt::Success(record) => {
                    info!(
                        target: "room.hub.client",
                        site_id = %record.id,
                        revision = %record.revision,
                        "Room registered"
                    );
                    let _ = self.registration.set(record);
                    Attempt::Success(())
                }
                Attempt::Permanent(reason) => Attempt::Permanent(reason),
                Attempt::Transient(reason) => Attempt::Transient(reason),
            },
            Attempt::Permanent(reason) => Attempt::Permanent(reason),
            Attempt::Transient(reason) => Attempt::Transient(reason),
        }
    }

    /// Query the directory for an entry under `(name, owner)`.
    ///
    /// 200 means found (one-element array), 204 means not registered.
    async fn query_existing(&self) -> Attempt<Option<RegistrationRecord>> {
        let url = format!("{}{SITES_PATH}", self.config.hub_base_url());

        let headers = match auth::auth_headers(&self.config, "") {
            Ok(h) => h,
            Err(e) => return Attempt::Transient(format!("signing failed: {e}")),
        };

        debug!(
            target: "room.hub.client",
            %url,
            name = %self.config.room_name,
            owner = %self.config.hub_id,
            "Querying directory for prior registration"
        );

        let response = self
            .http
            .get(&url)
            .headers(headers)
            .query(&[
                ("name", self.config.room_name.as_str()),
                ("owner", self.config.hub_id.as_str()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return Attempt::Transient(format!("query request failed: {e}")),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::OK => {
                // The entry exists; the body is a one-element array. A
                // parse failure still counts as registered (the point of
                // the check is idempotency), it just leaves the cached
                // record empty.
                match serde_json::from_str::<Vec<RegistrationRecord>>(&body) {
                    Ok(mut records) => Attempt::Success(records.pop()),
                    Err(e) => {
                        warn!(
                            target: "room.hub.client",
                            error = %e,
                            "Registration query body did not parse; treating as registered"
                        );
                        Attempt::Success(Some(RegistrationRecord {
                            id: String::new(),
                            revision: String::new(),
                            owner: self.config.hub_id.clone(),
                            info: None,
                        }))
                    }
                }
            }
            StatusCode::NO_CONTENT => {
                debug!(target: "room.hub.client", "Room is not currently registered");
                Attempt::Success(None)
            }
            other => {
                warn!(
                    target: "room.hub.client",
                    status = %other,
                    body = %body,
                    "Unexpected status from registration query"
                );
                Attempt::Transient(format!("query returned status {other}"))
            }
        }
    }

    /// Submit this room's descriptor to the directory.
    ///
    /// The descriptor is serialized once; the exact bytes are hashed,
    /// signed and transmitted.
    async fn create_registration(&self) -> Attempt<RegistrationRecord> {
        let descriptor = RoomDescriptor::from_config(&self.config);
        let body = match serde_json::to_string_pretty(&descriptor) {
            Ok(b) => b,
            Err(e) => return Attempt::Transient(format!("descriptor serialization failed: {e}")),
        };

        let headers = match auth::auth_headers(&self.config, &body) {
            Ok(h) => h,
            Err(e) => return Attempt::Transient(format!("signing failed: {e}")),
        };

        let url = format!("{}{SITES_PATH}", self.config.hub_base_url());
        debug!(target: "room.hub.client", %url, registration = %body, "Posting registration");

        let response = match self.http.post(&url).headers(headers).body(body).send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Transient(format!("create request failed: {e}")),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::CREATED => match serde_json::from_str::<RegistrationRecord>(&body) {
                Ok(record) => Attempt::Success(record),
                Err(e) => {
                    warn!(
                        target: "room.hub.client",
                        error = %e,
                        body = %body,
                        "Created response did not parse"
                    );
                    Attempt::Transient(format!("created response did not parse: {e}"))
                }
            },
            StatusCode::CONFLICT => {
                // Another entry holds this (name, owner) pair. Retrying
                // the same descriptor cannot succeed.
                warn!(
                    target: "room.hub.client",
                    body = %body,
                    "Registration conflict; an entry already holds this name and owner"
                );
                Attempt::Permanent(format!("registration conflict: status {status}"))
            }
            other => {
                warn!(
                    target: "room.hub.client",
                    status = %other,
                    body = %body,
                    "Unhandled status from registration create"
                );
                Attempt::Transient(format!("create returned status {other}"))
            }
        }
    }

    /// One deletion attempt for the entry with the given id.
    async fn delete_room(&self, room_id: &str) -> Attempt<()> {
        let url = format!("{}{SITES_PATH}/{room_id}", self.config.hub_base_url());

        // Delete requests have empty bodies; the body hash is still
        // transmitted but does not enter the signature.
        let headers = match auth::auth_headers(&self.config, "") {
            Ok(h) => h,
            Err(e) => return Attempt::Transient(format!("signing failed: {e}")),
        };

        debug!(target: "room.hub.client", %url, "Deleting room from directory");

        let response = match self.http.delete(&url).headers(headers).send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Transient(format!("delete request failed: {e}")),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::NO_CONTENT => {
                info!(target: "room.hub.client", %room_id, "Room deleted from directory");
                Attempt::Success(())
            }
            StatusCode::OK | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                warn!(
                    target: "room.hub.client",
                    status = %status,
                    body = %body,
                    "Deletion cannot succeed in its current form; giving up"
                );
                Attempt::Permanent(format!("deletion rejected with status {status}"))
            }
            other => {
                warn!(
                    target: "room.hub.client",
                    status = %other,
                    body = %body,
                    "Unhandled status from deletion"
                );
                Attempt::Transient(format!("delete returned status {other}"))
            }
        }
    }
}

/// Run `op` up to `attempts` times, sleeping `delay` between attempts.
///
/// The sleep is skipped after the final attempt. Permanent outcomes
/// abort the loop immediately; exhaustion wraps the last transient
/// error.
async fn retry_loop<T, F, Fut>(
    attempts: u32,
    delay: Duration,
    what: &str,
    mut op: F,
) -> Result<T, RoomError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut last = format!("{what} was never attempted");

    for attempt in 1..=attempts {
        debug!(
            target: "room.hub.client",
            attempt,
            attempts,
            "Beginning {what} attempt"
        );

        match op().await {
            Attempt::Success(value) => {
                info!(target: "room.hub.client", attempt, "{what} succeeded");
                return Ok(value);
            }
            Attempt::Permanent(reason) => {
                warn!(
                    target: "room.hub.client",
                    attempt,
                    %reason,
                    "{what} failed permanently; not retrying"
                );
                return Err(RoomError::Registration(reason));
            }
            Attempt::Transient(reason) => {
                warn!(
                    target: "room.hub.client",
                    attempt,
                    attempts,
                    %reason,
                    "{what} attempt failed"
                );
                last = reason;
            }
        }

        if attempt < attempts {
            debug!(
                target: "room.hub.client",
                delay_secs = delay.as_secs(),
                "Sleeping before next {what} attempt"
            );
            tokio::time::sleep(delay).await;
        }
    }

    warn!(target: "room.hub.client", attempts, "{what} failed; retries exhausted");
    Err(RoomError::RetriesExhausted { attempts, last })
}
