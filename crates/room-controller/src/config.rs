//! Room controller configuration.
//!
//! Configuration is loaded from environment variables once at startup and
//! passed to every consumer behind an `Arc`; nothing mutates it afterward.
//! The shared hub secret is redacted in Debug output.

use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default number of registration/deletion attempts.
pub const DEFAULT_REGISTRATION_RETRIES: u32 = 5;

/// Default delay between registration/deletion attempts, in seconds.
pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 5;

/// Default upper bound for the randomized smalltalk interval, in seconds.
pub const DEFAULT_SMALLTALK_MAX_INTERVAL_SECONDS: u64 = 65;

/// Default door descriptions, by compass direction.
pub const DEFAULT_DOOR_NORTH: &str = "A frost-covered door leads to the north.";
pub const DEFAULT_DOOR_SOUTH: &str = "A moss-covered door leads to the south.";
pub const DEFAULT_DOOR_EAST: &str = "A badly-painted door opens to the east.";
pub const DEFAULT_DOOR_WEST: &str = "An old swinging door leads west.";
pub const DEFAULT_DOOR_UP: &str = "A rickety set of steps leads up.";
pub const DEFAULT_DOOR_DOWN: &str = "Heat emanates from an opening in the floor.";

/// Text descriptions of the doors that connect this room to its
/// neighbors. The hub typically ignores any direction other than
/// n, s, e and w; up and down are accepted but unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doors {
    pub north: String,
    pub south: String,
    pub east: String,
    pub west: String,
    pub up: String,
    pub down: String,
}

impl Default for Doors {
    fn default() -> Self {
        Self {
            north: DEFAULT_DOOR_NORTH.to_string(),
            south: DEFAULT_DOOR_SOUTH.to_string(),
            east: DEFAULT_DOOR_EAST.to_string(),
            west: DEFAULT_DOOR_WEST.to_string(),
            up: DEFAULT_DOOR_UP.to_string(),
            down: DEFAULT_DOOR_DOWN.to_string(),
        }
    }
}

/// Room controller configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Sensitive fields are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Hub directory address, host\[:port\] without a scheme. The scheme
    /// follows `local_hub`.
    pub hub_address: String,

    /// Identity id this room registered with the hub under.
    pub hub_id: String,

    /// Shared secret used to sign every directory request.
    /// Protected by `SecretString` to prevent accidental logging.
    pub hub_secret: SecretString,

    /// Whether the hub is a local deployment. Local hubs speak http/ws,
    /// remote hubs speak https/wss.
    pub local_hub: bool,

    /// Milliseconds added to the transmitted timestamp so an operator
    /// can compensate for hub clock drift without touching the local
    /// clock. May be negative.
    pub time_shift_ms: i64,

    /// Externally visible address the hub should call back on.
    pub callback_address: String,

    /// Externally visible port for hub websocket callbacks.
    pub callback_port: u16,

    /// Port the websocket server listens on internally. Defaults to the
    /// callback port; diverges when the service runs behind a port
    /// mapping.
    pub listening_port: u16,

    /// The name of this room.
    pub room_name: String,

    /// Door descriptions advertised in the directory entry.
    pub doors: Doors,

    /// Emit verbose wire-level debugging.
    pub debug: bool,

    /// Number of registration/deletion attempts before giving up.
    pub registration_retries: u32,

    /// Delay between registration/deletion attempts.
    pub retry_delay: Duration,

    /// When set, delete this room id from the directory and exit
    /// instead of serving sessions.
    pub room_to_delete: Option<String>,

    /// Health endpoint bind address.
    pub health_bind_address: String,

    /// Upper bound for the randomized pause between ambient smalltalk
    /// injections.
    pub smalltalk_max_interval: Duration,
}

/// Custom Debug implementation that redacts the shared secret.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("hub_address", &self.hub_address)
            .field("hub_id", &self.hub_id)
            .field("hub_secret", &"[REDACTED]")
            .field("local_hub", &self.local_hub)
            .field("time_shift_ms", &self.time_shift_ms)
            .field("callback_address", &self.callback_address)
            .field("callback_port", &self.callback_port)
            .field("listening_port", &self.listening_port)
            .field("room_name", &self.room_name)
            .field("doors", &self.doors)
            .field("debug", &self.debug)
            .field("registration_retries", &self.registration_retries)
            .field("retry_delay", &self.retry_delay)
            .field("room_to_delete", &self.room_to_delete)
            .field("health_bind_address", &self.health_bind_address)
            .field("smalltalk_max_interval", &self.smalltalk_max_interval)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw}"))),
        None => Ok(default),
    }
}

fn door(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    vars.get(key).cloned().unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let hub_address = vars
            .get("HUB_ADDRESS")
            .ok_or_else(|| ConfigError::MissingEnvVar("HUB_ADDRESS".to_string()))?
            .clone();

        let hub_id = vars
            .get("HUB_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("HUB_ID".to_string()))?
            .clone();

        let hub_secret = SecretString::from(
            vars.get("HUB_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("HUB_SECRET".to_string()))?
                .clone(),
        );

        let room_to_delete = vars.get("ROOM_DELETE_ID").cloned().filter(|v| !v.is_empty());

        // Deletion requests do not serve sessions, so the callback
        // surface is only validated in normal mode.
        let (callback_address, callback_port) = if room_to_delete.is_some() {
            (
                vars.get("ROOM_CALLBACK_ADDRESS").cloned().unwrap_or_default(),
                parse_var(vars, "ROOM_CALLBACK_PORT", 0u16)?,
            )
        } else {
            let addr = vars
                .get("ROOM_CALLBACK_ADDRESS")
                .ok_or_else(|| ConfigError::MissingEnvVar("ROOM_CALLBACK_ADDRESS".to_string()))?
                .clone();
            let port: u16 = vars
                .get("ROOM_CALLBACK_PORT")
                .ok_or_else(|| ConfigError::MissingEnvVar("ROOM_CALLBACK_PORT".to_string()))?
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("ROOM_CALLBACK_PORT must be a port number".to_string())
                })?;
            (addr, port)
        };

        let listening_port = parse_var(vars, "ROOM_LISTEN_PORT", callback_port)?;

        let room_name = vars
            .get("ROOM_NAME")
            .cloned()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("ROOM.{callback_port:05}"));

        let doors = Doors {
            north: door(vars, "ROOM_DOOR_NORTH", DEFAULT_DOOR_NORTH),
            south: door(vars, "ROOM_DOOR_SOUTH", DEFAULT_DOOR_SOUTH),
            east: door(vars, "ROOM_DOOR_EAST", DEFAULT_DOOR_EAST),
            west: door(vars, "ROOM_DOOR_WEST", DEFAULT_DOOR_WEST),
            up: door(vars, "ROOM_DOOR_UP", DEFAULT_DOOR_UP),
            down: door(vars, "ROOM_DOOR_DOWN", DEFAULT_DOOR_DOWN),
        };

        let debug = parse_var(vars, "ROOM_DEBUG", false)?;
        let local_hub = parse_var(vars, "HUB_LOCAL", false)?;
        let time_shift_ms = parse_var(vars, "HUB_TIME_SHIFT_MS", 0i64)?;
        let registration_retries = parse_var(
            vars,
            "HUB_REGISTRATION_RETRIES",
            DEFAULT_REGISTRATION_RETRIES,
        )?;
        let retry_delay = Duration::from_secs(parse_var(
            vars,
            "HUB_RETRY_DELAY_SECONDS",
            DEFAULT_RETRY_DELAY_SECONDS,
        )?);
        let smalltalk_max_interval = Duration::from_secs(parse_var(
            vars,
            "ROOM_SMALLTALK_MAX_INTERVAL_SECONDS",
            DEFAULT_SMALLTALK_MAX_INTERVAL_SECONDS,
        )?);

        let health_bind_address = vars
            .get("ROOM_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        Ok(Config {
            hub_address,
            hub_id,
            hub_secret,
            local_hub,
            time_shift_ms,
            callback_address,
            callback_port,
            listening_port,
            room_name,
            doors,
            debug,
            registration_retries,
            retry_delay,
            room_to_delete,
            health_bind_address,
            smalltalk_max_interval,
        })
    }

    /// Base URL of the hub directory service, scheme included.
    #[must_use]
    pub fn hub_base_url(&self) -> String {
        let scheme = if self.local_hub { "http" } else { "https" };
        format!("{scheme}://{}", self.hub_address)
    }

    /// Websocket target the hub should connect back to.
    #[must_use]
    pub fn callback_target(&self) -> String {
        let scheme = if self.local_hub { "ws" } else { "wss" };
        format!(
            "{scheme}://{}:{}",
            self.callback_address, self.callback_port
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("HUB_ADDRESS".to_string(), "hub.example.com".to_string()),
            ("HUB_ID".to_string(), "google:12345".to_string()),
            ("HUB_SECRET".to_string(), "shared-secret".to_string()),
            (
                "ROOM_CALLBACK_ADDRESS".to_string(),
                "room.example.com".to_string(),
            ),
            ("ROOM_CALLBACK_PORT".to_string(), "3000".to_string()),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.hub_address, "hub.example.com");
        assert_eq!(config.hub_id, "google:12345");
        assert_eq!(config.callback_address, "room.example.com");
        assert_eq!(config.callback_port, 3000);
        // Listening port defaults to the callback port.
        assert_eq!(config.listening_port, 3000);
        // Room name is derived from the callback port when unset.
        assert_eq!(config.room_name, "ROOM.03000");
        assert_eq!(config.doors, Doors::default());
        assert!(!config.debug);
        assert!(!config.local_hub);
        assert_eq!(config.time_shift_ms, 0);
        assert_eq!(config.registration_retries, DEFAULT_REGISTRATION_RETRIES);
        assert_eq!(
            config.retry_delay,
            Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS)
        );
        assert_eq!(config.room_to_delete, None);
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("ROOM_LISTEN_PORT".to_string(), "4000".to_string());
        vars.insert("ROOM_NAME".to_string(), "The Lobby".to_string());
        vars.insert("ROOM_DOOR_NORTH".to_string(), "An iron gate.".to_string());
        vars.insert("ROOM_DEBUG".to_string(), "true".to_string());
        vars.insert("HUB_LOCAL".to_string(), "true".to_string());
        vars.insert("HUB_TIME_SHIFT_MS".to_string(), "-250".to_string());
        vars.insert("HUB_REGISTRATION_RETRIES".to_string(), "3".to_string());
        vars.insert("HUB_RETRY_DELAY_SECONDS".to_string(), "1".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.listening_port, 4000);
        assert_eq!(config.room_name, "The Lobby");
        assert_eq!(config.doors.north, "An iron gate.");
        assert_eq!(config.doors.south, DEFAULT_DOOR_SOUTH);
        assert!(config.debug);
        assert!(config.local_hub);
        assert_eq!(config.time_shift_ms, -250);
        assert_eq!(config.registration_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_from_vars_missing_hub_address() {
        let mut vars = base_vars();
        vars.remove("HUB_ADDRESS");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "HUB_ADDRESS"));
    }

    #[test]
    fn test_from_vars_missing_callback_address() {
        let mut vars = base_vars();
        vars.remove("ROOM_CALLBACK_ADDRESS");

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "ROOM_CALLBACK_ADDRESS")
        );
    }

    #[test]
    fn test_delete_mode_does_not_require_callback_surface() {
        let vars = HashMap::from([
            ("HUB_ADDRESS".to_string(), "hub.example.com".to_string()),
            ("HUB_ID".to_string(), "google:12345".to_string()),
            ("HUB_SECRET".to_string(), "shared-secret".to_string()),
            ("ROOM_DELETE_ID".to_string(), "abc123".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.room_to_delete, Some("abc123".to_string()));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut vars = base_vars();
        vars.insert("ROOM_CALLBACK_PORT".to_string(), "not-a-port".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_hub_urls_follow_local_flag() {
        let mut vars = base_vars();
        let remote = Config::from_vars(&vars).unwrap();
        assert_eq!(remote.hub_base_url(), "https://hub.example.com");
        assert_eq!(remote.callback_target(), "wss://room.example.com:3000");

        vars.insert("HUB_LOCAL".to_string(), "true".to_string());
        let local = Config::from_vars(&vars).unwrap();
        assert_eq!(local.hub_base_url(), "http://hub.example.com");
        assert_eq!(local.callback_target(), "ws://room.example.com:3000");
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("shared-secret"));
    }
}
