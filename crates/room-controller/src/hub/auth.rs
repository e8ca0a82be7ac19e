//! Signed-request credentials for hub directory calls.
//!
//! Every exchange with the directory service carries five headers: the
//! identity id, a fresh timestamp, a hash of the request body, and an
//! HMAC-SHA256 signature over the concatenated tokens. The hub verifies
//! the signature against the shared secret and rejects requests whose
//! timestamp falls outside its clock-tolerance window.
//!
//! Token order is fixed: `[id, timestamp]` for empty bodies and
//! `[id, timestamp, body_hash]` otherwise, concatenated with no
//! delimiter. Reordering breaks hub-side verification.

use base64::Engine;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use ring::{digest, hmac};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::config::Config;
use crate::errors::RoomError;

/// Identity id header.
pub const HEADER_ID: &str = "hub-id";
/// Request timestamp header.
pub const HEADER_DATE: &str = "hub-date";
/// Body hash header.
pub const HEADER_BODY_HASH: &str = "hub-sig-body";
/// Signature header.
pub const HEADER_SIGNATURE: &str = "hub-signature";

/// Base64 of the SHA-256 digest of `body`.
///
/// Defined for the empty body as well; the empty-body hash is still
/// transmitted even though it does not enter the signature.
#[must_use]
pub fn body_hash(body: &str) -> String {
    let digest = digest::digest(&digest::SHA256, body.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(digest.as_ref())
}

/// Base64 of HMAC-SHA256 over the tokens concatenated in order.
#[must_use]
pub fn signature(tokens: &[&str], secret: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let message = tokens.concat();
    let tag = hmac::sign(&key, message.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(tag.as_ref())
}

/// Current time as an RFC 3339 string with nanosecond precision, UTC.
///
/// A non-zero configured `time_shift_ms` is applied only to the value
/// transmitted to the hub; the true local time is logged alongside so
/// operators can see both. This lets a deployment compensate for hub
/// clock drift without altering the local clock.
#[must_use]
pub fn timestamp(config: &Config) -> String {
    let now = Utc::now();
    if config.time_shift_ms == 0 {
        return now.to_rfc3339_opts(SecondsFormat::Nanos, true);
    }
    let shifted = now + chrono::Duration::milliseconds(config.time_shift_ms);
    let local = now.to_rfc3339_opts(SecondsFormat::Nanos, true);
    let transmitted = shifted.to_rfc3339_opts(SecondsFormat::Nanos, true);
    debug!(
        target: "room.hub.auth",
        shift_ms = config.time_shift_ms,
        %local,
        %transmitted,
        "Applying clock shift to transmitted timestamp"
    );
    transmitted
}

/// Build the signed headers for one directory request.
///
/// The timestamp is captured fresh on every call; reusing headers across
/// a retry would desynchronize the signature from the hub's
/// clock-tolerance window.
///
/// # Errors
///
/// Returns `RoomError::Internal` if a computed value is not a valid
/// header value (configured ids containing control characters).
pub fn auth_headers(config: &Config, body: &str) -> Result<HeaderMap, RoomError> {
    let ts = timestamp(config);
    let hash = body_hash(body);
    let secret = config.hub_secret.expose_secret();

    // The body hash only enters the signature for non-empty bodies.
    let sig = if body.is_empty() {
        signature(&[&config.hub_id, &ts], secret)
    } else {
        signature(&[&config.hub_id, &ts, &hash], secret)
    };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json,text/plain"),
    );
    headers.insert(HEADER_ID, header_value(&config.hub_id)?);
    headers.insert(HEADER_DATE, header_value(&ts)?);
    headers.insert(HEADER_BODY_HASH, header_value(&hash)?);
    headers.insert(HEADER_SIGNATURE, header_value(&sig)?);

    if config.debug {
        debug!(
            target: "room.hub.auth",
            id = %config.hub_id,
            date = %ts,
            body_hash = %hash,
            signature = %sig,
            "Signed directory request"
        );
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, RoomError> {
    HeaderValue::from_str(value)
        .map_err(|e| RoomError::Internal(format!("invalid header value: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "MyRegistrationSecret";
    const TS: &str = "2026-01-02T03:04:05.000000006Z";

    fn test_config(extra: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("HUB_ADDRESS".to_string(), "hub.example.com".to_string()),
            ("HUB_ID".to_string(), "room-1".to_string()),
            ("HUB_SECRET".to_string(), SECRET.to_string()),
            ("ROOM_CALLBACK_ADDRESS".to_string(), "room.example.com".to_string()),
            ("ROOM_CALLBACK_PORT".to_string(), "3000".to_string()),
        ]);
        for (k, v) in extra {
            vars.insert((*k).to_string(), (*v).to_string());
        }
        Config::from_vars(&vars).expect("Config should load successfully")
    }

    #[test]
    fn test_body_hash_known_vectors() {
        // SHA-256 of the empty string is a fixed, well-known value.
        assert_eq!(body_hash(""), "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
        assert_eq!(
            body_hash("hello"),
            "LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ="
        );
        assert_eq!(body_hash("{}"), "RBNvo1WzZ4oRRq0W9+hknpT7T8If536DEMBg9hyq/4o=");
    }

    #[test]
    fn test_body_hash_differs_for_different_inputs() {
        assert_ne!(body_hash(""), body_hash("x"));
        assert_ne!(body_hash("a"), body_hash("b"));
    }

    #[test]
    fn test_signature_known_vectors() {
        assert_eq!(
            signature(&["room-1", TS], SECRET),
            "8slb6dkVlVuB15E+j5Zpt4MRrgI2LIA/FUQOD7deH34="
        );
        assert_eq!(
            signature(&["room-1", TS, "RBNvo1WzZ4oRRq0W9+hknpT7T8If536DEMBg9hyq/4o="], SECRET),
            "vDnkhuNbEcu18c3JKHNRilAnLUtWk9vaNVsIRUY6/nY="
        );
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = signature(&["room-1", TS], SECRET);
        let b = signature(&["room-1", TS], SECRET);
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_is_sensitive_to_every_token_and_the_secret() {
        let baseline = signature(&["room-1", TS], SECRET);

        assert_ne!(signature(&["room-2", TS], SECRET), baseline);
        assert_ne!(
            signature(&["room-1", "2026-01-02T03:04:05.000000007Z"], SECRET),
            baseline
        );
        assert_ne!(signature(&["room-1", TS], "OtherSecret"), baseline);
    }

    #[test]
    fn test_signature_token_order_matters() {
        // Reordered tokens must produce a different signature; the hub
        // verifies the concatenation [id, timestamp].
        assert_eq!(
            signature(&[TS, "room-1"], SECRET),
            "1O3V/Ob9NOGPza2M3iBOHnJtkx8ZmvDY/zOwVh1rkIc="
        );
        assert_ne!(
            signature(&[TS, "room-1"], SECRET),
            signature(&["room-1", TS], SECRET)
        );
    }

    #[test]
    fn test_auth_headers_sets_all_five_headers() {
        let config = test_config(&[]);
        let headers = auth_headers(&config, "").expect("headers should build");

        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json,text/plain");
        assert_eq!(headers.get(HEADER_ID).unwrap(), "room-1");
        assert!(headers.contains_key(HEADER_DATE));
        assert_eq!(
            headers.get(HEADER_BODY_HASH).unwrap(),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
        assert!(headers.contains_key(HEADER_SIGNATURE));
    }

    #[test]
    fn test_auth_headers_empty_body_signature_excludes_body_hash() {
        let config = test_config(&[]);
        let headers = auth_headers(&config, "").expect("headers should build");

        let ts = headers.get(HEADER_DATE).unwrap().to_str().unwrap();
        let expected = signature(&["room-1", ts], SECRET);
        assert_eq!(headers.get(HEADER_SIGNATURE).unwrap(), expected.as_str());
    }

    #[test]
    fn test_auth_headers_nonempty_body_signature_includes_body_hash() {
        let config = test_config(&[]);
        let body = r#"{"name":"ROOM.03000"}"#;
        let headers = auth_headers(&config, body).expect("headers should build");

        let ts = headers.get(HEADER_DATE).unwrap().to_str().unwrap();
        let hash = body_hash(body);
        assert_eq!(headers.get(HEADER_BODY_HASH).unwrap(), hash.as_str());

        let expected = signature(&["room-1", ts, &hash], SECRET);
        assert_eq!(headers.get(HEADER_SIGNATURE).unwrap(), expected.as_str());
    }

    #[test]
    fn test_timestamp_is_rfc3339_nanos_utc() {
        let config = test_config(&[]);
        let ts = timestamp(&config);

        assert!(ts.ends_with('Z'));
        let parsed = chrono::DateTime::parse_from_rfc3339(&ts);
        assert!(parsed.is_ok(), "timestamp should parse: {ts}");
    }

    #[test]
    fn test_timestamp_applies_configured_shift() {
        let shifted_config = test_config(&[("HUB_TIME_SHIFT_MS", "60000")]);

        let before = Utc::now();
        let ts = timestamp(&shifted_config);
        let parsed = chrono::DateTime::parse_from_rfc3339(&ts).unwrap();

        // Transmitted value sits roughly one minute ahead of local time.
        let delta_ms = parsed
            .signed_duration_since(before)
            .num_milliseconds();
        assert!(
            (59_000..61_000).contains(&delta_ms),
            "expected ~60s shift, got {delta_ms}ms"
        );
    }
}
