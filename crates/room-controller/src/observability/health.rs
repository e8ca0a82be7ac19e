//! Health endpoints for the room controller.
//!
//! Provides Kubernetes-compatible probes:
//! - `GET /health` - liveness (is the process running?)
//! - `GET /ready` - readiness (has the room registered with the hub?)
//!
//! Readiness flips true once hub registration succeeds and false again
//! when shutdown begins, so the hub-side load balancer stops routing
//! players to a room that is going away.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Health state for the room controller.
#[derive(Debug)]
pub struct HealthState {
    /// True after startup; the process is running.
    live: AtomicBool,
    /// True once the room is registered with the hub directory.
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the room as ready to receive players.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the room as not ready (e.g. during shutdown).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Create the health router with liveness and readiness endpoints.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

async fn liveness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_live_but_not_ready() {
        let state = HealthState::new();
        assert!(state.is_live());
        assert!(!state.is_ready());
    }

    #[test]
    fn test_readiness_toggles() {
        let state = HealthState::new();

        state.set_ready();
        assert!(state.is_ready());

        state.set_not_ready();
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_liveness_handler_returns_ok() {
        let state = Arc::new(HealthState::new());
        let status = liveness_handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_handler_tracks_state() {
        let state = Arc::new(HealthState::new());

        let status = readiness_handler(State(Arc::clone(&state))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready();
        let status = readiness_handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
