//! Room Controller
//!
//! One room node in a multiplayer text-adventure hub.
//!
//! # Modes
//!
//! - **Delete mode** (`ROOM_DELETE_ID` set): run the signed deletion
//!   protocol against the hub directory, then exit.
//! - **Normal mode**: register this room with the directory (bounded
//!   retries, fatal on exhaustion), then serve the websocket session
//!   protocol indefinitely.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment (fatal before any network use)
//! 3. Build the directory client; run delete mode if requested
//! 4. Register with the hub, retrying per configuration
//! 5. Spawn the registry actor, conversation task and health server
//! 6. Serve websocket sessions until a shutdown signal arrives

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use room_controller::actors::RegistryActor;
use room_controller::config::Config;
use room_controller::conversation;
use room_controller::hub::DirectoryClient;
use room_controller::observability::{health_router, HealthState};
use room_controller::protocol::commands::SlashTable;
use room_controller::protocol::Bookmark;
use room_controller::session::{session_router, SessionState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_controller=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting room controller");

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    let config = Arc::new(config);

    info!(
        hub_address = %config.hub_address,
        room_name = %config.room_name,
        callback_target = %config.callback_target(),
        listening_port = config.listening_port,
        registration_retries = config.registration_retries,
        retry_delay_secs = config.retry_delay.as_secs(),
        "Configuration loaded successfully"
    );

    let directory = DirectoryClient::new(Arc::clone(&config))?;

    // Delete mode: do the work and exit.
    if let Some(room_id) = config.room_to_delete.clone() {
        info!(%room_id, "Delete mode: removing room from hub directory");
        directory.delete_with_retries(&room_id).await.map_err(|e| {
            error!(error = %e, %room_id, "Room deletion failed");
            e
        })?;
        info!(%room_id, "Room deletion complete");
        return Ok(());
    }

    // Registration must succeed before the room serves any sessions.
    info!("Registering with hub directory");
    directory.register_with_retries().await.map_err(|e| {
        error!(error = %e, "Registration failed; exiting");
        e
    })?;
    if let Some(record) = directory.registration() {
        info!(site_id = %record.id, "Hub directory entry confirmed");
    }

    let health_state = Arc::new(HealthState::new());
    health_state.set_ready();

    let shutdown_token = CancellationToken::new();

    // The registry actor must run before any session callbacks arrive.
    let bookmark = Bookmark::new();
    let (registry, _registry_task) =
        RegistryActor::spawn(bookmark.clone(), shutdown_token.child_token());
    info!("Registry actor started");

    let _conversation_task = conversation::spawn(
        registry.clone(),
        config.smalltalk_max_interval,
        shutdown_token.child_token(),
    );
    info!("Conversation task started");

    // Health server. Bind before spawning to fail fast on bind errors.
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;
    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_app = health_router(Arc::clone(&health_state));
    let health_shutdown = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // Session server for hub websocket callbacks.
    let session_addr = SocketAddr::from(([0, 0, 0, 0], config.listening_port));
    let session_listener = tokio::net::TcpListener::bind(session_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %session_addr, "Failed to bind session server");
            format!("Failed to bind session server to {session_addr}: {e}")
        })?;

    let session_state = SessionState {
        config: Arc::clone(&config),
        registry: registry.clone(),
        slash: Arc::new(SlashTable::default()),
        bookmark,
    };
    let session_app = session_router(session_state);
    let session_shutdown = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %session_addr, "Session server starting");
        let server =
            axum::serve(session_listener, session_app).with_graceful_shutdown(async move {
                session_shutdown.cancelled().await;
                info!("Session server shutting down");
            });
        if let Err(e) = server.await {
            error!(error = %e, "Session server failed");
        }
    });

    info!("Room controller running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown");

    // Stop advertising readiness before tearing anything down.
    health_state.set_not_ready();
    shutdown_token.cancel();

    // Give servers and tasks a moment to drain.
    tokio::time::sleep(Duration::from_secs(1)).await;

    info!("Room controller shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed; without them the
/// service could not shut down gracefully at all.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
