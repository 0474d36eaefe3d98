//! # hirelink-server
//!
//! Messaging server for the Hirelink marketplace.
//!
//! This binary provides:
//! - **REST API** (axum) over the message store: send, history, summaries,
//!   read-state, deletion, unread counts
//! - **WebSocket gateway** with handshake authentication, presence
//!   broadcasting, and per-conversation rooms
//! - **Real-time delivery façade** shared by both, so REST-persisted
//!   changes reach online peers without polling
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod auth;
mod config;
mod delivery;
mod error;
mod gateway;
mod presence;
mod rate_limit;

use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use hirelink_shared::auth::TokenAuth;
use hirelink_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::delivery::Delivery;
use crate::presence::PresenceRegistry;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hirelink_server=debug")),
        )
        .init();

    info!("Starting Hirelink messaging server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        instance = %config.instance_name,
        addr = %config.http_addr,
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Message store (system of record).
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let db = Arc::new(Mutex::new(db));

    // Presence registry, shared by the gateway and REST delivery.
    let presence = Arc::new(PresenceRegistry::new());
    let delivery = Delivery::new(presence.clone());

    // Bearer-token verifier.
    let token_auth = Arc::new(TokenAuth::new(config.jwt_secret.as_bytes()));

    let rate_limiter = RateLimiter::default();

    let state = AppState {
        db,
        presence,
        delivery,
        auth: token_auth,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
