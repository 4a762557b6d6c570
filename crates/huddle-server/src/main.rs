//! # huddle-server
//!
//! HTTP front end for the Huddle chat service.
//!
//! This binary provides:
//! - **REST API** (axum) for contacts, direct chats, groups, messages and
//!   notifications
//! - **Server-Sent Events** streams that replay a chat and then follow it live
//! - **Per-caller rate limiting** to protect against abuse
//!
//! State lives in a single SQLite database (`huddle-store`).

mod api;
mod auth;
mod config;
mod error;
mod extract;
mod rate_limit;
mod sse;

use std::time::Duration;

use huddle_store::{Database, StoreHandle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Huddle server v{} starting", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Configuration loaded");

    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => Database::default_path()?,
    };
    let store = StoreHandle::new(Database::open_at(&db_path)?);

    let http_addr = config.http_addr;
    let state = AppState::new(store, config);
    spawn_rate_limit_purge(state.rate_limiter.clone());

    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server exited with an error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, stopping");
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise info everywhere and debug for our crates.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,huddle_server=debug,huddle_core=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Every 5 minutes, forget callers idle for more than 10.
fn spawn_rate_limit_purge(limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            limiter.purge_stale(600.0).await;
        }
    });
}
