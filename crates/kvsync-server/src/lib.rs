//! kvsync API Server
//!
//! Exercises three consistency patterns between a fast key-value store
//! (Redis, or an in-process stand-in) and a durable SQLite table.
//!
//! # Architecture
//!
//! - **Store**: the [`store::FastStore`] seam over Redis or memory
//! - **Database**: the durable `users` table behind [`db::UserRepository`]
//! - **Score**: optimistic per-user counters with bounded retries
//! - **Sync**: write-through, cache-aside and write-behind updates
//! - **Leaderboard**: ranking kept in a sorted set
//! - **Routes**: thin HTTP surface over the components
//!
//! # Features
//!
//! - `tracing` - Log output through `tracing-subscriber`

#![warn(clippy::all)]

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod leaderboard;
pub mod request;
pub mod response;
pub mod routes;
pub mod score;
pub mod state;
pub mod store;
pub mod sync;

pub use crate::config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Server builder for constructing and running the API server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given configuration.
    pub async fn new(config: ServerConfig) -> Result<Self, anyhow::Error> {
        if let Err(errors) = crate::config::validate_config(&config) {
            for e in &errors {
                error!(error = %e, "Invalid configuration");
            }
            anyhow::bail!("{} configuration error(s)", errors.len());
        }

        let state = AppState::new(&config).await?;
        Ok(Self { config, state })
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone(), &self.config.server)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until a shutdown signal, then release both stores.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = self.addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("Server listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.state.shutdown().await;
        Ok(())
    }

    /// Get the server's socket address.
    pub fn addr(&self) -> Result<SocketAddr, anyhow::Error> {
        self.config
            .socket_addr()
            .context("Invalid bind address")
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
