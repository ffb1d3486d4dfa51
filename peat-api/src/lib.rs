//! # PEAT API Server
//!
//! REST API over the exposure scanner.
//!
//! ## Endpoints
//!
//! - `GET /health` - Status, version, uptime and ephemeral cache size
//! - `GET /api/scan?email=…` / `?username=…` / `?usernames=a,b` - Scan an identity
//!   (`forceRefresh=true` skips the caches)
//! - `GET /api/scan/quick?email=…` - Breach and registration lookups only,
//!   uncached; very long breach histories are truncated
//! - `GET /api/cache-stats` - Stats of both cache tiers
//! - `DELETE /api/cache` - Purge the caches (`includeDurable=true` for both tiers)
//!
//! ## Example
//!
//! ```rust,ignore
//! use peat_api::{ApiConfig, ApiServer};
//!
//! let server = ApiServer::from_config(ApiConfig::from_env()).await?;
//! server.run(([0, 0, 0, 0], 3001)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use dto::{
    CacheStatsResponse, ClearQuery, ClearResponse, HealthResponse, QuickScanQuery, ScanQuery,
};
pub use error::ApiError;
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use peat_core::error::Result;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server for PEAT.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a server around existing state.
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Creates a server with the production adapters.
    pub async fn from_config(config: ApiConfig) -> Result<Self> {
        Ok(Self::new(AppState::from_config(config).await?))
    }

    /// Creates the router with all routes configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address until Ctrl-C.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        self.run_until(addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Runs the server until `shutdown` resolves.
    ///
    /// The ephemeral sweep task runs for the lifetime of the server and is
    /// stopped once in-flight requests have drained.
    pub async fn run_until(
        self,
        addr: impl Into<SocketAddr>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let sweeper = self.state.scanner.ephemeral().spawn_sweeper();

        info!("PEAT API server listening on {}", addr);

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        let swept = sweeper.shutdown().await;
        info!(swept, "PEAT API server stopped");
        served
    }
}

/// Starts the API server with configuration from the environment.
pub async fn start_server(port: u16) -> std::io::Result<()> {
    let config = ApiConfig::from_env();
    let host = config.host.clone();
    let server = ApiServer::from_config(config)
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let ip = host
        .parse::<std::net::IpAddr>()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    server.run((ip, port)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_server_stops_on_shutdown_signal() {
        let config = ApiConfig {
            durable_cache: false,
            ..ApiConfig::default()
        };
        let server = ApiServer::from_config(config).await.unwrap();

        let run = server.run_until(([127, 0, 0, 1], 0), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
    }
}
