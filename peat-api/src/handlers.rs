//! API route handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use tracing::{debug, info};

use peat_core::types::ScanResult;

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.uptime_seconds(),
        cache_entries: state.scanner.ephemeral().len(),
    })
}

/// GET /api/scan
pub async fn scan(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScanQuery>,
) -> Result<Json<ScanResult>> {
    let identity = query.identity()?;
    debug!(kind = %identity.kind(), force = query.force_refresh, "scan requested");

    let result = state.scanner.resolve(identity, query.force_refresh).await?;
    Ok(Json(result))
}

/// GET /api/scan/quick
pub async fn quick_scan(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuickScanQuery>,
) -> Result<Json<ScanResult>> {
    let identity = query.identity()?;
    debug!("quick scan requested");

    let result = state.scanner.quick_scan(identity).await?;
    Ok(Json(result))
}

/// GET /api/cache-stats
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        stats: state.scanner.stats().await,
        timestamp: Utc::now(),
    })
}

/// DELETE /api/cache
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClearQuery>,
) -> Json<ClearResponse> {
    let summary = state.scanner.clear(query.include_durable).await;
    info!(include_durable = query.include_durable, "cache cleared via API");

    Json(ClearResponse {
        summary,
        timestamp: Utc::now(),
    })
}
