//! Estimating engine for the Laurel proposal app.
//!
//! Serves cost rollups, estimation workflow writes and bid totals over
//! HTTP/JSON against the Django application's Postgres database.

pub mod bid;
pub mod cache;
pub mod config;
pub mod error;
pub mod estimate;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::cache::{AppCache, CacheStats};
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cache: AppCache,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            cache: AppCache::new(config.rollup_cache_capacity, config.rollup_cache_ttl),
            config: Arc::new(config),
        }
    }
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/invalidate", post(invalidate_all))
        .route("/api/cache/invalidate/:doc", post(invalidate_cache))
        .merge(estimate::router())
        .merge(bid::router())
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

async fn invalidate_all(State(state): State<AppState>) -> Json<Value> {
    state.cache.invalidate_all();
    Json(json!({ "invalidated": "all" }))
}

async fn invalidate_cache(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Json<Value> {
    state.cache.invalidate_opportunity(&doc).await;
    Json(json!({ "invalidated": doc }))
}
