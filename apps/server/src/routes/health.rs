use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::routes::{ok, Envelope};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Liveness plus a `SELECT 1` against the pool.
async fn health(State(state): State<AppState>) -> ApiResult<Json<Envelope<Health>>> {
    if !state.db.health_check().await {
        return Err(ApiError::service_unavailable("Database unavailable"));
    }
    Ok(ok(Health {
        status: "ok",
        database: "connected",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
