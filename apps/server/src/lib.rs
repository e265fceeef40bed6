//! # Stockbook Server
//!
//! JSON REST API for the shop: catalog, checkout, debtor ledgers and the
//! sales dashboard.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Server                                 │
//! │                                                                         │
//! │  HTTP ──► TraceLayer ──► timeout ──► /api router ──► stockbook-db      │
//! │                                           │                             │
//! │                                           ▼                             │
//! │                                    ApiError / Envelope                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

pub use crate::config::{ConfigError, ServerConfig};
pub use crate::error::{ApiError, ApiResult};
pub use crate::state::AppState;

/// Builds the application: every route under `/api`, traced and bounded
/// by the request timeout.
pub fn build_router(state: AppState) -> Router {
    let api = routes::router().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::request_timeout,
    ));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
