//! Request deadline.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Fails a request with 503 once it exceeds `request_timeout_secs`.
///
/// Dropping the handler future rolls back any open transaction and
/// releases the write gate.
pub async fn request_timeout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let limit = state.config.request_timeout();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(%method, %path, timeout_secs = limit.as_secs(), "Request timed out");
            ApiError::service_unavailable("Request timed out").into_response()
        }
    }
}
