//! # Route Handlers
//!
//! ## Route Organization
//! ```text
//! /api
//! ├── /health                               health.rs
//! ├── /debtors ...                          debtors.rs
//! ├── /products ...                         products.rs
//! └── /sales ...                            sales.rs
//! ```
//!
//! Every success body is the envelope `{ success: true, data, message? }`.

pub mod debtors;
pub mod health;
pub mod products;
pub mod sales;

use axum::Router;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Wraps `data` in a success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: None,
    })
}

/// Success envelope with a message for the cashier.
pub fn ok_with<T: Serialize>(data: T, message: impl Into<String>) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
        message: Some(message.into()),
    })
}

/// All API routes, relative to `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(debtors::router())
        .merge(products::router())
        .merge(sales::router())
}
