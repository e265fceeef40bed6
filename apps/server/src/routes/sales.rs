//! Checkout, sale history and the dashboard.
//!
//! ## Checkout
//! ```text
//! POST /api/sales  (Idempotency-Key: abc)
//!      │
//!      ▼
//! SaleRepository::checkout ── one transaction behind the write gate
//!      │
//!      ├── new sale      ──► 201 { data: { sale, replayed: false, ledgerEntry } }
//!      └── key seen      ──► 200 { data: { sale, replayed: true } }
//! ```

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use stockbook_core::aggregation::{aggregate, parse_timestamp, AggregationOptions, DashboardStats, Window};
use stockbook_core::checkout::CheckoutRequest;
use stockbook_core::{Money, Sale, ValidationError};
use stockbook_db::{CancelOutcome, CheckoutOutcome, SaleFilter};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::extract::{header_value, Actor, ApiJson, ApiQuery, IDEMPOTENCY_HEADER};
use crate::routes::{ok, ok_with, Envelope};
use crate::state::AppState;

// =============================================================================
// Payloads
// =============================================================================

/// `GET /sales` filter. Bounds take RFC 3339 instants or local `YYYY-MM-DD`
/// dates; a date as `to` includes that whole day.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaySales {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Completed sales only.
    pub sales_count: u64,
    pub total_amount: Money,
    pub sales: Vec<Sale>,
}

// =============================================================================
// Router
// =============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", get(list).post(checkout))
        .route("/sales/today", get(today))
        .route("/sales/stats", get(stats))
        .route("/sales/debtor/{id}", get(by_debtor))
        .route("/sales/{id}", get(get_one).delete(cancel))
}

// =============================================================================
// Handlers
// =============================================================================

async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(mut request): ApiJson<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<CheckoutOutcome>>)> {
    if request.idempotency_key.is_none() {
        request.idempotency_key = header_value(&headers, IDEMPOTENCY_HEADER);
    }

    let outcome = state.db.sales().checkout(&request).await?;
    if outcome.replayed {
        return Ok((StatusCode::OK, ok_with(outcome, "Sale already recorded")));
    }

    info!(
        receipt = %outcome.sale.receipt_number,
        total = outcome.sale.total_cents,
        method = ?outcome.sale.payment_method,
        "Checkout completed"
    );
    Ok((StatusCode::CREATED, ok_with(outcome, "Sale completed")))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Envelope<Vec<Sale>>>> {
    let offset = state.config.utc_offset();
    let filter = SaleFilter {
        from: params
            .from
            .as_deref()
            .map(|raw| parse_bound("from", raw, offset, false))
            .transpose()?,
        to: params
            .to
            .as_deref()
            .map(|raw| parse_bound("to", raw, offset, true))
            .transpose()?,
        limit: params.limit,
    };
    Ok(ok(state.db.sales().list(&filter).await?))
}

/// Sales of the current local day. The list is capped like `GET /sales`;
/// the count and total cover the whole day.
async fn today(State(state): State<AppState>) -> ApiResult<Json<Envelope<TodaySales>>> {
    let window = Window::day(Utc::now(), state.config.utc_offset());
    let sales = state.db.sales();

    let totals = sales.completed_totals(window.start, window.end).await?;
    let listed = sales
        .list(&SaleFilter {
            from: Some(window.start),
            to: Some(window.end),
            limit: None,
        })
        .await?;

    Ok(ok(TodaySales {
        from: window.start,
        to: window.end,
        sales_count: totals.sales_count.max(0) as u64,
        total_amount: Money::from_cents(totals.total_cents),
        sales: listed,
    }))
}

/// Dashboard figures computed from the whole sales history.
async fn stats(State(state): State<AppState>) -> ApiResult<Json<Envelope<DashboardStats>>> {
    let products = state.db.products().all_active().await?;
    let sales = state.db.sales().snapshots().await?;

    let options = AggregationOptions::new(Utc::now())
        .with_offset(state.config.utc_offset())
        .with_margin_bps(state.config.estimated_margin_bps)
        .with_top_n(state.config.top_products_limit);
    let stats = aggregate(&products, &sales, &options);

    let quality = &stats.data_quality;
    if quality.unparseable_timestamps > 0 || quality.skipped_items > 0 {
        warn!(
            unparseable_timestamps = quality.unparseable_timestamps,
            skipped_items = quality.skipped_items,
            "Dashboard computed over damaged sale records"
        );
    }
    Ok(ok(stats))
}

async fn by_debtor(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Envelope<Vec<Sale>>>> {
    Ok(ok(state.db.sales().by_debtor(&id).await?))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Envelope<Sale>>> {
    state
        .db
        .sales()
        .get_by_id(&id)
        .await?
        .map(ok)
        .ok_or_else(|| ApiError::not_found("Sale", &id))
}

/// Cancels a completed sale: restock, void open credit, compensate the ledger.
async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: Actor,
) -> ApiResult<Json<Envelope<CancelOutcome>>> {
    let outcome = state.db.sales().cancel(&id, actor.as_deref()).await?;
    Ok(ok_with(outcome, "Sale cancelled"))
}

// =============================================================================
// Helpers
// =============================================================================

/// Parses a range bound. Dates are local midnight; an end date moves to the
/// following midnight so the range stays `[from, to)`.
fn parse_bound(field: &str, raw: &str, offset: FixedOffset, end: bool) -> Result<DateTime<Utc>, ApiError> {
    if let Some(at) = parse_timestamp(raw) {
        return Ok(at);
    }

    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "expected an RFC 3339 timestamp or YYYY-MM-DD".to_string(),
    })?;
    let date = if end { date.succ_opt().unwrap_or(date) } else { date };

    let local = date.and_time(NaiveTime::MIN);
    Ok((local - chrono::Duration::seconds(offset.local_minus_utc() as i64)).and_utc())
}
