//! Debtor directory, balance changes and credit settlement.
//!
//! ```text
//! GET    /debtors                                        list
//! POST   /debtors                                        create
//! GET    /debtors/active                                 debt > 0
//! GET    /debtors/search?query=                          name / phone
//! GET    /debtors/stats                                  directory totals
//! GET    /debtors/{id}                                   one debtor
//! PUT    /debtors/{id}                                   profile edit
//! DELETE /debtors/{id}                                   delete with ledger
//! PATCH  /debtors/{id}/debt                              ledger entry
//! GET    /debtors/{id}/transactions                      ledger
//! GET    /debtors/{id}/sales                             credit sales
//! GET    /debtors/{id}/history                           rebuilt history
//! POST   /debtors/{id}/sales/{saleId}/items/{itemId}/settle
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockbook_core::ledger::{DebtorSummary, LedgerChange};
use stockbook_core::{
    DebtChangeKind, Debtor, DebtorPatch, DebtorStatus, LedgerEntry, LedgerEntryType, Money, NewDebtor, Sale,
    SettleAction,
};
use stockbook_db::{DebtorHistory, SettleOutcome};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ApiResult;
use crate::extract::{Actor, ApiJson, ApiQuery};
use crate::routes::{ok, ok_with, Envelope};
use crate::state::AppState;

// =============================================================================
// Payloads
// =============================================================================

/// A debtor with its computed standing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtorView {
    #[serde(flatten)]
    pub debtor: Debtor,
    pub status: DebtorStatus,
    pub over_limit: bool,
}

impl DebtorView {
    fn new(debtor: Debtor, config: &ServerConfig, now: DateTime<Utc>) -> Self {
        DebtorView {
            status: debtor.status(now, config.overdue_after_days),
            over_limit: debtor.is_over_limit(),
            debtor,
        }
    }

    fn many(debtors: Vec<Debtor>, config: &ServerConfig) -> Vec<Self> {
        let now = Utc::now();
        debtors
            .into_iter()
            .map(|debtor| DebtorView::new(debtor, config, now))
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
}

/// `PATCH /debtors/{id}/debt`. Amounts are in minor units.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtRequest {
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: DebtChangeKind,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub entry_type: Option<LedgerEntryType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtChanged {
    pub debtor: DebtorView,
    pub entry: LedgerEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    pub action: SettleAction,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    #[serde(flatten)]
    pub history: DebtorHistory,
    pub status: DebtorStatus,
}

// =============================================================================
// Router
// =============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/debtors", get(list).post(create))
        .route("/debtors/active", get(active))
        .route("/debtors/search", get(search))
        .route("/debtors/stats", get(stats))
        .route("/debtors/{id}", get(get_one).put(update).delete(remove))
        .route("/debtors/{id}/debt", patch(change_debt))
        .route("/debtors/{id}/transactions", get(transactions))
        .route("/debtors/{id}/sales", get(sales))
        .route("/debtors/{id}/history", get(history))
        .route(
            "/debtors/{id}/sales/{sale_id}/items/{item_id}/settle",
            post(settle),
        )
}

// =============================================================================
// Handlers
// =============================================================================

async fn list(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<DebtorView>>>> {
    let debtors = state.db.debtors().list().await?;
    Ok(ok(DebtorView::many(debtors, &state.config)))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewDebtor>,
) -> ApiResult<(StatusCode, Json<Envelope<DebtorView>>)> {
    let debtor = state.db.debtors().create(&input).await?;
    info!(id = %debtor.id, "Debtor registered via API");
    let view = DebtorView::new(debtor, &state.config, Utc::now());
    Ok((StatusCode::CREATED, ok_with(view, "Debtor created")))
}

async fn active(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<DebtorView>>>> {
    let debtors = state.db.debtors().active().await?;
    Ok(ok(DebtorView::many(debtors, &state.config)))
}

async fn search(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<Envelope<Vec<DebtorView>>>> {
    let query = params.query.unwrap_or_default();
    let debtors = state.db.debtors().search(&query).await?;
    Ok(ok(DebtorView::many(debtors, &state.config)))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<Envelope<DebtorSummary>>> {
    let summary = state
        .db
        .debtors()
        .stats(Utc::now(), state.config.overdue_after_days)
        .await?;
    Ok(ok(summary))
}

async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<DebtorView>>> {
    let debtor = state.db.debtors().require(&id).await?;
    Ok(ok(DebtorView::new(debtor, &state.config, Utc::now())))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<DebtorPatch>,
) -> ApiResult<Json<Envelope<DebtorView>>> {
    let debtor = state.db.debtors().update(&id, &patch).await?;
    Ok(ok_with(
        DebtorView::new(debtor, &state.config, Utc::now()),
        "Debtor updated",
    ))
}

async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Envelope<()>>> {
    state.db.debtors().delete(&id).await?;
    Ok(ok_with((), "Debtor deleted"))
}

/// Adds or subtracts debt through the ledger.
///
/// Over-payment is accepted and clamps the balance at zero; the entry
/// records both the requested and the applied amount.
async fn change_debt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    actor: Actor,
    ApiJson(request): ApiJson<DebtRequest>,
) -> ApiResult<Json<Envelope<DebtChanged>>> {
    let change = LedgerChange::from_debt_request(
        request.kind,
        request.entry_type,
        Money::from_cents(request.amount),
    )?;
    let (entry, debtor) = state
        .db
        .debtors()
        .apply_entry(&id, &change, request.notes.as_deref(), actor.as_deref())
        .await?;

    let message = if entry.applied_cents < entry.amount_cents {
        "Debt updated; amount exceeded the balance and was clamped"
    } else {
        "Debt updated"
    };
    let changed = DebtChanged {
        debtor: DebtorView::new(debtor, &state.config, Utc::now()),
        entry,
    };
    Ok(ok_with(changed, message))
}

async fn transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<Vec<LedgerEntry>>>> {
    Ok(ok(state.db.debtors().entries(&id).await?))
}

async fn sales(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Envelope<Vec<Sale>>>> {
    Ok(ok(state.db.debtors().sales(&id).await?))
}

async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<HistoryView>>> {
    let history = state.db.debtors().history(&id).await?;
    let status = history
        .debtor
        .status(Utc::now(), state.config.overdue_after_days);
    Ok(ok(HistoryView { history, status }))
}

async fn settle(
    State(state): State<AppState>,
    Path((id, sale_id, item_id)): Path<(String, String, String)>,
    actor: Actor,
    ApiJson(request): ApiJson<SettleRequest>,
) -> ApiResult<Json<Envelope<SettleOutcome>>> {
    let outcome = state
        .db
        .debtors()
        .settle_item(
            &id,
            &sale_id,
            &item_id,
            request.action,
            request.reason.as_deref(),
            actor.as_deref(),
        )
        .await?;

    let message = match request.action {
        SettleAction::Pay => "Item paid",
        SettleAction::Remove => "Item removed",
    };
    Ok(ok_with(outcome, message))
}
