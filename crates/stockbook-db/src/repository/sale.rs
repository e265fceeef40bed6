//! # Sale Repository
//!
//! Checkout, cancellation and sale queries.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout(request)                                                      │
//! │                                                                         │
//! │  gate.lock()                                                            │
//! │  BEGIN                                                                  │
//! │    1. idempotency key seen? ──yes──► return stored sale (no writes)     │
//! │    2. load referenced products                                          │
//! │    3. plan_checkout (core): stock, prices, cost basis                   │
//! │    4. credit: load debtor (DebtorNotFound)                              │
//! │    5. UPDATE products SET quantity = quantity - n WHERE quantity >= n   │
//! │    6. INSERT sale + items                                               │
//! │    7. credit: ledger `sale` entry for the total                         │
//! │  COMMIT                    (any error above: ROLLBACK, nothing stored)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancellation is the compensating action: restock, void open credit and
//! write the open credit off the debtor's balance.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use stockbook_core::aggregation::{SaleLineSnapshot, SaleSnapshot};
use stockbook_core::checkout::{plan_checkout, CheckoutRequest};
use stockbook_core::ledger::LedgerChange;
use stockbook_core::validation::validate_notes;
use stockbook_core::{
    CoreError, LedgerEntry, PaymentMethod, Sale, SaleItem, SaleStatus, SaleType, Settlement, ValidationError,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ledger::{append_entry, load_debtor, EntryRefs};
use super::product::{decrement_stock, fetch_by_id, fetch_many, restock};
use super::{non_blank, SALE_COLUMNS, SALE_ITEM_COLUMNS};
use crate::error::{DbError, DbResult};
use crate::pool::{LedgerPolicy, WriteGate};

const DEFAULT_LIST_LIMIT: u32 = 100;
const MAX_LIST_LIMIT: u32 = 1_000;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

// =============================================================================
// Inputs / Outputs
// =============================================================================

/// Sale listing filter; bounds are `[from, to)`.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Completed-sale figures for a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct SaleTotals {
    pub sales_count: i64,
    pub total_cents: i64,
}

/// Result of a checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub sale: Sale,
    /// True when the idempotency key matched an earlier checkout.
    pub replayed: bool,
    /// The `sale` entry of a credit checkout.
    pub ledger_entry: Option<LedgerEntry>,
}

/// Result of cancelling a sale.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOutcome {
    pub sale: Sale,
    /// Write-off of the credit that was still open, if any.
    pub ledger_entry: Option<LedgerEntry>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    write_gate: WriteGate,
    policy: LedgerPolicy,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool, write_gate: WriteGate, policy: LedgerPolicy) -> Self {
        SaleRepository {
            pool,
            write_gate,
            policy,
        }
    }

    /// Records a sale atomically. See the module docs for the sequence.
    ///
    /// ## Errors
    /// - `EmptySale`, `TooManyItems`, `Validation` for a malformed cart
    /// - `ProductNotFound` / `InsufficientStock` naming the first bad line
    /// - `CreditRequiresDebtor`, `DebtorNotFound`, `CreditLimitExceeded`
    pub async fn checkout(&self, request: &CheckoutRequest) -> DbResult<CheckoutOutcome> {
        let idempotency_key = non_blank(request.idempotency_key.as_deref());
        if let Some(key) = &idempotency_key {
            if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
                return Err(ValidationError::TooLong {
                    field: "idempotencyKey".to_string(),
                    max: MAX_IDEMPOTENCY_KEY_LEN,
                }
                .into());
            }
        }
        let notes = non_blank(request.notes.as_deref());
        if let Some(notes) = &notes {
            validate_notes(notes)?;
        }

        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        if let Some(key) = &idempotency_key {
            if let Some(sale) = fetch_sale_by_key(&mut *tx, key).await? {
                info!(sale_id = %sale.id, key = %key, "Checkout replayed");
                return Ok(CheckoutOutcome {
                    sale,
                    replayed: true,
                    ledger_entry: None,
                });
            }
        }

        let products = fetch_many(&mut *tx, &request.product_ids()).await?;
        let plan = plan_checkout(
            &request.items,
            &products,
            request.payment_method,
            request.debtor_id.as_deref(),
            self.policy.estimated_margin_bps,
        )?;

        let debtor = match (request.payment_method, request.debtor_id.as_deref()) {
            (PaymentMethod::Credit, Some(debtor_id)) => Some(load_debtor(&mut *tx, debtor_id.trim()).await?),
            _ => None,
        };

        for (product_id, quantity) in &plan.stock_demand {
            if !decrement_stock(&mut *tx, product_id, *quantity).await? {
                let current = fetch_by_id(&mut *tx, product_id).await?;
                return Err(match current {
                    Some(p) => CoreError::InsufficientStock {
                        product: p.name,
                        available: p.quantity,
                        requested: *quantity,
                    },
                    None => CoreError::ProductNotFound(product_id.clone()),
                }
                .into());
            }
        }

        let now = Utc::now();
        let receipt_number = next_receipt_number(&mut *tx, now).await?;
        let item_settlement = if request.payment_method.is_credit() {
            Settlement::Open
        } else {
            Settlement::Settled
        };

        let mut sale = Sale {
            id: Uuid::new_v4().to_string(),
            receipt_number,
            sale_type: SaleType::Sale,
            payment_method: request.payment_method,
            status: SaleStatus::Completed,
            total_cents: plan.total.cents(),
            total_cost_cents: plan.total_cost.cents(),
            profit_cents: plan.profit.cents(),
            debtor_id: debtor.as_ref().map(|d| d.id.clone()),
            customer_name: non_blank(request.customer_name.as_deref()),
            customer_phone: non_blank(request.customer_phone.as_deref()),
            notes,
            idempotency_key,
            created_at: now,
            updated_at: now,
            items: Vec::with_capacity(plan.lines.len()),
        };

        insert_sale(&mut *tx, &sale).await?;

        for (position, line) in plan.lines.iter().enumerate() {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                name_snapshot: line.name.clone(),
                barcode_snapshot: line.barcode.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                unit_cost_cents: line.unit_cost.cents(),
                line_total_cents: line.line_total.cents(),
                cost_basis: line.cost_basis,
                settlement: item_settlement,
                settled_at: (item_settlement == Settlement::Settled).then_some(now),
                settlement_reason: None,
                settlement_entry_id: None,
                created_at: now,
            };
            insert_item(&mut *tx, &item, position as i64).await?;
            sale.items.push(item);
        }

        let ledger_entry = match &debtor {
            Some(debtor) if plan.total.is_positive() => {
                let change = LedgerChange::sale(plan.total)?;
                let notes = format!("Sale {}", sale.receipt_number);
                let refs = EntryRefs {
                    notes: Some(&notes),
                    sale_id: Some(&sale.id),
                    ..EntryRefs::default()
                };
                let (entry, _) =
                    append_entry(&mut *tx, debtor, &change, refs, self.policy.enforce_credit_limit, now).await?;
                Some(entry)
            }
            _ => None,
        };

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            total = sale.total_cents,
            items = sale.items.len(),
            payment_method = ?sale.payment_method,
            "Sale completed"
        );

        Ok(CheckoutOutcome {
            sale,
            replayed: false,
            ledger_entry,
        })
    }

    /// Cancels a completed sale.
    ///
    /// ## Effects (one transaction)
    /// 1. every item's quantity goes back on the shelf
    /// 2. credit items still `open` become `voided`
    /// 3. one `adjustment`/decrease entry for the open credit, if the
    ///    debtor still exists
    /// 4. status → `cancelled`
    ///
    /// Items already paid keep their payment; a refund is a separate entry.
    pub async fn cancel(&self, sale_id: &str, actor: Option<&str>) -> DbResult<CancelOutcome> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut sale = fetch_sale(&mut *tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale.id.clone(),
                current_status: sale.status.as_str().to_string(),
            }
            .into());
        }

        for item in &sale.items {
            restock(&mut *tx, &item.product_id, item.quantity).await?;
        }

        let now = Utc::now();
        let open_credit = sale.open_credit();

        let ledger_entry = match sale.debtor_id.as_deref() {
            Some(debtor_id) if open_credit.is_positive() => {
                match load_debtor(&mut *tx, debtor_id).await {
                    Ok(debtor) => {
                        let change = LedgerChange::write_off(open_credit)?;
                        let notes = format!("Sale {} cancelled", sale.receipt_number);
                        let refs = EntryRefs {
                            notes: Some(&notes),
                            sale_id: Some(&sale.id),
                            created_by: actor,
                            ..EntryRefs::default()
                        };
                        let (entry, _) =
                            append_entry(&mut *tx, &debtor, &change, refs, self.policy.enforce_credit_limit, now)
                                .await?;
                        Some(entry)
                    }
                    Err(DbError::Domain(CoreError::DebtorNotFound(_))) => {
                        warn!(sale_id = %sale.id, debtor_id = %debtor_id, "Cancelled sale's debtor no longer exists");
                        None
                    }
                    Err(other) => return Err(other),
                }
            }
            _ => None,
        };

        let entry_id = ledger_entry.as_ref().map(|e| e.id.clone());
        sqlx::query(
            r#"
            UPDATE sale_items
            SET settlement = 'voided', settled_at = ?1, settlement_reason = 'sale cancelled',
                settlement_entry_id = ?2
            WHERE sale_id = ?3 AND settlement = 'open'
            "#,
        )
        .bind(now)
        .bind(&entry_id)
        .bind(&sale.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE sales SET status = 'cancelled', updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(&sale.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        sale.status = SaleStatus::Cancelled;
        sale.updated_at = now;
        for item in sale.items.iter_mut().filter(|i| i.settlement == Settlement::Open) {
            item.settlement = Settlement::Voided;
            item.settled_at = Some(now);
            item.settlement_reason = Some("sale cancelled".to_string());
            item.settlement_entry_id = entry_id.clone();
        }

        info!(sale_id = %sale.id, written_off = open_credit.cents(), "Sale cancelled");
        Ok(CancelOutcome { sale, ledger_entry })
    }

    /// Gets a sale with its items.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        debug!(id = %id, "Getting sale");
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut *conn, id).await
    }

    /// Sales in a time range, newest first, with items.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        debug!(from = ?filter.from, to = ?filter.to, limit, "Listing sales");

        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at < ?2)
            ORDER BY created_at DESC, id
            LIMIT ?3
            "#
        );
        let mut sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(filter.from)
            .bind(filter.to)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?;

        attach_items(&mut *conn, &mut sales).await?;
        Ok(sales)
    }

    /// Count and revenue of completed sales in `[from, to)`, summed in SQL so
    /// the figures never depend on a list page size.
    pub async fn completed_totals(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> DbResult<SaleTotals> {
        let mut conn = self.pool.acquire().await?;
        let totals = sqlx::query_as::<_, SaleTotals>(
            "SELECT COUNT(*) AS sales_count, COALESCE(SUM(total_cents), 0) AS total_cents \
             FROM sales WHERE status = 'completed' AND created_at >= ?1 AND created_at < ?2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&mut *conn)
        .await?;
        Ok(totals)
    }

    /// Sales attributed to a debtor, newest first.
    pub async fn by_debtor(&self, debtor_id: &str) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sales_for_debtor(&mut *conn, debtor_id).await
    }

    /// Every sale as an aggregation snapshot.
    ///
    /// Timestamps are read as raw text so a damaged value cannot fail the
    /// whole read; the aggregator counts it instead.
    pub async fn snapshots(&self) -> DbResult<Vec<SaleSnapshot>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT id, sale_type, status, CAST(created_at AS TEXT) AS recorded_at FROM sales ORDER BY created_at, id",
        )
        .fetch_all(&mut *conn)
        .await?;

        let lines = sqlx::query_as::<_, SnapshotLineRow>(
            "SELECT sale_id, product_id, name_snapshot, quantity, unit_price_cents \
             FROM sale_items ORDER BY sale_id, position",
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut by_sale: HashMap<String, Vec<SaleLineSnapshot>> = HashMap::new();
        for line in lines {
            by_sale.entry(line.sale_id).or_default().push(SaleLineSnapshot {
                product_id: non_blank(Some(&line.product_id)),
                name: line.name_snapshot,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
            });
        }

        let snapshots: Vec<SaleSnapshot> = rows
            .into_iter()
            .map(|row| SaleSnapshot {
                items: by_sale.remove(&row.id).unwrap_or_default(),
                id: row.id,
                sale_type: row.sale_type,
                status: row.status,
                recorded_at: row.recorded_at.unwrap_or_default(),
            })
            .collect();

        debug!(count = snapshots.len(), "Loaded sale snapshots");
        Ok(snapshots)
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    id: String,
    sale_type: SaleType,
    status: SaleStatus,
    recorded_at: Option<String>,
}

#[derive(Debug, FromRow)]
struct SnapshotLineRow {
    sale_id: String,
    product_id: String,
    name_snapshot: String,
    quantity: i64,
    unit_price_cents: i64,
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Loads a sale and its items.
pub(crate) async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match sale {
        Some(mut sale) => {
            sale.items = fetch_items(conn, &sale.id).await?;
            Ok(Some(sale))
        }
        None => Ok(None),
    }
}

pub(crate) async fn fetch_sales_for_debtor(conn: &mut SqliteConnection, debtor_id: &str) -> DbResult<Vec<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE debtor_id = ?1 ORDER BY created_at DESC, id");
    let mut sales = sqlx::query_as::<_, Sale>(&sql)
        .bind(debtor_id)
        .fetch_all(&mut *conn)
        .await?;
    attach_items(conn, &mut sales).await?;
    Ok(sales)
}

async fn fetch_sale_by_key(conn: &mut SqliteConnection, key: &str) -> DbResult<Option<Sale>> {
    let id: Option<String> = sqlx::query_scalar("SELECT id FROM sales WHERE idempotency_key = ?1")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
    match id {
        Some(id) => fetch_sale(conn, &id).await,
        None => Ok(None),
    }
}

async fn fetch_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let sql = format!("SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY position");
    let items = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(items)
}

async fn attach_items(conn: &mut SqliteConnection, sales: &mut [Sale]) -> DbResult<()> {
    for sale in sales.iter_mut() {
        sale.items = fetch_items(conn, &sale.id).await?;
    }
    Ok(())
}

/// `YYYYMMDD-HHMMSS-NNNN`, NNNN counting the day's receipts from 0001.
async fn next_receipt_number(conn: &mut SqliteConnection, now: DateTime<Utc>) -> DbResult<String> {
    let day = now.format("%Y%m%d").to_string();
    let issued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE receipt_number LIKE ?1 || '-%'")
        .bind(&day)
        .fetch_one(&mut *conn)
        .await?;
    Ok(format!("{}-{:04}", now.format("%Y%m%d-%H%M%S"), issued + 1))
}

async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales (
            id, receipt_number, sale_type, payment_method, status,
            total_cents, total_cost_cents, profit_cents, debtor_id,
            customer_name, customer_phone, notes, idempotency_key,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.receipt_number)
    .bind(sale.sale_type)
    .bind(sale.payment_method)
    .bind(sale.status)
    .bind(sale.total_cents)
    .bind(sale.total_cost_cents)
    .bind(sale.profit_cents)
    .bind(&sale.debtor_id)
    .bind(&sale.customer_name)
    .bind(&sale.customer_phone)
    .bind(&sale.notes)
    .bind(&sale.idempotency_key)
    .bind(sale.created_at)
    .bind(sale.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem, position: i64) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, name_snapshot, barcode_snapshot, quantity,
            unit_price_cents, unit_cost_cents, line_total_cents, cost_basis,
            settlement, settled_at, settlement_reason, settlement_entry_id,
            position, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.name_snapshot)
    .bind(&item.barcode_snapshot)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.unit_cost_cents)
    .bind(item.line_total_cents)
    .bind(item.cost_basis)
    .bind(item.settlement)
    .bind(item.settled_at)
    .bind(&item.settlement_reason)
    .bind(&item.settlement_entry_id)
    .bind(position)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
