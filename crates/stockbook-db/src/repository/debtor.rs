//! # Debtor Repository
//!
//! Debtor directory plus every operation that moves a debtor's balance.
//!
//! ## Balance Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PATCH /debtors/{id}/debt ──► apply_entry()  ──┐                        │
//! │                                                │                        │
//! │  POST .../items/{id}/settle ──► settle_item() ─┼──► ledger::append_entry│
//! │                                                │    (gate + one tx)     │
//! │  POST /sales (credit)   ──► SaleRepository ────┤                        │
//! │  DELETE /sales/{id}     ──► SaleRepository ────┘                        │
//! │                                                                         │
//! │  update() edits name/phone/limit/notes only; debt_cents is untouched.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use stockbook_core::ledger::{applied_total, summarize_debtors, DebtorSummary, LedgerChange};
use stockbook_core::validation::{validate_reason, validate_search_query};
use stockbook_core::{
    CoreError, Debtor, DebtorPatch, LedgerEntry, LedgerEntryType, Money, NewDebtor, PaymentMethod, Sale,
    SaleItem, SaleStatus, SettleAction, Settlement,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ledger::{append_entry, load_debtor, load_entries, EntryRefs};
use super::sale::{fetch_sale, fetch_sales_for_debtor};
use super::{non_blank, DEBTOR_COLUMNS};
use crate::error::{DbError, DbResult};
use crate::pool::{LedgerPolicy, WriteGate};

const MAX_SEARCH_RESULTS: i64 = 50;

// =============================================================================
// Read Models
// =============================================================================

/// Result of settling one credit line item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleOutcome {
    pub item: SaleItem,
    /// `None` when the line total was zero and no money moved.
    pub entry: Option<LedgerEntry>,
    pub debtor: Debtor,
}

/// A credit line item together with the sale it came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditItem {
    pub receipt_number: String,
    pub sold_at: DateTime<Utc>,
    pub sale_status: SaleStatus,
    #[serde(flatten)]
    pub item: SaleItem,
}

/// Totals over a debtor's credit items and ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub open_credit: Money,
    pub settled_credit: Money,
    pub voided_credit: Money,
    /// Applied amount of all `payment` entries, itemized or not.
    pub total_paid: Money,
    /// Σ signed applied amounts of the ledger.
    pub ledger_balance: Money,
    /// `ledger_balance` equals the stored `debt_cents`.
    pub balance_consistent: bool,
}

/// Everything the debtor detail screen shows, rebuilt from storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtorHistory {
    pub debtor: Debtor,
    pub credit_items: Vec<CreditItem>,
    pub entries: Vec<LedgerEntry>,
    pub summary: HistorySummary,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for debtor accounts and their ledgers.
#[derive(Debug, Clone)]
pub struct DebtorRepository {
    pool: SqlitePool,
    write_gate: WriteGate,
    policy: LedgerPolicy,
}

impl DebtorRepository {
    /// Creates a new DebtorRepository.
    pub fn new(pool: SqlitePool, write_gate: WriteGate, policy: LedgerPolicy) -> Self {
        DebtorRepository {
            pool,
            write_gate,
            policy,
        }
    }

    /// All debtors by name.
    pub async fn list(&self) -> DbResult<Vec<Debtor>> {
        let sql = format!("SELECT {DEBTOR_COLUMNS} FROM debtors ORDER BY name COLLATE NOCASE, id");
        let debtors = sqlx::query_as::<_, Debtor>(&sql).fetch_all(&self.pool).await?;
        debug!(count = debtors.len(), "Listed debtors");
        Ok(debtors)
    }

    /// Debtors that currently owe something, largest debt first.
    pub async fn active(&self) -> DbResult<Vec<Debtor>> {
        let sql = format!("SELECT {DEBTOR_COLUMNS} FROM debtors WHERE debt_cents > 0 ORDER BY debt_cents DESC, name");
        let debtors = sqlx::query_as::<_, Debtor>(&sql).fetch_all(&self.pool).await?;
        Ok(debtors)
    }

    /// Substring search on name or phone.
    ///
    /// An empty query returns no results rather than the whole directory.
    pub async fn search(&self, query: &str) -> DbResult<Vec<Debtor>> {
        let query = validate_search_query(query)?;
        if query.is_empty() {
            return Ok(Vec::new());
        }

        debug!(query = %query, "Searching debtors");

        let sql = format!(
            r#"
            SELECT {DEBTOR_COLUMNS}
            FROM debtors
            WHERE name LIKE '%' || ?1 || '%' OR phone LIKE '%' || ?1 || '%'
            ORDER BY name COLLATE NOCASE, id
            LIMIT ?2
            "#
        );
        let debtors = sqlx::query_as::<_, Debtor>(&sql)
            .bind(&query)
            .bind(MAX_SEARCH_RESULTS)
            .fetch_all(&self.pool)
            .await?;

        Ok(debtors)
    }

    /// Directory headline numbers as of `now`.
    pub async fn stats(&self, now: DateTime<Utc>, overdue_after_days: i64) -> DbResult<DebtorSummary> {
        let debtors = self.list().await?;
        Ok(summarize_debtors(&debtors, now, overdue_after_days))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Debtor>> {
        debug!(id = %id, "Getting debtor");
        let sql = format!("SELECT {DEBTOR_COLUMNS} FROM debtors WHERE id = ?1");
        let debtor = sqlx::query_as::<_, Debtor>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(debtor)
    }

    /// Gets a debtor or fails with `DebtorNotFound`.
    pub async fn require(&self, id: &str) -> DbResult<Debtor> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::DebtorNotFound(id.to_string()).into())
    }

    /// Opens a new account with a zero balance.
    pub async fn create(&self, input: &NewDebtor) -> DbResult<Debtor> {
        input.validate()?;

        let now = Utc::now();
        let debtor = Debtor {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            phone: input.phone.trim().to_string(),
            debt_cents: 0,
            max_debt_cents: input.max_debt_cents,
            notes: non_blank(input.notes.as_deref()),
            total_purchases_cents: 0,
            total_payments_cents: 0,
            last_activity_at: now,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let _gate = self.write_gate.lock().await;

        sqlx::query(
            r#"
            INSERT INTO debtors (
                id, name, phone, debt_cents, max_debt_cents, notes,
                total_purchases_cents, total_payments_cents, last_activity_at,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0, ?4, ?5, 0, 0, ?6, 1, ?6, ?6)
            "#,
        )
        .bind(&debtor.id)
        .bind(&debtor.name)
        .bind(&debtor.phone)
        .bind(debtor.max_debt_cents)
        .bind(&debtor.notes)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("phone", &debtor.phone))?;

        info!(id = %debtor.id, name = %debtor.name, "Debtor created");
        Ok(debtor)
    }

    /// Edits profile fields. The balance is never changed here.
    pub async fn update(&self, id: &str, patch: &DebtorPatch) -> DbResult<Debtor> {
        patch.validate()?;

        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let current = load_debtor(&mut *tx, id).await?;
        if let Some(expected) = patch.version {
            if expected != current.version {
                return Err(CoreError::Conflict {
                    entity: "Debtor".to_string(),
                    id: id.to_string(),
                    expected,
                }
                .into());
            }
        }

        let mut next = current.clone();
        if let Some(name) = &patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(phone) = &patch.phone {
            next.phone = phone.trim().to_string();
        }
        if patch.max_debt_cents.is_some() {
            next.max_debt_cents = patch.max_debt_cents;
        }
        if let Some(notes) = &patch.notes {
            next.notes = non_blank(Some(notes));
        }
        next.version = current.version + 1;
        next.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE debtors
            SET name = ?1, phone = ?2, max_debt_cents = ?3, notes = ?4,
                version = ?5, updated_at = ?6
            WHERE id = ?7 AND version = ?8
            "#,
        )
        .bind(&next.name)
        .bind(&next.phone)
        .bind(next.max_debt_cents)
        .bind(&next.notes)
        .bind(next.version)
        .bind(next.updated_at)
        .bind(id)
        .bind(current.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("phone", &next.phone))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict {
                entity: "Debtor".to_string(),
                id: id.to_string(),
                expected: current.version,
            }
            .into());
        }

        tx.commit().await?;

        info!(id = %id, version = next.version, "Debtor updated");
        Ok(next)
    }

    /// Deletes a debtor and its ledger. Their sales stay, detached.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let _gate = self.write_gate.lock().await;

        let result = sqlx::query("DELETE FROM debtors WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::DebtorNotFound(id.to_string()).into());
        }

        info!(id = %id, "Debtor deleted");
        Ok(())
    }

    /// Appends one ledger entry and moves the balance accordingly.
    ///
    /// ## Atomicity
    /// ```text
    /// gate.lock() ─► BEGIN ─► load debtor ─► INSERT entry ─► UPDATE debtor ─► COMMIT
    /// ```
    /// Any failure rolls the transaction back; the balance and the ledger
    /// never disagree.
    pub async fn apply_entry(
        &self,
        debtor_id: &str,
        change: &LedgerChange,
        notes: Option<&str>,
        actor: Option<&str>,
    ) -> DbResult<(LedgerEntry, Debtor)> {
        let notes = non_blank(notes);
        if let Some(notes) = &notes {
            stockbook_core::validation::validate_notes(notes)?;
        }

        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let debtor = load_debtor(&mut *tx, debtor_id).await?;
        let refs = EntryRefs {
            notes: notes.as_deref(),
            created_by: actor,
            ..EntryRefs::default()
        };
        let applied = append_entry(
            &mut *tx,
            &debtor,
            change,
            refs,
            self.policy.enforce_credit_limit,
            Utc::now(),
        )
        .await?;

        tx.commit().await?;
        Ok(applied)
    }

    /// Ledger of one debtor, oldest first.
    pub async fn entries(&self, debtor_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let mut conn = self.pool.acquire().await?;
        load_debtor(&mut *conn, debtor_id).await?;
        load_entries(&mut *conn, debtor_id).await
    }

    /// Sales attributed to one debtor, newest first, with items.
    pub async fn sales(&self, debtor_id: &str) -> DbResult<Vec<Sale>> {
        let mut conn = self.pool.acquire().await?;
        load_debtor(&mut *conn, debtor_id).await?;
        fetch_sales_for_debtor(&mut *conn, debtor_id).await
    }

    /// Pays for or removes one open credit line item.
    ///
    /// ## Preconditions
    /// - the sale is a completed credit sale of this debtor
    /// - the item belongs to that sale and is still `open`
    ///
    /// ## Effects
    /// ```text
    /// pay    ──► payment entry for the line total          item → settled
    /// remove ──► adjustment/decrease "<name> removed: why"  item → voided
    /// ```
    pub async fn settle_item(
        &self,
        debtor_id: &str,
        sale_id: &str,
        item_id: &str,
        action: SettleAction,
        reason: Option<&str>,
        actor: Option<&str>,
    ) -> DbResult<SettleOutcome> {
        let reason = match action {
            SettleAction::Remove => Some(validate_reason(reason)?),
            SettleAction::Pay => non_blank(reason),
        };

        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let debtor = load_debtor(&mut *tx, debtor_id).await?;
        let sale = fetch_sale(&mut *tx, sale_id)
            .await?
            .filter(|s| s.debtor_id.as_deref() == Some(debtor_id) && s.payment_method == PaymentMethod::Credit)
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale.status != SaleStatus::Completed {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: sale.id.clone(),
                current_status: sale.status.as_str().to_string(),
            }
            .into());
        }

        let mut item = sale
            .items
            .iter()
            .find(|i| i.id == item_id)
            .cloned()
            .ok_or_else(|| CoreError::SaleItemNotFound(item_id.to_string()))?;

        if item.settlement != Settlement::Open {
            return Err(CoreError::AlreadySettled {
                item_id: item.id.clone(),
                state: item.settlement.as_str().to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let (settlement, notes) = match action {
            SettleAction::Pay => (Settlement::Settled, format!("{} paid", item.name_snapshot)),
            SettleAction::Remove => (
                Settlement::Voided,
                format!("{} removed: {}", item.name_snapshot, reason.as_deref().unwrap_or_default()),
            ),
        };

        let (entry, debtor) = if item.line_total().is_positive() {
            let change = match action {
                SettleAction::Pay => LedgerChange::payment(item.line_total())?,
                SettleAction::Remove => LedgerChange::write_off(item.line_total())?,
            };
            let refs = EntryRefs {
                notes: Some(&notes),
                sale_id: Some(&sale.id),
                sale_item_id: Some(&item.id),
                created_by: actor,
            };
            let (entry, debtor) =
                append_entry(&mut *tx, &debtor, &change, refs, self.policy.enforce_credit_limit, now).await?;
            (Some(entry), debtor)
        } else {
            (None, debtor)
        };

        sqlx::query(
            r#"
            UPDATE sale_items
            SET settlement = ?1, settled_at = ?2, settlement_reason = ?3, settlement_entry_id = ?4
            WHERE id = ?5 AND settlement = 'open'
            "#,
        )
        .bind(settlement)
        .bind(now)
        .bind(&reason)
        .bind(entry.as_ref().map(|e| e.id.as_str()))
        .bind(&item.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE sales SET updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(&sale.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        item.settlement = settlement;
        item.settled_at = Some(now);
        item.settlement_reason = reason;
        item.settlement_entry_id = entry.as_ref().map(|e| e.id.clone());

        info!(
            debtor_id = %debtor_id,
            sale_id = %sale_id,
            item_id = %item_id,
            settlement = settlement.as_str(),
            "Credit item settled"
        );

        Ok(SettleOutcome { item, entry, debtor })
    }

    /// Rebuilds the debtor's history: credit items with their settlement,
    /// the full ledger and the totals that tie them together.
    pub async fn history(&self, debtor_id: &str) -> DbResult<DebtorHistory> {
        let mut conn = self.pool.acquire().await?;

        let debtor = load_debtor(&mut *conn, debtor_id).await?;
        let entries = load_entries(&mut *conn, debtor_id).await?;
        let sales = fetch_sales_for_debtor(&mut *conn, debtor_id).await?;

        let mut summary = HistorySummary::default();
        let mut credit_items = Vec::new();

        for sale in sales.into_iter().filter(|s| s.payment_method == PaymentMethod::Credit) {
            for item in sale.items {
                match item.settlement {
                    Settlement::Open => summary.open_credit += item.line_total(),
                    Settlement::Settled => summary.settled_credit += item.line_total(),
                    Settlement::Voided => summary.voided_credit += item.line_total(),
                }
                credit_items.push(CreditItem {
                    receipt_number: sale.receipt_number.clone(),
                    sold_at: sale.created_at,
                    sale_status: sale.status,
                    item,
                });
            }
        }

        summary.total_paid = entries
            .iter()
            .filter(|e| e.entry_type == LedgerEntryType::Payment)
            .map(|e| Money::from_cents(e.applied_cents))
            .sum();
        summary.ledger_balance = applied_total(&entries);
        summary.balance_consistent = summary.ledger_balance == debtor.debt();

        if !summary.balance_consistent {
            warn!(
                debtor_id = %debtor_id,
                stored = debtor.debt_cents,
                ledger = summary.ledger_balance.cents(),
                "Debtor balance disagrees with ledger"
            );
        }

        Ok(DebtorHistory {
            debtor,
            credit_items,
            entries,
            summary,
        })
    }
}
