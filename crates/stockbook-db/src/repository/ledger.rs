//! # Ledger Persistence
//!
//! The single write path for debtor balances. Debtor edits, settlements,
//! credit checkouts and cancellations all end up in [`append_entry`], always
//! on a connection that is already inside a transaction.
//!
//! ```text
//! load debtor ──► apply_entry (core) ──► limit check ──► INSERT entry ──► UPDATE debtor
//!                     │                                     seq = max+1      debt, counters,
//!                     └── clamp at zero                                      last_activity,
//!                                                                            version + 1
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use stockbook_core::ledger::{apply_entry, check_credit_limit, LedgerChange};
use stockbook_core::{CoreError, Debtor, Direction, LedgerEntry, Money, SYSTEM_ACTOR};
use tracing::{debug, info};
use uuid::Uuid;

use super::{DEBTOR_COLUMNS, LEDGER_COLUMNS};
use crate::error::DbResult;

/// Optional context stored on an entry.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EntryRefs<'a> {
    pub notes: Option<&'a str>,
    pub sale_id: Option<&'a str>,
    pub sale_item_id: Option<&'a str>,
    pub created_by: Option<&'a str>,
}

/// Loads a debtor or fails with `DebtorNotFound`.
pub(crate) async fn load_debtor(conn: &mut SqliteConnection, id: &str) -> DbResult<Debtor> {
    let sql = format!("SELECT {DEBTOR_COLUMNS} FROM debtors WHERE id = ?1");
    sqlx::query_as::<_, Debtor>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| CoreError::DebtorNotFound(id.to_string()).into())
}

/// Entries of one debtor in `seq` order.
pub(crate) async fn load_entries(conn: &mut SqliteConnection, debtor_id: &str) -> DbResult<Vec<LedgerEntry>> {
    let sql = format!("SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE debtor_id = ?1 ORDER BY seq");
    let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
        .bind(debtor_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(entries)
}

/// Appends one entry and moves the debtor's balance.
///
/// The caller holds the write gate and owns the transaction; nothing here
/// commits. Returns the stored entry and the debtor as it now reads.
pub(crate) async fn append_entry(
    conn: &mut SqliteConnection,
    debtor: &Debtor,
    change: &LedgerChange,
    refs: EntryRefs<'_>,
    enforce_credit_limit: bool,
    now: DateTime<Utc>,
) -> DbResult<(LedgerEntry, Debtor)> {
    let applied = apply_entry(debtor.debt(), change);

    if enforce_credit_limit {
        check_credit_limit(&debtor.name, &applied, debtor.max_debt_cents.map(Money::from_cents))?;
    }

    let seq: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) + 1 FROM ledger_entries WHERE debtor_id = ?1")
        .bind(&debtor.id)
        .fetch_one(&mut *conn)
        .await?;

    let entry = LedgerEntry {
        id: Uuid::new_v4().to_string(),
        debtor_id: debtor.id.clone(),
        seq,
        entry_type: change.entry_type,
        direction: change.direction,
        amount_cents: change.amount.cents(),
        applied_cents: applied.applied.cents(),
        balance_after_cents: applied.balance_after.cents(),
        notes: refs.notes.map(str::to_string),
        sale_id: refs.sale_id.map(str::to_string),
        sale_item_id: refs.sale_item_id.map(str::to_string),
        created_by: refs.created_by.unwrap_or(SYSTEM_ACTOR).to_string(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            id, debtor_id, seq, entry_type, direction, amount_cents, applied_cents,
            balance_after_cents, notes, sale_id, sale_item_id, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.debtor_id)
    .bind(entry.seq)
    .bind(entry.entry_type)
    .bind(entry.direction)
    .bind(entry.amount_cents)
    .bind(entry.applied_cents)
    .bind(entry.balance_after_cents)
    .bind(&entry.notes)
    .bind(&entry.sale_id)
    .bind(&entry.sale_item_id)
    .bind(&entry.created_by)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    let mut updated = debtor.clone();
    updated.debt_cents = applied.balance_after.cents();
    match change.direction {
        Direction::Increase => updated.total_purchases_cents += applied.applied.cents(),
        Direction::Decrease => updated.total_payments_cents += applied.applied.cents(),
    }
    updated.last_activity_at = now;
    updated.updated_at = now;
    updated.version += 1;

    let result = sqlx::query(
        r#"
        UPDATE debtors
        SET debt_cents = ?1,
            total_purchases_cents = ?2,
            total_payments_cents = ?3,
            last_activity_at = ?4,
            updated_at = ?4,
            version = version + 1
        WHERE id = ?5 AND version = ?6
        "#,
    )
    .bind(updated.debt_cents)
    .bind(updated.total_purchases_cents)
    .bind(updated.total_payments_cents)
    .bind(now)
    .bind(&debtor.id)
    .bind(debtor.version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::Conflict {
            entity: "Debtor".to_string(),
            id: debtor.id.clone(),
            expected: debtor.version,
        }
        .into());
    }

    if applied.applied != change.amount {
        debug!(
            debtor_id = %debtor.id,
            requested = change.amount.cents(),
            applied = applied.applied.cents(),
            "Ledger decrease clamped at zero"
        );
    }

    info!(
        debtor_id = %debtor.id,
        seq,
        entry_type = change.entry_type.as_str(),
        balance_after = entry.balance_after_cents,
        "Ledger entry appended"
    );

    Ok((entry, updated))
}
