//! # Repository Module
//!
//! Database repository implementations for Stockbook.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler                                                           │
//! │       │  db.debtors().apply_entry(id, change, notes)                    │
//! │       ▼                                                                 │
//! │  DebtorRepository ─────┐                                                │
//! │  SaleRepository ───────┼──► ledger::append_entry(&mut conn, ...)        │
//! │  ProductRepository     │      (the only code that writes entries        │
//! │                        │       or touches debt_cents)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog CRUD, search, stock listings
//! - [`DebtorRepository`](debtor::DebtorRepository) - Debtor CRUD, ledger, settlements
//! - [`SaleRepository`](sale::SaleRepository) - Checkout, cancellation, sale queries

pub mod debtor;
pub mod ledger;
pub mod product;
pub mod sale;

/// Column list shared by every `SELECT` that maps to [`stockbook_core::SaleItem`].
pub(crate) const SALE_ITEM_COLUMNS: &str = "id, sale_id, product_id, name_snapshot, barcode_snapshot, \
     quantity, unit_price_cents, unit_cost_cents, line_total_cents, cost_basis, settlement, \
     settled_at, settlement_reason, settlement_entry_id, created_at";

pub(crate) const SALE_COLUMNS: &str = "id, receipt_number, sale_type, payment_method, status, \
     total_cents, total_cost_cents, profit_cents, debtor_id, customer_name, customer_phone, \
     notes, idempotency_key, created_at, updated_at";

pub(crate) const DEBTOR_COLUMNS: &str = "id, name, phone, debt_cents, max_debt_cents, notes, \
     total_purchases_cents, total_payments_cents, last_activity_at, version, created_at, updated_at";

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, barcode, category_id, unit, cost_cents, \
     price_cents, quantity, min_stock, is_active, version, created_at, updated_at";

pub(crate) const LEDGER_COLUMNS: &str = "id, debtor_id, seq, entry_type, direction, amount_cents, \
     applied_cents, balance_after_cents, notes, sale_id, sale_item_id, created_by, created_at";

/// Trims an optional text field and drops it when blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
