//! # Domain Types
//!
//! Core domain types used throughout Stockbook.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │     Debtor      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  items[]        │──►│  id (UUID)      │       │
//! │  │  barcode        │   │  payment_method │   │  phone (unique) │       │
//! │  │  cost / price   │   │  total / profit │   │  debt_cents     │       │
//! │  │  quantity       │   │  status         │   │  status (fn)    │       │
//! │  └─────────────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │                                 │ credit               │ append-only    │
//! │                                 ▼                      ▼                │
//! │                        ┌─────────────────────────────────────┐          │
//! │                        │            LedgerEntry              │          │
//! │                        │  entry_type + direction + amount    │          │
//! │                        │  applied (after clamp at zero)      │          │
//! │                        │  sale_id / sale_item_id (weak refs) │          │
//! │                        └─────────────────────────────────────┘          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ledger;
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// An inventory item available for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to the cashier and on receipts.
    pub name: String,

    /// Scanned barcode; the lookup key at the register.
    pub barcode: Option<String>,

    /// Reference into the external category service.
    pub category_id: Option<String>,

    /// Unit of measure ("pcs", "kg", "l", ...).
    pub unit: String,

    /// Purchase cost per unit. Zero means unknown.
    pub cost_cents: i64,

    /// Selling price per unit.
    pub price_cents: i64,

    /// Units on hand.
    pub quantity: i64,

    /// Reorder threshold for the low-stock list.
    pub min_stock: i64,

    /// Soft delete flag. Inactive products cannot be sold.
    pub is_active: bool,

    /// Optimistic concurrency counter.
    pub version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// True when a real purchase cost has been recorded.
    #[inline]
    pub fn has_cost(&self) -> bool {
        self.cost_cents > 0
    }

    /// True when stock has fallen to the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_stock
    }

    /// True when the product sells below cost.
    pub fn is_problematic(&self) -> bool {
        self.cost_cents > self.price_cents
    }
}

/// Fields accepted when creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub barcode: Option<String>,
    pub category_id: Option<String>,
    pub unit: Option<String>,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub quantity: i64,
    pub min_stock: Option<i64>,
}

/// Partial product edit. `None` leaves the field untouched.
///
/// `version`, when present, must match the stored row or the edit is
/// rejected with a conflict.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub category_id: Option<String>,
    pub unit: Option<String>,
    pub cost_cents: Option<i64>,
    pub price_cents: Option<i64>,
    pub quantity: Option<i64>,
    pub min_stock: Option<i64>,
    pub version: Option<i64>,
}

// =============================================================================
// Debtor
// =============================================================================

/// Repayment standing of a debtor.
///
/// Never stored; see [`Debtor::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DebtorStatus {
    /// Owes money and paid or bought something recently.
    Active,
    /// Owes nothing.
    Paid,
    /// Owes money and has been silent for too long.
    Overdue,
}

/// A customer's store-credit account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Debtor {
    pub id: String,
    pub name: String,
    /// Unique per debtor.
    pub phone: String,
    /// Outstanding balance. Never negative.
    pub debt_cents: i64,
    /// Credit ceiling. Informational unless enforcement is switched on.
    pub max_debt_cents: Option<i64>,
    pub notes: Option<String>,
    /// Sum of applied increases.
    pub total_purchases_cents: i64,
    /// Sum of applied decreases.
    pub total_payments_cents: i64,
    /// Time of the last balance-affecting entry, or creation.
    #[ts(as = "String")]
    pub last_activity_at: DateTime<Utc>,
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Debtor {
    #[inline]
    pub fn debt(&self) -> Money {
        Money::from_cents(self.debt_cents)
    }

    /// Computes the debtor's status at `now`.
    pub fn status(&self, now: DateTime<Utc>, overdue_after_days: i64) -> DebtorStatus {
        ledger::debtor_status(self.debt(), self.last_activity_at, now, overdue_after_days)
    }

    /// True when a positive ceiling is set and the balance is above it.
    pub fn is_over_limit(&self) -> bool {
        matches!(self.max_debt_cents, Some(limit) if limit > 0 && self.debt_cents > limit)
    }
}

/// Fields accepted when registering a debtor.
///
/// The opening balance is always zero; debt only moves through ledger entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewDebtor {
    pub name: String,
    pub phone: String,
    pub max_debt_cents: Option<i64>,
    pub notes: Option<String>,
}

/// Partial debtor edit. Balance fields are deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebtorPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub max_debt_cents: Option<i64>,
    pub notes: Option<String>,
    pub version: Option<i64>,
}

// =============================================================================
// Ledger
// =============================================================================

/// What kind of event moved the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LedgerEntryType {
    /// Goods taken on credit.
    Sale,
    /// Money received.
    Payment,
    /// Manual correction, either direction.
    Adjustment,
    /// Goods returned.
    Refund,
}

impl LedgerEntryType {
    /// The direction implied by the type, if the type fixes one.
    pub fn implied_direction(self) -> Option<Direction> {
        match self {
            LedgerEntryType::Sale => Some(Direction::Increase),
            LedgerEntryType::Payment | LedgerEntryType::Refund => Some(Direction::Decrease),
            LedgerEntryType::Adjustment => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LedgerEntryType::Sale => "sale",
            LedgerEntryType::Payment => "payment",
            LedgerEntryType::Adjustment => "adjustment",
            LedgerEntryType::Refund => "refund",
        }
    }
}

/// Whether an entry raises or lowers the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    /// +1 or -1.
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Direction::Increase => 1,
            Direction::Decrease => -1,
        }
    }
}

/// The `type` field of a debt PATCH request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DebtChangeKind {
    Add,
    Subtract,
}

/// One immutable balance-affecting event on a debtor account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub debtor_id: String,
    /// Per-debtor position; insertion order is chronological order.
    pub seq: i64,
    pub entry_type: LedgerEntryType,
    pub direction: Direction,
    /// Requested amount, always positive.
    pub amount_cents: i64,
    /// Amount that actually moved the balance (decreases clamp at zero).
    pub applied_cents: i64,
    pub balance_after_cents: i64,
    pub notes: Option<String>,
    /// Originating sale, lookup only.
    pub sale_id: Option<String>,
    /// Credit line item this entry settles, lookup only.
    pub sale_item_id: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Applied amount with the direction's sign.
    #[inline]
    pub fn signed_applied(&self) -> i64 {
        self.applied_cents * self.direction.sign()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Kind of sale record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SaleType {
    Sale,
    Purchase,
    Return,
    Payment,
}

impl Default for SaleType {
    fn default() -> Self {
        SaleType::Sale
    }
}

/// How the customer paid. `Credit` books the total onto a debtor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Credit,
}

impl PaymentMethod {
    #[inline]
    pub fn is_credit(self) -> bool {
        self == PaymentMethod::Credit
    }
}

/// Lifecycle state of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SaleStatus {
    Completed,
    Pending,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Pending => "pending",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

/// Settlement state of a credit line item.
///
/// ```text
///           pay                remove (reason)
///  Open ───────────► Settled   Open ───────────► Voided
/// ```
/// Non-credit items are born `Settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Settlement {
    Open,
    Settled,
    Voided,
}

impl Settlement {
    pub fn as_str(self) -> &'static str {
        match self {
            Settlement::Open => "open",
            Settlement::Settled => "settled",
            Settlement::Voided => "voided",
        }
    }
}

/// Whether a cost figure comes from a recorded unit cost or the assumed margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CostBasis {
    Real,
    Estimated,
}

/// A persisted sale with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Human-facing number printed on the receipt.
    pub receipt_number: String,
    pub sale_type: SaleType,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub total_cents: i64,
    pub total_cost_cents: i64,
    pub profit_cents: i64,
    pub debtor_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<SaleItem>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Sum of credit line totals that are still open.
    pub fn open_credit(&self) -> Money {
        self.items
            .iter()
            .filter(|item| item.settlement == Settlement::Open)
            .map(SaleItem::line_total)
            .sum()
    }
}

/// A line item. Product data is snapshotted at the time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub barcode_snapshot: Option<String>,
    pub quantity: i64,
    /// Catalog price at checkout.
    pub unit_price_cents: i64,
    /// Catalog cost at checkout (zero when unknown).
    pub unit_cost_cents: i64,
    pub line_total_cents: i64,
    pub cost_basis: CostBasis,
    pub settlement: Settlement,
    #[ts(as = "Option<String>")]
    pub settled_at: Option<DateTime<Utc>>,
    pub settlement_reason: Option<String>,
    pub settlement_entry_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// Action taken on an open credit line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SettleAction {
    /// The customer paid for the item.
    Pay,
    /// The item was returned or written off.
    Remove,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(cost: i64, price: i64, quantity: i64) -> Product {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Product {
            id: "p-1".to_string(),
            name: "Sugar 1kg".to_string(),
            barcode: None,
            category_id: None,
            unit: "pcs".to_string(),
            cost_cents: cost,
            price_cents: price,
            quantity,
            min_stock: 5,
            is_active: true,
            version: 1,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_product_flags() {
        assert!(product(10_000, 8_000, 5).is_problematic());
        assert!(!product(8_000, 10_000, 5).is_problematic());
        assert!(product(0, 10_000, 5).is_low_stock());
        assert!(!product(0, 10_000, 6).is_low_stock());
        assert!(!product(0, 10_000, 6).has_cost());
    }

    #[test]
    fn test_implied_direction() {
        assert_eq!(LedgerEntryType::Sale.implied_direction(), Some(Direction::Increase));
        assert_eq!(LedgerEntryType::Refund.implied_direction(), Some(Direction::Decrease));
        assert_eq!(LedgerEntryType::Adjustment.implied_direction(), None);
    }

    #[test]
    fn test_payment_method_rejects_debt_alias() {
        let parsed: Result<PaymentMethod, _> = serde_json::from_str("\"debt\"");
        assert!(parsed.is_err());
        let parsed: PaymentMethod = serde_json::from_str("\"credit\"").unwrap();
        assert!(parsed.is_credit());
    }
}
