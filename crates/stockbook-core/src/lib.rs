//! # stockbook-core: Pure Business Logic for Stockbook
//!
//! This crate holds the shop's bookkeeping rules as pure functions with
//! zero I/O dependencies: store-credit ledgers, checkout planning and the
//! dashboard statistics.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web frontend                                 │   │
//! │  │    Catalog ──► Checkout ──► Debtors ──► Dashboard               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/server (axum)                           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockbook-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌────────┐ ┌────────┐ ┌──────────┐ ┌─────────────┐ ┌───────┐ │   │
//! │  │  │ types  │ │ money  │ │  ledger  │ │ aggregation │ │checkout│ │   │
//! │  │  └────────┘ └────────┘ └──────────┘ └─────────────┘ └───────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  stockbook-db (Database Layer)                  │   │
//! │  │       SQLite repositories, migrations, transaction boundaries   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Debtor, LedgerEntry, Sale, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`ledger`] - Debtor balance rules (clamped application, replay, status)
//! - [`checkout`] - Validates a cart against the catalog and prices it
//! - [`aggregation`] - Dashboard statistics over product/sale snapshots
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use stockbook_core::ledger::{apply_entry, LedgerChange};
//! use stockbook_core::{LedgerEntryType, Money};
//!
//! let change = LedgerChange::new(LedgerEntryType::Sale, Money::from_cents(50_000), None).unwrap();
//! let applied = apply_entry(Money::zero(), &change);
//! assert_eq!(applied.balance_after.cents(), 50_000);
//! ```

pub mod aggregation;
pub mod checkout;
pub mod error;
pub mod ledger;
pub mod money;
pub mod types;
pub mod validation;

// These allow `use stockbook_core::Money` instead of
// `use stockbook_core::money::Money`
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items accepted in a single checkout.
pub const MAX_SALE_ITEMS: usize = 100;

/// Maximum quantity of a single line item.
///
/// Catches typing 1000 instead of 10 at the register.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Days without balance activity after which an unpaid debtor is overdue.
pub const DEFAULT_OVERDUE_AFTER_DAYS: i64 = 30;

/// Margin assumed for products without a recorded cost (4000 bps = 40%).
pub const DEFAULT_ESTIMATED_MARGIN_BPS: u32 = 4_000;

/// Author recorded on ledger entries when the caller does not name one.
pub const SYSTEM_ACTOR: &str = "system";
