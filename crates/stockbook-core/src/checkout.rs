//! # Checkout Planning
//!
//! Turns a requested cart into a fully priced, stock-checked plan before
//! anything is written.
//!
//! ## Processing Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  plan_checkout() (THIS MODULE, pure)                                    │
//! │    1. every line: product exists, is active, quantity in range         │
//! │    2. cumulative demand per product <= stock on hand                    │
//! │    3. price from the catalog (client prices are never read)             │
//! │    4. cost/profit per line (real cost or assumed margin)                │
//! │    5. credit requires a debtor                                          │
//! │                                                                         │
//! │  stockbook-db, inside one transaction                                   │
//! │    6. guarded stock decrement                                           │
//! │    7. insert sale + items                                               │
//! │    8. credit: append one `sale` ledger entry                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::aggregation::line_cost;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CostBasis, PaymentMethod, Product};
use crate::validation::validate_quantity;
use crate::{DEFAULT_ESTIMATED_MARGIN_BPS, MAX_SALE_ITEMS};

/// One requested line: which product and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A checkout as submitted by the register.
///
/// Carries no prices or totals; those come from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub debtor_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// One key per checkout attempt; retries with the same key are no-ops.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl CheckoutRequest {
    /// Distinct product ids in first-seen order.
    pub fn product_ids(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for line in &self.items {
            if !seen.contains(&line.product_id.as_str()) {
                seen.push(line.product_id.as_str());
            }
        }
        seen
    }
}

/// A priced line ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub product_id: String,
    pub name: String,
    pub barcode: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub line_total: Money,
    pub line_cost: Money,
    pub cost_basis: CostBasis,
}

/// The outcome of a successful [`plan_checkout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutPlan {
    pub lines: Vec<PlannedLine>,
    pub total: Money,
    pub total_cost: Money,
    pub profit: Money,
    /// Units to remove per product, summed over duplicate lines.
    pub stock_demand: BTreeMap<String, i64>,
}

/// Validates and prices a cart against catalog snapshots.
///
/// `products` must hold the current rows for every id referenced by `lines`
/// (missing ids are reported as not found). Fails on the first offending
/// line, in request order.
pub fn plan_checkout(
    lines: &[CheckoutLine],
    products: &[Product],
    payment_method: PaymentMethod,
    debtor_id: Option<&str>,
    estimated_margin_bps: u32,
) -> CoreResult<CheckoutPlan> {
    if lines.is_empty() {
        return Err(CoreError::EmptySale);
    }
    if lines.len() > MAX_SALE_ITEMS {
        return Err(CoreError::TooManyItems {
            max: MAX_SALE_ITEMS,
        });
    }
    if payment_method.is_credit() && debtor_id.map_or(true, |id| id.trim().is_empty()) {
        return Err(CoreError::CreditRequiresDebtor);
    }

    let catalog: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut stock_demand: BTreeMap<String, i64> = BTreeMap::new();
    let mut planned = Vec::with_capacity(lines.len());

    for line in lines {
        validate_quantity(line.quantity)?;

        let product = catalog
            .get(line.product_id.as_str())
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        let demand = stock_demand.entry(product.id.clone()).or_insert(0);
        *demand += line.quantity;
        if *demand > product.quantity {
            return Err(CoreError::InsufficientStock {
                product: product.name.clone(),
                available: product.quantity,
                requested: *demand,
            });
        }

        let line_total = product.price().multiply_quantity(line.quantity);
        let priced = line_cost(
            line_total,
            Some(product.cost()),
            line.quantity,
            estimated_margin_bps,
        );

        planned.push(PlannedLine {
            product_id: product.id.clone(),
            name: product.name.clone(),
            barcode: product.barcode.clone(),
            quantity: line.quantity,
            unit_price: product.price(),
            unit_cost: product.cost(),
            line_total,
            line_cost: priced.cost,
            cost_basis: priced.basis,
        });
    }

    let total: Money = planned.iter().map(|l| l.line_total).sum();
    let total_cost: Money = planned.iter().map(|l| l.line_cost).sum();

    Ok(CheckoutPlan {
        lines: planned,
        total,
        total_cost,
        profit: total - total_cost,
        stock_demand,
    })
}

/// [`plan_checkout`] with the default assumed margin.
pub fn plan_checkout_default(
    lines: &[CheckoutLine],
    products: &[Product],
    payment_method: PaymentMethod,
    debtor_id: Option<&str>,
) -> CoreResult<CheckoutPlan> {
    plan_checkout(lines, products, payment_method, debtor_id, DEFAULT_ESTIMATED_MARGIN_BPS)
}

// =============================================================================
// Unit Tests
// =============================================================================
