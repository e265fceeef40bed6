//! # Aggregation Module
//!
//! Dashboard statistics computed from product and sale snapshots.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  products[] ──┬──► inventory summary (stock value / cost)               │
//! │               ├──► loss report (cost > price)                           │
//! │               └──► cost lookup ───┐                                     │
//! │                                   ▼                                     │
//! │  sales[] ──► parse timestamp ──► price each line ──► bucket             │
//! │               (fallback: now,     (real cost or        ├── total        │
//! │                counted)            assumed margin)      ├── today       │
//! │                                                         └── this month  │
//! │                                                                         │
//! │  Output is a pure function of (products, sales, options).               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Malformed records never abort the computation: they are skipped or
//! defaulted and counted in [`DataQuality`].

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CostBasis, Product, SaleStatus, SaleType};
use crate::DEFAULT_ESTIMATED_MARGIN_BPS;

// =============================================================================
// Inputs
// =============================================================================

/// A sale as read from storage, with its timestamp left unparsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleSnapshot {
    pub id: String,
    pub sale_type: SaleType,
    pub status: SaleStatus,
    /// Stored timestamp text.
    pub recorded_at: String,
    pub items: Vec<SaleLineSnapshot>,
}

/// One line of a [`SaleSnapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct SaleLineSnapshot {
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// Knobs for [`aggregate`].
#[derive(Debug, Clone)]
pub struct AggregationOptions {
    /// Reference instant for the "today" and "this month" windows.
    pub now: DateTime<Utc>,
    /// Offset of the shop's local time; windows follow local midnight.
    pub utc_offset: FixedOffset,
    /// Margin assumed when a product has no recorded cost.
    pub estimated_margin_bps: u32,
    /// Length of the ranked product lists.
    pub top_n: usize,
}

impl AggregationOptions {
    pub fn new(now: DateTime<Utc>) -> Self {
        AggregationOptions {
            now,
            utc_offset: Utc.fix(),
            estimated_margin_bps: DEFAULT_ESTIMATED_MARGIN_BPS,
            top_n: 5,
        }
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn with_margin_bps(mut self, bps: u32) -> Self {
        self.estimated_margin_bps = bps;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardStats {
    pub inventory: InventorySummary,
    pub total: PeriodStats,
    pub today: PeriodStats,
    pub month: PeriodStats,
    pub loss_report: LossReport,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventorySummary {
    pub product_count: u64,
    /// Σ price × quantity.
    pub stock_value: Money,
    /// Σ cost × quantity over products with a recorded cost.
    pub stock_cost: Money,
    pub products_with_cost: u64,
    pub products_without_cost: u64,
    pub low_stock_count: u64,
}

/// Sales figures for one time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PeriodStats {
    pub sales_count: u64,
    pub amount: Money,
    pub cost: Money,
    pub profit: Money,
    /// profit / amount in basis points.
    pub profit_margin_bps: i64,
    /// amount / sales_count.
    pub average_sale: Money,
    /// Part of `cost` derived from the assumed margin.
    pub estimated_cost: Money,
    /// Part of `profit` derived from the assumed margin.
    pub estimated_profit: Money,
    /// Σ |profit| over lines sold below cost.
    pub loss_amount: Money,
    pub loss_margin_bps: i64,
    /// `Estimated` as soon as any line used the assumed margin.
    pub cost_basis: CostBasis,
    /// Per-product lines, ranked by amount (desc) then product id.
    pub products: Vec<ProductLine>,
    pub top_product: Option<ProductLine>,
}

impl PeriodStats {
    fn empty() -> Self {
        PeriodStats {
            sales_count: 0,
            amount: Money::zero(),
            cost: Money::zero(),
            profit: Money::zero(),
            profit_margin_bps: 0,
            average_sale: Money::zero(),
            estimated_cost: Money::zero(),
            estimated_profit: Money::zero(),
            loss_amount: Money::zero(),
            loss_margin_bps: 0,
            cost_basis: CostBasis::Real,
            products: Vec::new(),
            top_product: None,
        }
    }
}

/// Aggregated sales of one product within a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductLine {
    /// Catalog id, or `unknown:<name>` for lines without one.
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub amount: Money,
    pub cost: Money,
    pub profit: Money,
    pub cost_basis: CostBasis,
}

/// A product priced below its cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProblematicProduct {
    pub product_id: String,
    pub name: String,
    pub cost: Money,
    pub price: Money,
    pub quantity: i64,
    pub loss_per_unit: Money,
    /// loss_per_unit × quantity on hand.
    pub total_loss: Money,
    /// loss_per_unit / cost in basis points.
    pub percentage_loss_bps: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LossReport {
    /// Sorted by total loss (desc) then product id.
    pub products: Vec<ProblematicProduct>,
    pub total_potential_loss: Money,
}

/// Counters for records that were defaulted or skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DataQuality {
    pub sales_considered: u64,
    /// Not completed, or not a sale.
    pub sales_excluded: u64,
    /// Timestamps that failed to parse and were bucketed at `now`.
    pub unparseable_timestamps: u64,
    /// Lines with a non-positive quantity or a negative price.
    pub skipped_items: u64,
    /// Lines whose product is no longer in the catalog.
    pub unknown_products: u64,
}

// =============================================================================
// Cost Basis
// =============================================================================

/// Cost and profit of one priced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCost {
    pub cost: Money,
    pub profit: Money,
    pub basis: CostBasis,
}

/// Prices a line: real unit cost when recorded, otherwise the assumed margin.
///
/// ## Example
/// ```rust
/// use stockbook_core::aggregation::line_cost;
/// use stockbook_core::{CostBasis, Money};
///
/// let real = line_cost(Money::from_cents(30_000), Some(Money::from_cents(8_000)), 3, 4_000);
/// assert_eq!(real.cost.cents(), 24_000);
/// assert_eq!(real.basis, CostBasis::Real);
///
/// let estimated = line_cost(Money::from_cents(30_000), None, 3, 4_000);
/// assert_eq!(estimated.profit.cents(), 12_000);
/// assert_eq!(estimated.basis, CostBasis::Estimated);
/// ```
pub fn line_cost(amount: Money, unit_cost: Option<Money>, quantity: i64, margin_bps: u32) -> LineCost {
    match unit_cost.filter(Money::is_positive) {
        Some(unit_cost) => {
            let cost = unit_cost.multiply_quantity(quantity);
            LineCost {
                cost,
                profit: amount - cost,
                basis: CostBasis::Real,
            }
        }
        None => {
            let profit = amount.percentage(margin_bps);
            LineCost {
                cost: amount - profit,
                profit,
                basis: CostBasis::Estimated,
            }
        }
    }
}

// =============================================================================
// Loss Detection
// =============================================================================

/// Reports products priced below cost, independent of any sales.
pub fn loss_report(products: &[Product]) -> LossReport {
    let mut rows: Vec<ProblematicProduct> = products
        .iter()
        .filter(|p| p.is_problematic())
        .map(|p| {
            let loss_per_unit = p.cost() - p.price();
            ProblematicProduct {
                product_id: p.id.clone(),
                name: p.name.clone(),
                cost: p.cost(),
                price: p.price(),
                quantity: p.quantity,
                loss_per_unit,
                total_loss: loss_per_unit.multiply_quantity(p.quantity.max(0)),
                percentage_loss_bps: loss_per_unit.ratio_bps(p.cost()),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_loss
            .cmp(&a.total_loss)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });

    let total_potential_loss = rows.iter().map(|r| r.total_loss).sum();
    LossReport {
        products: rows,
        total_potential_loss,
    }
}

// =============================================================================
// Windows
// =============================================================================

/// Half-open UTC range `[start, end)`; `end` is the next local midnight, so
/// the range covers the local day (or month) up to its last instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    #[inline]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// The local calendar day containing `now`.
    pub fn day(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let date = now.with_timezone(&offset).date_naive();
        Window {
            start: local_midnight(date, offset),
            end: local_midnight(date + Duration::days(1), offset),
        }
    }

    /// The local calendar month containing `now`.
    pub fn month(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let date = now.with_timezone(&offset).date_naive();
        let first = date.with_day(1).unwrap_or(date);
        let next = if first.month() == 12 {
            NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
        }
        .unwrap_or(first + Duration::days(31));
        Window {
            start: local_midnight(first, offset),
            end: local_midnight(next, offset),
        }
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    // A fixed offset has no gaps, so this is always a single instant.
    (naive - Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
}

/// Parses a stored sale timestamp.
///
/// Accepts RFC 3339 and SQLite's `YYYY-MM-DD HH:MM:SS[.fff]` (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f%:z"]
        .iter()
        .find_map(|fmt| {
            DateTime::parse_from_str(raw, fmt)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(raw, fmt).ok().map(|n| n.and_utc()))
        })
}

// =============================================================================
// Aggregate
// =============================================================================

#[derive(Default)]
struct Bucket {
    sales_count: u64,
    amount: Money,
    cost: Money,
    profit: Money,
    estimated_cost: Money,
    estimated_profit: Money,
    loss_amount: Money,
    any_estimated: bool,
    products: BTreeMap<String, ProductLine>,
}

impl Bucket {
    fn add_line(&mut self, key: &str, name: &str, quantity: i64, amount: Money, priced: LineCost) {
        self.amount += amount;
        self.cost += priced.cost;
        self.profit += priced.profit;
        if priced.basis == CostBasis::Estimated {
            self.estimated_cost += priced.cost;
            self.estimated_profit += priced.profit;
            self.any_estimated = true;
        }
        if priced.profit.is_negative() {
            self.loss_amount += priced.profit.abs();
        }

        let line = self
            .products
            .entry(key.to_string())
            .or_insert_with(|| ProductLine {
                product_id: key.to_string(),
                name: name.to_string(),
                quantity: 0,
                amount: Money::zero(),
                cost: Money::zero(),
                profit: Money::zero(),
                cost_basis: priced.basis,
            });
        line.quantity += quantity;
        line.amount += amount;
        line.cost += priced.cost;
        line.profit += priced.profit;
        if priced.basis == CostBasis::Estimated {
            line.cost_basis = CostBasis::Estimated;
        }
    }

    fn finish(self, top_n: usize) -> PeriodStats {
        let mut products: Vec<ProductLine> = self.products.into_values().collect();
        products.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        products.truncate(top_n);

        let average_sale = if self.sales_count == 0 {
            Money::zero()
        } else {
            Money::from_cents(self.amount.cents() / self.sales_count as i64)
        };

        PeriodStats {
            sales_count: self.sales_count,
            amount: self.amount,
            cost: self.cost,
            profit: self.profit,
            profit_margin_bps: self.profit.ratio_bps(self.amount),
            average_sale,
            estimated_cost: self.estimated_cost,
            estimated_profit: self.estimated_profit,
            loss_amount: self.loss_amount,
            loss_margin_bps: self.loss_amount.ratio_bps(self.amount),
            cost_basis: if self.any_estimated {
                CostBasis::Estimated
            } else {
                CostBasis::Real
            },
            top_product: products.first().cloned(),
            products,
        }
    }
}

/// Computes the dashboard from snapshots.
///
/// Only completed sales of type `sale` count. Each line is priced against
/// the product's current cost; lines for products missing from `products`
/// use the assumed margin.
pub fn aggregate(
    products: &[Product],
    sales: &[SaleSnapshot],
    options: &AggregationOptions,
) -> DashboardStats {
    let mut inventory = InventorySummary::default();
    for product in products {
        inventory.product_count += 1;
        inventory.stock_value += product.price().multiply_quantity(product.quantity);
        if product.has_cost() {
            inventory.products_with_cost += 1;
            inventory.stock_cost += product.cost().multiply_quantity(product.quantity);
        } else {
            inventory.products_without_cost += 1;
        }
        if product.is_low_stock() {
            inventory.low_stock_count += 1;
        }
    }

    let catalog: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();
    let today = Window::day(options.now, options.utc_offset);
    let month = Window::month(options.now, options.utc_offset);

    let mut quality = DataQuality::default();
    let mut total = Bucket::default();
    let mut daily = Bucket::default();
    let mut monthly = Bucket::default();

    for sale in sales {
        if sale.status != SaleStatus::Completed || sale.sale_type != SaleType::Sale {
            quality.sales_excluded += 1;
            continue;
        }
        quality.sales_considered += 1;

        let at = match parse_timestamp(&sale.recorded_at) {
            Some(at) => at,
            None => {
                quality.unparseable_timestamps += 1;
                options.now
            }
        };
        let in_day = today.contains(at);
        let in_month = month.contains(at);

        total.sales_count += 1;
        if in_day {
            daily.sales_count += 1;
        }
        if in_month {
            monthly.sales_count += 1;
        }

        for item in &sale.items {
            if item.quantity <= 0 || item.unit_price_cents < 0 {
                quality.skipped_items += 1;
                continue;
            }

            let product = item.product_id.as_deref().and_then(|id| catalog.get(id));
            if product.is_none() {
                quality.unknown_products += 1;
            }
            let key = match &item.product_id {
                Some(id) => id.clone(),
                None => format!("unknown:{}", item.name),
            };
            let name = product.map(|p| p.name.as_str()).unwrap_or(item.name.as_str());

            let amount = Money::from_cents(item.unit_price_cents).multiply_quantity(item.quantity);
            let priced = line_cost(
                amount,
                product.map(|p| p.cost()),
                item.quantity,
                options.estimated_margin_bps,
            );

            total.add_line(&key, name, item.quantity, amount, priced);
            if in_day {
                daily.add_line(&key, name, item.quantity, amount, priced);
            }
            if in_month {
                monthly.add_line(&key, name, item.quantity, amount, priced);
            }
        }
    }

    DashboardStats {
        inventory,
        total: total.finish(options.top_n),
        today: daily.finish(options.top_n),
        month: monthly.finish(options.top_n),
        loss_report: loss_report(products),
        data_quality: quality,
    }
}

impl Default for PeriodStats {
    fn default() -> Self {
        PeriodStats::empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).unwrap()
    }

    fn product(id: &str, cost: i64, price: i64, quantity: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            barcode: None,
            category_id: None,
            unit: "pcs".to_string(),
            cost_cents: cost,
            price_cents: price,
            quantity,
            min_stock: 2,
            is_active: true,
            version: 1,
            created_at: at("2024-01-01T00:00:00Z"),
            updated_at: at("2024-01-01T00:00:00Z"),
        }
    }

    fn sale(id: &str, recorded_at: &str, lines: &[(&str, i64, i64)]) -> SaleSnapshot {
        SaleSnapshot {
            id: id.to_string(),
            sale_type: SaleType::Sale,
            status: SaleStatus::Completed,
            recorded_at: recorded_at.to_string(),
            items: lines
                .iter()
                .map(|(product_id, quantity, price)| SaleLineSnapshot {
                    product_id: Some(product_id.to_string()),
                    name: product_id.to_string(),
                    quantity: *quantity,
                    unit_price_cents: *price,
                })
                .collect(),
        }
    }

    fn options() -> AggregationOptions {
        AggregationOptions::new(at("2024-03-15T10:00:00Z"))
    }

    #[test]
    fn test_problematic_product_loss() {
        let report = loss_report(&[product("a", 10_000, 8_000, 5), product("b", 1_000, 2_000, 9)]);
        assert_eq!(report.products.len(), 1);
        let row = &report.products[0];
        assert_eq!(row.loss_per_unit.cents(), 2_000);
        assert_eq!(row.total_loss.cents(), 10_000);
        assert_eq!(row.percentage_loss_bps, 2_000);
        assert_eq!(report.total_potential_loss.cents(), 10_000);
    }

    #[test]
    fn test_cost_basis_labels() {
        let products = [product("real", 6_000, 10_000, 10), product("free", 0, 10_000, 10)];
        let sales = [sale("s1", "2024-03-15T09:00:00Z", &[("real", 1, 10_000), ("free", 1, 10_000)])];

        let stats = aggregate(&products, &sales, &options());
        let lines: BTreeMap<_, _> = stats
            .today
            .products
            .iter()
            .map(|l| (l.product_id.as_str(), l))
            .collect();

        assert_eq!(lines["real"].cost_basis, CostBasis::Real);
        assert_eq!(lines["real"].profit.cents(), 4_000);
        assert_eq!(lines["free"].cost_basis, CostBasis::Estimated);
        assert_eq!(lines["free"].profit.cents(), 4_000);
        assert_eq!(stats.today.cost_basis, CostBasis::Estimated);
        assert_eq!(stats.today.estimated_profit.cents(), 4_000);
        assert_eq!(stats.today.profit_margin_bps, 4_000);
    }

    #[test]
    fn test_bucketing_uses_sale_timestamp() {
        let products = [product("a", 500, 1_000, 100)];
        let sales = [
            sale("today", "2024-03-15T00:00:00Z", &[("a", 1, 1_000)]),
            sale("end-of-day", "2024-03-15T23:59:59.999Z", &[("a", 1, 1_000)]),
            sale("earlier-this-month", "2024-03-01T00:00:00Z", &[("a", 2, 1_000)]),
            sale("last-month", "2024-02-29T23:59:59Z", &[("a", 4, 1_000)]),
        ];

        let stats = aggregate(&products, &sales, &options());
        assert_eq!(stats.today.sales_count, 2);
        assert_eq!(stats.today.amount.cents(), 2_000);
        assert_eq!(stats.month.sales_count, 3);
        assert_eq!(stats.month.amount.cents(), 4_000);
        assert_eq!(stats.total.sales_count, 4);
        assert_eq!(stats.total.amount.cents(), 8_000);
        assert_eq!(stats.total.average_sale.cents(), 2_000);
    }

    #[test]
    fn test_local_offset_moves_day_boundary() {
        // 20:00 UTC on the 14th is 01:00 on the 15th at UTC+5.
        let products = [product("a", 500, 1_000, 100)];
        let sales = [sale("late", "2024-03-14T20:00:00Z", &[("a", 1, 1_000)])];
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();

        let utc = aggregate(&products, &sales, &options());
        let local = aggregate(&products, &sales, &options().with_offset(offset));
        assert_eq!(utc.today.sales_count, 0);
        assert_eq!(local.today.sales_count, 1);
    }

    #[test]
    fn test_malformed_records_are_counted_not_fatal() {
        let products = [product("a", 500, 1_000, 100)];
        let mut broken = sale("broken", "not a date", &[("a", 1, 1_000), ("a", 0, 1_000)]);
        broken.items.push(SaleLineSnapshot {
            product_id: Some("gone".to_string()),
            name: "Deleted".to_string(),
            quantity: 1,
            unit_price_cents: 5_000,
        });
        let mut cancelled = sale("cancelled", "2024-03-15T09:00:00Z", &[("a", 1, 1_000)]);
        cancelled.status = SaleStatus::Cancelled;

        let stats = aggregate(&products, &[broken, cancelled], &options());
        assert_eq!(stats.data_quality.unparseable_timestamps, 1);
        assert_eq!(stats.data_quality.skipped_items, 1);
        assert_eq!(stats.data_quality.unknown_products, 1);
        assert_eq!(stats.data_quality.sales_excluded, 1);
        // fell back to now, so it lands in today
        assert_eq!(stats.today.sales_count, 1);
        assert_eq!(stats.today.amount.cents(), 6_000);
    }

    #[test]
    fn test_ranking_and_loss_lines() {
        let products = [product("a", 1_500, 1_000, 10), product("b", 100, 1_000, 10)];
        let sales = [sale("s", "2024-03-10T10:00:00Z", &[("a", 2, 1_000), ("b", 2, 1_000)])];

        let stats = aggregate(&products, &sales, &options().with_top_n(1));
        assert_eq!(stats.month.products.len(), 1);
        // equal amounts: tie broken by product id
        assert_eq!(stats.month.top_product.as_ref().unwrap().product_id, "a");
        assert_eq!(stats.month.loss_amount.cents(), 1_000);
        assert_eq!(stats.month.loss_margin_bps, 2_500);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let products = [product("a", 700, 1_000, 3), product("b", 0, 2_500, 0)];
        let sales = [
            sale("s1", "2024-03-15T08:00:00Z", &[("b", 1, 2_500), ("a", 1, 1_000)]),
            sale("s2", "garbage", &[("a", 3, 1_000)]),
            sale("s3", "2024-03-02 11:22:33", &[("b", 2, 2_500)]),
        ];

        let first = aggregate(&products, &sales, &options());
        let second = aggregate(&products, &sales, &options());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_inventory_summary() {
        let products = [product("a", 700, 1_000, 3), product("b", 0, 2_500, 1)];
        let stats = aggregate(&products, &[], &options());
        assert_eq!(stats.inventory.stock_value.cents(), 5_500);
        assert_eq!(stats.inventory.stock_cost.cents(), 2_100);
        assert_eq!(stats.inventory.products_without_cost, 1);
        assert_eq!(stats.inventory.low_stock_count, 1);
        assert_eq!(stats.total, PeriodStats::default());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-15T10:00:00+05:00").is_some());
        assert!(parse_timestamp("2024-03-15 10:00:00").is_some());
        assert!(parse_timestamp("2024-03-15 10:00:00.123").is_some());
        assert!(parse_timestamp("15/03/2024").is_none());
    }
}
