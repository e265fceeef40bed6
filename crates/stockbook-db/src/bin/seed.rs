//! # Seed Data Generator
//!
//! Populates a development database with a small shop: a catalog, a few
//! debtors and some credit history.
//!
//! ## Usage
//! ```bash
//! cargo run -p stockbook-db --bin seed
//! cargo run -p stockbook-db --bin seed -- --db ./data/stockbook.db
//! ```
//!
//! A handful of products are deliberately priced below cost so the
//! problematic-products report has something to show.

use std::env;

use anyhow::Context;
use stockbook_core::checkout::{CheckoutLine, CheckoutRequest};
use stockbook_core::ledger::LedgerChange;
use stockbook_core::{Money, NewDebtor, NewProduct, PaymentMethod};
use stockbook_db::{Database, DbConfig, ProductFilter};
use tracing::info;

/// (name, barcode, cost, price, quantity, min_stock)
const PRODUCTS: &[(&str, &str, i64, i64, i64, i64)] = &[
    ("Sugar 1kg", "4780000000017", 9_000, 12_000, 40, 10),
    ("Rice 1kg", "4780000000024", 11_000, 15_000, 60, 10),
    ("Sunflower Oil 1L", "4780000000031", 18_000, 23_000, 25, 5),
    ("Black Tea 100g", "4780000000048", 7_500, 10_000, 30, 5),
    ("Flour 2kg", "4780000000055", 14_000, 17_500, 20, 8),
    ("Eggs x10", "4780000000062", 13_000, 16_000, 15, 10),
    ("Milk 1L", "4780000000079", 8_000, 9_500, 8, 10),
    ("Bread", "4780000000086", 3_000, 4_000, 50, 15),
    ("Cola 1.5L", "4780000000093", 10_500, 9_900, 24, 6),
    ("Soap", "4780000000109", 0, 6_000, 35, 5),
    ("Matches", "4780000000116", 0, 1_000, 100, 20),
    ("Butter 200g", "4780000000123", 21_000, 19_000, 6, 4),
];

/// (name, phone, max debt)
const DEBTORS: &[(&str, &str, Option<i64>)] = &[
    ("Aziza Karimova", "+998 90 111-22-33", Some(500_000)),
    ("Bobur Aliyev", "+998 91 222-33-44", None),
    ("Dilnoza Yusupova", "+998 93 333-44-55", Some(200_000)),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let mut db_path = String::from("./stockbook_dev.db");

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" | "-d" => {
                db_path = args.next().context("--db needs a path")?;
            }
            "--help" | "-h" => {
                println!("Stockbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./stockbook_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .with_context(|| format!("opening {db_path}"))?;

    let existing = db
        .products()
        .list(&ProductFilter {
            limit: Some(1),
            ..ProductFilter::default()
        })
        .await?;
    if !existing.is_empty() {
        info!(path = %db_path, "Database already has products, skipping seed");
        return Ok(());
    }

    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (name, barcode, cost, price, quantity, min_stock) in PRODUCTS {
        let product = db
            .products()
            .create(&NewProduct {
                name: name.to_string(),
                barcode: Some(barcode.to_string()),
                category_id: None,
                unit: None,
                cost_cents: *cost,
                price_cents: *price,
                quantity: *quantity,
                min_stock: Some(*min_stock),
            })
            .await
            .with_context(|| format!("creating product {name}"))?;
        product_ids.push(product.id);
    }
    info!(count = product_ids.len(), "Products created");

    let mut debtor_ids = Vec::with_capacity(DEBTORS.len());
    for (name, phone, max_debt) in DEBTORS {
        let debtor = db
            .debtors()
            .create(&NewDebtor {
                name: name.to_string(),
                phone: phone.to_string(),
                max_debt_cents: *max_debt,
                notes: None,
            })
            .await
            .with_context(|| format!("creating debtor {name}"))?;
        debtor_ids.push(debtor.id);
    }
    info!(count = debtor_ids.len(), "Debtors created");

    // A cash sale, a credit sale per debtor, and one partial payment.
    db.sales()
        .checkout(&CheckoutRequest {
            items: vec![line(&product_ids[0], 2), line(&product_ids[7], 3)],
            payment_method: PaymentMethod::Cash,
            debtor_id: None,
            customer_name: None,
            customer_phone: None,
            notes: None,
            idempotency_key: None,
        })
        .await?;

    for (index, debtor_id) in debtor_ids.iter().enumerate() {
        db.sales()
            .checkout(&CheckoutRequest {
                items: vec![line(&product_ids[index + 1], 1), line(&product_ids[9], 2)],
                payment_method: PaymentMethod::Credit,
                debtor_id: Some(debtor_id.clone()),
                customer_name: None,
                customer_phone: None,
                notes: Some("seed".to_string()),
                idempotency_key: None,
            })
            .await?;
    }

    let payment = LedgerChange::payment(Money::from_cents(10_000))?;
    db.debtors()
        .apply_entry(&debtor_ids[0], &payment, Some("Partial payment"), None)
        .await?;

    info!(path = %db_path, "Seed complete");
    Ok(())
}

fn line(product_id: &str, quantity: i64) -> CheckoutLine {
    CheckoutLine {
        product_id: product_id.to_string(),
        quantity,
    }
}
