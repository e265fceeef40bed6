#![allow(dead_code)]

use stockbook_core::checkout::{CheckoutLine, CheckoutRequest};
use stockbook_core::{Debtor, NewDebtor, NewProduct, PaymentMethod, Product};
use stockbook_db::{Database, DbConfig};

pub async fn db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub async fn db_with(config: DbConfig) -> Database {
    Database::new(config).await.unwrap()
}

pub async fn product(db: &Database, name: &str, cost: i64, price: i64, quantity: i64) -> Product {
    db.products()
        .create(&NewProduct {
            name: name.to_string(),
            cost_cents: cost,
            price_cents: price,
            quantity,
            ..NewProduct::default()
        })
        .await
        .unwrap()
}

pub async fn debtor(db: &Database, name: &str, phone: &str) -> Debtor {
    db.debtors()
        .create(&NewDebtor {
            name: name.to_string(),
            phone: phone.to_string(),
            max_debt_cents: None,
            notes: None,
        })
        .await
        .unwrap()
}

pub fn line(product: &Product, quantity: i64) -> CheckoutLine {
    CheckoutLine {
        product_id: product.id.clone(),
        quantity,
    }
}

pub fn cash(items: Vec<CheckoutLine>) -> CheckoutRequest {
    CheckoutRequest {
        items,
        payment_method: PaymentMethod::Cash,
        debtor_id: None,
        customer_name: None,
        customer_phone: None,
        notes: None,
        idempotency_key: None,
    }
}

pub fn credit(debtor: &Debtor, items: Vec<CheckoutLine>) -> CheckoutRequest {
    CheckoutRequest {
        payment_method: PaymentMethod::Credit,
        debtor_id: Some(debtor.id.clone()),
        ..cash(items)
    }
}
