//! Checkout, settlement and cancellation against a real (in-memory) database.

mod common;

use chrono::Utc;
use stockbook_core::aggregation::{aggregate, AggregationOptions};
use stockbook_core::ledger::applied_total;
use stockbook_core::{
    CoreError, CostBasis, Direction, LedgerEntryType, PaymentMethod, ProductPatch, SaleStatus, SettleAction,
    Settlement, ValidationError,
};
use stockbook_db::{DbError, SaleFilter, SaleTotals};

#[tokio::test]
async fn test_credit_checkout_charges_debtor_once() {
    let db = common::db().await;
    let bread = common::product(&db, "Bread", 6_000, 10_000, 10).await;
    let debtor = common::debtor(&db, "Aziza", "+998901112233").await;

    let outcome = db
        .sales()
        .checkout(&common::credit(&debtor, vec![common::line(&bread, 3)]))
        .await
        .unwrap();

    assert!(!outcome.replayed);
    assert_eq!(outcome.sale.total_cents, 30_000);
    assert_eq!(outcome.sale.total_cost_cents, 18_000);
    assert_eq!(outcome.sale.profit_cents, 12_000);
    assert_eq!(outcome.sale.payment_method, PaymentMethod::Credit);
    assert_eq!(outcome.sale.items[0].settlement, Settlement::Open);
    assert_eq!(outcome.sale.items[0].cost_basis, CostBasis::Real);

    let stored = db.debtors().require(&debtor.id).await.unwrap();
    assert_eq!(stored.debt_cents, 30_000);

    let entries = db.debtors().entries(&debtor.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, LedgerEntryType::Sale);
    assert_eq!(entries[0].amount_cents, 30_000);
    assert_eq!(entries[0].sale_id.as_deref(), Some(outcome.sale.id.as_str()));

    let shelf = db.products().require_active(&bread.id).await.unwrap();
    assert_eq!(shelf.quantity, 7);
}

#[tokio::test]
async fn test_receipt_number_format() {
    let db = common::db().await;
    let soap = common::product(&db, "Soap", 0, 6_000, 10).await;

    let first = db.sales().checkout(&common::cash(vec![common::line(&soap, 1)])).await.unwrap();
    let second = db.sales().checkout(&common::cash(vec![common::line(&soap, 1)])).await.unwrap();

    let receipt = &first.sale.receipt_number;
    assert_eq!(receipt.len(), "YYYYMMDD-HHMMSS-NNNN".len());
    assert!(receipt.ends_with("-0001"));
    assert!(second.sale.receipt_number.ends_with("-0002"));
    assert_eq!(first.sale.items[0].cost_basis, CostBasis::Estimated);
    assert_eq!(first.sale.items[0].settlement, Settlement::Settled);
}

#[tokio::test]
async fn test_insufficient_stock_writes_nothing() {
    let db = common::db().await;
    let sugar = common::product(&db, "Sugar", 9_000, 12_000, 10).await;
    let milk = common::product(&db, "Milk", 8_000, 9_500, 1).await;
    let debtor = common::debtor(&db, "Aziza", "+998901112233").await;

    let err = db
        .sales()
        .checkout(&common::credit(
            &debtor,
            vec![common::line(&sugar, 2), common::line(&milk, 5)],
        ))
        .await
        .unwrap_err();

    match err {
        DbError::Domain(CoreError::InsufficientStock {
            product,
            available,
            requested,
        }) => {
            assert_eq!(product, "Milk");
            assert_eq!(available, 1);
            assert_eq!(requested, 5);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(db.products().require_active(&sugar.id).await.unwrap().quantity, 10);
    assert!(db.sales().list(&SaleFilter::default()).await.unwrap().is_empty());
    assert_eq!(db.debtors().require(&debtor.id).await.unwrap().debt_cents, 0);
}

#[tokio::test]
async fn test_checkout_rejections() {
    let db = common::db().await;
    let bread = common::product(&db, "Bread", 3_000, 4_000, 10).await;

    let empty = db.sales().checkout(&common::cash(vec![])).await.unwrap_err();
    assert!(matches!(empty, DbError::Domain(CoreError::EmptySale)));

    let mut no_debtor = common::cash(vec![common::line(&bread, 1)]);
    no_debtor.payment_method = PaymentMethod::Credit;
    let err = db.sales().checkout(&no_debtor).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::CreditRequiresDebtor)));

    no_debtor.debtor_id = Some("missing".to_string());
    let err = db.sales().checkout(&no_debtor).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::DebtorNotFound(_))));

    db.products().deactivate(&bread.id).await.unwrap();
    let err = db
        .sales()
        .checkout(&common::cash(vec![common::line(&bread, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));
}

#[tokio::test]
async fn test_idempotent_retry_returns_original_sale() {
    let db = common::db().await;
    let bread = common::product(&db, "Bread", 3_000, 4_000, 10).await;
    let debtor = common::debtor(&db, "Aziza", "+998901112233").await;

    let mut request = common::credit(&debtor, vec![common::line(&bread, 2)]);
    request.idempotency_key = Some("register-1:0042".to_string());

    let first = db.sales().checkout(&request).await.unwrap();
    let retry = db.sales().checkout(&request).await.unwrap();

    assert!(retry.replayed);
    assert_eq!(retry.sale.id, first.sale.id);
    assert_eq!(retry.sale.items.len(), 1);
    assert_eq!(db.products().require_active(&bread.id).await.unwrap().quantity, 8);
    assert_eq!(db.debtors().entries(&debtor.id).await.unwrap().len(), 1);
    assert_eq!(db.debtors().require(&debtor.id).await.unwrap().debt_cents, 8_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_checkouts_for_last_unit() {
    let db = common::db().await;
    let last = common::product(&db, "Butter", 21_000, 25_000, 1).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let db = db.clone();
        let request = common::cash(vec![common::line(&last, 1)]);
        handles.push(tokio::spawn(async move { db.sales().checkout(&request).await }));
    }

    let mut succeeded = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(DbError::Domain(CoreError::InsufficientStock { .. })) => out_of_stock += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!((succeeded, out_of_stock), (1, 1));
    assert_eq!(db.products().require_active(&last.id).await.unwrap().quantity, 0);
}

#[tokio::test]
async fn test_settle_pay_and_remove() {
    let db = common::db().await;
    let rice = common::product(&db, "Rice", 11_000, 15_000, 10).await;
    let tea = common::product(&db, "Tea", 7_500, 10_000, 10).await;
    let debtor = common::debtor(&db, "Aziza", "+998901112233").await;

    let sale = db
        .sales()
        .checkout(&common::credit(
            &debtor,
            vec![common::line(&rice, 2), common::line(&tea, 1)],
        ))
        .await
        .unwrap()
        .sale;
    let (rice_item, tea_item) = (&sale.items[0], &sale.items[1]);

    let paid = db
        .debtors()
        .settle_item(&debtor.id, &sale.id, &rice_item.id, SettleAction::Pay, None, None)
        .await
        .unwrap();
    assert_eq!(paid.item.settlement, Settlement::Settled);
    let entry = paid.entry.unwrap();
    assert_eq!(entry.entry_type, LedgerEntryType::Payment);
    assert_eq!(entry.sale_item_id.as_deref(), Some(rice_item.id.as_str()));
    assert_eq!(paid.debtor.debt_cents, 10_000);

    let again = db
        .debtors()
        .settle_item(&debtor.id, &sale.id, &rice_item.id, SettleAction::Pay, None, None)
        .await
        .unwrap_err();
    assert!(matches!(again, DbError::Domain(CoreError::AlreadySettled { .. })));

    let no_reason = db
        .debtors()
        .settle_item(&debtor.id, &sale.id, &tea_item.id, SettleAction::Remove, Some("  "), None)
        .await
        .unwrap_err();
    assert!(matches!(
        no_reason,
        DbError::Domain(CoreError::Validation(ValidationError::Required { .. }))
    ));

    let removed = db
        .debtors()
        .settle_item(&debtor.id, &sale.id, &tea_item.id, SettleAction::Remove, Some("returned"), None)
        .await
        .unwrap();
    assert_eq!(removed.item.settlement, Settlement::Voided);
    assert_eq!(removed.item.settlement_reason.as_deref(), Some("returned"));
    let entry = removed.entry.unwrap();
    assert_eq!(entry.entry_type, LedgerEntryType::Adjustment);
    assert_eq!(entry.direction, Direction::Decrease);
    assert_eq!(entry.notes.as_deref(), Some("Tea removed: returned"));
    assert_eq!(removed.debtor.debt_cents, 0);

    let history = db.debtors().history(&debtor.id).await.unwrap();
    assert_eq!(history.credit_items.len(), 2);
    assert_eq!(history.summary.settled_credit.cents(), 30_000);
    assert_eq!(history.summary.voided_credit.cents(), 10_000);
    assert_eq!(history.summary.open_credit.cents(), 0);
    assert_eq!(history.summary.total_paid.cents(), 30_000);
    assert!(history.summary.balance_consistent);
}

#[tokio::test]
async fn test_settle_rejects_foreign_sale() {
    let db = common::db().await;
    let rice = common::product(&db, "Rice", 11_000, 15_000, 10).await;
    let owner = common::debtor(&db, "Aziza", "+998901112233").await;
    let other = common::debtor(&db, "Bobur", "+998912223344").await;

    let sale = db
        .sales()
        .checkout(&common::credit(&owner, vec![common::line(&rice, 1)]))
        .await
        .unwrap()
        .sale;

    let err = db
        .debtors()
        .settle_item(&other.id, &sale.id, &sale.items[0].id, SettleAction::Pay, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::SaleNotFound(_))));

    let err = db
        .debtors()
        .settle_item(&owner.id, &sale.id, "no-such-item", SettleAction::Pay, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::SaleItemNotFound(_))));
}

#[tokio::test]
async fn test_cancel_compensates_stock_and_balance() {
    let db = common::db().await;
    let rice = common::product(&db, "Rice", 11_000, 15_000, 10).await;
    let tea = common::product(&db, "Tea", 7_500, 10_000, 10).await;
    let debtor = common::debtor(&db, "Aziza", "+998901112233").await;

    let sale = db
        .sales()
        .checkout(&common::credit(
            &debtor,
            vec![common::line(&rice, 2), common::line(&tea, 1)],
        ))
        .await
        .unwrap()
        .sale;
    db.debtors()
        .settle_item(&debtor.id, &sale.id, &sale.items[1].id, SettleAction::Pay, None, None)
        .await
        .unwrap();

    let cancelled = db.sales().cancel(&sale.id, None).await.unwrap();
    assert_eq!(cancelled.sale.status, SaleStatus::Cancelled);
    assert_eq!(cancelled.sale.items[0].settlement, Settlement::Voided);
    assert_eq!(cancelled.sale.items[1].settlement, Settlement::Settled);
    assert_eq!(cancelled.ledger_entry.unwrap().amount_cents, 30_000);

    assert_eq!(db.products().require_active(&rice.id).await.unwrap().quantity, 10);
    assert_eq!(db.products().require_active(&tea.id).await.unwrap().quantity, 10);

    let stored = db.debtors().require(&debtor.id).await.unwrap();
    assert_eq!(stored.debt_cents, 0);
    let entries = db.debtors().entries(&debtor.id).await.unwrap();
    assert_eq!(applied_total(&entries), stored.debt());

    let twice = db.sales().cancel(&sale.id, None).await.unwrap_err();
    assert!(matches!(twice, DbError::Domain(CoreError::InvalidSaleStatus { .. })));
}

#[tokio::test]
async fn test_stale_product_edit_conflicts() {
    let db = common::db().await;
    let bread = common::product(&db, "Bread", 3_000, 4_000, 10).await;

    let edited = db
        .products()
        .update(
            &bread.id,
            &ProductPatch {
                price_cents: Some(4_500),
                version: Some(bread.version),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.price_cents, 4_500);
    assert_eq!(edited.version, bread.version + 1);

    let err = db
        .products()
        .update(
            &bread.id,
            &ProductPatch {
                price_cents: Some(5_000),
                version: Some(bread.version),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::Conflict { .. })));
}

#[tokio::test]
async fn test_edit_read_before_checkout_cannot_restore_sold_stock() {
    let db = common::db().await;
    let bread = common::product(&db, "Bread", 3_000, 4_000, 5).await;

    let sold = db
        .sales()
        .checkout(&common::cash(vec![common::line(&bread, 2)]))
        .await
        .unwrap();

    let err = db
        .products()
        .update(
            &bread.id,
            &ProductPatch {
                quantity: Some(5),
                price_cents: Some(4_200),
                version: Some(bread.version),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::Conflict { .. })));

    let stored = db.products().get_by_id(&bread.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 3);
    assert_eq!(stored.price_cents, 4_000);
    assert_eq!(stored.version, bread.version + 1);

    // Cancelling puts the units back and moves the version again.
    db.sales().cancel(&sold.sale.id, None).await.unwrap();
    let restocked = db.products().get_by_id(&bread.id).await.unwrap().unwrap();
    assert_eq!(restocked.quantity, 5);
    assert_eq!(restocked.version, stored.version + 1);
}

#[tokio::test]
async fn test_completed_totals_ignore_list_limit() {
    let db = common::db().await;
    let tea = common::product(&db, "Tea", 7_500, 10_000, 20).await;

    let mut sales = Vec::new();
    for quantity in 1..=3 {
        let outcome = db
            .sales()
            .checkout(&common::cash(vec![common::line(&tea, quantity)]))
            .await
            .unwrap();
        sales.push(outcome.sale);
    }
    db.sales().cancel(&sales[0].id, None).await.unwrap();

    let (from, to) = (Utc::now() - chrono::Duration::hours(1), Utc::now() + chrono::Duration::hours(1));
    let page = db
        .sales()
        .list(&SaleFilter {
            from: Some(from),
            to: Some(to),
            limit: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);

    let totals = db.sales().completed_totals(from, to).await.unwrap();
    assert_eq!(totals.sales_count, 2);
    assert_eq!(totals.total_cents, 50_000);

    let earlier = db.sales().completed_totals(from - chrono::Duration::days(1), from).await.unwrap();
    assert_eq!(earlier, SaleTotals::default());
}

#[tokio::test]
async fn test_catalog_listings() {
    let db = common::db().await;
    common::product(&db, "Cola 1.5L", 10_500, 9_900, 24).await;
    common::product(&db, "Milk 1L", 8_000, 9_500, 0).await;
    common::product(&db, "Matches", 0, 1_000, 100).await;

    let problematic = db.products().problematic().await.unwrap();
    assert_eq!(problematic.len(), 1);
    assert_eq!(problematic[0].name, "Cola 1.5L");

    let low = db.products().low_stock().await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].name, "Milk 1L");

    let filter = stockbook_db::ProductFilter {
        query: Some("cola".to_string()),
        ..Default::default()
    };
    assert_eq!(db.products().list(&filter).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_snapshots_feed_the_dashboard() {
    let db = common::db().await;
    let bread = common::product(&db, "Bread", 3_000, 4_000, 10).await;
    let soap = common::product(&db, "Soap", 0, 10_000, 10).await;

    db.sales()
        .checkout(&common::cash(vec![common::line(&bread, 2), common::line(&soap, 1)]))
        .await
        .unwrap();
    let cancelled = db
        .sales()
        .checkout(&common::cash(vec![common::line(&bread, 1)]))
        .await
        .unwrap();
    db.sales().cancel(&cancelled.sale.id, None).await.unwrap();

    let products = db.products().all_active().await.unwrap();
    let snapshots = db.sales().snapshots().await.unwrap();
    assert_eq!(snapshots.len(), 2);

    let stats = aggregate(&products, &snapshots, &AggregationOptions::new(Utc::now()));
    assert_eq!(stats.today.sales_count, 1);
    assert_eq!(stats.today.amount.cents(), 18_000);
    // bread: real 6 000; soap: estimated 10 000 at 40% → cost 6 000
    assert_eq!(stats.today.cost.cents(), 12_000);
    assert_eq!(stats.data_quality.unparseable_timestamps, 0);
}
