//! Debtor accounts against a real (in-memory) database.

mod common;

use chrono::Utc;
use stockbook_core::ledger::{applied_total, replay, LedgerChange};
use stockbook_core::{
    CoreError, DebtChangeKind, DebtorPatch, DebtorStatus, Direction, LedgerEntryType, Money, NewDebtor,
};
use stockbook_db::{DbConfig, DbError};

fn cents(value: i64) -> Money {
    Money::from_cents(value)
}

#[tokio::test]
async fn test_sale_payment_overpayment_scenario() {
    let db = common::db().await;
    let debtor = common::debtor(&db, "Aziza", "+998901112233").await;
    let repo = db.debtors();

    let sale = LedgerChange::sale(cents(50_000)).unwrap();
    let (_, after) = repo.apply_entry(&debtor.id, &sale, Some("groceries"), None).await.unwrap();
    assert_eq!(after.debt_cents, 50_000);
    assert_eq!(after.status(Utc::now(), 30), DebtorStatus::Active);

    let pay = LedgerChange::payment(cents(20_000)).unwrap();
    let (_, after) = repo.apply_entry(&debtor.id, &pay, None, None).await.unwrap();
    assert_eq!(after.debt_cents, 30_000);

    let overpay = LedgerChange::payment(cents(100_000)).unwrap();
    let (entry, after) = repo.apply_entry(&debtor.id, &overpay, None, Some("cashier-1")).await.unwrap();
    assert_eq!(after.debt_cents, 0);
    assert_eq!(entry.amount_cents, 100_000);
    assert_eq!(entry.applied_cents, 30_000);
    assert_eq!(entry.created_by, "cashier-1");
    assert_eq!(after.status(Utc::now(), 30), DebtorStatus::Paid);

    let stored = repo.require(&debtor.id).await.unwrap();
    assert_eq!(stored.debt_cents, 0);
    assert_eq!(stored.total_purchases_cents, 50_000);
    assert_eq!(stored.total_payments_cents, 50_000);
    assert_eq!(stored.version, debtor.version + 3);

    let entries = repo.entries(&debtor.id).await.unwrap();
    assert_eq!(entries.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(entries[0].entry_type, LedgerEntryType::Sale);
    assert_eq!(applied_total(&entries), stored.debt());
    assert_eq!(replay(&entries), stored.debt());
}

#[tokio::test]
async fn test_mixed_entries_keep_balance_equal_to_ledger() {
    let db = common::db().await;
    let debtor = common::debtor(&db, "Bobur", "+998912223344").await;
    let repo = db.debtors();

    let steps = [
        (DebtChangeKind::Add, None, 12_000),
        (DebtChangeKind::Subtract, Some(LedgerEntryType::Refund), 20_000),
        (DebtChangeKind::Add, Some(LedgerEntryType::Sale), 7_000),
        (DebtChangeKind::Subtract, Some(LedgerEntryType::Adjustment), 2_500),
        (DebtChangeKind::Subtract, None, 1_000),
    ];
    for (kind, entry_type, amount) in steps {
        let change = LedgerChange::from_debt_request(kind, entry_type, cents(amount)).unwrap();
        repo.apply_entry(&debtor.id, &change, None, None).await.unwrap();
    }

    let stored = repo.require(&debtor.id).await.unwrap();
    assert_eq!(stored.debt_cents, 3_500);

    let entries = repo.entries(&debtor.id).await.unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[1].applied_cents, 12_000);
    assert_eq!(entries[3].direction, Direction::Decrease);
    assert_eq!(applied_total(&entries), stored.debt());
}

#[tokio::test]
async fn test_apply_entry_to_missing_debtor() {
    let db = common::db().await;
    let change = LedgerChange::payment(cents(100)).unwrap();

    let err = db.debtors().apply_entry("missing", &change, None, None).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::DebtorNotFound(_))));
}

#[tokio::test]
async fn test_credit_limit_enforced_only_when_configured() {
    let limited = NewDebtor {
        name: "Dilnoza".to_string(),
        phone: "+998933334455".to_string(),
        max_debt_cents: Some(10_000),
        notes: None,
    };
    let increase = LedgerChange::sale(cents(15_000)).unwrap();

    let relaxed = common::db().await;
    let debtor = relaxed.debtors().create(&limited).await.unwrap();
    let (_, after) = relaxed.debtors().apply_entry(&debtor.id, &increase, None, None).await.unwrap();
    assert!(after.is_over_limit());

    let strict = common::db_with(DbConfig::in_memory().enforce_credit_limit(true)).await;
    let debtor = strict.debtors().create(&limited).await.unwrap();
    let err = strict.debtors().apply_entry(&debtor.id, &increase, None, None).await.unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::CreditLimitExceeded { limit: 10_000, .. })));

    // Nothing was written.
    assert!(strict.debtors().entries(&debtor.id).await.unwrap().is_empty());
    assert_eq!(strict.debtors().require(&debtor.id).await.unwrap().debt_cents, 0);
}

#[tokio::test]
async fn test_profile_edit_never_touches_balance() {
    let db = common::db().await;
    let debtor = common::debtor(&db, "Aziza", "+998901112233").await;
    let sale = LedgerChange::sale(cents(8_000)).unwrap();
    let (_, charged) = db.debtors().apply_entry(&debtor.id, &sale, None, None).await.unwrap();

    let updated = db
        .debtors()
        .update(
            &debtor.id,
            &DebtorPatch {
                name: Some("Aziza K.".to_string()),
                version: Some(charged.version),
                ..DebtorPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Aziza K.");
    assert_eq!(updated.debt_cents, 8_000);

    // The version used above is now stale.
    let err = db
        .debtors()
        .update(
            &debtor.id,
            &DebtorPatch {
                notes: Some("late".to_string()),
                version: Some(charged.version),
                ..DebtorPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Domain(CoreError::Conflict { .. })));
}

#[tokio::test]
async fn test_duplicate_phone_is_rejected() {
    let db = common::db().await;
    common::debtor(&db, "First", "+998901112233").await;

    let err = db
        .debtors()
        .create(&NewDebtor {
            name: "Second".to_string(),
            phone: "+998901112233".to_string(),
            max_debt_cents: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "phone"));
}

#[tokio::test]
async fn test_search_active_and_stats() {
    let db = common::db().await;
    let a = common::debtor(&db, "Aziza", "+998901112233").await;
    common::debtor(&db, "Bobur", "+998912223344").await;

    let sale = LedgerChange::sale(cents(40_000)).unwrap();
    db.debtors().apply_entry(&a.id, &sale, None, None).await.unwrap();

    let found = db.debtors().search("aziz").await.unwrap();
    assert_eq!(found.len(), 1);
    let by_phone = db.debtors().search("22233").await.unwrap();
    assert_eq!(by_phone[0].name, "Bobur");
    assert!(db.debtors().search("   ").await.unwrap().is_empty());

    let active = db.debtors().active().await.unwrap();
    assert_eq!(active.len(), 1);

    let stats = db.debtors().stats(Utc::now(), 30).await.unwrap();
    assert_eq!(stats.total_debtors, 2);
    assert_eq!(stats.active_debtors, 1);
    assert_eq!(stats.inactive_debtors, 1);
    assert_eq!(stats.total_debt, cents(40_000));
    assert_eq!(stats.average_debt, cents(40_000));
}

#[tokio::test]
async fn test_delete_discards_ledger() {
    let db = common::db().await;
    let debtor = common::debtor(&db, "Aziza", "+998901112233").await;
    let sale = LedgerChange::sale(cents(1_000)).unwrap();
    db.debtors().apply_entry(&debtor.id, &sale, None, None).await.unwrap();

    db.debtors().delete(&debtor.id).await.unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert!(matches!(
        db.debtors().delete(&debtor.id).await,
        Err(DbError::Domain(CoreError::DebtorNotFound(_)))
    ));
}

#[tokio::test]
async fn test_ledger_rows_cannot_be_rewritten() {
    let db = common::db().await;
    let debtor = common::debtor(&db, "Aziza", "+998901112233").await;
    let sale = LedgerChange::sale(cents(1_000)).unwrap();
    db.debtors().apply_entry(&debtor.id, &sale, None, None).await.unwrap();

    let result = sqlx::query("UPDATE ledger_entries SET amount_cents = 1")
        .execute(db.pool())
        .await;
    assert!(result.is_err());

    let result = sqlx::query("DELETE FROM ledger_entries WHERE debtor_id = ?1")
        .bind(&debtor.id)
        .execute(db.pool())
        .await;
    assert!(result.is_err());

    let kept: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(kept, 1);
    assert_eq!(db.debtors().require(&debtor.id).await.unwrap().debt_cents, 1_000);
}
