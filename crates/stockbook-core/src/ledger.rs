//! # Ledger Module
//!
//! Balance rules for debtor accounts.
//!
//! ## The Balance Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   balance₀ = 0                                                          │
//! │   balanceₙ = max(0, balanceₙ₋₁ + sign(entryₙ) × amountₙ)                │
//! │                                                                         │
//! │   sale        ──► increase                                              │
//! │   payment     ──► decrease (clamped at zero)                            │
//! │   refund      ──► decrease (clamped at zero)                            │
//! │   adjustment  ──► caller chooses                                        │
//! │                                                                         │
//! │   Every entry also records the amount that actually moved the balance   │
//! │   ("applied"), so  Σ sign × applied == balance  holds exactly.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Over-payment is clamped rather than rejected: a customer handing over
//! more than they owe zeroes the account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{DebtChangeKind, Debtor, DebtorStatus, Direction, LedgerEntry, LedgerEntryType};

// =============================================================================
// Ledger Change
// =============================================================================

/// A validated, not yet applied, balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerChange {
    pub entry_type: LedgerEntryType,
    pub direction: Direction,
    pub amount: Money,
}

impl LedgerChange {
    /// Builds a change, resolving the direction from the entry type.
    ///
    /// ## Rules
    /// - `amount` must be positive
    /// - `sale` only increases, `payment`/`refund` only decrease
    /// - `adjustment` needs an explicit direction
    pub fn new(
        entry_type: LedgerEntryType,
        amount: Money,
        direction: Option<Direction>,
    ) -> Result<Self, ValidationError> {
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            });
        }

        let direction = match (entry_type.implied_direction(), direction) {
            (Some(implied), None) => implied,
            (Some(implied), Some(given)) if implied == given => implied,
            (Some(_), Some(_)) => {
                return Err(ValidationError::InvalidFormat {
                    field: "direction".to_string(),
                    reason: format!("{} entries cannot go the other way", entry_type.as_str()),
                })
            }
            (None, Some(given)) => given,
            (None, None) => return Err(ValidationError::required("direction")),
        };

        Ok(LedgerChange {
            entry_type,
            direction,
            amount,
        })
    }

    /// Maps the `{type: add|subtract, entryType?}` shape of a debt edit.
    ///
    /// ```text
    /// add                     → adjustment / increase
    /// add + entryType=sale    → sale
    /// subtract                → payment
    /// subtract + refund       → refund
    /// subtract + adjustment   → adjustment / decrease
    /// ```
    pub fn from_debt_request(
        kind: DebtChangeKind,
        entry_type: Option<LedgerEntryType>,
        amount: Money,
    ) -> Result<Self, ValidationError> {
        let (entry_type, direction) = match kind {
            DebtChangeKind::Add => (
                entry_type.unwrap_or(LedgerEntryType::Adjustment),
                Direction::Increase,
            ),
            DebtChangeKind::Subtract => (
                entry_type.unwrap_or(LedgerEntryType::Payment),
                Direction::Decrease,
            ),
        };
        LedgerChange::new(entry_type, amount, Some(direction))
    }

    pub fn sale(amount: Money) -> Result<Self, ValidationError> {
        LedgerChange::new(LedgerEntryType::Sale, amount, None)
    }

    pub fn payment(amount: Money) -> Result<Self, ValidationError> {
        LedgerChange::new(LedgerEntryType::Payment, amount, None)
    }

    /// A downward adjustment, used for voided credit.
    pub fn write_off(amount: Money) -> Result<Self, ValidationError> {
        LedgerChange::new(LedgerEntryType::Adjustment, amount, Some(Direction::Decrease))
    }
}

/// Outcome of applying a [`LedgerChange`] to a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedChange {
    pub balance_before: Money,
    pub balance_after: Money,
    /// Amount that actually moved the balance, `0 <= applied <= amount`.
    pub applied: Money,
}

impl AppliedChange {
    /// Portion of a decrease that was discarded by the clamp.
    pub fn clamped(&self, change: &LedgerChange) -> Money {
        change.amount - self.applied
    }
}

// =============================================================================
// Balance Rules
// =============================================================================

/// Applies one change to a balance, clamping decreases at zero.
///
/// ## Example
/// ```rust
/// use stockbook_core::ledger::{apply_entry, LedgerChange};
/// use stockbook_core::Money;
///
/// let pay = LedgerChange::payment(Money::from_cents(100_000)).unwrap();
/// let applied = apply_entry(Money::from_cents(30_000), &pay);
/// assert_eq!(applied.balance_after, Money::zero());
/// assert_eq!(applied.applied.cents(), 30_000);
/// ```
pub fn apply_entry(balance: Money, change: &LedgerChange) -> AppliedChange {
    match change.direction {
        Direction::Increase => {
            let after = Money::from_cents(balance.cents().saturating_add(change.amount.cents()));
            AppliedChange {
                balance_before: balance,
                balance_after: after,
                applied: after - balance,
            }
        }
        Direction::Decrease => {
            let available = balance.clamp_non_negative();
            let applied = change.amount.min(available);
            AppliedChange {
                balance_before: balance,
                balance_after: available - applied,
                applied,
            }
        }
    }
}

/// Rejects an increase that would carry the balance above a positive limit.
pub fn check_credit_limit(
    debtor: &str,
    applied: &AppliedChange,
    limit: Option<Money>,
) -> CoreResult<()> {
    match limit {
        Some(limit)
            if limit.is_positive()
                && applied.balance_after > applied.balance_before
                && applied.balance_after > limit =>
        {
            Err(CoreError::CreditLimitExceeded {
                debtor: debtor.to_string(),
                limit: limit.cents(),
                attempted: applied.balance_after.cents(),
            })
        }
        _ => Ok(()),
    }
}

/// Recomputes a balance from the requested amounts of stored entries.
///
/// Entries must be in `seq` order. The result equals the stored balance as
/// long as nothing bypassed the ledger.
pub fn replay<'a, I>(entries: I) -> Money
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    entries.into_iter().fold(Money::zero(), |balance, entry| {
        let change = LedgerChange {
            entry_type: entry.entry_type,
            direction: entry.direction,
            amount: Money::from_cents(entry.amount_cents),
        };
        apply_entry(balance, &change).balance_after
    })
}

/// Sum of signed applied amounts. Must equal the stored balance.
pub fn applied_total<'a, I>(entries: I) -> Money
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    entries
        .into_iter()
        .map(|entry| Money::from_cents(entry.signed_applied()))
        .sum()
}

/// Single source of truth for a debtor's status.
///
/// ```text
/// debt <= 0                               → paid
/// days since last activity > threshold    → overdue
/// otherwise                               → active
/// ```
pub fn debtor_status(
    debt: Money,
    last_activity_at: DateTime<Utc>,
    now: DateTime<Utc>,
    overdue_after_days: i64,
) -> DebtorStatus {
    if !debt.is_positive() {
        return DebtorStatus::Paid;
    }
    if now.signed_duration_since(last_activity_at).num_days() > overdue_after_days {
        DebtorStatus::Overdue
    } else {
        DebtorStatus::Active
    }
}

// =============================================================================
// Debtor Directory Summary
// =============================================================================

/// Headline numbers for the debtor directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DebtorSummary {
    pub total_debtors: u64,
    /// Debtors that owe something (active or overdue).
    pub active_debtors: u64,
    /// Debtors that owe nothing.
    pub inactive_debtors: u64,
    pub overdue_debtors: u64,
    pub total_debt: Money,
    /// total_debt / active_debtors.
    pub average_debt: Money,
}

/// Summarizes a debtor list as of `now`.
pub fn summarize_debtors(debtors: &[Debtor], now: DateTime<Utc>, overdue_after_days: i64) -> DebtorSummary {
    let mut summary = DebtorSummary::default();
    for debtor in debtors {
        summary.total_debtors += 1;
        match debtor.status(now, overdue_after_days) {
            DebtorStatus::Paid => summary.inactive_debtors += 1,
            DebtorStatus::Active => summary.active_debtors += 1,
            DebtorStatus::Overdue => {
                summary.active_debtors += 1;
                summary.overdue_debtors += 1;
            }
        }
        summary.total_debt += debtor.debt().clamp_non_negative();
    }
    if summary.active_debtors > 0 {
        summary.average_debt =
            Money::from_cents(summary.total_debt.cents() / summary.active_debtors as i64);
    }
    summary
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn money(cents: i64) -> Money {
        Money::from_cents(cents)
    }

    fn entry(seq: i64, change: &LedgerChange, applied: &AppliedChange) -> LedgerEntry {
        LedgerEntry {
            id: format!("e-{seq}"),
            debtor_id: "d-1".to_string(),
            seq,
            entry_type: change.entry_type,
            direction: change.direction,
            amount_cents: change.amount.cents(),
            applied_cents: applied.applied.cents(),
            balance_after_cents: applied.balance_after.cents(),
            notes: None,
            sale_id: None,
            sale_item_id: None,
            created_by: "system".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_sale_then_payments_clamp_to_paid() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let sale = LedgerChange::sale(money(50_000)).unwrap();
        let step = apply_entry(Money::zero(), &sale);
        assert_eq!(step.balance_after, money(50_000));
        assert_eq!(debtor_status(step.balance_after, now, now, 30), DebtorStatus::Active);

        let pay = LedgerChange::payment(money(20_000)).unwrap();
        let step = apply_entry(step.balance_after, &pay);
        assert_eq!(step.balance_after, money(30_000));

        let overpay = LedgerChange::payment(money(100_000)).unwrap();
        let step = apply_entry(step.balance_after, &overpay);
        assert_eq!(step.balance_after, Money::zero());
        assert_eq!(step.applied, money(30_000));
        assert_eq!(step.clamped(&overpay), money(70_000));
        assert_eq!(debtor_status(step.balance_after, now, now, 30), DebtorStatus::Paid);
    }

    #[test]
    fn test_balance_matches_clamped_running_sum() {
        // Deterministic pseudo-random walk over all entry kinds.
        let mut seed: u64 = 0x5eed;
        let mut balance = Money::zero();
        let mut expected: i64 = 0;
        let mut entries = Vec::new();

        for seq in 1..=500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let amount = money(((seed >> 33) % 90_000) as i64 + 1);
            let change = match (seed >> 20) % 4 {
                0 => LedgerChange::sale(amount),
                1 => LedgerChange::payment(amount),
                2 => LedgerChange::new(LedgerEntryType::Refund, amount, None),
                _ => LedgerChange::new(
                    LedgerEntryType::Adjustment,
                    amount,
                    Some(if seed % 2 == 0 { Direction::Increase } else { Direction::Decrease }),
                ),
            }
            .unwrap();

            let applied = apply_entry(balance, &change);
            expected = (expected + change.direction.sign() * change.amount.cents()).max(0);
            assert_eq!(applied.balance_after.cents(), expected);
            assert!(applied.applied <= change.amount);
            assert!(!applied.applied.is_negative());

            entries.push(entry(seq, &change, &applied));
            balance = applied.balance_after;
        }

        assert_eq!(replay(&entries), balance);
        assert_eq!(applied_total(&entries), balance);
    }

    #[test]
    fn test_change_validation() {
        assert!(LedgerChange::sale(Money::zero()).is_err());
        assert!(LedgerChange::payment(money(-5)).is_err());
        assert!(LedgerChange::new(LedgerEntryType::Adjustment, money(5), None).is_err());
        assert!(LedgerChange::new(LedgerEntryType::Sale, money(5), Some(Direction::Decrease)).is_err());
    }

    #[test]
    fn test_from_debt_request_mapping() {
        let add = LedgerChange::from_debt_request(DebtChangeKind::Add, None, money(10)).unwrap();
        assert_eq!(add.entry_type, LedgerEntryType::Adjustment);
        assert_eq!(add.direction, Direction::Increase);

        let sub = LedgerChange::from_debt_request(DebtChangeKind::Subtract, None, money(10)).unwrap();
        assert_eq!(sub.entry_type, LedgerEntryType::Payment);

        let refund = LedgerChange::from_debt_request(
            DebtChangeKind::Subtract,
            Some(LedgerEntryType::Refund),
            money(10),
        )
        .unwrap();
        assert_eq!(refund.direction, Direction::Decrease);

        // a sale can never be subtracted
        assert!(LedgerChange::from_debt_request(
            DebtChangeKind::Subtract,
            Some(LedgerEntryType::Sale),
            money(10)
        )
        .is_err());
    }

    #[test]
    fn test_overdue_after_threshold() {
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        assert_eq!(
            debtor_status(money(1), last, last + Duration::days(30), 30),
            DebtorStatus::Active
        );
        assert_eq!(
            debtor_status(money(1), last, last + Duration::days(31), 30),
            DebtorStatus::Overdue
        );
        assert_eq!(
            debtor_status(Money::zero(), last, last + Duration::days(90), 30),
            DebtorStatus::Paid
        );
    }

    #[test]
    fn test_credit_limit() {
        let sale = LedgerChange::sale(money(60_000)).unwrap();
        let applied = apply_entry(money(50_000), &sale);
        assert!(matches!(
            check_credit_limit("Ali", &applied, Some(money(100_000))),
            Err(CoreError::CreditLimitExceeded { attempted: 110_000, .. })
        ));
        assert!(check_credit_limit("Ali", &applied, None).is_ok());
        assert!(check_credit_limit("Ali", &applied, Some(Money::zero())).is_ok());

        let pay = LedgerChange::payment(money(1)).unwrap();
        let applied = apply_entry(money(500_000), &pay);
        assert!(check_credit_limit("Ali", &applied, Some(money(100_000))).is_ok());
    }

    #[test]
    fn test_summarize_debtors() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let debtor = |debt: i64, idle_days: i64| Debtor {
            id: format!("d-{debt}-{idle_days}"),
            name: "Debtor".to_string(),
            phone: "+998900000000".to_string(),
            debt_cents: debt,
            max_debt_cents: None,
            notes: None,
            total_purchases_cents: debt,
            total_payments_cents: 0,
            last_activity_at: now - Duration::days(idle_days),
            version: 1,
            created_at: now - Duration::days(idle_days),
            updated_at: now - Duration::days(idle_days),
        };

        let summary = summarize_debtors(
            &[debtor(30_000, 1), debtor(10_000, 45), debtor(0, 90)],
            now,
            30,
        );
        assert_eq!(summary.total_debtors, 3);
        assert_eq!(summary.active_debtors, 2);
        assert_eq!(summary.inactive_debtors, 1);
        assert_eq!(summary.overdue_debtors, 1);
        assert_eq!(summary.total_debt.cents(), 40_000);
        assert_eq!(summary.average_debt.cents(), 20_000);
    }
}
