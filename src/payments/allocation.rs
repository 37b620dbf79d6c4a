use chrono::{DateTime, Utc};
use tracing::debug;

use crate::decimal::Money;
use crate::obligations::{apply_to_obligation, Obligation};
use crate::types::{ObligationId, OrderId};

use super::AllocationLine;

/// snapshot of one open obligation taken at the start of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenObligation {
    pub id: ObligationId,
    pub order_id: OrderId,
    /// creation time of the owning order
    pub created_at: DateTime<Utc>,
    /// installment number, 0 for a plain order
    pub sequence: u32,
    pub amount: Money,
    pub paid_amount: Money,
}

impl OpenObligation {
    /// oldest order first, then order id, then installment number
    pub fn sort_key(&self) -> (DateTime<Utc>, OrderId, u32) {
        (self.created_at, self.order_id, self.sequence)
    }
}

impl Obligation for OpenObligation {
    fn obligation_id(&self) -> ObligationId {
        self.id
    }

    fn amount(&self) -> Money {
        self.amount
    }

    fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    fn record_applied(&mut self, applied: Money) {
        self.paid_amount += applied;
    }
}

/// result of running a payment over a list of obligations
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Allocation {
    pub lines: Vec<AllocationLine>,
    pub total_applied: Money,
    /// money left once the list was exhausted
    pub remainder: Money,
}

/// apply `amount` to `obligations` in the order given
///
/// Stops as soon as less than a cent is left. Obligations are mutated in
/// place so callers can work on snapshots and commit afterwards.
pub fn allocate_in_order(obligations: &mut [OpenObligation], amount: Money) -> Allocation {
    let mut remaining = amount;
    let mut allocation = Allocation::default();

    for obligation in obligations.iter_mut() {
        if remaining < Money::CENT {
            break;
        }
        if !obligation.is_open() {
            continue;
        }

        let (applied, rest) = apply_to_obligation(obligation, remaining);
        remaining = rest;

        debug!(
            obligation = %obligation.id,
            applied = %applied,
            balance_after = %obligation.remaining(),
            "obligation allocated"
        );

        allocation.total_applied += applied;
        allocation.lines.push(AllocationLine {
            obligation_id: obligation.id,
            order_id: obligation.order_id,
            applied,
            balance_after: obligation.remaining(),
        });
    }

    allocation.remainder = remaining;
    allocation
}

/// payment allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentAllocator;

impl PaymentAllocator {
    pub fn new() -> Self {
        Self
    }

    /// general mode: every open obligation, oldest debt first
    pub fn allocate_general(&self, mut obligations: Vec<OpenObligation>, amount: Money) -> (Allocation, Vec<OpenObligation>) {
        obligations.retain(|o| o.is_open());
        obligations.sort_by_key(|o| o.sort_key());
        let allocation = allocate_in_order(&mut obligations, amount);
        (allocation, obligations)
    }

    /// targeted mode: the obligations of one order or a single installment,
    /// already in the order they must be paid
    pub fn allocate_targeted(&self, mut obligations: Vec<OpenObligation>, amount: Money) -> (Allocation, Vec<OpenObligation>) {
        let allocation = allocate_in_order(&mut obligations, amount);
        (allocation, obligations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn open(order: u128, days: i64, amount: Money, paid: Money) -> OpenObligation {
        let order_id = Uuid::from_u128(order);
        OpenObligation {
            id: ObligationId::Order(order_id),
            order_id,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(days),
            sequence: 0,
            amount,
            paid_amount: paid,
        }
    }

    fn three_orders() -> Vec<OpenObligation> {
        // given newest first to prove the allocator sorts
        vec![
            open(3, 2, Money::from_major(20), Money::ZERO),
            open(2, 1, Money::from_major(60), Money::from_major(10)),
            open(1, 0, Money::from_major(30), Money::ZERO),
        ]
    }

    #[test]
    fn test_general_partial_cover() {
        let (allocation, after) = PaymentAllocator::new().allocate_general(three_orders(), Money::from_major(70));

        assert_eq!(allocation.lines.len(), 2);
        assert_eq!(allocation.lines[0].obligation_id, ObligationId::Order(Uuid::from_u128(1)));
        assert_eq!(allocation.lines[0].applied, Money::from_major(30));
        assert_eq!(allocation.lines[0].balance_after, Money::ZERO);
        assert_eq!(allocation.lines[1].applied, Money::from_major(40));
        assert_eq!(allocation.lines[1].balance_after, Money::from_major(10));
        assert_eq!(allocation.remainder, Money::ZERO);

        // newest order untouched
        assert_eq!(after[2].paid_amount, Money::ZERO);
    }

    #[test]
    fn test_general_overpay_leaves_remainder() {
        let (allocation, after) = PaymentAllocator::new().allocate_general(three_orders(), Money::from_major(150));

        assert_eq!(allocation.total_applied, Money::from_major(100));
        assert_eq!(allocation.remainder, Money::from_major(50));
        assert!(after.iter().all(|o| !o.is_open()));
    }

    #[test]
    fn test_ties_broken_by_order_id() {
        let obligations = vec![
            open(9, 0, Money::from_major(10), Money::ZERO),
            open(4, 0, Money::from_major(10), Money::ZERO),
        ];
        let (allocation, _) = PaymentAllocator::new().allocate_general(obligations, Money::from_major(10));

        assert_eq!(allocation.lines.len(), 1);
        assert_eq!(allocation.lines[0].order_id, Uuid::from_u128(4));
    }

    #[test]
    fn test_installments_follow_number_within_order() {
        let order_id = Uuid::from_u128(7);
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let installment = |seq: u32| OpenObligation {
            id: ObligationId::Installment(Uuid::from_u128(100 + seq as u128)),
            order_id,
            created_at,
            sequence: seq,
            amount: Money::from_decimal(dec!(33.33)),
            paid_amount: Money::ZERO,
        };

        let (allocation, _) = PaymentAllocator::new()
            .allocate_general(vec![installment(3), installment(1), installment(2)], Money::from_major(40));

        let sequence: Vec<_> = allocation.lines.iter().map(|l| l.obligation_id).collect();
        assert_eq!(
            sequence,
            vec![
                ObligationId::Installment(Uuid::from_u128(101)),
                ObligationId::Installment(Uuid::from_u128(102)),
            ]
        );
        assert_eq!(allocation.lines[1].applied, Money::from_decimal(dec!(6.67)));
    }

    #[test]
    fn test_targeted_exact_settles_without_drift() {
        let obligation = open(1, 0, Money::from_decimal(dec!(33.34)), Money::from_decimal(dec!(10.01)));
        let (allocation, after) =
            PaymentAllocator::new().allocate_targeted(vec![obligation], Money::from_decimal(dec!(23.33)));

        assert_eq!(allocation.remainder, Money::ZERO);
        assert_eq!(after[0].remaining(), Money::ZERO);
        assert!(allocation.lines[0].settles());
    }

    #[test]
    fn test_targeted_on_paid_obligation_returns_everything() {
        let obligation = open(1, 0, Money::from_major(10), Money::from_major(10));
        let (allocation, _) = PaymentAllocator::new().allocate_targeted(vec![obligation], Money::from_major(3));

        assert!(allocation.lines.is_empty());
        assert_eq!(allocation.remainder, Money::from_major(3));
    }

    proptest! {
        #[test]
        fn general_allocation_conserves_money(
            balances in prop::collection::vec((1i64..50_000i64, 0u32..=100u32), 1..12),
            payment_cents in 1i64..500_000i64,
        ) {
            let obligations: Vec<_> = balances
                .iter()
                .enumerate()
                .map(|(i, (cents, paid_share))| {
                    let amount = Money::from_cents(*cents);
                    let paid = Money::from_cents(cents * *paid_share as i64 / 100);
                    open(i as u128 + 1, (i % 3) as i64, amount, paid)
                })
                .collect();
            let owed_before: Money = obligations.iter().map(|o| o.remaining()).sum();
            let payment = Money::from_cents(payment_cents);

            let (allocation, after) = PaymentAllocator::new().allocate_general(obligations, payment);

            let applied: Money = allocation.lines.iter().map(|l| l.applied).sum();
            prop_assert_eq!(applied, allocation.total_applied);
            prop_assert_eq!(applied + allocation.remainder, payment);
            prop_assert!(applied <= owed_before);
            prop_assert!(after.iter().all(|o| o.paid_amount <= o.amount));
            if allocation.remainder.is_positive() {
                prop_assert!(after.iter().all(|o| !o.is_open()));
            }
        }
    }
}
