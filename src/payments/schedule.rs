use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::PlanLimits;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::obligations::{Installment, InstallmentPlan, Order};
use crate::types::{Frequency, OrderId, PlanId};

const PLAN_ID_SALT: u128 = 0x706c_616e;
const INSTALLMENT_ID_SALT: u128 = 0x6375_6f74_61;

/// financing terms chosen at sale time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTerms {
    pub initial_payment: Money,
    pub number_of_installments: u32,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
}

impl PlanTerms {
    pub fn new(number_of_installments: u32, frequency: Frequency, start_date: NaiveDate) -> Self {
        Self {
            initial_payment: Money::ZERO,
            number_of_installments,
            frequency,
            start_date,
        }
    }

    pub fn with_initial_payment(mut self, initial_payment: Money) -> Self {
        self.initial_payment = initial_payment;
        self
    }
}

/// installment plan generator
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanGenerator {
    limits: PlanLimits,
}

impl PlanGenerator {
    pub fn new(limits: PlanLimits) -> Self {
        Self { limits }
    }

    /// generate the schedule for an order
    ///
    /// Identifiers are derived from the order id, so the same inputs always
    /// yield the same plan.
    pub fn generate(&self, order_id: OrderId, total_amount: Money, terms: &PlanTerms) -> Result<InstallmentPlan> {
        self.validate(total_amount, terms)?;

        let plan_id = plan_id_for(order_id);
        let amounts = split_amount(total_amount - terms.initial_payment, terms.number_of_installments);

        let mut installments = Vec::with_capacity(amounts.len());
        for (number, amount) in (1..=terms.number_of_installments).zip(amounts) {
            installments.push(Installment {
                id: installment_id_for(plan_id, number),
                plan_id,
                order_id,
                number,
                due_date: due_date(terms.start_date, terms.frequency, number)?,
                amount,
                paid_amount: Money::ZERO,
            });
        }

        debug!(
            order_id = %order_id,
            installments = installments.len(),
            frequency = %terms.frequency,
            "installment schedule generated"
        );

        Ok(InstallmentPlan {
            id: plan_id,
            order_id,
            total_amount,
            initial_payment: terms.initial_payment,
            number_of_installments: terms.number_of_installments,
            frequency: terms.frequency,
            start_date: terms.start_date,
            installments,
        })
    }

    fn validate(&self, total_amount: Money, terms: &PlanTerms) -> Result<()> {
        if !total_amount.is_positive() {
            return Err(LedgerError::InvalidPlan {
                message: format!("total amount must be positive, got {}", total_amount),
            });
        }
        if terms.initial_payment.is_negative() || terms.initial_payment > total_amount {
            return Err(LedgerError::InvalidPlan {
                message: format!(
                    "initial payment {} outside 0..={}",
                    terms.initial_payment, total_amount
                ),
            });
        }
        if !self.limits.contains(terms.number_of_installments) {
            return Err(LedgerError::InvalidPlan {
                message: format!(
                    "number of installments must be between {} and {}, got {}",
                    self.limits.min_installments,
                    self.limits.max_installments,
                    terms.number_of_installments
                ),
            });
        }
        Ok(())
    }
}

/// generate a plan for an order with the default 2..=12 bounds
pub fn generate_plan(order: &Order, terms: &PlanTerms) -> Result<InstallmentPlan> {
    PlanGenerator::default().generate(order.id, order.total_amount, terms)
}

/// split `remaining` into `count` amounts; the last one absorbs the rounding remainder
pub fn split_amount(remaining: Money, count: u32) -> Vec<Money> {
    if count == 0 {
        return Vec::new();
    }
    let base = remaining.floor_div(count);
    let last = remaining - base * (count - 1);

    let mut amounts = vec![base; (count - 1) as usize];
    amounts.push(last);
    amounts
}

/// due date of installment `number` (1-based)
pub fn due_date(start_date: NaiveDate, frequency: Frequency, number: u32) -> Result<NaiveDate> {
    let date = match frequency {
        Frequency::Weekly => start_date.checked_add_signed(Duration::days(7 * number as i64)),
        Frequency::Biweekly => start_date.checked_add_signed(Duration::days(15 * number as i64)),
        // always offset from the start date so short months never shift later dates
        Frequency::Monthly => start_date.checked_add_months(Months::new(number)),
    };

    date.ok_or_else(|| LedgerError::InvalidPlan {
        message: format!("due date {} from {} is out of range", number, start_date),
    })
}

fn plan_id_for(order_id: OrderId) -> PlanId {
    Uuid::from_u128(order_id.as_u128() ^ PLAN_ID_SALT)
}

fn installment_id_for(plan_id: PlanId, number: u32) -> Uuid {
    Uuid::from_u128(plan_id.as_u128() ^ ((number as u128) << 64 | INSTALLMENT_ID_SALT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order(total: Money) -> Order {
        Order::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            total,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_monthly_plan_with_initial_payment() {
        let order = order(Money::from_major(100));
        let terms = PlanTerms::new(4, Frequency::Monthly, date(2024, 1, 1))
            .with_initial_payment(Money::from_major(20));

        let plan = generate_plan(&order, &terms).unwrap();

        assert_eq!(plan.installments.len(), 4);
        for installment in &plan.installments {
            assert_eq!(installment.amount, Money::from_major(20));
            assert_eq!(installment.paid_amount, Money::ZERO);
        }
        let dates: Vec<_> = plan.installments.iter().map(|i| i.due_date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 2, 1), date(2024, 3, 1), date(2024, 4, 1), date(2024, 5, 1)]
        );
        assert_eq!(plan.financed_amount(), Money::from_major(80));
    }

    #[test]
    fn test_last_installment_absorbs_remainder() {
        let order = order(Money::from_major(100));
        let terms = PlanTerms::new(3, Frequency::Weekly, date(2024, 1, 1));

        let plan = generate_plan(&order, &terms).unwrap();
        let amounts: Vec<_> = plan.installments.iter().map(|i| i.amount).collect();

        assert_eq!(
            amounts,
            vec![
                Money::from_decimal(dec!(33.33)),
                Money::from_decimal(dec!(33.33)),
                Money::from_decimal(dec!(33.34)),
            ]
        );
        assert_eq!(amounts.iter().sum::<Money>(), Money::from_major(100));
    }

    #[test]
    fn test_weekly_and_biweekly_steps() {
        let start = date(2024, 1, 1);
        assert_eq!(due_date(start, Frequency::Weekly, 1).unwrap(), date(2024, 1, 8));
        assert_eq!(due_date(start, Frequency::Weekly, 3).unwrap(), date(2024, 1, 22));
        assert_eq!(due_date(start, Frequency::Biweekly, 1).unwrap(), date(2024, 1, 16));
        assert_eq!(due_date(start, Frequency::Biweekly, 2).unwrap(), date(2024, 1, 31));
    }

    #[test]
    fn test_monthly_end_of_month_does_not_drift() {
        let start = date(2024, 1, 31);
        assert_eq!(due_date(start, Frequency::Monthly, 1).unwrap(), date(2024, 2, 29));
        assert_eq!(due_date(start, Frequency::Monthly, 2).unwrap(), date(2024, 3, 31));
        assert_eq!(due_date(start, Frequency::Monthly, 3).unwrap(), date(2024, 4, 30));
        assert_eq!(due_date(start, Frequency::Monthly, 4).unwrap(), date(2024, 5, 31));
    }

    #[test]
    fn test_rejects_out_of_bounds_terms() {
        let order = order(Money::from_major(100));
        let start = date(2024, 1, 1);

        let too_few = PlanTerms::new(1, Frequency::Monthly, start);
        assert!(matches!(generate_plan(&order, &too_few), Err(LedgerError::InvalidPlan { .. })));

        let too_many = PlanTerms::new(13, Frequency::Monthly, start);
        assert!(generate_plan(&order, &too_many).is_err());

        let big_initial = PlanTerms::new(3, Frequency::Monthly, start)
            .with_initial_payment(Money::from_major(101));
        assert!(generate_plan(&order, &big_initial).is_err());

        let negative_initial = PlanTerms::new(3, Frequency::Monthly, start)
            .with_initial_payment(Money::from_major(-1));
        assert!(generate_plan(&order, &negative_initial).is_err());

        let empty = Order::new(Uuid::new_v4(), Uuid::new_v4(), Money::ZERO, Utc::now());
        assert!(generate_plan(&empty, &PlanTerms::new(3, Frequency::Monthly, start)).is_err());
    }

    #[test]
    fn test_custom_limits() {
        let generator = PlanGenerator::new(PlanLimits {
            min_installments: 2,
            max_installments: 24,
        });
        let terms = PlanTerms::new(18, Frequency::Monthly, date(2024, 1, 1));
        let plan = generator.generate(Uuid::new_v4(), Money::from_major(1_000), &terms).unwrap();
        assert_eq!(plan.installments.len(), 18);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let order = order(Money::from_decimal(dec!(250.75)));
        let terms = PlanTerms::new(7, Frequency::Biweekly, date(2024, 6, 15))
            .with_initial_payment(Money::from_major(50));

        let first = generate_plan(&order, &terms).unwrap();
        let second = generate_plan(&order, &terms).unwrap();
        assert_eq!(first, second);

        let mut ids: Vec<_> = first.installments.iter().map(|i| i.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 7);
    }

    proptest! {
        #[test]
        fn plan_sum_is_exact_and_dates_increase(
            total_cents in 1i64..100_000_000i64,
            initial_share in 0u32..=100u32,
            count in 2u32..=12u32,
            freq in prop_oneof![
                Just(Frequency::Weekly),
                Just(Frequency::Biweekly),
                Just(Frequency::Monthly),
            ],
            day in 1u32..=31u32,
        ) {
            let total = Money::from_cents(total_cents);
            let initial = Money::from_cents(total_cents * initial_share as i64 / 100);
            let start = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
            let terms = PlanTerms::new(count, freq, start).with_initial_payment(initial);

            let plan = PlanGenerator::default().generate(Uuid::new_v4(), total, &terms).unwrap();

            let sum: Money = plan.installments.iter().map(|i| i.amount).sum();
            prop_assert_eq!(sum, total - initial);
            prop_assert_eq!(plan.installments.len() as u32, count);

            for pair in plan.installments.windows(2) {
                prop_assert!(pair[0].due_date < pair[1].due_date);
                prop_assert_eq!(pair[0].number + 1, pair[1].number);
            }
            for installment in &plan.installments {
                prop_assert_eq!(
                    installment.due_date,
                    due_date(start, freq, installment.number).unwrap()
                );
                prop_assert!(!installment.amount.is_negative());
            }
        }
    }
}
