use chrono::NaiveDate;

use crate::decimal::Money;
use crate::types::{InstallmentStatus, OrderStatus};

/// derive an installment status from what was owed, what was paid and the date
///
/// Full payment wins over the calendar, so a paid installment never turns
/// overdue later on.
pub fn resolve_installment_status(
    paid_amount: Money,
    amount: Money,
    due_date: NaiveDate,
    today: NaiveDate,
) -> InstallmentStatus {
    if paid_amount >= amount {
        InstallmentStatus::Paid
    } else if today > due_date {
        InstallmentStatus::Overdue
    } else if paid_amount.is_positive() {
        InstallmentStatus::Partial
    } else {
        InstallmentStatus::Pending
    }
}

/// derive an order status; cancellation is the only status set from outside
pub fn resolve_order_status(amount_paid: Money, total_amount: Money, cancelled: bool) -> OrderStatus {
    if cancelled {
        OrderStatus::Cancelled
    } else if amount_paid >= total_amount {
        OrderStatus::Paid
    } else if amount_paid.is_positive() {
        OrderStatus::Partial
    } else {
        OrderStatus::Pending
    }
}

/// signed days until the due date, negative once it has passed
pub fn days_until_due(due_date: NaiveDate, today: NaiveDate) -> i64 {
    due_date.signed_duration_since(today).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_installment_status_table() {
        let amount = Money::from_major(20);
        let due = date(2024, 2, 1);

        assert_eq!(
            resolve_installment_status(Money::ZERO, amount, due, date(2024, 1, 15)),
            InstallmentStatus::Pending
        );
        assert_eq!(
            resolve_installment_status(Money::from_major(5), amount, due, date(2024, 1, 15)),
            InstallmentStatus::Partial
        );
        assert_eq!(
            resolve_installment_status(Money::from_major(5), amount, due, date(2024, 2, 2)),
            InstallmentStatus::Overdue
        );
        assert_eq!(
            resolve_installment_status(Money::ZERO, amount, due, date(2024, 2, 2)),
            InstallmentStatus::Overdue
        );
    }

    #[test]
    fn test_due_date_itself_is_not_overdue() {
        let due = date(2024, 2, 1);
        assert_eq!(
            resolve_installment_status(Money::ZERO, Money::from_major(20), due, due),
            InstallmentStatus::Pending
        );
    }

    #[test]
    fn test_paid_is_terminal() {
        let amount = Money::from_decimal(dec!(33.34));
        let due = date(2024, 2, 1);

        for today in [date(2024, 1, 1), date(2024, 2, 1), date(2030, 1, 1)] {
            assert_eq!(
                resolve_installment_status(amount, amount, due, today),
                InstallmentStatus::Paid
            );
        }
    }

    #[test]
    fn test_order_status() {
        let total = Money::from_major(100);
        assert_eq!(resolve_order_status(Money::ZERO, total, false), OrderStatus::Pending);
        assert_eq!(resolve_order_status(Money::from_major(1), total, false), OrderStatus::Partial);
        assert_eq!(resolve_order_status(total, total, false), OrderStatus::Paid);
        assert_eq!(resolve_order_status(total, total, true), OrderStatus::Cancelled);
    }

    #[test]
    fn test_days_until_due() {
        assert_eq!(days_until_due(date(2024, 3, 1), date(2024, 2, 1)), 29);
        assert_eq!(days_until_due(date(2024, 2, 1), date(2024, 2, 4)), -3);
    }
}
