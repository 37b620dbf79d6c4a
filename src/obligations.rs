use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::status::{resolve_installment_status, resolve_order_status};
use crate::types::{
    ClientId, Frequency, InstallmentId, InstallmentStatus, ObligationId, OrderId, OrderStatus,
    PlanId,
};

/// anything that carries debt and can absorb a payment
pub trait Obligation {
    fn obligation_id(&self) -> ObligationId;

    /// amount owed in total
    fn amount(&self) -> Money;

    fn paid_amount(&self) -> Money;

    fn remaining(&self) -> Money {
        self.amount().saturating_sub(self.paid_amount())
    }

    fn is_open(&self) -> bool {
        self.remaining().is_positive()
    }

    /// add an already clamped amount to the paid total
    fn record_applied(&mut self, applied: Money);
}

/// apply up to `amount` to one obligation, returning (applied, remainder)
///
/// Never pushes the paid total past the obligation amount.
pub fn apply_to_obligation<O: Obligation + ?Sized>(obligation: &mut O, amount: Money) -> (Money, Money) {
    let applied = amount.min(obligation.remaining()).max(Money::ZERO);
    if applied.is_positive() {
        obligation.record_applied(applied);
    }
    (applied, amount - applied)
}

/// client identity as handed over by client management
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
}

impl Client {
    pub fn new(id: ClientId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// a sale; the root debt-bearing entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_id: ClientId,
    pub total_amount: Money,
    /// cached projection of the payment log
    pub amount_paid: Money,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(id: OrderId, client_id: ClientId, total_amount: Money, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            client_id,
            total_amount,
            amount_paid: Money::ZERO,
            created_at,
            due_date: None,
            status: OrderStatus::Pending,
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }

    /// fully paid orders are read-mostly
    pub fn is_closed(&self) -> bool {
        self.amount_paid >= self.total_amount
    }

    /// outstanding balance; cancelled orders owe nothing
    pub fn balance(&self) -> Money {
        if self.is_cancelled() {
            Money::ZERO
        } else {
            self.remaining()
        }
    }

    /// date the debt is aged from
    pub fn reference_date(&self) -> NaiveDate {
        self.due_date.unwrap_or_else(|| self.created_at.date_naive())
    }

    pub fn refresh_status(&mut self) {
        self.status = resolve_order_status(self.amount_paid, self.total_amount, self.is_cancelled());
    }

    pub fn validate(&self) -> Result<()> {
        if !self.total_amount.is_positive() {
            return Err(LedgerError::InvalidOrder {
                message: format!("total amount must be positive, got {}", self.total_amount),
            });
        }
        if self.amount_paid.is_negative() || self.amount_paid > self.total_amount {
            return Err(LedgerError::InvalidOrder {
                message: format!(
                    "amount paid {} outside 0..={}",
                    self.amount_paid, self.total_amount
                ),
            });
        }
        Ok(())
    }
}

impl Obligation for Order {
    fn obligation_id(&self) -> ObligationId {
        ObligationId::Order(self.id)
    }

    fn amount(&self) -> Money {
        self.total_amount
    }

    fn paid_amount(&self) -> Money {
        self.amount_paid
    }

    fn record_applied(&mut self, applied: Money) {
        self.amount_paid += applied;
        self.refresh_status();
    }
}

/// one cuota of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub plan_id: PlanId,
    pub order_id: OrderId,
    /// 1-based position in the plan
    pub number: u32,
    pub due_date: NaiveDate,
    /// fixed at generation
    pub amount: Money,
    /// cached projection of the payment log
    pub paid_amount: Money,
}

impl Installment {
    pub fn status(&self, today: NaiveDate) -> InstallmentStatus {
        resolve_installment_status(self.paid_amount, self.amount, self.due_date, today)
    }
}

impl Obligation for Installment {
    fn obligation_id(&self) -> ObligationId {
        ObligationId::Installment(self.id)
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

/// a financed order's schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub id: PlanId,
    pub order_id: OrderId,
    pub total_amount: Money,
    pub initial_payment: Money,
    pub number_of_installments: u32,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    /// ordered by number; count and dates never change after generation
    pub installments: Vec<Installment>,
}

impl InstallmentPlan {
    /// amount spread over the installments
    pub fn financed_amount(&self) -> Money {
        self.total_amount - self.initial_payment
    }

    pub fn installment(&self, number: u32) -> Option<&Installment> {
        self.installments.iter().find(|i| i.number == number)
    }

    pub fn find(&self, id: InstallmentId) -> Option<&Installment> {
        self.installments.iter().find(|i| i.id == id)
    }

    pub fn find_mut(&mut self, id: InstallmentId) -> Option<&mut Installment> {
        self.installments.iter_mut().find(|i| i.id == id)
    }

    pub fn total_paid(&self) -> Money {
        self.installments.iter().map(|i| i.paid_amount).sum()
    }

    pub fn remaining(&self) -> Money {
        self.installments.iter().map(|i| i.remaining()).sum()
    }

    pub fn paid_count(&self) -> usize {
        self.installments
            .iter()
            .filter(|i| i.paid_amount >= i.amount)
            .count()
    }

    /// next installment with a balance, by number
    pub fn next_open(&self) -> Option<&Installment> {
        self.installments.iter().find(|i| i.is_open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn order(total: i64) -> Order {
        Order::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Money::from_major(total),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_apply_clamps_to_remaining() {
        let mut o = order(50);
        let (applied, remainder) = apply_to_obligation(&mut o, Money::from_major(80));

        assert_eq!(applied, Money::from_major(50));
        assert_eq!(remainder, Money::from_major(30));
        assert_eq!(o.amount_paid, Money::from_major(50));
        assert_eq!(o.status, OrderStatus::Paid);
    }

    #[test]
    fn test_apply_partial() {
        let mut o = order(50);
        let (applied, remainder) = apply_to_obligation(&mut o, Money::from_decimal(dec!(12.50)));

        assert_eq!(applied, Money::from_decimal(dec!(12.50)));
        assert_eq!(remainder, Money::ZERO);
        assert_eq!(o.remaining(), Money::from_decimal(dec!(37.50)));
        assert_eq!(o.status, OrderStatus::Partial);
    }

    #[test]
    fn test_apply_to_closed_obligation_is_noop() {
        let mut o = order(10);
        o.amount_paid = Money::from_major(10);
        let (applied, remainder) = apply_to_obligation(&mut o, Money::from_major(5));

        assert_eq!(applied, Money::ZERO);
        assert_eq!(remainder, Money::from_major(5));
        assert!(!o.is_open());
    }

    #[test]
    fn test_order_validation() {
        let mut o = order(10);
        assert!(o.validate().is_ok());

        o.amount_paid = Money::from_major(11);
        assert!(o.validate().is_err());

        let zero = Order::new(Uuid::new_v4(), Uuid::new_v4(), Money::ZERO, Utc::now());
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_reference_date_falls_back_to_creation() {
        let o = order(10);
        assert_eq!(o.reference_date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        let due = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(o.with_due_date(due).reference_date(), due);
    }

    #[test]
    fn test_cancelled_order_has_no_balance() {
        let mut o = order(10);
        o.status = OrderStatus::Cancelled;
        assert_eq!(o.balance(), Money::ZERO);
        assert_eq!(o.remaining(), Money::from_major(10));
    }
}
