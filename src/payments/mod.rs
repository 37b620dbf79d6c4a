pub mod allocation;
pub mod overpayment;
pub mod schedule;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::{ClientId, InstallmentId, ObligationId, OrderId, PaymentId, PaymentMethod, PaymentTarget};

pub use allocation::{allocate_in_order, Allocation, OpenObligation, PaymentAllocator};
pub use overpayment::{OverpaymentHandler, RemainderDisposition};
pub use schedule::{due_date, generate_plan, split_amount, PlanGenerator, PlanTerms};

/// payment request as submitted by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub payment_id: PaymentId,
    pub target: PaymentTarget,
    pub amount: Money,
    pub method: PaymentMethod,
    pub notes: String,
}

impl PaymentRequest {
    pub fn new(target: PaymentTarget, amount: Money, method: PaymentMethod) -> Self {
        Self {
            payment_id: Uuid::new_v4(),
            target,
            amount,
            method,
            notes: String::new(),
        }
    }

    /// client-level payment spread oldest debt first
    pub fn general(client_id: ClientId, amount: Money, method: PaymentMethod) -> Self {
        Self::new(PaymentTarget::Client(client_id), amount, method)
    }

    pub fn to_order(order_id: OrderId, amount: Money, method: PaymentMethod) -> Self {
        Self::new(PaymentTarget::Order(order_id), amount, method)
    }

    pub fn to_installment(installment_id: InstallmentId, amount: Money, method: PaymentMethod) -> Self {
        Self::new(PaymentTarget::Installment(installment_id), amount, method)
    }

    /// reuse a caller-side id so resubmissions are recognised
    pub fn with_id(mut self, payment_id: PaymentId) -> Self {
        self.payment_id = payment_id;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(LedgerError::InvalidPaymentAmount { amount: self.amount });
        }
        Ok(())
    }
}

/// one step of an allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub obligation_id: ObligationId,
    pub order_id: OrderId,
    pub applied: Money,
    pub balance_after: Money,
}

impl AllocationLine {
    pub fn settles(&self) -> bool {
        self.balance_after.is_zero()
    }
}

/// append-only payment record carrying its full allocation breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub client_id: ClientId,
    pub target: PaymentTarget,
    pub amount: Money,
    pub method: PaymentMethod,
    pub notes: String,
    pub applied_at: DateTime<Utc>,
    pub allocation: Vec<AllocationLine>,
    /// part of the amount that matched no obligation
    pub unapplied: Money,
    /// part of `unapplied` kept as client credit
    pub credit_recorded: Money,
}

impl Payment {
    pub fn total_applied(&self) -> Money {
        self.allocation.iter().map(|l| l.applied).sum()
    }

    /// same submission as `request`, used to tell replays from id reuse
    pub fn matches(&self, request: &PaymentRequest) -> bool {
        self.id == request.payment_id
            && self.target == request.target
            && self.amount == request.amount
    }

    pub fn receipt(&self) -> AllocationReceipt {
        let (unapplied_remainder, overpayment_remainder) = if self.target.is_general() {
            (self.unapplied, Money::ZERO)
        } else {
            (Money::ZERO, self.unapplied)
        };

        AllocationReceipt {
            payment_id: self.id,
            target: self.target,
            requested: self.amount,
            total_applied: self.total_applied(),
            per_obligation: self.allocation.clone(),
            unapplied_remainder,
            overpayment_remainder,
            credit_recorded: self.credit_recorded,
            applied_at: self.applied_at,
            replayed: false,
        }
    }
}

/// allocation receipt returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReceipt {
    pub payment_id: PaymentId,
    pub target: PaymentTarget,
    pub requested: Money,
    pub total_applied: Money,
    pub per_obligation: Vec<AllocationLine>,
    /// general mode leftover once every obligation was covered
    pub unapplied_remainder: Money,
    /// targeted mode excess over the obligation balance
    pub overpayment_remainder: Money,
    pub credit_recorded: Money,
    pub applied_at: DateTime<Utc>,
    /// true when this receipt was served from the log instead of applied again
    pub replayed: bool,
}

impl AllocationReceipt {
    /// money that did not reach any obligation
    pub fn remainder(&self) -> Money {
        self.unapplied_remainder + self.overpayment_remainder
    }

    pub fn is_fully_applied(&self) -> bool {
        self.remainder().is_zero()
    }

    pub fn applied_to(&self, obligation_id: ObligationId) -> Money {
        self.per_obligation
            .iter()
            .filter(|l| l.obligation_id == obligation_id)
            .map(|l| l.applied)
            .sum()
    }

    pub fn settled(&self) -> impl Iterator<Item = ObligationId> + '_ {
        self.per_obligation
            .iter()
            .filter(|l| l.settles())
            .map(|l| l.obligation_id)
    }
}
