use thiserror::Error;

use crate::decimal::Money;
use crate::store::StoreError;
use crate::types::{ClientId, InstallmentId, OrderId, OrderStatus, PaymentId};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("invalid plan: {message}")]
    InvalidPlan {
        message: String,
    },

    #[error("invalid order: {message}")]
    InvalidOrder {
        message: String,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("client {client_id} has no open obligations")]
    NoOpenObligations {
        client_id: ClientId,
    },

    #[error("overpayment rejected: outstanding {outstanding}, requested {requested}")]
    Overpayment {
        outstanding: Money,
        requested: Money,
    },

    #[error("concurrent modification of client {client_id}: expected version {expected}, found {found}")]
    ConcurrentModification {
        client_id: ClientId,
        expected: u64,
        found: u64,
    },

    #[error("persistence error: {0}")]
    Persistence(StoreError),

    #[error("client not found: {id}")]
    ClientNotFound {
        id: ClientId,
    },

    #[error("order not found: {id}")]
    OrderNotFound {
        id: OrderId,
    },

    #[error("installment not found: {id}")]
    InstallmentNotFound {
        id: InstallmentId,
    },

    #[error("order {order_id} already has an installment plan")]
    PlanAlreadyExists {
        order_id: OrderId,
    },

    #[error("order {order_id} does not accept payments: status is {status:?}")]
    OrderClosed {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error("payment {payment_id} was already recorded with different details")]
    DuplicatePayment {
        payment_id: PaymentId,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                client_id,
                expected,
                found,
            } => LedgerError::ConcurrentModification {
                client_id,
                expected,
                found,
            },
            StoreError::DuplicatePayment { payment_id, .. } => {
                LedgerError::DuplicatePayment { payment_id }
            }
            StoreError::DuplicateOrder { order_id, owner } => LedgerError::InvalidOrder {
                message: format!("order {} is already recorded for client {}", order_id, owner),
            },
            other => LedgerError::Persistence(other),
        }
    }
}

impl LedgerError {
    /// validation failures are rejected before any write
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidPlan { .. }
                | LedgerError::InvalidOrder { .. }
                | LedgerError::InvalidPaymentAmount { .. }
                | LedgerError::InvalidConfiguration { .. }
        )
    }

    /// the caller may retry the whole operation against fresh state
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrentModification { .. })
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
