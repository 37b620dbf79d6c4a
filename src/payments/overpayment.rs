use tracing::warn;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::types::OverpaymentPolicy;

/// what becomes of money no obligation could absorb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemainderDisposition {
    /// handed back to the caller in the receipt
    pub returned: Money,
    /// kept on the client account as credit
    pub credited: Money,
}

/// overpayment handler
#[derive(Debug, Clone, Copy)]
pub struct OverpaymentHandler {
    policy: OverpaymentPolicy,
}

impl OverpaymentHandler {
    pub fn new(policy: OverpaymentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OverpaymentPolicy {
        self.policy
    }

    /// decide on the remainder of a payment before anything is written
    pub fn resolve(&self, remainder: Money, outstanding: Money, requested: Money) -> Result<RemainderDisposition> {
        if !remainder.is_positive() {
            return Ok(RemainderDisposition::default());
        }

        match self.policy {
            OverpaymentPolicy::ReportRemainder => Ok(RemainderDisposition {
                returned: remainder,
                credited: Money::ZERO,
            }),
            OverpaymentPolicy::RecordCredit => Ok(RemainderDisposition {
                returned: remainder,
                credited: remainder,
            }),
            OverpaymentPolicy::Reject => {
                warn!(
                    outstanding = %outstanding,
                    requested = %requested,
                    "overpayment rejected"
                );
                Err(LedgerError::Overpayment {
                    outstanding,
                    requested,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_to_dispose() {
        for policy in [
            OverpaymentPolicy::ReportRemainder,
            OverpaymentPolicy::RecordCredit,
            OverpaymentPolicy::Reject,
        ] {
            let handler = OverpaymentHandler::new(policy);
            let disposition = handler
                .resolve(Money::ZERO, Money::from_major(10), Money::from_major(10))
                .unwrap();
            assert_eq!(disposition, RemainderDisposition::default());
        }
    }

    #[test]
    fn test_report_remainder() {
        let handler = OverpaymentHandler::new(OverpaymentPolicy::ReportRemainder);
        let disposition = handler
            .resolve(Money::from_major(5), Money::from_major(10), Money::from_major(15))
            .unwrap();

        assert_eq!(disposition.returned, Money::from_major(5));
        assert_eq!(disposition.credited, Money::ZERO);
    }

    #[test]
    fn test_record_credit() {
        let handler = OverpaymentHandler::new(OverpaymentPolicy::RecordCredit);
        let disposition = handler
            .resolve(Money::from_major(5), Money::from_major(10), Money::from_major(15))
            .unwrap();

        assert_eq!(disposition.returned, Money::from_major(5));
        assert_eq!(disposition.credited, Money::from_major(5));
    }

    #[test]
    fn test_reject() {
        let handler = OverpaymentHandler::new(OverpaymentPolicy::Reject);
        let err = handler
            .resolve(Money::from_major(5), Money::from_major(10), Money::from_major(15))
            .unwrap_err();

        match err {
            LedgerError::Overpayment { outstanding, requested } => {
                assert_eq!(outstanding, Money::from_major(10));
                assert_eq!(requested, Money::from_major(15));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
