use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// client identity, owned by client management
pub type ClientId = Uuid;

/// order identifier, owned by order management
pub type OrderId = Uuid;

pub type PlanId = Uuid;

pub type InstallmentId = Uuid;

/// payment identifier, supplied by the caller so replays are detectable
pub type PaymentId = Uuid;

/// installment cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// every 7 days
    #[serde(rename = "semanal")]
    Weekly,
    /// every 15 days
    #[serde(rename = "quincenal")]
    Biweekly,
    /// same day of the following calendar month
    #[serde(rename = "mensual")]
    Monthly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::Weekly => "semanal",
            Frequency::Biweekly => "quincenal",
            Frequency::Monthly => "mensual",
        };
        f.write_str(label)
    }
}

/// order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// nothing paid yet
    #[serde(rename = "pendiente")]
    Pending,
    /// some amount paid
    #[serde(rename = "parcial")]
    Partial,
    /// fully paid, order is closed
    #[serde(rename = "pagado")]
    Paid,
    /// voided by order management, carries no debt
    #[serde(rename = "cancelado")]
    Cancelled,
}

/// installment status, always derived from amounts and dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallmentStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "parcial")]
    Partial,
    #[serde(rename = "pagada")]
    Paid,
    #[serde(rename = "vencida")]
    Overdue,
}

impl InstallmentStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, InstallmentStatus::Paid)
    }
}

/// how the client paid
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    MobilePayment,
    Zelle,
    Other(String),
}

/// anything a payment can be applied against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationId {
    /// an order without an installment plan, or its initial payment
    Order(OrderId),
    Installment(InstallmentId),
}

impl fmt::Display for ObligationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObligationId::Order(id) => write!(f, "order:{}", id),
            ObligationId::Installment(id) => write!(f, "installment:{}", id),
        }
    }
}

/// where a payment is directed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentTarget {
    /// one order; for a financed order this covers its installments in order
    Order(OrderId),
    /// exactly one installment
    Installment(InstallmentId),
    /// general payment across every open obligation of the client
    Client(ClientId),
}

impl PaymentTarget {
    pub fn is_general(&self) -> bool {
        matches!(self, PaymentTarget::Client(_))
    }
}

impl fmt::Display for PaymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentTarget::Order(id) => write!(f, "order:{}", id),
            PaymentTarget::Installment(id) => write!(f, "installment:{}", id),
            PaymentTarget::Client(id) => write!(f, "client:{}", id),
        }
    }
}

/// what happened to money that could not be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// clamp and hand the excess back in the receipt
    ReportRemainder,
    /// clamp, hand back the excess and keep it as client credit
    RecordCredit,
    /// refuse the payment before touching any balance
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Frequency::Biweekly).unwrap(), "\"quincenal\"");
        assert_eq!(serde_json::to_string(&InstallmentStatus::Overdue).unwrap(), "\"vencida\"");
        assert_eq!(serde_json::to_string(&OrderStatus::Paid).unwrap(), "\"pagado\"");

        let freq: Frequency = serde_json::from_str("\"mensual\"").unwrap();
        assert_eq!(freq, Frequency::Monthly);
    }

    #[test]
    fn test_obligation_ordering_is_total() {
        let a = ObligationId::Order(Uuid::from_u128(1));
        let b = ObligationId::Order(Uuid::from_u128(2));
        assert!(a < b);
    }
}
