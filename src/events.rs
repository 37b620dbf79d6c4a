use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{
    ClientId, Frequency, InstallmentStatus, ObligationId, OrderId, PaymentId, PaymentTarget, PlanId,
};

/// all events that can be emitted by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // intake events
    OrderRecorded {
        client_id: ClientId,
        order_id: OrderId,
        total_amount: Money,
        timestamp: DateTime<Utc>,
    },
    OrderCancelled {
        client_id: ClientId,
        order_id: OrderId,
        timestamp: DateTime<Utc>,
    },
    PlanGenerated {
        order_id: OrderId,
        plan_id: PlanId,
        initial_payment: Money,
        installments: u32,
        frequency: Frequency,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentApplied {
        payment_id: PaymentId,
        client_id: ClientId,
        target: PaymentTarget,
        requested: Money,
        applied: Money,
        remainder: Money,
        timestamp: DateTime<Utc>,
    },
    ObligationSettled {
        obligation_id: ObligationId,
        order_id: OrderId,
        payment_id: PaymentId,
        timestamp: DateTime<Utc>,
    },
    InstallmentStatusChanged {
        obligation_id: ObligationId,
        old_status: InstallmentStatus,
        new_status: InstallmentStatus,
        timestamp: DateTime<Utc>,
    },
    CreditRecorded {
        client_id: ClientId,
        payment_id: PaymentId,
        amount: Money,
        credit_balance: Money,
        timestamp: DateTime<Utc>,
    },
    OverpaymentRejected {
        client_id: ClientId,
        target: PaymentTarget,
        requested: Money,
        outstanding: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentReplayed {
        payment_id: PaymentId,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
