use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aging::AgingEntry;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::obligations::{Client, Installment, InstallmentPlan, Obligation, Order};
use crate::payments::{AllocationLine, OpenObligation, Payment};
use crate::types::{ClientId, InstallmentId, ObligationId, OrderId, PaymentId};

/// everything the ledger knows about one client; the unit of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientAccount {
    pub client: Client,
    /// bumped on every commit, used to detect stale snapshots
    pub version: u64,
    pub orders: BTreeMap<OrderId, Order>,
    /// keyed by order id, at most one plan per order
    pub plans: BTreeMap<OrderId, InstallmentPlan>,
    /// append-only payment log
    pub payments: Vec<Payment>,
    /// cached projection of credit recorded in the log
    pub credit_balance: Money,
}

/// a cached amount that no longer matches the payment log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionDrift {
    pub obligation_id: Option<ObligationId>,
    pub cached: Money,
    pub derived: Money,
}

impl ClientAccount {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            version: 0,
            orders: BTreeMap::new(),
            plans: BTreeMap::new(),
            payments: Vec::new(),
            credit_balance: Money::ZERO,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client.id
    }

    pub fn order(&self, order_id: OrderId) -> Result<&Order> {
        self.orders
            .get(&order_id)
            .ok_or(LedgerError::OrderNotFound { id: order_id })
    }

    pub fn order_mut(&mut self, order_id: OrderId) -> Result<&mut Order> {
        self.orders
            .get_mut(&order_id)
            .ok_or(LedgerError::OrderNotFound { id: order_id })
    }

    pub fn plan_for(&self, order_id: OrderId) -> Option<&InstallmentPlan> {
        self.plans.get(&order_id)
    }

    pub fn installments(&self) -> impl Iterator<Item = &Installment> {
        self.plans.values().flat_map(|p| p.installments.iter())
    }

    pub fn installment(&self, installment_id: InstallmentId) -> Result<&Installment> {
        self.installments()
            .find(|i| i.id == installment_id)
            .ok_or(LedgerError::InstallmentNotFound { id: installment_id })
    }

    pub fn payment(&self, payment_id: PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == payment_id)
    }

    /// aggregate debt, always computed from the orders
    pub fn outstanding_debt(&self) -> Money {
        self.orders.values().map(|o| o.balance()).sum()
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(|o| o.balance().is_positive())
    }

    pub fn add_order(&mut self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn attach_plan(&mut self, plan: InstallmentPlan) {
        self.plans.insert(plan.order_id, plan);
    }

    /// every obligation with a balance; financed orders contribute their installments
    pub fn open_obligations(&self) -> Vec<OpenObligation> {
        self.orders
            .values()
            .filter(|o| !o.is_cancelled())
            .flat_map(|o| self.order_obligations(o))
            .collect()
    }

    /// obligations covered by a payment targeted at one order, in payment order
    pub fn obligations_for_order(&self, order_id: OrderId) -> Result<Vec<OpenObligation>> {
        let order = self.order(order_id)?;
        ensure_accepts_payments(order)?;
        Ok(self.order_obligations(order))
    }

    /// the single obligation covered by a payment targeted at one installment
    pub fn obligations_for_installment(&self, installment_id: InstallmentId) -> Result<Vec<OpenObligation>> {
        let installment = self.installment(installment_id)?;
        let order = self.order(installment.order_id)?;
        ensure_accepts_payments(order)?;
        Ok(vec![installment_snapshot(order, installment)])
    }

    fn order_obligations(&self, order: &Order) -> Vec<OpenObligation> {
        match self.plans.get(&order.id) {
            Some(plan) => plan
                .installments
                .iter()
                .filter(|i| i.is_open())
                .map(|i| installment_snapshot(order, i))
                .collect(),
            None if order.is_open() => vec![OpenObligation {
                id: ObligationId::Order(order.id),
                order_id: order.id,
                created_at: order.created_at,
                sequence: 0,
                amount: order.total_amount,
                paid_amount: order.amount_paid,
            }],
            None => Vec::new(),
        }
    }

    /// one entry per open balance: installments age from their own due date,
    /// plain orders from their due date or order date
    pub fn aging_entries(&self) -> Vec<AgingEntry> {
        let mut entries = Vec::new();
        for order in self.orders.values().filter(|o| !o.is_cancelled()) {
            match self.plans.get(&order.id) {
                Some(plan) => entries.extend(plan.installments.iter().filter(|i| i.is_open()).map(|i| {
                    AgingEntry {
                        obligation_id: ObligationId::Installment(i.id),
                        client_id: self.client.id,
                        remaining_balance: i.remaining(),
                        reference_date: i.due_date,
                    }
                })),
                None if order.is_open() => entries.push(AgingEntry {
                    obligation_id: ObligationId::Order(order.id),
                    client_id: self.client.id,
                    remaining_balance: order.remaining(),
                    reference_date: order.reference_date(),
                }),
                None => {}
            }
        }
        entries
    }

    /// apply a payment's allocation to the cached balances and append it to the log
    pub fn record_payment(&mut self, payment: Payment) -> Result<()> {
        for line in &payment.allocation {
            self.apply_line(line)?;
        }
        self.credit_balance += payment.credit_recorded;
        self.payments.push(payment);
        Ok(())
    }

    fn apply_line(&mut self, line: &AllocationLine) -> Result<()> {
        if let ObligationId::Installment(installment_id) = line.obligation_id {
            let installment = self
                .plans
                .get_mut(&line.order_id)
                .and_then(|p| p.find_mut(installment_id))
                .ok_or(LedgerError::InstallmentNotFound { id: installment_id })?;
            installment.record_applied(line.applied);
        }
        // installment payments also count towards the owning order
        self.order_mut(line.order_id)?.record_applied(line.applied);
        Ok(())
    }

    /// recompute every cached balance from the payment log
    pub fn rebuild_projections(&mut self) -> Result<()> {
        for order in self.orders.values_mut() {
            order.amount_paid = Money::ZERO;
            order.refresh_status();
        }
        for plan in self.plans.values_mut() {
            for installment in plan.installments.iter_mut() {
                installment.paid_amount = Money::ZERO;
            }
        }
        self.credit_balance = Money::ZERO;

        let payments = std::mem::take(&mut self.payments);
        for payment in payments {
            self.record_payment(payment)?;
        }
        Ok(())
    }

    /// compare cached balances with what the payment log says
    pub fn verify_projections(&self) -> Result<Vec<ProjectionDrift>> {
        let mut rebuilt = self.clone();
        rebuilt.rebuild_projections()?;

        let mut drift = Vec::new();
        for (id, order) in &self.orders {
            let derived = rebuilt.order(*id)?.amount_paid;
            if derived != order.amount_paid {
                drift.push(ProjectionDrift {
                    obligation_id: Some(ObligationId::Order(*id)),
                    cached: order.amount_paid,
                    derived,
                });
            }
        }
        for installment in self.installments() {
            let derived = rebuilt.installment(installment.id)?.paid_amount;
            if derived != installment.paid_amount {
                drift.push(ProjectionDrift {
                    obligation_id: Some(ObligationId::Installment(installment.id)),
                    cached: installment.paid_amount,
                    derived,
                });
            }
        }
        if rebuilt.credit_balance != self.credit_balance {
            drift.push(ProjectionDrift {
                obligation_id: None,
                cached: self.credit_balance,
                derived: rebuilt.credit_balance,
            });
        }
        Ok(drift)
    }
}

fn ensure_accepts_payments(order: &Order) -> Result<()> {
    if order.is_cancelled() {
        return Err(LedgerError::OrderClosed {
            order_id: order.id,
            status: order.status,
        });
    }
    Ok(())
}

fn installment_snapshot(order: &Order, installment: &Installment) -> OpenObligation {
    OpenObligation {
        id: ObligationId::Installment(installment.id),
        order_id: order.id,
        created_at: order.created_at,
        sequence: installment.number,
        amount: installment.amount,
        paid_amount: installment.paid_amount,
    }
}
