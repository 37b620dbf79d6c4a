use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aging::{AgingClassifier, AgingEntry, AgingReport};
use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::obligations::{Client, InstallmentPlan, Obligation, Order};
use crate::payments::{
    AllocationLine, AllocationReceipt, OpenObligation, OverpaymentHandler, Payment,
    PaymentAllocator, PaymentRequest, PlanGenerator, PlanTerms,
};
use crate::serialization::{ClientBalance, LedgerStats, PlanSummary};
use crate::state::{ClientAccount, ProjectionDrift};
use crate::store::{ClientLocks, InMemoryStore, LedgerStore};
use crate::types::{
    ClientId, InstallmentId, InstallmentStatus, ObligationId, OrderId, OrderStatus, PaymentMethod,
    PaymentTarget,
};

/// which accounts an aging report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgingScope {
    Client(ClientId),
    All,
}

/// debt ledger
///
/// Every write takes the owning client's lock, works on a copy of the
/// account and commits it against the version it was loaded at, so a
/// failed operation leaves nothing behind.
///
/// Events are kept in memory until drained with [`Ledger::take_events`];
/// long-running callers must drain them regularly.
pub struct Ledger<S: LedgerStore = InMemoryStore> {
    store: S,
    config: LedgerConfig,
    generator: PlanGenerator,
    allocator: PaymentAllocator,
    overpayment: OverpaymentHandler,
    aging: AgingClassifier,
    locks: ClientLocks,
    events: Mutex<EventStore>,
}

impl Ledger<InMemoryStore> {
    /// ledger backed by an in-memory store
    pub fn in_memory(config: LedgerConfig) -> Result<Self> {
        Self::new(InMemoryStore::new(), config)
    }
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            generator: PlanGenerator::new(config.plan_limits),
            allocator: PaymentAllocator::new(),
            overpayment: OverpaymentHandler::new(config.overpayment_policy),
            aging: AgingClassifier::new(config.aging),
            config,
            locks: ClientLocks::new(),
            events: Mutex::new(EventStore::new()),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// register a client; opening an existing account is a no-op
    pub fn open_account(&self, client: Client) -> Result<()> {
        let lock = self.locks.for_client(client.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.store.load(client.id)?.is_some() {
            debug!(client_id = %client.id, "account already open");
            return Ok(());
        }

        let client_id = client.id;
        self.store.commit(ClientAccount::new(client), 0)?;
        info!(client_id = %client_id, "account opened");
        Ok(())
    }

    /// take over an order from order management
    ///
    /// An amount already paid at intake is written to the payment log as an
    /// opening balance, so cached totals can always be rebuilt from the log.
    pub fn record_order(&self, mut order: Order, time_provider: &SafeTimeProvider) -> Result<()> {
        order.validate()?;
        if order.is_cancelled() {
            return Err(LedgerError::InvalidOrder {
                message: format!("order {} is already cancelled", order.id),
            });
        }
        if let Some(owner) = self.store.client_for_order(order.id)? {
            return Err(LedgerError::InvalidOrder {
                message: format!("order {} is already recorded for client {}", order.id, owner),
            });
        }

        let client_id = order.client_id;
        let lock = self.locks.for_client(client_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let account = self.load_account(client_id)?;
        if account.orders.contains_key(&order.id) {
            warn!(client_id = %client_id, order_id = %order.id, "order intake repeated");
            return Err(LedgerError::InvalidOrder {
                message: format!("order {} is already recorded for client {}", order.id, client_id),
            });
        }

        let now = time_provider.now();
        let (order_id, total_amount) = (order.id, order.total_amount);
        let opening_balance = order.amount_paid;

        order.amount_paid = Money::ZERO;
        order.refresh_status();

        let mut next = account.clone();
        next.add_order(order);
        if opening_balance.is_positive() {
            next.record_payment(order_payment(
                client_id,
                order_id,
                opening_balance,
                total_amount - opening_balance,
                PaymentMethod::Other("opening_balance".to_string()),
                "paid before intake",
                now,
            ))?;
        }

        self.commit(next, account.version)?;
        self.publish(vec![Event::OrderRecorded {
            client_id,
            order_id,
            total_amount,
            timestamp: now,
        }]);

        info!(
            client_id = %client_id,
            order_id = %order_id,
            total = %total_amount,
            opening_balance = %opening_balance,
            "order recorded"
        );
        Ok(())
    }

    /// void an order; only orders without recorded payments can be cancelled
    pub fn cancel_order(&self, order_id: OrderId, time_provider: &SafeTimeProvider) -> Result<()> {
        let client_id = self.client_for_order(order_id)?;
        let lock = self.locks.for_client(client_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let account = self.load_account(client_id)?;
        let order = account.order(order_id)?;
        if order.is_cancelled() {
            return Err(LedgerError::OrderClosed {
                order_id,
                status: order.status,
            });
        }
        if order.amount_paid.is_positive() {
            return Err(LedgerError::InvalidOrder {
                message: format!("order {} has recorded payments and cannot be cancelled", order_id),
            });
        }

        let mut next = account.clone();
        next.order_mut(order_id)?.status = OrderStatus::Cancelled;

        self.commit(next, account.version)?;
        self.publish(vec![Event::OrderCancelled {
            client_id,
            order_id,
            timestamp: time_provider.now(),
        }]);

        info!(client_id = %client_id, order_id = %order_id, "order cancelled");
        Ok(())
    }

    /// finance an order with an installment plan
    ///
    /// The initial payment, if any, is recorded against the order itself;
    /// from then on the order is paid through its installments.
    pub fn generate_plan(
        &self,
        order_id: OrderId,
        terms: PlanTerms,
        method: PaymentMethod,
        time_provider: &SafeTimeProvider,
    ) -> Result<InstallmentPlan> {
        let client_id = self.client_for_order(order_id)?;
        let lock = self.locks.for_client(client_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let account = self.load_account(client_id)?;
        let order = account.order(order_id)?;
        if order.is_cancelled() {
            return Err(LedgerError::OrderClosed {
                order_id,
                status: order.status,
            });
        }
        if account.plan_for(order_id).is_some() {
            return Err(LedgerError::PlanAlreadyExists { order_id });
        }
        if order.amount_paid.is_positive() {
            return Err(LedgerError::InvalidPlan {
                message: format!("order {} already has payments recorded", order_id),
            });
        }

        let plan = self.generator.generate(order.id, order.total_amount, &terms)?;
        let now = time_provider.now();

        let mut next = account.clone();
        next.attach_plan(plan.clone());
        if terms.initial_payment.is_positive() {
            next.record_payment(order_payment(
                client_id,
                order_id,
                terms.initial_payment,
                plan.financed_amount(),
                method,
                "initial payment",
                now,
            ))?;
        }

        self.commit(next, account.version)?;
        self.publish(vec![Event::PlanGenerated {
            order_id,
            plan_id: plan.id,
            initial_payment: plan.initial_payment,
            installments: plan.number_of_installments,
            frequency: plan.frequency,
            timestamp: now,
        }]);

        info!(
            client_id = %client_id,
            order_id = %order_id,
            installments = plan.number_of_installments,
            frequency = %plan.frequency,
            initial_payment = %plan.initial_payment,
            "installment plan generated"
        );
        Ok(plan)
    }

    /// apply payment with system time
    pub fn apply_payment_now(&self, request: PaymentRequest) -> Result<AllocationReceipt> {
        let time = SafeTimeProvider::new(TimeSource::System);
        self.apply_payment(request, &time)
    }

    /// apply a payment, targeted or general, as one all-or-nothing transaction
    pub fn apply_payment(
        &self,
        request: PaymentRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<AllocationReceipt> {
        if let Err(err) = request.validate() {
            warn!(payment_id = %request.payment_id, amount = %request.amount, "payment rejected");
            return Err(err);
        }

        let client_id = self.owner_of(&request.target)?;
        let lock = self.locks.for_client(client_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(owner) = self.store.client_for_payment(request.payment_id)? {
            if owner != client_id {
                warn!(
                    payment_id = %request.payment_id,
                    owner = %owner,
                    client_id = %client_id,
                    "payment id already used by another client"
                );
                return Err(LedgerError::DuplicatePayment {
                    payment_id: request.payment_id,
                });
            }
        }

        let account = self.load_account(client_id)?;
        let now = time_provider.now();

        if let Some(existing) = account.payment(request.payment_id) {
            return self.replay(existing, &request, now);
        }

        let obligations = self.obligations_for(&account, &request.target)?;
        let outstanding: Money = obligations.iter().map(|o| o.remaining()).sum();
        let (allocation, _) = if request.target.is_general() {
            self.allocator.allocate_general(obligations, request.amount)
        } else {
            self.allocator.allocate_targeted(obligations, request.amount)
        };

        let disposition = match self
            .overpayment
            .resolve(allocation.remainder, outstanding, request.amount)
        {
            Ok(disposition) => disposition,
            Err(err) => {
                self.publish(vec![Event::OverpaymentRejected {
                    client_id,
                    target: request.target,
                    requested: request.amount,
                    outstanding,
                    timestamp: now,
                }]);
                return Err(err);
            }
        };

        let payment = Payment {
            id: request.payment_id,
            client_id,
            target: request.target,
            amount: request.amount,
            method: request.method,
            notes: request.notes,
            applied_at: now,
            allocation: allocation.lines,
            unapplied: allocation.remainder,
            credit_recorded: disposition.credited,
        };

        let mut next = account.clone();
        next.record_payment(payment.clone())?;
        let events = payment_events(&account, &next, &payment, now);

        let version = self.commit(next, account.version)?;
        self.publish(events);

        info!(
            client_id = %client_id,
            payment_id = %payment.id,
            target = %payment.target,
            requested = %payment.amount,
            applied = %allocation.total_applied,
            remainder = %payment.unapplied,
            version,
            "payment committed"
        );
        if payment.credit_recorded.is_positive() {
            info!(client_id = %client_id, credit = %payment.credit_recorded, "client credit recorded");
        }

        Ok(payment.receipt())
    }

    /// aging report as of a date, for one client or the whole ledger
    pub fn classify_aging(&self, scope: AgingScope, as_of: NaiveDate) -> Result<AgingReport> {
        let entries: Vec<AgingEntry> = match scope {
            AgingScope::Client(client_id) => self.load_account(client_id)?.aging_entries(),
            AgingScope::All => self
                .accounts()?
                .iter()
                .flat_map(|a| a.aging_entries())
                .collect(),
        };
        Ok(self.aging.classify(&entries, as_of))
    }

    pub fn account(&self, client_id: ClientId) -> Result<ClientAccount> {
        self.load_account(client_id)
    }

    /// aggregate debt of a client, computed from its orders
    pub fn client_debt(&self, client_id: ClientId) -> Result<Money> {
        Ok(self.load_account(client_id)?.outstanding_debt())
    }

    pub fn plan(&self, order_id: OrderId) -> Result<Option<InstallmentPlan>> {
        let account = self.load_account(self.client_for_order(order_id)?)?;
        Ok(account.plan_for(order_id).cloned())
    }

    pub fn installment_status(&self, installment_id: InstallmentId, today: NaiveDate) -> Result<InstallmentStatus> {
        let client_id = self
            .store
            .client_for_installment(installment_id)?
            .ok_or(LedgerError::InstallmentNotFound { id: installment_id })?;
        let account = self.load_account(client_id)?;
        Ok(account.installment(installment_id)?.status(today))
    }

    pub fn plan_summary(&self, order_id: OrderId, today: NaiveDate) -> Result<Option<PlanSummary>> {
        Ok(self
            .plan(order_id)?
            .map(|plan| PlanSummary::from_plan(&plan, today, self.config.due_soon_days)))
    }

    pub fn client_balances(&self) -> Result<Vec<ClientBalance>> {
        Ok(self.accounts()?.iter().map(ClientBalance::from_account).collect())
    }

    pub fn stats(&self, today: NaiveDate) -> Result<LedgerStats> {
        Ok(LedgerStats::from_accounts(&self.accounts()?, today, self.config.due_soon_days))
    }

    /// compare a client's cached balances with its payment log
    pub fn verify_projections(&self, client_id: ClientId) -> Result<Vec<ProjectionDrift>> {
        self.load_account(client_id)?.verify_projections()
    }

    /// rebuild a client's cached balances from its payment log, returning
    /// the drift that was corrected
    pub fn rebuild_projections(&self, client_id: ClientId) -> Result<Vec<ProjectionDrift>> {
        let lock = self.locks.for_client(client_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let account = self.load_account(client_id)?;
        let drift = account.verify_projections()?;
        if drift.is_empty() {
            return Ok(drift);
        }

        warn!(client_id = %client_id, drifted = drift.len(), "cached balances drifted from payment log");
        let mut next = account.clone();
        next.rebuild_projections()?;
        self.commit(next, account.version)?;
        Ok(drift)
    }

    /// drain every event published since the last call
    pub fn take_events(&self) -> Vec<Event> {
        self.event_store().take_events()
    }

    /// copy of the pending events, leaving them in place
    pub fn events(&self) -> Vec<Event> {
        self.event_store().events().to_vec()
    }

    fn event_store(&self) -> std::sync::MutexGuard<'_, EventStore> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, events: Vec<Event>) {
        if !events.is_empty() {
            self.event_store().extend(events);
        }
    }

    fn commit(&self, account: ClientAccount, expected_version: u64) -> Result<u64> {
        let client_id = account.client_id();
        self.store.commit(account, expected_version).map_err(|err| {
            warn!(client_id = %client_id, expected_version, error = %err, "commit refused");
            LedgerError::from(err)
        })
    }

    fn load_account(&self, client_id: ClientId) -> Result<ClientAccount> {
        self.store
            .load(client_id)?
            .ok_or(LedgerError::ClientNotFound { id: client_id })
    }

    fn accounts(&self) -> Result<Vec<ClientAccount>> {
        self.store
            .client_ids()?
            .into_iter()
            .map(|id| self.load_account(id))
            .collect()
    }

    fn client_for_order(&self, order_id: OrderId) -> Result<ClientId> {
        self.store
            .client_for_order(order_id)?
            .ok_or(LedgerError::OrderNotFound { id: order_id })
    }

    /// the client whose lock guards a payment target
    fn owner_of(&self, target: &PaymentTarget) -> Result<ClientId> {
        match *target {
            PaymentTarget::Client(client_id) => Ok(client_id),
            PaymentTarget::Order(order_id) => self.client_for_order(order_id),
            PaymentTarget::Installment(installment_id) => self
                .store
                .client_for_installment(installment_id)?
                .ok_or(LedgerError::InstallmentNotFound { id: installment_id }),
        }
    }

    fn obligations_for(&self, account: &ClientAccount, target: &PaymentTarget) -> Result<Vec<OpenObligation>> {
        match *target {
            PaymentTarget::Client(client_id) => {
                let obligations = account.open_obligations();
                if obligations.is_empty() {
                    warn!(client_id = %client_id, "general payment with no open obligations");
                    return Err(LedgerError::NoOpenObligations { client_id });
                }
                Ok(obligations)
            }
            PaymentTarget::Order(order_id) => account.obligations_for_order(order_id),
            PaymentTarget::Installment(installment_id) => account.obligations_for_installment(installment_id),
        }
    }

    fn replay(&self, existing: &Payment, request: &PaymentRequest, now: DateTime<Utc>) -> Result<AllocationReceipt> {
        if !existing.matches(request) {
            warn!(payment_id = %request.payment_id, "payment id reused with different details");
            return Err(LedgerError::DuplicatePayment {
                payment_id: request.payment_id,
            });
        }

        debug!(payment_id = %existing.id, "payment already applied, returning stored receipt");
        self.publish(vec![Event::PaymentReplayed {
            payment_id: existing.id,
            timestamp: now,
        }]);

        let mut receipt = existing.receipt();
        receipt.replayed = true;
        Ok(receipt)
    }
}

/// payment recorded straight against an order
fn order_payment(
    client_id: ClientId,
    order_id: OrderId,
    amount: Money,
    balance_after: Money,
    method: PaymentMethod,
    notes: &str,
    applied_at: DateTime<Utc>,
) -> Payment {
    Payment {
        id: Uuid::new_v4(),
        client_id,
        target: PaymentTarget::Order(order_id),
        amount,
        method,
        notes: notes.to_string(),
        applied_at,
        allocation: vec![AllocationLine {
            obligation_id: ObligationId::Order(order_id),
            order_id,
            applied: amount,
            balance_after,
        }],
        unapplied: Money::ZERO,
        credit_recorded: Money::ZERO,
    }
}

fn payment_events(before: &ClientAccount, after: &ClientAccount, payment: &Payment, now: DateTime<Utc>) -> Vec<Event> {
    let today = now.date_naive();
    let mut events = vec![Event::PaymentApplied {
        payment_id: payment.id,
        client_id: payment.client_id,
        target: payment.target,
        requested: payment.amount,
        applied: payment.total_applied(),
        remainder: payment.unapplied,
        timestamp: now,
    }];

    for line in &payment.allocation {
        if line.settles() {
            events.push(Event::ObligationSettled {
                obligation_id: line.obligation_id,
                order_id: line.order_id,
                payment_id: payment.id,
                timestamp: now,
            });
        }
        if let ObligationId::Installment(id) = line.obligation_id {
            if let (Ok(old), Ok(new)) = (before.installment(id), after.installment(id)) {
                let (old_status, new_status) = (old.status(today), new.status(today));
                if old_status != new_status {
                    events.push(Event::InstallmentStatusChanged {
                        obligation_id: line.obligation_id,
                        old_status,
                        new_status,
                        timestamp: now,
                    });
                }
            }
        }
    }

    if payment.credit_recorded.is_positive() {
        events.push(Event::CreditRecorded {
            client_id: payment.client_id,
            payment_id: payment.id,
            amount: payment.credit_recorded,
            credit_balance: after.credit_balance,
            timestamp: now,
        });
    }
    events
}
