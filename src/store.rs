use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;

use crate::state::ClientAccount;
use crate::types::{ClientId, InstallmentId, OrderId, PaymentId};

/// errors raised by a persistence backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("version conflict for client {client_id}: expected {expected}, found {found}")]
    VersionConflict {
        client_id: ClientId,
        expected: u64,
        found: u64,
    },

    #[error("backend unavailable: {message}")]
    Unavailable {
        message: String,
    },

    #[error("order {order_id} already belongs to client {owner}")]
    DuplicateOrder {
        order_id: OrderId,
        owner: ClientId,
    },

    #[error("payment {payment_id} already recorded for client {owner}")]
    DuplicatePayment {
        payment_id: PaymentId,
        owner: ClientId,
    },
}

/// persistence port for client accounts
///
/// `commit` must be atomic: either the whole account is replaced or nothing
/// is, and only when the stored version still equals `expected_version`.
/// Order and payment ids are unique across clients; a commit that would
/// claim one already owned by another client is refused.
pub trait LedgerStore: Send + Sync {
    fn load(&self, client_id: ClientId) -> Result<Option<ClientAccount>, StoreError>;

    /// store `account` with its version bumped by one
    fn commit(&self, account: ClientAccount, expected_version: u64) -> Result<u64, StoreError>;

    fn client_ids(&self) -> Result<Vec<ClientId>, StoreError>;

    fn client_for_order(&self, order_id: OrderId) -> Result<Option<ClientId>, StoreError>;

    fn client_for_installment(&self, installment_id: InstallmentId) -> Result<Option<ClientId>, StoreError>;

    fn client_for_payment(&self, payment_id: PaymentId) -> Result<Option<ClientId>, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<ClientId, ClientAccount>,
    order_index: HashMap<OrderId, ClientId>,
    installment_index: HashMap<InstallmentId, ClientId>,
    payment_index: HashMap<PaymentId, ClientId>,
}

/// in-memory store, suitable for tests and single-process use
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerStore for InMemoryStore {
    fn load(&self, client_id: ClientId) -> Result<Option<ClientAccount>, StoreError> {
        Ok(self.read().accounts.get(&client_id).cloned())
    }

    fn commit(&self, mut account: ClientAccount, expected_version: u64) -> Result<u64, StoreError> {
        let mut tables = self.write();
        let client_id = account.client_id();

        let found = tables.accounts.get(&client_id).map(|a| a.version).unwrap_or(0);
        if found != expected_version {
            return Err(StoreError::VersionConflict {
                client_id,
                expected: expected_version,
                found,
            });
        }

        for order_id in account.orders.keys() {
            if let Some(owner) = tables.order_index.get(order_id).filter(|o| **o != client_id) {
                return Err(StoreError::DuplicateOrder {
                    order_id: *order_id,
                    owner: *owner,
                });
            }
        }
        for payment in &account.payments {
            if let Some(owner) = tables.payment_index.get(&payment.id).filter(|o| **o != client_id) {
                return Err(StoreError::DuplicatePayment {
                    payment_id: payment.id,
                    owner: *owner,
                });
            }
        }

        account.version = expected_version + 1;
        for order_id in account.orders.keys() {
            tables.order_index.insert(*order_id, client_id);
        }
        for installment in account.installments() {
            tables.installment_index.insert(installment.id, client_id);
        }
        for payment in &account.payments {
            tables.payment_index.insert(payment.id, client_id);
        }
        let version = account.version;
        tables.accounts.insert(client_id, account);
        Ok(version)
    }

    fn client_ids(&self) -> Result<Vec<ClientId>, StoreError> {
        let mut ids: Vec<_> = self.read().accounts.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn client_for_order(&self, order_id: OrderId) -> Result<Option<ClientId>, StoreError> {
        Ok(self.read().order_index.get(&order_id).copied())
    }

    fn client_for_installment(&self, installment_id: InstallmentId) -> Result<Option<ClientId>, StoreError> {
        Ok(self.read().installment_index.get(&installment_id).copied())
    }

    fn client_for_payment(&self, payment_id: PaymentId) -> Result<Option<ClientId>, StoreError> {
        Ok(self.read().payment_index.get(&payment_id).copied())
    }
}

/// one writer lock per client
#[derive(Debug, Default)]
pub struct ClientLocks {
    locks: Mutex<HashMap<ClientId, Arc<Mutex<()>>>>,
}

impl ClientLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_client(&self, client_id: ClientId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(client_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Money;
    use crate::obligations::{Client, Order};
    use crate::payments::Payment;
    use crate::types::{PaymentMethod, PaymentTarget};
    use chrono::Utc;
    use uuid::Uuid;

    fn account() -> ClientAccount {
        let mut account = ClientAccount::new(Client::new(Uuid::new_v4(), "Jose Rivas"));
        let order = Order::new(Uuid::new_v4(), account.client_id(), Money::from_major(10), Utc::now());
        account.add_order(order);
        account
    }

    #[test]
    fn test_commit_bumps_version_and_indexes() {
        let store = InMemoryStore::new();
        let account = account();
        let client_id = account.client_id();
        let order_id = *account.orders.keys().next().unwrap();

        assert_eq!(store.commit(account, 0).unwrap(), 1);
        assert_eq!(store.load(client_id).unwrap().unwrap().version, 1);
        assert_eq!(store.client_for_order(order_id).unwrap(), Some(client_id));
        assert_eq!(store.client_ids().unwrap(), vec![client_id]);
    }

    #[test]
    fn test_stale_commit_is_refused() {
        let store = InMemoryStore::new();
        let account = account();
        let client_id = account.client_id();
        store.commit(account.clone(), 0).unwrap();

        let err = store.commit(account, 0).unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                client_id,
                expected: 0,
                found: 1
            }
        );
    }

    #[test]
    fn test_ids_cannot_move_between_clients() {
        let store = InMemoryStore::new();
        let first = account();
        let order_id = *first.orders.keys().next().unwrap();
        let owner = first.client_id();
        store.commit(first.clone(), 0).unwrap();

        let mut other = ClientAccount::new(Client::new(Uuid::new_v4(), "Rosa Lima"));
        other.add_order(first.orders[&order_id].clone());
        assert_eq!(
            store.commit(other.clone(), 0).unwrap_err(),
            StoreError::DuplicateOrder { order_id, owner }
        );
        assert!(store.load(other.client_id()).unwrap().is_none());
    }

    #[test]
    fn test_payment_ids_are_indexed() {
        let store = InMemoryStore::new();
        let mut account = account();
        let client_id = account.client_id();
        let order_id = *account.orders.keys().next().unwrap();
        let payment = Payment {
            id: Uuid::new_v4(),
            client_id,
            target: PaymentTarget::Order(order_id),
            amount: Money::from_major(4),
            method: PaymentMethod::Cash,
            notes: String::new(),
            applied_at: Utc::now(),
            allocation: Vec::new(),
            unapplied: Money::from_major(4),
            credit_recorded: Money::ZERO,
        };
        let payment_id = payment.id;
        account.record_payment(payment.clone()).unwrap();
        store.commit(account, 0).unwrap();
        assert_eq!(store.client_for_payment(payment_id).unwrap(), Some(client_id));

        let mut other = ClientAccount::new(Client::new(Uuid::new_v4(), "Rosa Lima"));
        other.payments.push(payment);
        assert_eq!(
            store.commit(other, 0).unwrap_err(),
            StoreError::DuplicatePayment {
                payment_id,
                owner: client_id
            }
        );
    }

    #[test]
    fn test_locks_are_shared_per_client() {
        let locks = ClientLocks::new();
        let id = Uuid::new_v4();
        assert!(Arc::ptr_eq(&locks.for_client(id), &locks.for_client(id)));
        assert!(!Arc::ptr_eq(&locks.for_client(id), &locks.for_client(Uuid::new_v4())));
    }
}
