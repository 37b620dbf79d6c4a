pub mod aging;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod obligations;
pub mod payments;
pub mod serialization;
pub mod state;
pub mod status;
pub mod store;
pub mod types;

// re-export key types
pub use aging::{AgingBucket, AgingBuckets, AgingClassifier, AgingEntry, AgingReport};
pub use config::{AgingConfig, LedgerConfig, PlanLimits};
pub use decimal::Money;
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use ledger::{AgingScope, Ledger};
pub use obligations::{Client, Installment, InstallmentPlan, Obligation, Order};
pub use payments::{
    AllocationLine, AllocationReceipt, OverpaymentHandler, Payment, PaymentAllocator,
    PaymentRequest, PlanGenerator, PlanTerms,
};
pub use serialization::{AccountView, ClientBalance, InstallmentView, LedgerStats, PlanSummary};
pub use state::{ClientAccount, ProjectionDrift};
pub use status::{resolve_installment_status, resolve_order_status};
pub use store::{ClientLocks, InMemoryStore, LedgerStore, StoreError};
pub use types::{
    ClientId, Frequency, InstallmentId, InstallmentStatus, ObligationId, OrderId, OrderStatus,
    OverpaymentPolicy, PaymentId, PaymentMethod, PaymentTarget, PlanId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
