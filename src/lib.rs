pub mod config;
pub mod decimal;
pub mod defaults;
pub mod engine;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod limits;
pub mod notifications;
pub mod purchases;
pub mod serialization;
pub mod state;
pub mod store;
pub mod types;

// re-export key types
pub use config::{CreditPolicy, DefaultPolicy, EngineConfig, InitialBalance, UtilizationAlerts};
pub use decimal::{Money, Percentage};
pub use defaults::{
    ContactHistory, ContactMethod, DefaultDetector, DefaultRecord, DefaultStatus,
    DetectionReport, RecoveryAction, RecoveryActionStatus, RecoveryActionType, RecoveryWorkflow,
};
pub use engine::{CreditEngine, CreditStatus};
pub use errors::{CreditError, ErrorKind, Result};
pub use events::{Event, EventStore};
pub use ledger::{
    verify_chain, ChainBreak, CreditLedger, DailyActivity, LedgerEntry, LedgerOperation,
    LedgerRequest, ReconciliationReport,
};
pub use limits::{CreditLimitCalculator, CreditQuote};
pub use notifications::{
    Notification, NotificationCategory, NotificationDispatcher, NotificationError, Notifier,
    NoopDispatcher, RecordingDispatcher,
};
pub use purchases::{
    CancelledPurchase, CartLine, CartReceipt, CollectionOutcome, InMemoryCatalog,
    InventoryCatalog, InventoryItem, Packaging, Purchase, PurchaseReceipt, PurchaseReservation,
};
pub use serialization::CreditStatementView;
pub use state::CreditProfile;
pub use store::{CreditStore, InMemoryStore, StoreReader, UnitOfWork};
pub use types::{
    Farmer, FarmerId, ItemId, PackagingId, PaymentMethod, PurchaseId, PurchaseStatus, Reference,
    RepaymentMethod, TransactionType,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
