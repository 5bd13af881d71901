//! Balance backends, audit journal and transfer engine for Hamlet accounts.

mod account;
mod amount;
mod audit;
mod backend;
mod entry;
mod error;
mod locks;
mod memory;
mod query;
mod repository;
mod sequencer;
mod sqlite;
mod transfer;

pub use account::{LedgerAccount, LedgerServices, BALANCE_UNAVAILABLE};
pub use amount::{amount_from_f64, validate_amount};
pub use audit::{
    AuditError, AuditResult, AuditSink, JournalAuditSink, NullAuditSink, TracingAuditSink,
};
pub use backend::{BackendError, BackendOptions, BackendResult, BalanceBackend, BalanceFormat};
pub use entry::{Party, RecordKind, TransactionRecord};
pub use error::{LedgerError, LedgerResult, PartialTransferFailure, TransferLeg};
pub use locks::{AccountGuard, AccountLocks};
pub use memory::{InMemoryBalanceBackend, MemoryAuditRepository};
pub use query::AuditQuery;
pub use repository::AuditRepository;
pub use sequencer::AuditSequencer;
pub use sqlite::{SqliteAuditRepository, SqliteBalanceBackend};
pub use transfer::TransferEngine;
