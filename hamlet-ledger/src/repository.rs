use crate::{AuditQuery, AuditResult, TransactionRecord};

/// Abstraction over durable audit journals.
pub trait AuditRepository: Send + Sync {
    /// Persist a single record.
    fn append(&self, record: &TransactionRecord) -> AuditResult<()> {
        self.append_batch(std::slice::from_ref(record))
    }

    /// Persist a group of records atomically.
    fn append_batch(&self, records: &[TransactionRecord]) -> AuditResult<()>;

    /// Read the latest persisted sequence value.
    fn latest_sequence(&self) -> AuditResult<Option<u64>>;

    /// Load records matching the supplied query.
    fn query(&self, query: AuditQuery) -> AuditResult<Vec<TransactionRecord>>;
}
