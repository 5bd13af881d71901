use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{AuditQuery, AuditRepository, AuditSequencer, TransactionRecord};

/// Result alias for audit journal operations.
pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for AuditError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<std::io::Error> for AuditError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

/// Receives one record per completed monetary movement.
///
/// Errors returned here are logged by the ledger and never fail the
/// operation that produced the record.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &TransactionRecord) -> AuditResult<()>;
}

/// Writes each record to the `hamlet::audit` tracing target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &TransactionRecord) -> AuditResult<()> {
        let payer = record
            .payer_account()
            .map(|name| name.to_string())
            .unwrap_or_default();
        let payee = record
            .payee_account()
            .map(|name| name.to_string())
            .unwrap_or_default();
        info!(
            target: "hamlet::audit",
            id = %record.id,
            kind = %record.kind,
            payer = %payer,
            payee = %payee,
            amount = %record.amount,
            reason = record.reason.as_deref().unwrap_or(""),
            "money transaction"
        );
        Ok(())
    }
}

/// Discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &TransactionRecord) -> AuditResult<()> {
        Ok(())
    }
}

/// Sequences records and appends them to an [`AuditRepository`].
pub struct JournalAuditSink {
    repo: Arc<dyn AuditRepository>,
    sequencer: AuditSequencer,
}

impl JournalAuditSink {
    /// Attach to `repo`, continuing after its last persisted sequence.
    pub fn new(repo: Arc<dyn AuditRepository>) -> AuditResult<Self> {
        let sequencer = AuditSequencer::bootstrap(repo.as_ref())?;
        Ok(Self { repo, sequencer })
    }

    pub fn repository(&self) -> &Arc<dyn AuditRepository> {
        &self.repo
    }

    pub fn query(&self, query: AuditQuery) -> AuditResult<Vec<TransactionRecord>> {
        self.repo.query(query)
    }
}

impl AuditSink for JournalAuditSink {
    fn record(&self, record: &TransactionRecord) -> AuditResult<()> {
        let sequenced = record.clone().with_sequence(self.sequencer.next());
        self.repo.append(&sequenced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryAuditRepository;
    use hamlet_core::Entity;
    use rust_decimal_macros::dec;

    #[test]
    fn journal_sink_assigns_increasing_sequences() {
        let repo = Arc::new(MemoryAuditRepository::default());
        let sink = JournalAuditSink::new(repo.clone()).unwrap();
        let steve = Entity::individual("Steve");
        sink.record(&TransactionRecord::collection(&steve, dec!(5), None))
            .unwrap();
        sink.record(&TransactionRecord::payment(&steve, dec!(2), Some("fee")))
            .unwrap();

        let records = repo.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[1].sequence, 2);
    }

    #[test]
    fn journal_sink_resumes_after_existing_records() {
        let repo = Arc::new(MemoryAuditRepository::default());
        let steve = Entity::individual("Steve");
        repo.append(&TransactionRecord::collection(&steve, dec!(1), None).with_sequence(7))
            .unwrap();
        let sink = JournalAuditSink::new(repo.clone()).unwrap();
        sink.record(&TransactionRecord::collection(&steve, dec!(1), None))
            .unwrap();
        assert_eq!(repo.latest_sequence().unwrap(), Some(8));
    }
}
