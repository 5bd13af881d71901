use chrono::{DateTime, Utc};
use hamlet_core::AccountName;

use crate::{RecordKind, TransactionRecord};

/// Filter describing which audit records to load from a journal.
#[derive(Clone, Debug)]
pub struct AuditQuery {
    pub account: Option<AccountName>,
    pub kind: Option<RecordKind>,
    pub start_sequence: Option<u64>,
    pub end_sequence: Option<u64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub ascending: bool,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            account: None,
            kind: None,
            start_sequence: None,
            end_sequence: None,
            start_time: None,
            end_time: None,
            limit: None,
            ascending: true,
        }
    }
}

impl AuditQuery {
    /// Records where `account` is either payer or payee.
    pub fn with_account(mut self, account: AccountName) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_sequence_range(mut self, start: Option<u64>, end: Option<u64>) -> Self {
        self.start_sequence = start;
        self.end_sequence = end;
        self
    }

    pub fn with_time_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    /// Whether `record` passes every filter. Ordering and limit are applied
    /// by the repository.
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        if let Some(account) = &self.account {
            if !record.involves(account) {
                return false;
            }
        }
        if self.kind.is_some_and(|kind| kind != record.kind) {
            return false;
        }
        if self.start_sequence.is_some_and(|start| record.sequence < start) {
            return false;
        }
        if self.end_sequence.is_some_and(|end| record.sequence > end) {
            return false;
        }
        if self.start_time.is_some_and(|start| record.timestamp < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| record.timestamp > end) {
            return false;
        }
        true
    }
}
