use std::sync::atomic::{AtomicU64, Ordering};

use crate::{AuditRepository, AuditResult};

/// Simple atomic sequencer used to assign monotonic record numbers.
#[derive(Debug)]
pub struct AuditSequencer {
    counter: AtomicU64,
}

impl AuditSequencer {
    /// Create a new sequencer that starts after the provided value.
    pub fn new(last_sequence: u64) -> Self {
        Self {
            counter: AtomicU64::new(last_sequence),
        }
    }

    /// Bootstrap the sequencer by reading the persisted tail sequence.
    pub fn bootstrap(repo: &dyn AuditRepository) -> AuditResult<Self> {
        let last = repo.latest_sequence()?.unwrap_or(0);
        Ok(Self::new(last))
    }

    /// Return the next monotonic sequence.
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continues_after_last_sequence() {
        let sequencer = AuditSequencer::new(41);
        assert_eq!(sequencer.next(), 42);
        assert_eq!(sequencer.next(), 43);
    }
}
