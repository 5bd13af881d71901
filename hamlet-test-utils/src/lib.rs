//! Fault-injecting collaborators for exercising Hamlet failure paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hamlet_core::{AccountName, Context};
use hamlet_ledger::{
    AuditError, AuditResult, AuditSink, BackendError, BackendResult, BalanceBackend,
    InMemoryBalanceBackend, TransactionRecord,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;

#[derive(Debug, Default)]
struct FaultPlan {
    failing_adds: usize,
    failing_subtracts: usize,
    failing_reads: bool,
    unavailable: bool,
}

/// Wraps an [`InMemoryBalanceBackend`] and fails selected calls on demand.
///
/// Scripted add and subtract failures are consumed one per call. While
/// unavailable, every call fails with [`BackendError::Unavailable`].
#[derive(Debug)]
pub struct FaultyBackend {
    inner: Arc<InMemoryBalanceBackend>,
    plan: Mutex<FaultPlan>,
    mutations: AtomicUsize,
}

impl FaultyBackend {
    pub fn new(inner: Arc<InMemoryBalanceBackend>) -> Self {
        Self {
            inner,
            plan: Mutex::new(FaultPlan::default()),
            mutations: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryBalanceBackend> {
        &self.inner
    }

    /// Fail the next `count` calls to `add`.
    pub fn fail_next_adds(&self, count: usize) {
        self.plan.lock().failing_adds = count;
    }

    /// Fail the next `count` calls to `subtract`.
    pub fn fail_next_subtracts(&self, count: usize) {
        self.plan.lock().failing_subtracts = count;
    }

    /// Make `get_balance` and `has_enough` fail until switched off.
    pub fn fail_reads(&self, failing: bool) {
        self.plan.lock().failing_reads = failing;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.plan.lock().unavailable = unavailable;
    }

    /// Number of successful balance-changing calls.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> BackendResult<()> {
        if self.plan.lock().unavailable {
            return Err(BackendError::Unavailable("backend offline".into()));
        }
        Ok(())
    }

    fn check_read(&self) -> BackendResult<()> {
        self.check_reachable()?;
        if self.plan.lock().failing_reads {
            return Err(BackendError::Failed("injected read failure".into()));
        }
        Ok(())
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

fn take(counter: &mut usize) -> bool {
    if *counter == 0 {
        return false;
    }
    *counter -= 1;
    true
}

impl BalanceBackend for FaultyBackend {
    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    fn uses_context(&self) -> bool {
        self.inner.uses_context()
    }

    fn get_balance(
        &self,
        account: &AccountName,
        context: Option<&Context>,
    ) -> BackendResult<Decimal> {
        self.check_read()?;
        self.inner.get_balance(account, context)
    }

    fn set_balance(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<()> {
        self.check_reachable()?;
        self.inner.set_balance(account, amount, context)?;
        self.record_mutation();
        Ok(())
    }

    fn add(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<()> {
        self.check_reachable()?;
        if take(&mut self.plan.lock().failing_adds) {
            return Err(BackendError::Failed(format!(
                "injected add failure for {account}"
            )));
        }
        self.inner.add(account, amount, context)?;
        self.record_mutation();
        Ok(())
    }

    fn subtract(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<bool> {
        self.check_reachable()?;
        if take(&mut self.plan.lock().failing_subtracts) {
            return Err(BackendError::Failed(format!(
                "injected subtract failure for {account}"
            )));
        }
        let withdrawn = self.inner.subtract(account, amount, context)?;
        if withdrawn {
            self.record_mutation();
        }
        Ok(withdrawn)
    }

    fn has_enough(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<bool> {
        self.check_read()?;
        self.inner.has_enough(account, amount, context)
    }

    fn format_balance(&self, amount: Decimal) -> String {
        self.inner.format_balance(amount)
    }

    fn remove_account(&self, account: &AccountName) -> BackendResult<()> {
        self.check_reachable()?;
        self.inner.remove_account(account)?;
        self.record_mutation();
        Ok(())
    }
}

/// Audit sink that rejects every record and counts the attempts.
#[derive(Debug, Default)]
pub struct FailingAuditSink {
    attempts: AtomicUsize,
}

impl FailingAuditSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl AuditSink for FailingAuditSink {
    fn record(&self, _record: &TransactionRecord) -> AuditResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AuditError::Storage("audit log is read-only".into()))
    }
}
