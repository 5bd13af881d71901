use std::collections::HashMap;

use hamlet_core::{AccountName, Context};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::{
    AuditQuery, AuditRepository, AuditResult, BackendOptions, BackendResult, BalanceBackend,
    TransactionRecord,
};

type BalanceKey = (AccountName, Option<Context>);

/// Process-local balance store. Unknown accounts read as zero and are created
/// on first write.
#[derive(Debug, Default)]
pub struct InMemoryBalanceBackend {
    options: BackendOptions,
    balances: RwLock<HashMap<BalanceKey, Decimal>>,
}

impl InMemoryBalanceBackend {
    pub fn new(options: BackendOptions) -> Self {
        Self {
            options,
            balances: RwLock::new(HashMap::new()),
        }
    }

    fn key(&self, account: &AccountName, context: Option<&Context>) -> BalanceKey {
        (account.clone(), self.options.partition(context).cloned())
    }

    /// Sum of every stored balance.
    pub fn total(&self) -> Decimal {
        self.balances.read().values().copied().sum()
    }

    pub fn account_count(&self) -> usize {
        self.balances.read().len()
    }
}

impl BalanceBackend for InMemoryBalanceBackend {
    fn is_active(&self) -> bool {
        self.options.active
    }

    fn uses_context(&self) -> bool {
        self.options.partition_by_context
    }

    fn get_balance(
        &self,
        account: &AccountName,
        context: Option<&Context>,
    ) -> BackendResult<Decimal> {
        let key = self.key(account, context);
        Ok(self
            .balances
            .read()
            .get(&key)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    fn set_balance(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<()> {
        let key = self.key(account, context);
        self.balances.write().insert(key, amount);
        Ok(())
    }

    fn add(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<()> {
        let key = self.key(account, context);
        *self.balances.write().entry(key).or_insert(Decimal::ZERO) += amount;
        Ok(())
    }

    fn subtract(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<bool> {
        let key = self.key(account, context);
        let mut balances = self.balances.write();
        let balance = balances.entry(key).or_insert(Decimal::ZERO);
        if *balance < amount {
            return Ok(false);
        }
        *balance -= amount;
        Ok(true)
    }

    fn has_enough(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<bool> {
        Ok(self.get_balance(account, context)? >= amount)
    }

    fn format_balance(&self, amount: Decimal) -> String {
        self.options.format.format(amount)
    }

    fn remove_account(&self, account: &AccountName) -> BackendResult<()> {
        self.balances.write().retain(|(name, _), _| name != account);
        Ok(())
    }
}

/// Audit journal held in memory, mainly for tests and short-lived runtimes.
#[derive(Debug, Default)]
pub struct MemoryAuditRepository {
    records: RwLock<Vec<TransactionRecord>>,
}

impl MemoryAuditRepository {
    /// Every record in append order.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl AuditRepository for MemoryAuditRepository {
    fn append_batch(&self, records: &[TransactionRecord]) -> AuditResult<()> {
        self.records.write().extend_from_slice(records);
        Ok(())
    }

    fn latest_sequence(&self) -> AuditResult<Option<u64>> {
        Ok(self.records.read().iter().map(|record| record.sequence).max())
    }

    fn query(&self, query: AuditQuery) -> AuditResult<Vec<TransactionRecord>> {
        let mut matched: Vec<TransactionRecord> = self
            .records
            .read()
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        matched.sort_by_key(|record| record.sequence);
        if !query.ascending {
            matched.reverse();
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
