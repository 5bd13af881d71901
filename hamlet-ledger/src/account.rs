use std::sync::Arc;

use hamlet_core::{resolve_context, AccountName, Context, Entity, EntityDirectory};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::amount::validate_amount;
use crate::{
    AccountLocks, AuditSink, BalanceBackend, LedgerResult, TransactionRecord, TransferEngine,
};

/// Returned by [`LedgerAccount::formatted_balance`] when the balance cannot be read.
pub const BALANCE_UNAVAILABLE: &str = "Error Accessing Bank Account";

/// Capabilities shared by every account and transfer: the balance store, the
/// audit sink, the directory used for context lookups and the lock table.
#[derive(Clone)]
pub struct LedgerServices {
    backend: Arc<dyn BalanceBackend>,
    audit: Arc<dyn AuditSink>,
    directory: Arc<dyn EntityDirectory>,
    locks: Arc<AccountLocks>,
}

impl LedgerServices {
    pub fn new(
        backend: Arc<dyn BalanceBackend>,
        audit: Arc<dyn AuditSink>,
        directory: Arc<dyn EntityDirectory>,
    ) -> Self {
        Self {
            backend,
            audit,
            directory,
            locks: Arc::new(AccountLocks::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn BalanceBackend> {
        &self.backend
    }

    pub fn directory(&self) -> &Arc<dyn EntityDirectory> {
        &self.directory
    }

    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    /// True when both handles lock through the same table.
    pub fn shares_locks_with(&self, other: &LedgerServices) -> bool {
        Arc::ptr_eq(&self.locks, &other.locks)
    }

    /// Wrap `entity` in an account bound to these services.
    pub fn account(&self, entity: Entity) -> LedgerAccount {
        LedgerAccount::new(entity, self.clone())
    }

    /// Hand a record to the audit sink. Sink failures are logged and dropped.
    pub(crate) fn emit(&self, record: TransactionRecord) {
        if let Err(err) = self.audit.record(&record) {
            warn!(
                record = %record.id,
                kind = %record.kind,
                amount = %record.amount,
                error = %err,
                "failed to write audit record"
            );
        }
    }
}

/// Balance operations for a single entity.
///
/// The account name is derived from the entity on every call, so renaming
/// the entity redirects subsequent operations to the new backend record.
#[derive(Clone)]
pub struct LedgerAccount {
    entity: Entity,
    services: LedgerServices,
}

impl LedgerAccount {
    pub fn new(entity: Entity, services: LedgerServices) -> Self {
        Self { entity, services }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn services(&self) -> &LedgerServices {
        &self.services
    }

    pub fn rename(&mut self, id: impl Into<String>) {
        self.entity.rename(id);
    }

    pub fn account_name(&self) -> AccountName {
        self.entity.account_name()
    }

    /// Context passed to the backend. Only resolved when the backend
    /// partitions by context.
    pub fn context(&self) -> Option<Context> {
        if self.services.backend.uses_context() {
            Some(resolve_context(
                self.services.directory.as_ref(),
                &self.entity,
            ))
        } else {
            None
        }
    }

    /// Pay `amount` out of this account to nobody in particular.
    ///
    /// Returns `Ok(false)` without touching the balance when funds are short
    /// or the backend is inactive. A record is emitted only on success.
    pub fn pay(&self, amount: Decimal, reason: Option<&str>) -> LedgerResult<bool> {
        let amount = validate_amount(amount)?;
        let account = self.account_name();
        let _guard = self.services.locks.lock(&account);
        let context = self.context();
        let paid = self.debit(&account, context.as_ref(), amount)?;
        if paid {
            self.services
                .emit(TransactionRecord::payment(&self.entity, amount, reason));
        }
        Ok(paid)
    }

    /// Credit `amount` from outside the ledger. There is no upper bound.
    pub fn collect(&self, amount: Decimal, reason: Option<&str>) -> LedgerResult<()> {
        let amount = validate_amount(amount)?;
        let account = self.account_name();
        let _guard = self.services.locks.lock(&account);
        let context = self.context();
        self.credit(&account, context.as_ref(), amount)?;
        self.services
            .emit(TransactionRecord::collection(&self.entity, amount, reason));
        Ok(())
    }

    /// Pay `amount` to `collector` as a single audited transfer. Both
    /// accounts must come from the same services.
    pub fn pay_to(
        &self,
        amount: Decimal,
        collector: &LedgerAccount,
        reason: Option<&str>,
    ) -> LedgerResult<bool> {
        TransferEngine::new(self.services.clone()).transfer(self, collector, amount, reason)
    }

    /// Overwrite the balance. With a reason the overwrite is audited as a
    /// [`RecordKind::BalanceSet`](crate::RecordKind::BalanceSet) record.
    pub fn set_balance(&self, amount: Decimal, reason: Option<&str>) -> LedgerResult<()> {
        let amount = validate_amount(amount)?;
        let account = self.account_name();
        let context = self.context();
        let _guard = self.services.locks.lock(&account);
        self.services
            .backend
            .set_balance(&account, amount, context.as_ref())?;
        debug!(account = %account, amount = %amount, "balance set");
        if reason.is_some() {
            self.services
                .emit(TransactionRecord::balance_set(&self.entity, amount, reason));
        }
        Ok(())
    }

    pub fn balance(&self) -> LedgerResult<Decimal> {
        let account = self.account_name();
        let context = self.context();
        Ok(self
            .services
            .backend
            .get_balance(&account, context.as_ref())?)
    }

    /// Side-effect free sufficiency check. The answer may be stale by the
    /// time the caller acts; mutations re-check under the account lock.
    pub fn has_enough(&self, amount: Decimal) -> LedgerResult<bool> {
        let amount = validate_amount(amount)?;
        let account = self.account_name();
        let context = self.context();
        Ok(self
            .services
            .backend
            .has_enough(&account, amount, context.as_ref())?)
    }

    /// Display string for the current balance. Never fails.
    pub fn formatted_balance(&self) -> String {
        match self.balance() {
            Ok(balance) => self.services.backend.format_balance(balance),
            Err(err) => {
                warn!(
                    account = %self.account_name(),
                    error = %err,
                    "cannot read balance for display"
                );
                BALANCE_UNAVAILABLE.to_string()
            }
        }
    }

    /// Ask the backend to delete this account's record. Best effort.
    pub fn remove_account(&self) {
        let account = self.account_name();
        let _guard = self.services.locks.lock(&account);
        match self.services.backend.remove_account(&account) {
            Ok(()) => debug!(account = %account, "account removed"),
            Err(err) => warn!(account = %account, error = %err, "failed to remove account"),
        }
    }

    /// Unaudited, unlocked withdrawal gated by the sufficiency check. The
    /// caller must hold the account lock and pass the context it resolved
    /// under that lock.
    pub(crate) fn debit(
        &self,
        account: &AccountName,
        context: Option<&Context>,
        amount: Decimal,
    ) -> LedgerResult<bool> {
        let backend = &self.services.backend;
        if !backend.is_active() {
            debug!(account = %account, "backend inactive; refusing payment");
            return Ok(false);
        }
        if !backend.has_enough(account, amount, context)? {
            debug!(account = %account, amount = %amount, "insufficient funds");
            return Ok(false);
        }
        let withdrawn = backend.subtract(account, amount, context)?;
        if withdrawn {
            debug!(account = %account, amount = %amount, "debited");
        }
        Ok(withdrawn)
    }

    /// Unaudited, unlocked deposit. The caller must hold the account lock.
    pub(crate) fn credit(
        &self,
        account: &AccountName,
        context: Option<&Context>,
        amount: Decimal,
    ) -> LedgerResult<()> {
        self.services.backend.add(account, amount, context)?;
        debug!(account = %account, amount = %amount, "credited");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BackendOptions, InMemoryBalanceBackend, JournalAuditSink, LedgerError,
        MemoryAuditRepository, RecordKind,
    };
    use hamlet_core::{Context, MemoryDirectory};
    use rust_decimal_macros::dec;

    struct Fixture {
        backend: Arc<InMemoryBalanceBackend>,
        journal: Arc<MemoryAuditRepository>,
        directory: Arc<MemoryDirectory>,
        services: LedgerServices,
    }

    fn fixture_with(options: BackendOptions) -> Fixture {
        let backend = Arc::new(InMemoryBalanceBackend::new(options));
        let journal = Arc::new(MemoryAuditRepository::default());
        let directory = Arc::new(MemoryDirectory::new(Context::new("world")));
        let sink = Arc::new(JournalAuditSink::new(journal.clone()).unwrap());
        let services = LedgerServices::new(backend.clone(), sink, directory.clone());
        Fixture {
            backend,
            journal,
            directory,
            services,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(BackendOptions::default())
    }

    #[test]
    fn collect_has_no_upper_bound() {
        let fx = fixture();
        let town = fx.services.account(Entity::collective("Riverside"));
        town.collect(dec!(1_000_000), None).unwrap();
        assert_eq!(town.balance().unwrap(), dec!(1_000_000));

        let records = fx.journal.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, RecordKind::Collection);
        assert!(records[0].payer.is_none());
        assert_eq!(
            records[0].payee_account(),
            Some(&AccountName::from("town-Riverside"))
        );
        assert_eq!(records[0].amount, dec!(1_000_000));
    }

    #[test]
    fn pay_with_sufficient_funds_records_payment() {
        let fx = fixture();
        let steve = fx.services.account(Entity::individual("Steve"));
        steve.collect(dec!(50), None).unwrap();
        assert!(steve.pay(dec!(20), Some("plot claim")).unwrap());
        assert_eq!(steve.balance().unwrap(), dec!(30));

        let last = fx.journal.records().pop().unwrap();
        assert_eq!(last.kind, RecordKind::Payment);
        assert_eq!(last.payer_account(), Some(&AccountName::from("Steve")));
        assert!(last.payee.is_none());
        assert_eq!(last.reason.as_deref(), Some("plot claim"));
    }

    #[test]
    fn pay_without_funds_changes_nothing() {
        let fx = fixture();
        let steve = fx.services.account(Entity::individual("Steve"));
        steve.collect(dec!(5), None).unwrap();
        assert!(!steve.pay(dec!(5.01), None).unwrap());
        assert_eq!(steve.balance().unwrap(), dec!(5));
        assert_eq!(fx.journal.len(), 1);
    }

    #[test]
    fn inactive_backend_refuses_payment() {
        let fx = fixture_with(BackendOptions::default().inactive());
        let steve = fx.services.account(Entity::individual("Steve"));
        steve.collect(dec!(10), None).unwrap();
        assert!(!steve.pay(dec!(1), None).unwrap());
        assert_eq!(steve.balance().unwrap(), dec!(10));
        assert_eq!(fx.journal.len(), 1);
    }

    #[test]
    fn negative_amount_is_rejected_before_backend() {
        let fx = fixture();
        let steve = fx.services.account(Entity::individual("Steve"));
        assert!(matches!(
            steve.pay(dec!(-1), None),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            steve.collect(dec!(-1), None),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(fx.backend.account_count(), 0);
        assert!(fx.journal.is_empty());
    }

    #[test]
    fn set_balance_is_audited_only_with_reason() {
        let fx = fixture();
        let nation = fx.services.account(Entity::federation("Atlantis"));
        nation.set_balance(dec!(75), None).unwrap();
        assert!(fx.journal.is_empty());
        nation.set_balance(dec!(80), Some("admin correction")).unwrap();
        assert_eq!(nation.balance().unwrap(), dec!(80));

        let records = fx.journal.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, RecordKind::BalanceSet);
        assert_eq!(records[0].amount, dec!(80));
    }

    #[test]
    fn has_enough_does_not_mutate() {
        let fx = fixture();
        let steve = fx.services.account(Entity::individual("Steve"));
        steve.collect(dec!(3), None).unwrap();
        assert!(steve.has_enough(dec!(3)).unwrap());
        assert!(!steve.has_enough(dec!(4)).unwrap());
        assert_eq!(steve.balance().unwrap(), dec!(3));
        assert_eq!(fx.journal.len(), 1);
    }

    #[test]
    fn formatted_balance_uses_backend_format() {
        let fx = fixture();
        let steve = fx.services.account(Entity::individual("Steve"));
        steve.collect(dec!(12.5), None).unwrap();
        assert_eq!(steve.formatted_balance(), "12.50 Dollars");
    }

    #[test]
    fn rename_redirects_to_new_record() {
        let fx = fixture();
        let mut town = fx.services.account(Entity::collective("Oldtown"));
        town.collect(dec!(10), None).unwrap();
        town.rename("Newtown");
        assert_eq!(town.account_name().as_str(), "town-Newtown");
        assert_eq!(town.balance().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn balances_follow_the_entity_context() {
        let fx = fixture();
        fx.directory
            .register_collective("Riverside", Context::new("world_nether"));
        let town = fx.services.account(Entity::collective("Riverside"));
        town.collect(dec!(7), None).unwrap();
        assert_eq!(
            fx.backend
                .get_balance(&town.account_name(), Some(&Context::new("world_nether")))
                .unwrap(),
            dec!(7)
        );
        assert_eq!(
            fx.backend
                .get_balance(&town.account_name(), Some(&Context::new("world")))
                .unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn unpartitioned_backend_skips_context_resolution() {
        let fx = fixture_with(BackendOptions::default().without_partitions());
        let steve = fx.services.account(Entity::individual("Steve"));
        assert!(steve.context().is_none());
    }

    #[test]
    fn remove_account_clears_balance() {
        let fx = fixture();
        let steve = fx.services.account(Entity::individual("Steve"));
        steve.collect(dec!(10), None).unwrap();
        steve.remove_account();
        assert_eq!(steve.balance().unwrap(), Decimal::ZERO);
        assert_eq!(fx.backend.account_count(), 0);
    }
}
