//! Unified facade for the Hamlet account ledger.
//!
//! [`Ledger`] wires a balance backend, an audit sink and an entity directory
//! from a [`LedgerConfig`] and hands out [`LedgerAccount`]s bound to them.

pub mod telemetry;

use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use rust_decimal::Decimal;
use tracing::info;

pub use hamlet_config::{AuditKind, BackendKind, LedgerConfig};
pub use hamlet_core::{AccountName, Context, Entity, EntityDirectory, EntityKind, MemoryDirectory};
pub use hamlet_ledger::{
    AuditQuery, LedgerAccount, LedgerError, LedgerResult, LedgerServices,
    PartialTransferFailure, RecordKind, TransactionRecord, TransferEngine,
};

use hamlet_ledger::{
    AuditRepository, AuditSink, BackendOptions, BalanceBackend, BalanceFormat,
    InMemoryBalanceBackend, JournalAuditSink, MemoryAuditRepository, NullAuditSink,
    SqliteAuditRepository, SqliteBalanceBackend, TracingAuditSink,
};

/// A configured ledger runtime.
#[derive(Clone)]
pub struct Ledger {
    services: LedgerServices,
    journal: Option<Arc<dyn AuditRepository>>,
}

impl Ledger {
    pub fn from_config(
        config: &LedgerConfig,
        directory: Arc<dyn EntityDirectory>,
    ) -> Result<Self> {
        let backend = build_backend(config)?;
        let (audit, journal) = build_audit(config)?;
        info!(
            backend = ?config.backend.kind,
            audit = ?config.audit.kind,
            "ledger initialised"
        );
        Ok(Self {
            services: LedgerServices::new(backend, audit, directory),
            journal,
        })
    }

    /// Build a ledger with an empty [`MemoryDirectory`] rooted at the
    /// configured primary context. The directory is returned for registration.
    pub fn with_memory_directory(
        config: &LedgerConfig,
    ) -> Result<(Self, Arc<MemoryDirectory>)> {
        let directory = Arc::new(MemoryDirectory::new(Context::new(
            config.primary_context.0.clone(),
        )));
        let ledger = Self::from_config(config, directory.clone())?;
        Ok((ledger, directory))
    }

    pub fn services(&self) -> &LedgerServices {
        &self.services
    }

    pub fn account(&self, entity: Entity) -> LedgerAccount {
        self.services.account(entity)
    }

    pub fn transfer(
        &self,
        payer: &LedgerAccount,
        payee: &LedgerAccount,
        amount: Decimal,
        reason: Option<&str>,
    ) -> LedgerResult<bool> {
        TransferEngine::new(self.services.clone()).transfer(payer, payee, amount, reason)
    }

    /// Query the audit journal. Fails when the configured sink keeps no journal.
    pub fn audit_trail(&self, query: AuditQuery) -> Result<Vec<TransactionRecord>> {
        let journal = self
            .journal
            .as_ref()
            .ok_or_else(|| anyhow!("configured audit sink does not keep a journal"))?;
        Ok(journal.query(query)?)
    }
}

fn backend_options(config: &LedgerConfig) -> BackendOptions {
    BackendOptions {
        active: config.backend.active,
        partition_by_context: config.backend.partition_by_context,
        format: BalanceFormat {
            currency_plural: config.display.currency_name.clone(),
            currency_singular: config.display.currency_name_singular.clone(),
            decimal_places: config.display.decimal_places,
        },
    }
}

fn build_backend(config: &LedgerConfig) -> Result<Arc<dyn BalanceBackend>> {
    let options = backend_options(config);
    Ok(match config.backend.kind {
        BackendKind::Memory => Arc::new(InMemoryBalanceBackend::new(options)),
        BackendKind::Sqlite => Arc::new(
            SqliteBalanceBackend::new(&config.backend.path, options).with_context(|| {
                format!(
                    "failed to open balance store {}",
                    config.backend.path.display()
                )
            })?,
        ),
    })
}

type AuditWiring = (Arc<dyn AuditSink>, Option<Arc<dyn AuditRepository>>);

fn build_audit(config: &LedgerConfig) -> Result<AuditWiring> {
    let journal: Arc<dyn AuditRepository> = match config.audit.kind {
        AuditKind::Tracing => return Ok((Arc::new(TracingAuditSink), None)),
        AuditKind::None => return Ok((Arc::new(NullAuditSink), None)),
        AuditKind::Memory => Arc::new(MemoryAuditRepository::default()),
        AuditKind::Sqlite => Arc::new(
            SqliteAuditRepository::new(&config.audit.path).with_context(|| {
                format!("failed to open audit journal {}", config.audit.path.display())
            })?,
        ),
    };
    let sink = JournalAuditSink::new(journal.clone())?;
    Ok((Arc::new(sink), Some(journal)))
}
