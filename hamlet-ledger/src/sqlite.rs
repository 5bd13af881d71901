use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use hamlet_core::{AccountName, Context, EntityKind};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    AuditError, AuditQuery, AuditRepository, AuditResult, BackendError, BackendOptions,
    BackendResult, BalanceBackend, Party, RecordKind, TransactionRecord,
};

const BALANCE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS balances (
    account TEXT NOT NULL,
    context TEXT NOT NULL DEFAULT '',
    balance TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (account, context)
);
"#;

const AUDIT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_transactions (
    sequence INTEGER PRIMARY KEY,
    record_id TEXT NOT NULL UNIQUE,
    timestamp TEXT NOT NULL,
    kind TEXT NOT NULL,
    payer_kind TEXT,
    payer_id TEXT,
    payer_account TEXT,
    payee_kind TEXT,
    payee_id TEXT,
    payee_account TEXT,
    amount TEXT NOT NULL,
    reason TEXT
);
CREATE INDEX IF NOT EXISTS ledger_tx_idx_payer ON ledger_transactions(payer_account);
CREATE INDEX IF NOT EXISTS ledger_tx_idx_payee ON ledger_transactions(payee_account);
CREATE INDEX IF NOT EXISTS ledger_tx_idx_timestamp ON ledger_transactions(timestamp);
"#;

fn open(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// SQLite-backed balance store. Each call opens its own connection so the
/// store can be shared across threads without a pool.
#[derive(Clone, Debug)]
pub struct SqliteBalanceBackend {
    path: PathBuf,
    options: BackendOptions,
}

impl SqliteBalanceBackend {
    pub fn new(path: impl Into<PathBuf>, options: BackendOptions) -> BackendResult<Self> {
        let backend = Self {
            path: path.into(),
            options,
        };
        let conn = backend.connect()?;
        conn.execute_batch(BALANCE_SCHEMA)?;
        Ok(backend)
    }

    fn connect(&self) -> BackendResult<Connection> {
        ensure_parent(&self.path)?;
        open(&self.path).map_err(|err| {
            BackendError::Unavailable(format!("cannot open {}: {err}", self.path.display()))
        })
    }

    fn partition_key(&self, context: Option<&Context>) -> String {
        self.options
            .partition(context)
            .map(|ctx| ctx.as_str().to_string())
            .unwrap_or_default()
    }

    /// Run `op` inside an immediate transaction so read-modify-write cycles
    /// from other connections cannot interleave.
    fn with_write_tx<T>(
        &self,
        op: impl FnOnce(&Transaction<'_>) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

fn read_balance(
    conn: &Connection,
    account: &AccountName,
    partition: &str,
) -> BackendResult<Decimal> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT balance FROM balances WHERE account = ?1 AND context = ?2",
            params![account.as_str(), partition],
            |row| row.get(0),
        )
        .optional()?;
    match stored {
        Some(text) => Decimal::from_str(&text).map_err(|err| {
            BackendError::Failed(format!("corrupt balance for {account}: {text}: {err}"))
        }),
        None => Ok(Decimal::ZERO),
    }
}

fn write_balance(
    conn: &Connection,
    account: &AccountName,
    partition: &str,
    balance: Decimal,
) -> BackendResult<()> {
    conn.execute(
        "INSERT INTO balances (account, context, balance, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(account, context) DO UPDATE
         SET balance = excluded.balance, updated_at = excluded.updated_at",
        params![
            account.as_str(),
            partition,
            balance.to_string(),
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

impl BalanceBackend for SqliteBalanceBackend {
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
        let conn = self.connect()?;
        read_balance(&conn, account, &self.partition_key(context))
    }

    fn set_balance(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<()> {
        let partition = self.partition_key(context);
        self.with_write_tx(|tx| write_balance(tx, account, &partition, amount))
    }

    fn add(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<()> {
        let partition = self.partition_key(context);
        self.with_write_tx(|tx| {
            let balance = read_balance(tx, account, &partition)?;
            write_balance(tx, account, &partition, balance + amount)
        })
    }

    fn subtract(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<bool> {
        let partition = self.partition_key(context);
        self.with_write_tx(|tx| {
            let balance = read_balance(tx, account, &partition)?;
            if balance < amount {
                return Ok(false);
            }
            write_balance(tx, account, &partition, balance - amount)?;
            Ok(true)
        })
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
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM balances WHERE account = ?1",
            params![account.as_str()],
        )?;
        Ok(())
    }
}

/// SQLite-backed audit journal.
#[derive(Clone, Debug)]
pub struct SqliteAuditRepository {
    path: PathBuf,
}

impl SqliteAuditRepository {
    pub fn new(path: impl Into<PathBuf>) -> AuditResult<Self> {
        let repo = Self { path: path.into() };
        repo.initialize_schema()?;
        Ok(repo)
    }

    fn initialize_schema(&self) -> AuditResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(AUDIT_SCHEMA)?;
        Ok(())
    }

    fn connect(&self) -> AuditResult<Connection> {
        ensure_parent(&self.path)?;
        Ok(open(&self.path)?)
    }
}

impl AuditRepository for SqliteAuditRepository {
    fn append_batch(&self, records: &[TransactionRecord]) -> AuditResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        for record in records {
            let (payer_kind, payer_id, payer_account) = party_columns(record.payer.as_ref());
            let (payee_kind, payee_id, payee_account) = party_columns(record.payee.as_ref());
            tx.execute(
                "INSERT INTO ledger_transactions (
                    sequence, record_id, timestamp, kind,
                    payer_kind, payer_id, payer_account,
                    payee_kind, payee_id, payee_account,
                    amount, reason
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.sequence as i64,
                    record.id.to_string(),
                    record.timestamp.to_rfc3339(),
                    record.kind.as_str(),
                    payer_kind,
                    payer_id,
                    payer_account,
                    payee_kind,
                    payee_id,
                    payee_account,
                    record.amount.to_string(),
                    record.reason
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn latest_sequence(&self) -> AuditResult<Option<u64>> {
        let conn = self.connect()?;
        let seq: Option<Option<i64>> = conn
            .query_row("SELECT MAX(sequence) FROM ledger_transactions", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?;
        Ok(seq.flatten().map(|value| value as u64))
    }

    fn query(&self, query: AuditQuery) -> AuditResult<Vec<TransactionRecord>> {
        let conn = self.connect()?;
        let mut sql = String::from(
            "SELECT sequence, record_id, timestamp, kind,
                    payer_kind, payer_id, payer_account,
                    payee_kind, payee_id, payee_account,
                    amount, reason
             FROM ledger_transactions
             WHERE (?1 IS NULL OR payer_account = ?1 OR payee_account = ?1)
               AND (?2 IS NULL OR kind = ?2)
               AND (?3 IS NULL OR sequence >= ?3)
               AND (?4 IS NULL OR sequence <= ?4)
               AND (?5 IS NULL OR timestamp >= ?5)
               AND (?6 IS NULL OR timestamp <= ?6)",
        );
        sql.push_str(if query.ascending {
            " ORDER BY sequence ASC"
        } else {
            " ORDER BY sequence DESC"
        });
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?7");
        }

        let mut params: Vec<Value> = Vec::with_capacity(7);
        params.push(optional_text(query.account.map(|name| name.to_string())));
        params.push(optional_text(query.kind.map(|kind| kind.as_str().to_string())));
        params.push(optional_int(query.start_sequence));
        params.push(optional_int(query.end_sequence));
        params.push(optional_text(query.start_time.map(|ts| ts.to_rfc3339())));
        params.push(optional_text(query.end_time.map(|ts| ts.to_rfc3339())));
        if let Some(limit) = query.limit {
            params.push(Value::Integer(limit as i64));
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(row_to_record(row)?);
        }
        Ok(records)
    }
}

type PartyColumns = (Option<&'static str>, Option<String>, Option<String>);

fn party_columns(party: Option<&Party>) -> PartyColumns {
    match party {
        Some(party) => (
            Some(party.kind.as_str()),
            Some(party.id.clone()),
            Some(party.account.to_string()),
        ),
        None => (None, None, None),
    }
}

fn optional_text(value: Option<String>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn optional_int(value: Option<u64>) -> Value {
    value
        .map(|v| Value::Integer(v as i64))
        .unwrap_or(Value::Null)
}

fn row_to_party(
    kind: Option<String>,
    id: Option<String>,
    account: Option<String>,
) -> AuditResult<Option<Party>> {
    match (kind, id, account) {
        (Some(kind), Some(id), Some(account)) => {
            let kind = EntityKind::from_str(&kind).map_err(AuditError::Serialization)?;
            Ok(Some(Party {
                kind,
                id,
                account: AccountName::new(account),
            }))
        }
        (None, None, None) => Ok(None),
        _ => Err(AuditError::Serialization(
            "partially populated party columns".into(),
        )),
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> AuditResult<TransactionRecord> {
    let sequence: i64 = row.get(0)?;
    let record_id: String = row.get(1)?;
    let timestamp_str: String = row.get(2)?;
    let kind_str: String = row.get(3)?;
    let payer = row_to_party(row.get(4)?, row.get(5)?, row.get(6)?)?;
    let payee = row_to_party(row.get(7)?, row.get(8)?, row.get(9)?)?;
    let amount_str: String = row.get(10)?;
    let reason: Option<String> = row.get(11)?;

    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map_err(|err| {
            AuditError::Serialization(format!("invalid timestamp {timestamp_str}: {err}"))
        })?
        .with_timezone(&Utc);
    let kind = RecordKind::from_str(&kind_str).map_err(AuditError::Serialization)?;
    let amount = Decimal::from_str(&amount_str).map_err(|err| {
        AuditError::Serialization(format!("invalid decimal {amount_str}: {err}"))
    })?;

    Ok(TransactionRecord {
        id: Uuid::parse_str(&record_id).map_err(|err| {
            AuditError::Serialization(format!("invalid record id {record_id}: {err}"))
        })?,
        sequence: sequence as u64,
        timestamp,
        kind,
        payer,
        payee,
        amount,
        reason,
    })
}
