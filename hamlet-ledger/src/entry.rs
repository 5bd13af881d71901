use chrono::{DateTime, Utc};
use hamlet_core::{AccountName, Entity, EntityKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Snapshot of an entity taken when a record is emitted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub kind: EntityKind,
    pub id: String,
    pub account: AccountName,
}

impl From<&Entity> for Party {
    fn from(entity: &Entity) -> Self {
        Self {
            kind: entity.kind(),
            id: entity.id().to_string(),
            account: entity.account_name(),
        }
    }
}

/// Audit record for one completed monetary movement.
///
/// A missing payer means money entered the ledger from outside; a missing
/// payee means it left.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: RecordKind,
    pub payer: Option<Party>,
    pub payee: Option<Party>,
    pub amount: Decimal,
    pub reason: Option<String>,
}

impl TransactionRecord {
    fn new(
        kind: RecordKind,
        payer: Option<Party>,
        payee: Option<Party>,
        amount: Decimal,
        reason: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            kind,
            payer,
            payee,
            amount,
            reason: reason.map(str::to_string),
        }
    }

    pub fn payment(payer: &Entity, amount: Decimal, reason: Option<&str>) -> Self {
        Self::new(RecordKind::Payment, Some(payer.into()), None, amount, reason)
    }

    pub fn collection(payee: &Entity, amount: Decimal, reason: Option<&str>) -> Self {
        Self::new(RecordKind::Collection, None, Some(payee.into()), amount, reason)
    }

    pub fn transfer(payer: &Entity, payee: &Entity, amount: Decimal, reason: Option<&str>) -> Self {
        Self::new(
            RecordKind::Transfer,
            Some(payer.into()),
            Some(payee.into()),
            amount,
            reason,
        )
    }

    pub fn balance_set(payee: &Entity, amount: Decimal, reason: Option<&str>) -> Self {
        Self::new(RecordKind::BalanceSet, None, Some(payee.into()), amount, reason)
    }

    /// Assign the monotonic sequence number used for replay.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn payer_account(&self) -> Option<&AccountName> {
        self.payer.as_ref().map(|party| &party.account)
    }

    pub fn payee_account(&self) -> Option<&AccountName> {
        self.payee.as_ref().map(|party| &party.account)
    }

    /// True when `account` is on either side of the movement.
    pub fn involves(&self, account: &AccountName) -> bool {
        self.payer_account() == Some(account) || self.payee_account() == Some(account)
    }
}

/// Distinguishes organic movements from direct balance overwrites so that
/// totals can be reconciled from the trail.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Payment,
    Collection,
    Transfer,
    BalanceSet,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Payment => "payment",
            RecordKind::Collection => "collection",
            RecordKind::Transfer => "transfer",
            RecordKind::BalanceSet => "balance_set",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(RecordKind::Payment),
            "collection" => Ok(RecordKind::Collection),
            "transfer" => Ok(RecordKind::Transfer),
            "balance_set" => Ok(RecordKind::BalanceSet),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}
