use std::fmt;

use hamlet_core::AccountName;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::backend::BackendError;

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error type surfaced by account and transfer operations.
///
/// Insufficient funds is not an error; operations that can be refused for
/// lack of funds return `Ok(false)`.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("balance backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("balance backend error: {0}")]
    Backend(String),
    #[error("account {0} is not served by this ledger")]
    ForeignAccount(AccountName),
    #[error(transparent)]
    PartialTransfer(#[from] PartialTransferFailure),
}

impl From<BackendError> for LedgerError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Unavailable(msg) => Self::BackendUnavailable(msg),
            BackendError::Failed(msg) => Self::Backend(msg),
        }
    }
}

/// Which half of a two-party transfer failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferLeg {
    Debit,
    Credit,
}

impl fmt::Display for TransferLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferLeg::Debit => f.write_str("debit"),
            TransferLeg::Credit => f.write_str("credit"),
        }
    }
}

/// A transfer whose debit committed but whose credit did not.
///
/// When `compensated` is true the debit was reversed and the payer holds its
/// pre-transfer balance. Otherwise `amount` has left the payer and must be
/// reconciled by hand.
#[derive(Clone, Debug, Error)]
#[error(
    "transfer of {amount} from {payer} to {payee} failed on the {failed_leg} leg \
     (compensated: {compensated}): {cause}"
)]
pub struct PartialTransferFailure {
    pub payer: AccountName,
    pub payee: AccountName,
    pub amount: Decimal,
    pub failed_leg: TransferLeg,
    pub compensated: bool,
    pub cause: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_keep_their_category() {
        assert!(matches!(
            LedgerError::from(BackendError::Unavailable("gone".into())),
            LedgerError::BackendUnavailable(msg) if msg == "gone"
        ));
        assert!(matches!(
            LedgerError::from(BackendError::Failed("locked".into())),
            LedgerError::Backend(msg) if msg == "locked"
        ));
    }

    #[test]
    fn partial_failure_message_names_both_accounts() {
        let failure = PartialTransferFailure {
            payer: AccountName::from("Steve"),
            payee: AccountName::from("town-Riverside"),
            amount: Decimal::new(250, 1),
            failed_leg: TransferLeg::Credit,
            compensated: false,
            cause: "disk full".into(),
        };
        let text = LedgerError::from(failure).to_string();
        assert!(text.contains("Steve"));
        assert!(text.contains("town-Riverside"));
        assert!(text.contains("credit leg"));
        assert!(text.contains("compensated: false"));
    }
}
