use hamlet_core::{AccountName, Context};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

/// Failure reported by a [`BalanceBackend`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BackendError {
    /// The store cannot be reached at all or is not wired up.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The store was reached but rejected this call.
    #[error("backend failure: {0}")]
    Failed(String),
}

impl From<rusqlite::Error> for BackendError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Failed(value.to_string())
    }
}

impl From<std::io::Error> for BackendError {
    fn from(value: std::io::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// Pluggable balance store keyed by account name and optional context.
///
/// Every call may block and may fail. Implementations are not required to
/// make any call atomic with another; the ledger serialises per-account work
/// itself.
pub trait BalanceBackend: Send + Sync {
    /// Whether the store is configured to accept payments.
    fn is_active(&self) -> bool;

    /// Whether balances are partitioned by context. When false the ledger
    /// never resolves a context and passes `None`.
    fn uses_context(&self) -> bool {
        true
    }

    fn get_balance(&self, account: &AccountName, context: Option<&Context>)
        -> BackendResult<Decimal>;

    fn set_balance(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<()>;

    fn add(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<()>;

    /// Withdraw `amount`. Returns `Ok(false)` without changing the balance
    /// when the account cannot cover it.
    fn subtract(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<bool>;

    fn has_enough(
        &self,
        account: &AccountName,
        amount: Decimal,
        context: Option<&Context>,
    ) -> BackendResult<bool>;

    /// Human-readable rendering of an amount in the store's currency.
    fn format_balance(&self, amount: Decimal) -> String;

    fn remove_account(&self, account: &AccountName) -> BackendResult<()>;
}

fn default_currency_plural() -> String {
    "Dollars".to_string()
}

fn default_currency_singular() -> String {
    "Dollar".to_string()
}

fn default_decimal_places() -> u32 {
    2
}

/// Currency naming and precision used when rendering balances.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct BalanceFormat {
    #[serde(default = "default_currency_plural")]
    pub currency_plural: String,
    #[serde(default = "default_currency_singular")]
    pub currency_singular: String,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

impl BalanceFormat {
    pub fn format(&self, amount: Decimal) -> String {
        let mut value = amount.round_dp(self.decimal_places);
        value.rescale(self.decimal_places);
        let unit = if value == Decimal::ONE {
            &self.currency_singular
        } else {
            &self.currency_plural
        };
        format!("{value} {unit}")
    }
}

impl Default for BalanceFormat {
    fn default() -> Self {
        Self {
            currency_plural: default_currency_plural(),
            currency_singular: default_currency_singular(),
            decimal_places: default_decimal_places(),
        }
    }
}

/// Settings shared by the bundled backends.
#[derive(Clone, Debug)]
pub struct BackendOptions {
    pub active: bool,
    pub partition_by_context: bool,
    pub format: BalanceFormat,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            active: true,
            partition_by_context: true,
            format: BalanceFormat::default(),
        }
    }
}

impl BackendOptions {
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn without_partitions(mut self) -> Self {
        self.partition_by_context = false;
        self
    }

    pub fn with_format(mut self, format: BalanceFormat) -> Self {
        self.format = format;
        self
    }

    /// Key component for a context under these options.
    pub(crate) fn partition<'a>(&self, context: Option<&'a Context>) -> Option<&'a Context> {
        if self.partition_by_context {
            context
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_pads_to_configured_places() {
        let format = BalanceFormat::default();
        assert_eq!(format.format(dec!(100)), "100.00 Dollars");
        assert_eq!(format.format(dec!(12.345)), "12.34 Dollars");
        assert_eq!(format.format(dec!(1)), "1.00 Dollar");
    }

    #[test]
    fn format_uses_custom_currency() {
        let format = BalanceFormat {
            currency_plural: "Crowns".into(),
            currency_singular: "Crown".into(),
            decimal_places: 0,
        };
        assert_eq!(format.format(dec!(42.4)), "42 Crowns");
    }
}
