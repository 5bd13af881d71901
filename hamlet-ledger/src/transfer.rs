use rust_decimal::Decimal;
use tracing::{error, info};

use crate::amount::validate_amount;
use crate::{
    LedgerAccount, LedgerError, LedgerResult, LedgerServices, PartialTransferFailure,
    TransactionRecord, TransferLeg,
};

/// Moves funds between two accounts as one audited operation.
///
/// Both accounts are locked in name order for the whole check, debit and
/// credit sequence, and each side's context is resolved once under those
/// locks so a refund lands where the debit was taken. A credit that fails after the debit committed is
/// compensated by crediting the payer back, and is always reported as
/// [`LedgerError::PartialTransfer`], never as a refused transfer.
#[derive(Clone)]
pub struct TransferEngine {
    services: LedgerServices,
}

impl TransferEngine {
    pub fn new(services: LedgerServices) -> Self {
        Self { services }
    }

    /// Transfer `amount` from `payer` to `payee`.
    ///
    /// Returns `Ok(false)` with no balance change when the payer cannot cover
    /// the amount or the backend is inactive. Accounts built from services
    /// with a different lock table are rejected with
    /// [`LedgerError::ForeignAccount`]. On `Ok(true)` exactly one
    /// [`RecordKind::Transfer`](crate::RecordKind::Transfer) record has been
    /// emitted.
    pub fn transfer(
        &self,
        payer: &LedgerAccount,
        payee: &LedgerAccount,
        amount: Decimal,
        reason: Option<&str>,
    ) -> LedgerResult<bool> {
        let amount = validate_amount(amount)?;
        let payer_account = payer.account_name();
        let payee_account = payee.account_name();
        for (account, name) in [(payer, &payer_account), (payee, &payee_account)] {
            if !account.services().shares_locks_with(&self.services) {
                return Err(LedgerError::ForeignAccount(name.clone()));
            }
        }
        let _guard = self
            .services
            .locks()
            .lock_pair(&payer_account, &payee_account);
        let payer_context = payer.context();
        let payee_context = payee.context();

        if !payer.debit(&payer_account, payer_context.as_ref(), amount)? {
            return Ok(false);
        }

        if let Err(cause) = payee.credit(&payee_account, payee_context.as_ref(), amount) {
            let refund = payer.credit(&payer_account, payer_context.as_ref(), amount);
            let compensated = match refund {
                Ok(()) => true,
                Err(err) => {
                    error!(
                        payer = %payer_account,
                        amount = %amount,
                        error = %err,
                        "failed to return debited funds to payer"
                    );
                    false
                }
            };
            let failure = PartialTransferFailure {
                payer: payer_account,
                payee: payee_account,
                amount,
                failed_leg: TransferLeg::Credit,
                compensated,
                cause: cause.to_string(),
            };
            error!(
                payer = %failure.payer,
                payee = %failure.payee,
                amount = %amount,
                compensated,
                cause = %failure.cause,
                "transfer credit leg failed after debit"
            );
            return Err(LedgerError::PartialTransfer(failure));
        }

        self.services.emit(TransactionRecord::transfer(
            payer.entity(),
            payee.entity(),
            amount,
            reason,
        ));
        info!(
            payer = %payer_account,
            payee = %payee_account,
            amount = %amount,
            "transfer complete"
        );
        Ok(true)
    }
}
