use tracing::{debug, info, instrument, warn};

use crate::domain::{CreateTransferParams, TransferResult, TransferStage};

use super::{
    AddAccountBalanceParams, CreateEntryParams, LedgerStore, Store, StoreError, TxContext,
};

/// Move `params.amount` from one account to another using `ledger`.
///
/// Writes the transfer record, a debit entry for the source, a credit entry for
/// the destination, then applies both balance changes lower account id first.
/// The caller owns the transaction: any error must abort it, since earlier
/// steps may already have written rows.
pub async fn execute_transfer<L>(
    ledger: &mut L,
    params: CreateTransferParams,
) -> Result<TransferResult, StoreError>
where
    L: LedgerStore + ?Sized,
{
    let mut stage = TransferStage::Started;
    let abort = |stage: TransferStage, err: &StoreError| {
        warn!(stage = %stage, error = %err, "transfer aborted");
    };

    params.validate().map_err(StoreError::from).inspect_err(|e| abort(stage, e))?;

    let transfer = ledger
        .create_transfer(params)
        .await
        .inspect_err(|e| abort(stage, e))?;
    stage = TransferStage::TransferRecorded;
    debug!(transfer_id = transfer.id, stage = %stage);

    let from_entry = ledger
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await
        .inspect_err(|e| abort(stage, e))?;
    let to_entry = ledger
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await
        .inspect_err(|e| abort(stage, e))?;
    stage = TransferStage::EntriesRecorded;
    debug!(transfer_id = transfer.id, stage = %stage);

    // Lower id first, never by direction. Reordering these two calls lets
    // opposite transfers between the same accounts deadlock.
    let [first, second] = params.balance_updates();
    let first_account = ledger
        .add_account_balance(AddAccountBalanceParams {
            id: first.account_id,
            amount: first.amount,
        })
        .await
        .inspect_err(|e| abort(stage, e))?;
    let second_account = ledger
        .add_account_balance(AddAccountBalanceParams {
            id: second.account_id,
            amount: second.amount,
        })
        .await
        .inspect_err(|e| abort(stage, e))?;
    stage = TransferStage::BalancesUpdated;
    debug!(transfer_id = transfer.id, stage = %stage);

    let (from_account, to_account) = if first.account_id == params.from_account_id {
        (first_account, second_account)
    } else {
        (second_account, first_account)
    };

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

impl Store {
    /// Perform one money transfer inside its own transaction.
    ///
    /// Either every row of the transfer is committed or none is.
    #[instrument(
        skip_all,
        fields(
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount
        )
    )]
    pub async fn transfer_tx(
        &self,
        ctx: &TxContext,
        params: CreateTransferParams,
    ) -> Result<TransferResult, StoreError> {
        let result = self
            .exec_tx(ctx, move |q| {
                Box::pin(async move { execute_transfer(q, params).await })
            })
            .await;

        match &result {
            Ok(done) => info!(
                transfer_id = done.transfer.id,
                stage = %TransferStage::Committed,
                "transfer committed"
            ),
            Err(err) => warn!(
                stage = %TransferStage::Aborted,
                error = %err,
                retryable = err.is_retryable(),
                "transfer failed"
            ),
        }

        result
    }
}
