use thiserror::Error;

use crate::domain::{AccountId, Currency, EntryId, MinorUnits, TransferId};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Account {account_id} currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: AccountId,
        expected: Currency,
        actual: Currency,
    },

    #[error("Unsupported currency: {0}")]
    UnknownCurrency(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(MinorUnits),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// True when the failed operation can be attempted again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Store(err) if err.is_retryable())
    }
}
