use crate::config::DatabaseConfig;
use crate::domain::{
    build_integrity_report, sum_entries, Account, AccountId, CreateTransferParams, Currency,
    Entry, EntryId, IntegrityReport, MinorUnits, Transfer, TransferId, TransferResult,
};
use crate::storage::{
    CreateAccountParams, ListAccountsParams, ListEntriesParams, ListTransfersParams, Store,
    StoreError, TxContext, NO_LIMIT,
};

use super::AppError;

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, API, tests).
pub struct LedgerService {
    store: Store,
}

/// A request to move money between two accounts.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: MinorUnits,
    /// When set, both accounts must hold this currency
    pub currency: Option<Currency>,
}

/// Detailed account information
pub struct AccountInfo {
    pub account: Account,
    pub entries: Vec<Entry>,
    pub entry_total: MinorUnits,
    pub outgoing_count: usize,
    pub incoming_count: usize,
}

impl LedgerService {
    /// Create a new ledger service over the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Initialize a database (created if missing) and apply migrations.
    pub async fn init(config: &DatabaseConfig) -> Result<Self, AppError> {
        let store = Store::init(config).await?;
        Ok(Self::new(store))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let store = Store::connect(config, false).await?;
        Ok(Self::new(store))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ========================
    // Account operations
    // ========================

    /// Open an account with an optional opening balance.
    pub async fn open_account(
        &self,
        owner: String,
        currency: &str,
        initial_balance: MinorUnits,
    ) -> Result<Account, AppError> {
        let currency = Currency::from_code(currency)
            .ok_or_else(|| AppError::UnknownCurrency(currency.to_string()))?;
        if initial_balance < 0 {
            return Err(AppError::InvalidAmount(initial_balance));
        }

        let account = self
            .store
            .create_account(CreateAccountParams {
                owner,
                balance: initial_balance,
                currency,
            })
            .await?;
        Ok(account)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.store.get_account(id).await.map_err(|err| match err {
            StoreError::NotFound { .. } => AppError::AccountNotFound(id),
            other => other.into(),
        })
    }

    /// Get an account together with its full entry history.
    pub async fn get_account_info(&self, id: AccountId) -> Result<AccountInfo, AppError> {
        let account = self.get_account(id).await?;
        let entries = self
            .store
            .list_entries(ListEntriesParams {
                account_id: id,
                limit: NO_LIMIT,
                offset: 0,
            })
            .await?;
        let outgoing = self
            .store
            .list_transfers(ListTransfersParams {
                from_account_id: Some(id),
                limit: NO_LIMIT,
                ..Default::default()
            })
            .await?;
        let incoming = self
            .store
            .list_transfers(ListTransfersParams {
                to_account_id: Some(id),
                limit: NO_LIMIT,
                ..Default::default()
            })
            .await?;

        Ok(AccountInfo {
            account,
            entry_total: sum_entries(&entries),
            entries,
            outgoing_count: outgoing.len(),
            incoming_count: incoming.len(),
        })
    }

    /// List accounts, optionally for a single owner.
    pub async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>, AppError> {
        Ok(self.store.list_accounts(params).await?)
    }

    /// Every account, ordered by ID.
    pub async fn all_accounts(&self) -> Result<Vec<Account>, AppError> {
        self.list_accounts(ListAccountsParams {
            limit: NO_LIMIT,
            ..Default::default()
        })
        .await
    }

    // ========================
    // Transfer operations
    // ========================

    /// Transfer money using the store's default transaction limits.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferResult, AppError> {
        let ctx = self.store.context();
        self.transfer_with(&ctx, request).await
    }

    /// Transfer money under a caller-supplied cancellation context.
    ///
    /// Both accounts must exist and share a currency. No retry is attempted:
    /// callers inspect [`AppError::is_retryable`] and decide.
    pub async fn transfer_with(
        &self,
        ctx: &TxContext,
        request: TransferRequest,
    ) -> Result<TransferResult, AppError> {
        if request.amount <= 0 {
            return Err(AppError::InvalidAmount(request.amount));
        }

        let from = self.get_account(request.from_account_id).await?;
        let to = self.get_account(request.to_account_id).await?;

        let expected = request.currency.unwrap_or(from.currency);
        for account in [&from, &to] {
            if account.currency != expected {
                return Err(AppError::CurrencyMismatch {
                    account_id: account.id,
                    expected,
                    actual: account.currency,
                });
            }
        }

        let params = CreateTransferParams::new(from.id, to.id, request.amount);
        Ok(self.store.transfer_tx(ctx, params).await?)
    }

    /// Get a transfer by ID.
    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, AppError> {
        self.store.get_transfer(id).await.map_err(|err| match err {
            StoreError::NotFound { .. } => AppError::TransferNotFound(id),
            other => other.into(),
        })
    }

    /// List transfers matching the given filter.
    pub async fn list_transfers(
        &self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, AppError> {
        Ok(self.store.list_transfers(params).await?)
    }

    /// Every transfer, ordered by ID.
    pub async fn all_transfers(&self) -> Result<Vec<Transfer>, AppError> {
        self.list_transfers(ListTransfersParams {
            limit: NO_LIMIT,
            ..Default::default()
        })
        .await
    }

    // ========================
    // Entry operations
    // ========================

    /// Get an entry by ID.
    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, AppError> {
        self.store.get_entry(id).await.map_err(|err| match err {
            StoreError::NotFound { .. } => AppError::EntryNotFound(id),
            other => other.into(),
        })
    }

    /// List entries for an account.
    pub async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>, AppError> {
        self.get_account(params.account_id).await?;
        Ok(self.store.list_entries(params).await?)
    }

    /// Every entry, grouped by account and ordered by ID within each account.
    pub async fn all_entries(&self) -> Result<Vec<Entry>, AppError> {
        let mut entries = Vec::new();
        for account in self.all_accounts().await? {
            entries.extend(
                self.store
                    .list_entries(ListEntriesParams {
                        account_id: account.id,
                        limit: NO_LIMIT,
                        offset: 0,
                    })
                    .await?,
            );
        }
        Ok(entries)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check ledger integrity and return a report.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.store.integrity_stats().await?;
        Ok(build_integrity_report(&stats))
    }
}
