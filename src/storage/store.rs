use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use tracing::{debug, error, info, instrument};

use crate::config::DatabaseConfig;
use crate::domain::{
    Account, AccountId, Entry, EntryId, IntegrityStats, Transfer, TransferId,
};

use super::{
    CreateAccountParams, CreateEntryParams, ListAccountsParams, ListEntriesParams,
    ListTransfersParams, Queries, StoreError, TxContext, MIGRATION_001_INITIAL,
};

/// Owns the connection pool and runs units of work inside transactions.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    tx_timeout: Option<Duration>,
}

impl Store {
    /// Create a store over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx_timeout: None,
        }
    }

    /// Abort every transaction started through [`Store::context`] after `timeout`.
    pub fn with_tx_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tx_timeout = timeout;
        self
    }

    /// Open a pool for the configured database.
    pub async fn connect(config: &DatabaseConfig, create_if_missing: bool) -> Result<Self> {
        let options = if config.database.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(&config.database)
                .with_context(|| format!("Invalid database URL: {}", config.database))?
        } else {
            SqliteConnectOptions::new().filename(&config.database)
        };

        let options = options
            .create_if_missing(create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!(database = %config.database, max_connections = config.max_connections, "connection pool established");
        Ok(Self::new(pool).with_tx_timeout(config.tx_timeout()))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        debug!("migrations applied");
        Ok(())
    }

    /// Initialize a database (connect + migrate), creating the file if needed.
    pub async fn init(config: &DatabaseConfig) -> Result<Self> {
        let store = Self::connect(config, true).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A fresh context carrying the configured transaction timeout.
    pub fn context(&self) -> TxContext {
        match self.tx_timeout {
            Some(timeout) => TxContext::new().with_timeout(timeout),
            None => TxContext::new(),
        }
    }

    /// Run `work` inside a single transaction.
    ///
    /// The transaction is committed when `work` succeeds and rolled back when it
    /// fails, is cancelled or times out. A failed rollback is reported together
    /// with the error that triggered it. Exactly one of commit and rollback is
    /// issued for every transaction opened here.
    ///
    /// The context's cancellation and timeout cover waiting for a connection
    /// and running `work`. Once commit is issued it runs to completion: an
    /// interrupted commit would leave the outcome unknown.
    #[instrument(level = "debug", skip_all)]
    pub async fn exec_tx<T, F>(&self, ctx: &TxContext, work: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut Queries<'_>) -> BoxFuture<'c, Result<T, StoreError>> + Send,
    {
        if ctx.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let deadline = ctx.deadline();
        let mut tx = ctx
            .run_until(deadline, async {
                self.pool
                    .begin()
                    .await
                    .map_err(|e| StoreError::from_sqlx("begin", e))
            })
            .await?;
        debug!("transaction started");

        let outcome = {
            let mut queries = Queries::new(&mut tx);
            ctx.run_until(deadline, work(&mut queries)).await
        };

        match outcome {
            Ok(value) => {
                tx.commit().await.map_err(StoreError::Commit)?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    error!(error = %err, rollback_error = %rollback, "rollback failed");
                    return Err(StoreError::Rollback {
                        source: Box::new(err),
                        rollback,
                    });
                }
                debug!(error = %err, "transaction rolled back");
                Err(err)
            }
        }
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| StoreError::from_sqlx("acquire", e))
    }

    // ========================
    // Account operations
    // ========================

    /// Create an account. A non-zero opening balance is recorded as the account's
    /// first entry in the same transaction, so balance and entries agree from
    /// the start.
    pub async fn create_account(&self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let ctx = self.context();
        self.exec_tx(&ctx, move |q| {
            Box::pin(async move {
                let account = q.create_account(params).await?;
                if account.balance != 0 {
                    q.create_entry(CreateEntryParams {
                        account_id: account.id,
                        amount: account.balance,
                    })
                    .await?;
                }
                Ok(account)
            })
        })
        .await
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, StoreError> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).get_account(id).await
    }

    pub async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).list_accounts(params).await
    }

    // ========================
    // Entry operations
    // ========================

    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, StoreError> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).get_entry(id).await
    }

    pub async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).list_entries(params).await
    }

    // ========================
    // Transfer operations
    // ========================

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, StoreError> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).get_transfer(id).await
    }

    pub async fn list_transfers(
        &self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        let mut conn = self.acquire().await?;
        Queries::new(&mut conn).list_transfers(params).await
    }

    // ========================
    // Integrity
    // ========================

    /// Figures for an integrity check, read from one consistent snapshot.
    pub async fn integrity_stats(&self) -> Result<IntegrityStats, StoreError> {
        let ctx = TxContext::new();
        self.exec_tx(&ctx, |q| Box::pin(async move { q.integrity_stats().await }))
            .await
    }
}
