use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::domain::{
    Account, AccountId, BalanceDrift, CreateTransferParams, Currency, Entry, EntryId,
    IntegrityStats, MinorUnits, Transfer, TransferId,
};

use super::StoreError;

/// Page size used when a listing does not ask for one.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// SQLite treats a negative LIMIT as no upper bound.
pub const NO_LIMIT: i64 = -1;

#[derive(Debug, Clone)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: MinorUnits,
    pub currency: Currency,
}

#[derive(Debug, Clone, Copy)]
pub struct CreateEntryParams {
    pub account_id: AccountId,
    pub amount: MinorUnits,
}

#[derive(Debug, Clone, Copy)]
pub struct AddAccountBalanceParams {
    pub id: AccountId,
    pub amount: MinorUnits,
}

#[derive(Debug, Clone)]
pub struct ListAccountsParams {
    pub owner: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListAccountsParams {
    fn default() -> Self {
        Self {
            owner: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListEntriesParams {
    pub account_id: AccountId,
    pub limit: i64,
    pub offset: i64,
}

impl ListEntriesParams {
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// Filter for listing transfers. A `None` side matches any account.
#[derive(Debug, Clone, Copy)]
pub struct ListTransfersParams {
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListTransfersParams {
    fn default() -> Self {
        Self {
            from_account_id: None,
            to_account_id: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// The row operations a money transfer needs.
///
/// Implemented by [`Queries`]; the transfer orchestrator only depends on this
/// trait, which keeps it testable with wrapping doubles.
#[async_trait]
pub trait LedgerStore: Send {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError>;

    /// Increment the balance in place and return the updated row.
    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>;
}

/// Row operations on accounts, entries and transfers, bound to a single
/// connection. Inside [`Store::exec_tx`](super::Store::exec_tx) that connection
/// is the open transaction.
pub struct Queries<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> Queries<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// The underlying connection, for statements not covered here.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut *self.conn
    }

    // ========================
    // Account operations
    // ========================

    pub async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (owner, balance, currency, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&params.owner)
        .bind(params.balance)
        .bind(params.currency.as_str())
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("create_account", e))?;

        row_to_account(&row)
    }

    pub async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("get_account", e))?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(StoreError::not_found("account", id)),
        }
    }

    /// List accounts ordered by id, optionally restricted to one owner.
    pub async fn list_accounts(
        &mut self,
        params: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE (? IS NULL OR owner = ?)
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(params.owner.as_deref())
        .bind(params.owner.as_deref())
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("list_accounts", e))?;

        rows.iter().map(row_to_account).collect()
    }

    /// Atomically add `amount` to the balance. The arithmetic happens inside the
    /// UPDATE, so concurrent callers never overwrite each other's changes.
    pub async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + ?
            WHERE id = ?
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(params.amount)
        .bind(params.id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("add_account_balance", e))?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(StoreError::not_found("account", params.id)),
        }
    }

    // ========================
    // Entry operations
    // ========================

    pub async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO entries (account_id, amount, created_at)
            VALUES (?, ?, ?)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("create_entry", e))?;

        row_to_entry(&row)
    }

    pub async fn get_entry(&mut self, id: EntryId) -> Result<Entry, StoreError> {
        let row = sqlx::query("SELECT id, account_id, amount, created_at FROM entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| StoreError::from_sqlx("get_entry", e))?;

        match row {
            Some(row) => row_to_entry(&row),
            None => Err(StoreError::not_found("entry", id)),
        }
    }

    pub async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("list_entries", e))?;

        rows.iter().map(row_to_entry).collect()
    }

    // ========================
    // Transfer operations
    // ========================

    pub async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        if params.amount <= 0 {
            return Err(StoreError::Validation(format!(
                "transfer amount must be positive, got {}",
                params.amount
            )));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("create_transfer", e))?;

        row_to_transfer(&row)
    }

    pub async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("get_transfer", e))?;

        match row {
            Some(row) => row_to_transfer(&row),
            None => Err(StoreError::not_found("transfer", id)),
        }
    }

    pub async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE (? IS NULL OR from_account_id = ?)
              AND (? IS NULL OR to_account_id = ?)
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("list_transfers", e))?;

        rows.iter().map(row_to_transfer).collect()
    }

    // ========================
    // Integrity
    // ========================

    /// Gather the figures used to verify the ledger invariants.
    pub async fn integrity_stats(&mut self) -> Result<IntegrityStats, StoreError> {
        let totals = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM accounts) AS account_count,
                (SELECT COUNT(*) FROM entries) AS entry_count,
                (SELECT COUNT(*) FROM transfers) AS transfer_count,
                (SELECT COALESCE(SUM(balance), 0) FROM accounts) AS total_balance,
                (SELECT COALESCE(SUM(amount), 0) FROM entries) AS total_entries,
                (SELECT COALESCE(SUM(amount), 0) FROM transfers) AS total_transferred,
                (SELECT COUNT(*) FROM transfers WHERE amount <= 0) AS invalid_amounts,
                (SELECT COUNT(*) FROM entries e
                    WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = e.account_id))
                + (SELECT COUNT(*) FROM transfers t
                    WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.from_account_id)
                       OR NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = t.to_account_id))
                    AS dangling
            "#,
        )
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("integrity_stats", e))?;

        let drift_rows = sqlx::query(
            r#"
            SELECT a.id AS account_id, a.balance AS balance, COALESCE(SUM(e.amount), 0) AS entry_total
            FROM accounts a
            LEFT JOIN entries e ON e.account_id = a.id
            GROUP BY a.id, a.balance
            HAVING a.balance != COALESCE(SUM(e.amount), 0)
            ORDER BY a.id
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await
        .map_err(|e| StoreError::from_sqlx("integrity_drift", e))?;

        let drifted_accounts = drift_rows
            .iter()
            .map(|row| {
                Ok(BalanceDrift {
                    account_id: row.try_get("account_id").map_err(decode_err)?,
                    balance: row.try_get("balance").map_err(decode_err)?,
                    entry_total: row.try_get("entry_total").map_err(decode_err)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(IntegrityStats {
            account_count: totals.try_get("account_count").map_err(decode_err)?,
            entry_count: totals.try_get("entry_count").map_err(decode_err)?,
            transfer_count: totals.try_get("transfer_count").map_err(decode_err)?,
            total_balance: totals.try_get("total_balance").map_err(decode_err)?,
            total_entries: totals.try_get("total_entries").map_err(decode_err)?,
            total_transferred: totals.try_get("total_transferred").map_err(decode_err)?,
            drifted_accounts,
            invalid_transfer_amounts: totals.try_get("invalid_amounts").map_err(decode_err)?,
            dangling_references: totals.try_get("dangling").map_err(decode_err)?,
        })
    }
}

#[async_trait]
impl<'c> LedgerStore for Queries<'c> {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        Queries::create_transfer(self, params).await
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        Queries::create_entry(self, params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        Queries::add_account_balance(self, params).await
    }
}

fn decode_err(err: sqlx::Error) -> StoreError {
    StoreError::from_sqlx("decode_row", err)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_err(sqlx::Error::Decode(Box::new(e))))
}

fn row_to_account(row: &SqliteRow) -> Result<Account, StoreError> {
    let currency_code: String = row.try_get("currency").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(Account {
        id: row.try_get("id").map_err(decode_err)?,
        owner: row.try_get("owner").map_err(decode_err)?,
        balance: row.try_get("balance").map_err(decode_err)?,
        currency: Currency::from_code(&currency_code).ok_or_else(|| {
            decode_err(sqlx::Error::Decode(
                format!("Invalid currency code: {}", currency_code).into(),
            ))
        })?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<Entry, StoreError> {
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(Entry {
        id: row.try_get("id").map_err(decode_err)?,
        account_id: row.try_get("account_id").map_err(decode_err)?,
        amount: row.try_get("amount").map_err(decode_err)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_transfer(row: &SqliteRow) -> Result<Transfer, StoreError> {
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(Transfer {
        id: row.try_get("id").map_err(decode_err)?,
        from_account_id: row.try_get("from_account_id").map_err(decode_err)?,
        to_account_id: row.try_get("to_account_id").map_err(decode_err)?,
        amount: row.try_get("amount").map_err(decode_err)?,
        created_at: parse_timestamp(&created_at)?,
    })
}
