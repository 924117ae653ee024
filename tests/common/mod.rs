// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use rand::distributions::Alphanumeric;
use rand::Rng;
use simplebank::application::LedgerService;
use simplebank::config::DatabaseConfig;
use simplebank::domain::{Account, Currency, MinorUnits};
use simplebank::storage::{CreateAccountParams, Store};
use tempfile::TempDir;

/// Config for a fresh database file inside `dir`
pub fn test_config(dir: &TempDir) -> DatabaseConfig {
    let db_path = dir.path().join("test.db");
    DatabaseConfig::for_path(db_path.to_string_lossy().into_owned())
}

/// Helper to create a test store with a temporary database
pub async fn test_store() -> Result<(Store, TempDir)> {
    let temp_dir = TempDir::new()?;
    let store = Store::init(&test_config(&temp_dir)).await?;
    Ok((store, temp_dir))
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(&test_config(&temp_dir)).await?;
    Ok((service, temp_dir))
}

pub fn random_owner() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

pub fn random_money() -> MinorUnits {
    rand::thread_rng().gen_range(1..=1_000)
}

pub fn random_currency() -> Currency {
    Currency::ALL[rand::thread_rng().gen_range(0..Currency::ALL.len())]
}

/// Create an account with a random owner holding `balance` USD minor units
pub async fn create_account(store: &Store, balance: MinorUnits) -> Result<Account> {
    let account = store
        .create_account(CreateAccountParams {
            owner: random_owner(),
            balance,
            currency: Currency::Usd,
        })
        .await?;
    Ok(account)
}

/// Sum of every account balance
pub async fn total_balance(store: &Store) -> Result<MinorUnits> {
    Ok(store.integrity_stats().await?.total_balance)
}
