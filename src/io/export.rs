use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{format_amount, Account, Entry, Transfer};

/// Point-in-time copy of the whole ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub entries: Vec<Entry>,
    pub transfers: Vec<Transfer>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export accounts to CSV format
    pub async fn export_accounts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.all_accounts().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "owner",
            "currency",
            "balance",
            "balance_minor",
            "created_at",
        ])?;

        for account in &accounts {
            csv_writer.write_record([
                account.id.to_string(),
                account.owner.clone(),
                account.currency.to_string(),
                format_amount(account.balance, account.currency),
                account.balance.to_string(),
                account.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export entries to CSV format, grouped by account
    pub async fn export_entries_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let entries = self.service.all_entries().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "account_id", "amount_minor", "created_at"])?;

        for entry in &entries {
            csv_writer.write_record([
                entry.id.to_string(),
                entry.account_id.to_string(),
                entry.amount.to_string(),
                entry.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(entries.len())
    }

    /// Export transfers to CSV format
    pub async fn export_transfers_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let transfers = self.service.all_transfers().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "from_account_id",
            "to_account_id",
            "amount_minor",
            "created_at",
        ])?;

        for transfer in &transfers {
            csv_writer.write_record([
                transfer.id.to_string(),
                transfer.from_account_id.to_string(),
                transfer.to_account_id.to_string(),
                transfer.amount.to_string(),
                transfer.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transfers.len())
    }

    /// Export the whole ledger as a JSON snapshot
    pub async fn export_snapshot_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let accounts = self.service.all_accounts().await?;
        let entries = self.service.all_entries().await?;
        let transfers = self.service.all_transfers().await?;

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts,
            entries,
            transfers,
        };

        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        Ok(snapshot)
    }
}
