use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{LedgerService, TransferRequest};
use crate::config::{DatabaseConfig, LogConfig};
use crate::domain::{
    format_amount, parse_amount, AccountId, Currency, EntryId, MinorUnits, TransferId,
};
use crate::storage::{
    ListAccountsParams, ListEntriesParams, ListTransfersParams, TxContext, DEFAULT_PAGE_SIZE,
};

/// SimpleBank - transactional money transfers between accounts
#[derive(Parser)]
#[command(name = "simplebank")]
#[command(about = "Move money between accounts with double-entry bookkeeping")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub db: DatabaseConfig,

    #[command(flatten)]
    pub log: LogConfig,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move money from one account to another
    Transfer {
        /// Amount to transfer in major units (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: AccountId,

        /// Destination account ID
        #[arg(long)]
        to: AccountId,

        /// Require both accounts to hold this currency
        #[arg(short, long)]
        currency: Option<String>,

        /// Abort the transfer if it has not committed within this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List transfers
    Transfers {
        /// Only transfers out of this account
        #[arg(long)]
        from: Option<AccountId>,

        /// Only transfers into this account
        #[arg(long)]
        to: Option<AccountId>,

        /// Maximum number of transfers to show
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: i64,

        /// Number of transfers to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show detailed transfer information
    #[command(name = "show")]
    ShowTransfer {
        /// Transfer ID
        id: TransferId,
    },

    /// List the entries of an account
    Entries {
        /// Account ID
        account: AccountId,

        /// Maximum number of entries to show
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: i64,

        /// Number of entries to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show a single entry
    Entry {
        /// Entry ID
        id: EntryId,
    },

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: accounts, entries, transfers, snapshot
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Create {
        /// Account owner
        owner: String,

        /// Currency code: USD, EUR, MYR, CAD, JPY
        #[arg(short, long, default_value = "USD")]
        currency: String,

        /// Opening balance in major units
        #[arg(short, long)]
        balance: Option<String>,
    },

    /// List accounts
    List {
        /// Only accounts of this owner
        #[arg(long)]
        owner: Option<String>,

        /// Maximum number of accounts to show
        #[arg(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: i64,

        /// Number of accounts to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show account details
    Show {
        /// Account ID
        id: AccountId,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let service = match self.command {
            Commands::Init => {
                LedgerService::init(&self.db).await?;
                println!("Database initialized: {}", self.db.database);
                return Ok(());
            }
            _ => LedgerService::connect(&self.db).await.with_context(|| {
                format!(
                    "Cannot open {}. Run `simplebank init` first",
                    self.db.database
                )
            })?,
        };

        match self.command {
            Commands::Init => {}

            Commands::Account(account_cmd) => {
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Transfer {
                amount,
                from,
                to,
                currency,
                timeout_ms,
            } => {
                run_transfer_command(&service, &amount, from, to, currency, timeout_ms).await?;
            }

            Commands::Transfers {
                from,
                to,
                limit,
                offset,
            } => {
                run_transfers_command(
                    &service,
                    ListTransfersParams {
                        from_account_id: from,
                        to_account_id: to,
                        limit,
                        offset,
                    },
                )
                .await?;
            }

            Commands::ShowTransfer { id } => {
                let transfer = service.get_transfer(id).await?;
                let currency = service.get_account(transfer.from_account_id).await?.currency;

                println!("Transfer: {}", transfer.id);
                println!("  From:     {}", transfer.from_account_id);
                println!("  To:       {}", transfer.to_account_id);
                println!(
                    "  Amount:   {} {}",
                    format_amount(transfer.amount, currency),
                    currency
                );
                println!(
                    "  Created:  {}",
                    transfer.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }

            Commands::Entries {
                account,
                limit,
                offset,
            } => {
                run_entries_command(
                    &service,
                    ListEntriesParams {
                        account_id: account,
                        limit,
                        offset,
                    },
                )
                .await?;
            }

            Commands::Entry { id } => {
                let entry = service.get_entry(id).await?;
                let currency = service.get_account(entry.account_id).await?.currency;

                println!("Entry: {}", entry.id);
                println!("  Account:  {}", entry.account_id);
                println!(
                    "  Amount:   {} {}",
                    format_amount(entry.amount, currency),
                    currency
                );
                println!(
                    "  Created:  {}",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }

            Commands::Check => {
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

fn parse_currency(code: &str) -> Result<Currency> {
    Currency::from_code(code).with_context(|| {
        format!(
            "Unsupported currency '{}'. Valid currencies: {}",
            code,
            Currency::ALL.map(|c| c.as_str()).join(", ")
        )
    })
}

fn parse_major(amount: &str, currency: Currency) -> Result<MinorUnits> {
    parse_amount(amount, currency)
        .with_context(|| format!("Invalid amount '{}' for {}", amount, currency))
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            owner,
            currency,
            balance,
        } => {
            let code = parse_currency(&currency)?;
            let opening = balance
                .map(|b| parse_major(&b, code))
                .transpose()?
                .unwrap_or(0);

            let account = service.open_account(owner, code.as_str(), opening).await?;
            println!(
                "Created account {} for {} ({} {})",
                account.id,
                account.owner,
                format_amount(account.balance, account.currency),
                account.currency
            );
        }

        AccountCommands::List {
            owner,
            limit,
            offset,
        } => {
            let accounts = service
                .list_accounts(ListAccountsParams {
                    owner,
                    limit,
                    offset,
                })
                .await?;

            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<8} {:<20} {:>14} {:<8}", "ID", "OWNER", "BALANCE", "CURRENCY");
                println!("{}", "-".repeat(53));
                for account in accounts {
                    println!(
                        "{:<8} {:<20} {:>14} {:<8}",
                        account.id,
                        truncate(&account.owner, 20),
                        format_amount(account.balance, account.currency),
                        account.currency
                    );
                }
            }
        }

        AccountCommands::Show { id } => {
            let info = service.get_account_info(id).await?;
            let account = &info.account;

            println!("Account: {}", account.id);
            println!("  Owner:          {}", account.owner);
            println!("  Currency:       {}", account.currency);
            println!(
                "  Balance:        {}",
                format_amount(account.balance, account.currency)
            );
            println!(
                "  Created:        {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Entries:        {}", info.entries.len());
            println!(
                "  Entry total:    {}",
                format_amount(info.entry_total, account.currency)
            );
            println!("  Transfers out:  {}", info.outgoing_count);
            println!("  Transfers in:   {}", info.incoming_count);
            if info.entry_total != account.balance {
                println!("  WARNING: balance does not match entry total");
            }
        }
    }
    Ok(())
}

async fn run_transfer_command(
    service: &LedgerService,
    amount: &str,
    from: AccountId,
    to: AccountId,
    currency: Option<String>,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let currency = currency.as_deref().map(parse_currency).transpose()?;
    // Amounts are entered in the currency of the source account unless one is given.
    let amount_currency = match currency {
        Some(code) => code,
        None => service.get_account(from).await?.currency,
    };
    let amount = parse_major(amount, amount_currency)?;

    let ctx = match timeout_ms {
        Some(ms) => TxContext::new().with_timeout(Duration::from_millis(ms)),
        None => service.store().context(),
    };

    let request = TransferRequest {
        from_account_id: from,
        to_account_id: to,
        amount,
        currency,
    };

    let result = match service.transfer_with(&ctx, request).await {
        Ok(result) => result,
        Err(err) if err.is_retryable() => {
            return Err(err).context("Transfer conflicted with another transaction; try again");
        }
        Err(err) => return Err(err.into()),
    };

    let code = result.from_account.currency;
    println!(
        "Transfer {}: {} {} from account {} to account {}",
        result.transfer.id,
        format_amount(result.transfer.amount, code),
        code,
        result.from_account.id,
        result.to_account.id
    );
    println!(
        "  Account {} balance: {}",
        result.from_account.id,
        format_amount(result.from_account.balance, code)
    );
    println!(
        "  Account {} balance: {}",
        result.to_account.id,
        format_amount(result.to_account.balance, code)
    );
    Ok(())
}

async fn run_transfers_command(service: &LedgerService, params: ListTransfersParams) -> Result<()> {
    let transfers = service.list_transfers(params).await?;

    if transfers.is_empty() {
        println!("No transfers found.");
        return Ok(());
    }

    println!(
        "{:<8} {:<20} {:>8} {:>8} {:>14}",
        "ID", "DATE", "FROM", "TO", "AMOUNT"
    );
    println!("{}", "-".repeat(62));
    for transfer in &transfers {
        // The source account's currency is shared by both sides of a transfer.
        let currency = service.get_account(transfer.from_account_id).await?.currency;
        println!(
            "{:<8} {:<20} {:>8} {:>8} {:>14}",
            transfer.id,
            transfer.created_at.format("%Y-%m-%d %H:%M:%S"),
            transfer.from_account_id,
            transfer.to_account_id,
            format_amount(transfer.amount, currency)
        );
    }
    Ok(())
}

async fn run_entries_command(service: &LedgerService, params: ListEntriesParams) -> Result<()> {
    let account = service.get_account(params.account_id).await?;
    let entries = service.list_entries(params).await?;

    if entries.is_empty() {
        println!("No entries found for account {}.", account.id);
        return Ok(());
    }

    println!("{:<8} {:<20} {:>14}", "ID", "DATE", "AMOUNT");
    println!("{}", "-".repeat(44));
    for entry in &entries {
        println!(
            "{:<8} {:<20} {:>14}",
            entry.id,
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            format_amount(entry.amount, account.currency)
        );
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:    {}", report.account_count);
    println!("Entries:     {}", report.entry_count);
    println!("Transfers:   {}", report.transfer_count);
    println!();
    println!("Total balance (minor units):      {:>14}", report.total_balance);
    println!("Total of entries (minor units):   {:>14}", report.total_entries);
    println!("Total transferred (minor units):  {:>14}", report.total_transferred);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let summary = match export_type {
        "accounts" => format!("{} accounts", exporter.export_accounts_csv(writer).await?),
        "entries" => format!("{} entries", exporter.export_entries_csv(writer).await?),
        "transfers" => format!("{} transfers", exporter.export_transfers_csv(writer).await?),
        "snapshot" => {
            let snapshot = exporter.export_snapshot_json(writer).await?;
            format!(
                "{} accounts, {} entries, {} transfers",
                snapshot.accounts.len(),
                snapshot.entries.len(),
                snapshot.transfers.len()
            )
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: accounts, entries, transfers, snapshot",
                export_type
            );
        }
    };

    if output.is_some() {
        eprintln!("Exported {}", summary);
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("alice", 20), "alice");
        assert_eq!(truncate("a very long owner name", 10), "a very ...");
    }

    #[test]
    fn test_parse_transfer_command() {
        let cli = Cli::parse_from([
            "simplebank",
            "--database",
            "bank.db",
            "transfer",
            "10.50",
            "--from",
            "1",
            "--to",
            "2",
            "--timeout-ms",
            "500",
        ]);

        assert_eq!(cli.db.database, "bank.db");
        match cli.command {
            Commands::Transfer {
                amount,
                from,
                to,
                currency,
                timeout_ms,
            } => {
                assert_eq!(amount, "10.50");
                assert_eq!(from, 1);
                assert_eq!(to, 2);
                assert_eq!(currency, None);
                assert_eq!(timeout_ms, Some(500));
            }
            _ => panic!("expected transfer command"),
        }
    }

    #[test]
    fn test_parse_currency_rejects_unknown_code() {
        assert_eq!(parse_currency("eur").unwrap(), Currency::Eur);
        assert!(parse_currency("XYZ").is_err());
    }

    #[test]
    fn test_parse_major_uses_currency_exponent() {
        assert_eq!(parse_major("12.34", Currency::Usd).unwrap(), 1234);
        assert_eq!(parse_major("500", Currency::Jpy).unwrap(), 500);
        assert!(parse_major("1.5", Currency::Jpy).is_err());
    }
}
