use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Account, AccountId, Entry, MinorUnits};

pub type TransferId = i64;

/// A transfer records an amount moved from one account to another.
/// Transfers are immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    /// Source account (balance decreases)
    pub from_account_id: AccountId,
    /// Destination account (balance increases)
    pub to_account_id: AccountId,
    /// Always positive
    pub amount: MinorUnits,
    pub created_at: DateTime<Utc>,
}

/// Input of a single money transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: MinorUnits,
}

/// One signed balance change, applied through the atomic increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub account_id: AccountId,
    pub amount: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferRuleError {
    #[error("transfer amount must be positive, got {0}")]
    NonPositiveAmount(MinorUnits),

    #[error("cannot transfer from account {0} to itself")]
    SelfTransfer(AccountId),
}

impl CreateTransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: MinorUnits) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    pub fn validate(&self) -> Result<(), TransferRuleError> {
        if self.amount <= 0 {
            return Err(TransferRuleError::NonPositiveAmount(self.amount));
        }
        if self.from_account_id == self.to_account_id {
            return Err(TransferRuleError::SelfTransfer(self.from_account_id));
        }
        Ok(())
    }

    /// The two balance changes of this transfer, lower account id first.
    ///
    /// Every transfer touching the same pair of accounts locks their rows in the
    /// same order, whatever its direction, so concurrent transfers cannot wait on
    /// each other in a cycle.
    pub fn balance_updates(&self) -> [BalanceUpdate; 2] {
        let debit = BalanceUpdate {
            account_id: self.from_account_id,
            amount: -self.amount,
        };
        let credit = BalanceUpdate {
            account_id: self.to_account_id,
            amount: self.amount,
        };

        if self.from_account_id < self.to_account_id {
            [debit, credit]
        } else {
            [credit, debit]
        }
    }
}

/// Everything one committed transfer produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Progress of one transfer through its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Started,
    TransferRecorded,
    EntriesRecorded,
    BalancesUpdated,
    Committed,
    Aborted,
}

impl TransferStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStage::Started => "started",
            TransferStage::TransferRecorded => "transfer_recorded",
            TransferStage::EntriesRecorded => "entries_recorded",
            TransferStage::BalancesUpdated => "balances_updated",
            TransferStage::Committed => "committed",
            TransferStage::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_positive_amount() {
        assert!(CreateTransferParams::new(1, 2, 30).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        assert_eq!(
            CreateTransferParams::new(1, 2, 0).validate(),
            Err(TransferRuleError::NonPositiveAmount(0))
        );
        assert_eq!(
            CreateTransferParams::new(1, 2, -5).validate(),
            Err(TransferRuleError::NonPositiveAmount(-5))
        );
    }

    #[test]
    fn test_validate_rejects_self_transfer() {
        assert_eq!(
            CreateTransferParams::new(7, 7, 10).validate(),
            Err(TransferRuleError::SelfTransfer(7))
        );
    }

    #[test]
    fn test_balance_updates_lower_id_first_when_debiting_lower() {
        let updates = CreateTransferParams::new(1, 2, 30).balance_updates();

        assert_eq!(
            updates,
            [
                BalanceUpdate {
                    account_id: 1,
                    amount: -30
                },
                BalanceUpdate {
                    account_id: 2,
                    amount: 30
                },
            ]
        );
    }

    #[test]
    fn test_balance_updates_lower_id_first_when_crediting_lower() {
        let updates = CreateTransferParams::new(9, 4, 25).balance_updates();

        assert_eq!(updates[0].account_id, 4);
        assert_eq!(updates[0].amount, 25);
        assert_eq!(updates[1].account_id, 9);
        assert_eq!(updates[1].amount, -25);
    }

    #[test]
    fn test_opposite_directions_share_lock_order() {
        let forward = CreateTransferParams::new(3, 8, 10).balance_updates();
        let backward = CreateTransferParams::new(8, 3, 10).balance_updates();

        let order = |u: [BalanceUpdate; 2]| [u[0].account_id, u[1].account_id];
        assert_eq!(order(forward), order(backward));
    }

    #[test]
    fn test_balance_updates_net_to_zero() {
        let updates = CreateTransferParams::new(5, 2, 1234).balance_updates();
        assert_eq!(updates[0].amount + updates[1].amount, 0);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(TransferStage::EntriesRecorded.to_string(), "entries_recorded");
        assert_eq!(TransferStage::Aborted.as_str(), "aborted");
    }
}
