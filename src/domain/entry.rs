use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, MinorUnits};

pub type EntryId = i64;

/// An entry records one signed change to one account's balance.
/// Entries are append-only: created once, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    /// Negative for debits, positive for credits
    pub amount: MinorUnits,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }

    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}
