use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MinorUnits;

pub type AccountId = i64;

/// Currencies the ledger accepts. Codes are stored as upper-case ISO 4217 strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Myr,
    Cad,
    Jpy,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Myr,
        Currency::Cad,
        Currency::Jpy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Myr => "MYR",
            Currency::Cad => "CAD",
            Currency::Jpy => "JPY",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "MYR" => Some(Currency::Myr),
            "CAD" => Some(Currency::Cad),
            "JPY" => Some(Currency::Jpy),
            _ => None,
        }
    }

    /// Number of decimal digits between a major and a minor unit.
    pub fn minor_digits(&self) -> u32 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An account holds a balance in a single currency.
///
/// The balance always equals the sum of the account's entries at any committed
/// point; it is only ever changed through an atomic in-place increment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub balance: MinorUnits,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}
