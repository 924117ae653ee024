use serde::Serialize;

use super::{AccountId, Entry, MinorUnits};

/// Sum of a set of entries.
pub fn sum_entries(entries: &[Entry]) -> MinorUnits {
    entries.iter().map(|e| e.amount).sum()
}

/// An account whose stored balance disagrees with its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceDrift {
    pub account_id: AccountId,
    pub balance: MinorUnits,
    pub entry_total: MinorUnits,
}

impl BalanceDrift {
    pub fn difference(&self) -> MinorUnits {
        self.balance - self.entry_total
    }
}

/// Raw figures gathered from the store for an integrity check.
#[derive(Debug, Clone, Default)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub entry_count: i64,
    pub transfer_count: i64,
    pub total_balance: MinorUnits,
    pub total_entries: MinorUnits,
    pub total_transferred: MinorUnits,
    pub drifted_accounts: Vec<BalanceDrift>,
    pub invalid_transfer_amounts: i64,
    pub dangling_references: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub account_count: i64,
    pub entry_count: i64,
    pub transfer_count: i64,
    pub total_balance: MinorUnits,
    pub total_entries: MinorUnits,
    pub total_transferred: MinorUnits,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn build_integrity_report(stats: &IntegrityStats) -> IntegrityReport {
    let mut issues = Vec::new();

    for drift in &stats.drifted_accounts {
        issues.push(format!(
            "Account {} balance {} differs from its entries {} by {}",
            drift.account_id,
            drift.balance,
            drift.entry_total,
            drift.difference()
        ));
    }

    if stats.total_balance != stats.total_entries {
        issues.push(format!(
            "Total balance {} does not match total of entries {}",
            stats.total_balance, stats.total_entries
        ));
    }

    // Each transfer writes exactly one debit and one credit entry.
    if stats.entry_count < stats.transfer_count * 2 {
        issues.push(format!(
            "{} transfers but only {} entries",
            stats.transfer_count, stats.entry_count
        ));
    }

    if stats.invalid_transfer_amounts > 0 {
        issues.push(format!(
            "{} transfers with a non-positive amount",
            stats.invalid_transfer_amounts
        ));
    }

    if stats.dangling_references > 0 {
        issues.push(format!(
            "{} rows reference missing accounts",
            stats.dangling_references
        ));
    }

    IntegrityReport {
        account_count: stats.account_count,
        entry_count: stats.entry_count,
        transfer_count: stats.transfer_count,
        total_balance: stats.total_balance,
        total_entries: stats.total_entries,
        total_transferred: stats.total_transferred,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn entry(account_id: AccountId, amount: MinorUnits) -> Entry {
        Entry {
            id: 0,
            account_id,
            amount,
            created_at: Utc::now(),
        }
    }

    fn healthy_stats() -> IntegrityStats {
        IntegrityStats {
            account_count: 2,
            entry_count: 4,
            transfer_count: 1,
            total_balance: 150,
            total_entries: 150,
            total_transferred: 30,
            ..Default::default()
        }
    }

    #[test]
    fn test_sum_entries() {
        assert_eq!(sum_entries(&[]), 0);
        assert_eq!(sum_entries(&[entry(1, -30), entry(2, 30)]), 0);
        assert_eq!(sum_entries(&[entry(1, 100), entry(1, -30)]), 70);
    }

    #[test]
    fn test_healthy_report() {
        let report = build_integrity_report(&healthy_stats());
        assert!(report.is_healthy(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.transfer_count, 1);
    }

    #[test]
    fn test_drift_is_reported() {
        let stats = IntegrityStats {
            total_balance: 160,
            drifted_accounts: vec![BalanceDrift {
                account_id: 2,
                balance: 90,
                entry_total: 80,
            }],
            ..healthy_stats()
        };

        let report = build_integrity_report(&stats);
        assert!(!report.is_healthy());
        assert_eq!(report.issues.len(), 2);
        assert!(report.issues[0].contains("Account 2"));
    }

    #[test]
    fn test_missing_entries_are_reported() {
        let stats = IntegrityStats {
            entry_count: 1,
            ..healthy_stats()
        };

        let report = build_integrity_report(&stats);
        assert_eq!(report.issues, vec!["1 transfers but only 1 entries"]);
    }
}
