use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::LedgerEntry;
use crate::decimal::Money;
use crate::state::CreditProfile;
use crate::types::{FarmerId, TransactionType};

/// first inconsistency found while walking a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainBreak {
    SequenceGap {
        expected: u64,
        found: u64,
    },
    /// entry does not start where the previous one ended
    Discontinuity {
        sequence: u64,
        previous_after: Money,
        balance_before: Money,
    },
    /// stored balance_after disagrees with replay
    ReplayMismatch {
        sequence: u64,
        replayed: Money,
        recorded: Money,
    },
}

/// walk entries in order and return the final balance when the chain holds
pub fn verify_chain(entries: &[LedgerEntry]) -> Result<Option<Money>, ChainBreak> {
    let mut previous: Option<&LedgerEntry> = None;

    for (index, entry) in entries.iter().enumerate() {
        let expected = index as u64 + 1;
        if entry.sequence != expected {
            return Err(ChainBreak::SequenceGap {
                expected,
                found: entry.sequence,
            });
        }

        if let Some(prev) = previous {
            if prev.balance_after != entry.balance_before {
                return Err(ChainBreak::Discontinuity {
                    sequence: entry.sequence,
                    previous_after: prev.balance_after,
                    balance_before: entry.balance_before,
                });
            }
        }

        let replayed = LedgerEntry::replay(
            entry.transaction_type,
            entry.balance_before,
            entry.amount,
            entry.limit_after,
        );
        if replayed != entry.balance_after {
            return Err(ChainBreak::ReplayMismatch {
                sequence: entry.sequence,
                replayed,
                recorded: entry.balance_after,
            });
        }

        previous = Some(entry);
    }

    Ok(previous.map(|e| e.balance_after))
}

/// profile balance compared against its ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub farmer_id: FarmerId,
    pub entry_count: usize,
    pub profile_balance: Money,
    /// None when the ledger is empty
    pub ledger_balance: Option<Money>,
    pub chain_break: Option<ChainBreak>,
    pub is_consistent: bool,
}

impl ReconciliationReport {
    pub fn build(profile: &CreditProfile, entries: &[LedgerEntry]) -> Self {
        let (ledger_balance, chain_break) = match verify_chain(entries) {
            Ok(balance) => (balance, None),
            Err(chain_break) => (entries.last().map(|e| e.balance_after), Some(chain_break)),
        };

        let balance_matches = ledger_balance
            .map(|b| b == profile.current_credit_balance)
            .unwrap_or(true);

        Self {
            farmer_id: profile.farmer_id,
            entry_count: entries.len(),
            profile_balance: profile.current_credit_balance,
            ledger_balance,
            is_consistent: chain_break.is_none() && balance_matches,
            chain_break,
        }
    }

    /// profile minus ledger
    pub fn discrepancy(&self) -> Money {
        self.ledger_balance
            .map(|ledger| self.profile_balance - ledger)
            .unwrap_or(Money::ZERO)
    }
}

/// ledger totals for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub granted: Money,
    pub used: Money,
    pub repaid: Money,
    pub adjustments: u32,
    /// combined effect on the balance
    pub net: Money,
}

impl DailyActivity {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            granted: Money::ZERO,
            used: Money::ZERO,
            repaid: Money::ZERO,
            adjustments: 0,
            net: Money::ZERO,
        }
    }
}

/// group entries by UTC day, oldest first
pub fn activity_by_day(entries: &[LedgerEntry]) -> Vec<DailyActivity> {
    let mut days: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();

    for entry in entries {
        let date = entry.created_at.date_naive();
        let day = days.entry(date).or_insert_with(|| DailyActivity::empty(date));

        match entry.transaction_type {
            TransactionType::Granted => day.granted += entry.amount,
            TransactionType::Used => day.used += entry.amount,
            TransactionType::Repaid => day.repaid += entry.amount,
            TransactionType::Adjusted => day.adjustments += 1,
        }
        day.net += entry.net_change();
    }

    days.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreditPolicy;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 10, 0, 0).unwrap()
    }

    fn entry(
        sequence: u64,
        transaction_type: TransactionType,
        before: i64,
        amount: i64,
        created_at: DateTime<Utc>,
    ) -> LedgerEntry {
        let limit = Money::from_major(100_000);
        let balance_before = Money::from_major(before);
        let amount = Money::from_major(amount);
        LedgerEntry {
            id: Uuid::new_v4(),
            farmer_id: Uuid::nil(),
            sequence,
            transaction_type,
            amount,
            balance_before,
            balance_after: LedgerEntry::replay(transaction_type, balance_before, amount, limit),
            limit_after: limit,
            reference: None,
            description: None,
            created_by: None,
            created_at,
        }
    }

    fn sample() -> Vec<LedgerEntry> {
        vec![
            entry(1, TransactionType::Granted, 0, 1_200, at(1)),
            entry(2, TransactionType::Used, 1_200, 500, at(1)),
            entry(3, TransactionType::Repaid, 700, 500, at(2)),
        ]
    }

    #[test]
    fn test_verify_chain_accepts_consistent_ledger() {
        assert_eq!(verify_chain(&sample()), Ok(Some(Money::from_major(1_200))));
        assert_eq!(verify_chain(&[]), Ok(None));
    }

    #[test]
    fn test_verify_chain_detects_gap() {
        let mut entries = sample();
        entries.remove(1);
        assert!(matches!(
            verify_chain(&entries),
            Err(ChainBreak::SequenceGap { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_verify_chain_detects_tampered_balance() {
        let mut entries = sample();
        entries[1].balance_after = Money::from_major(900);
        assert!(matches!(
            verify_chain(&entries),
            Err(ChainBreak::ReplayMismatch { sequence: 2, .. })
        ));
    }

    #[test]
    fn test_reconciliation_flags_drift() {
        let mut profile = CreditProfile::new(Uuid::nil(), &CreditPolicy::default(), at(1));
        profile.current_credit_balance = Money::from_major(1_200);

        let report = ReconciliationReport::build(&profile, &sample());
        assert!(report.is_consistent);
        assert_eq!(report.discrepancy(), Money::ZERO);

        profile.current_credit_balance = Money::from_major(1_000);
        let report = ReconciliationReport::build(&profile, &sample());
        assert!(!report.is_consistent);
        assert_eq!(report.discrepancy(), Money::from_major(-200));
    }

    #[test]
    fn test_activity_groups_by_day() {
        let days = activity_by_day(&sample());
        assert_eq!(days.len(), 2);

        assert_eq!(days[0].date, at(1).date_naive());
        assert_eq!(days[0].granted, Money::from_major(1_200));
        assert_eq!(days[0].used, Money::from_major(500));
        assert_eq!(days[0].net, Money::from_major(700));

        assert_eq!(days[1].date, (at(1) + Duration::days(1)).date_naive());
        assert_eq!(days[1].repaid, Money::from_major(500));
    }
}
