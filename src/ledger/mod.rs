pub mod audit;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::decimal::{Money, Percentage};
use crate::errors::{CreditError, Result};
use crate::store::UnitOfWork;
use crate::types::{FarmerId, LedgerEntryId, Reference, TransactionType};

pub use audit::{activity_by_day, verify_chain, ChainBreak, DailyActivity, ReconciliationReport};

/// immutable, balance-affecting record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub farmer_id: FarmerId,
    /// 1-based position in the farmer's ledger
    pub sequence: u64,
    pub transaction_type: TransactionType,
    /// for `adjusted` entries this is the new cap
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    /// max_credit_amount in force after this entry
    pub limit_after: Money,
    pub reference: Option<Reference>,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// balance implied by applying an entry to the previous balance
    pub fn replay(
        transaction_type: TransactionType,
        balance_before: Money,
        amount: Money,
        limit_after: Money,
    ) -> Money {
        match transaction_type {
            TransactionType::Granted | TransactionType::Repaid => {
                (balance_before + amount).min(limit_after)
            }
            TransactionType::Used => balance_before - amount,
            TransactionType::Adjusted => balance_before.min(limit_after),
        }
    }

    /// signed effect on the balance
    pub fn net_change(&self) -> Money {
        self.balance_after - self.balance_before
    }
}

/// balance change requested of the ledger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LedgerOperation {
    Grant { amount: Money },
    Use { amount: Money },
    Repay { amount: Money },
    Adjust { percentage: Percentage, max_credit_amount: Money },
}

impl LedgerOperation {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            LedgerOperation::Grant { .. } => TransactionType::Granted,
            LedgerOperation::Use { .. } => TransactionType::Used,
            LedgerOperation::Repay { .. } => TransactionType::Repaid,
            LedgerOperation::Adjust { .. } => TransactionType::Adjusted,
        }
    }

    fn amount(&self) -> Money {
        match self {
            LedgerOperation::Grant { amount }
            | LedgerOperation::Use { amount }
            | LedgerOperation::Repay { amount } => *amount,
            LedgerOperation::Adjust { max_credit_amount, .. } => *max_credit_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRequest {
    pub operation: LedgerOperation,
    pub reference: Option<Reference>,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

impl LedgerRequest {
    pub fn new(operation: LedgerOperation) -> Self {
        Self {
            operation,
            reference: None,
            description: None,
            created_by: None,
        }
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn created_by(mut self, actor: Option<&str>) -> Self {
        self.created_by = actor.map(str::to_string);
        self
    }
}

/// writes ledger entries inside a farmer's unit of work
#[derive(Debug, Clone)]
pub struct CreditLedger {
    settlement_cycle_days: u32,
}

impl CreditLedger {
    pub fn new(settlement_cycle_days: u32) -> Self {
        Self {
            settlement_cycle_days,
        }
    }

    /// apply one balance change to the locked profile and stage its entry
    pub fn record_transaction(
        &self,
        uow: &mut UnitOfWork<'_>,
        request: LedgerRequest,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        let mut profile = uow.require_profile()?;
        let operation = request.operation;
        let amount = operation.amount();

        match operation {
            LedgerOperation::Adjust { .. } => {
                if amount.is_negative() {
                    return Err(CreditError::validation("max credit amount must be >= 0"));
                }
            }
            _ => {
                if !amount.is_positive() {
                    return Err(CreditError::validation(format!(
                        "{} amount must be positive, got {}",
                        operation.transaction_type(),
                        amount
                    )));
                }
            }
        }

        if !profile.is_active
            && matches!(operation, LedgerOperation::Grant { .. } | LedgerOperation::Use { .. })
        {
            return Err(CreditError::CreditSuspended {
                farmer_id: profile.farmer_id,
            });
        }

        let balance_before = profile.current_credit_balance;

        match operation {
            LedgerOperation::Grant { amount } => profile.record_grant(amount, now),
            LedgerOperation::Use { amount } => {
                if balance_before < amount {
                    return Err(CreditError::InsufficientCredit {
                        available: balance_before,
                        requested: amount,
                    });
                }
                profile.record_usage(amount, self.settlement_cycle_days, now)?;
            }
            LedgerOperation::Repay { amount } => {
                profile.record_repayment(amount, now);
            }
            LedgerOperation::Adjust {
                percentage,
                max_credit_amount,
            } => profile.record_adjustment(percentage, max_credit_amount, now),
        }

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            farmer_id: profile.farmer_id,
            sequence: uow.next_sequence(),
            transaction_type: operation.transaction_type(),
            amount,
            balance_before,
            balance_after: profile.current_credit_balance,
            limit_after: profile.max_credit_amount,
            reference: request.reference,
            description: request.description,
            created_by: request.created_by,
            created_at: now,
        };

        debug_assert_eq!(
            LedgerEntry::replay(entry.transaction_type, balance_before, amount, entry.limit_after),
            entry.balance_after
        );

        uow.put_profile(profile)?;
        uow.append_entry(entry.clone())?;

        info!(
            farmer_id = %entry.farmer_id,
            transaction_type = %entry.transaction_type,
            amount = %entry.amount,
            balance_after = %entry.balance_after,
            sequence = entry.sequence,
            "ledger entry staged"
        );

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreditPolicy;
    use crate::state::CreditProfile;
    use crate::store::{CreditStore, InMemoryStore, StoreReader};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn seeded(balance: i64, used: i64) -> (InMemoryStore, FarmerId) {
        let store = InMemoryStore::new();
        let farmer = store.register_farmer("Chebet").unwrap();
        let mut profile = CreditProfile::new(farmer, &CreditPolicy::default(), now());
        profile.current_credit_balance = Money::from_major(balance);
        profile.total_credit_used = Money::from_major(used);
        store.seed_profile(profile).unwrap();
        (store, farmer)
    }

    fn record(
        store: &InMemoryStore,
        farmer: FarmerId,
        operation: LedgerOperation,
    ) -> Result<LedgerEntry> {
        let ledger = CreditLedger::new(30);
        store
            .transaction(farmer, |uow| {
                ledger.record_transaction(uow, LedgerRequest::new(operation), now())
            })
            .map(|(entry, _)| entry)
    }

    #[test]
    fn test_used_deducts_and_tracks_total() {
        let (store, farmer) = seeded(1_200, 0);
        let entry = record(&store, farmer, LedgerOperation::Use { amount: Money::from_major(500) })
            .unwrap();

        assert_eq!(entry.balance_after, Money::from_major(700));
        assert_eq!(entry.sequence, 1);

        let profile = store.profile(&farmer).unwrap().unwrap();
        assert_eq!(profile.total_credit_used, Money::from_major(500));
        assert_eq!(profile.pending_deductions, Money::from_major(500));
    }

    #[test]
    fn test_used_beyond_balance_fails_without_writing() {
        let (store, farmer) = seeded(1_200, 0);
        let err = record(&store, farmer, LedgerOperation::Use { amount: Money::from_major(1_201) })
            .unwrap_err();

        assert!(matches!(err, CreditError::InsufficientCredit { .. }));
        assert!(store.ledger_entries(&farmer).unwrap().is_empty());
        assert_eq!(
            store.profile(&farmer).unwrap().unwrap().current_credit_balance,
            Money::from_major(1_200)
        );
    }

    #[test]
    fn test_out_of_range_settlement_cycle_rejects_use() {
        let (store, farmer) = seeded(1_200, 0);
        let ledger = CreditLedger::new(u32::MAX);

        let err = store
            .transaction(farmer, |uow| {
                ledger.record_transaction(
                    uow,
                    LedgerRequest::new(LedgerOperation::Use { amount: Money::from_major(500) }),
                    now(),
                )
            })
            .unwrap_err();
        assert!(matches!(err, CreditError::Validation { .. }));
        assert!(store.ledger_entries(&farmer).unwrap().is_empty());

        let entry = record(&store, farmer, LedgerOperation::Repay { amount: Money::from_major(100) })
            .unwrap();
        assert_eq!(entry.sequence, 1);
    }

    #[test]
    fn test_repaid_restores_balance() {
        let (store, farmer) = seeded(0, 1_200);
        let entry = record(&store, farmer, LedgerOperation::Repay { amount: Money::from_major(1_200) })
            .unwrap();

        assert_eq!(entry.balance_after, Money::from_major(1_200));
        let profile = store.profile(&farmer).unwrap().unwrap();
        assert_eq!(profile.current_credit_balance, Money::from_major(1_200));
        assert_eq!(profile.total_credit_used, Money::ZERO);
    }

    #[test]
    fn test_granted_is_capped_at_max() {
        let (store, farmer) = seeded(99_000, 0);
        let entry = record(&store, farmer, LedgerOperation::Grant { amount: Money::from_major(5_000) })
            .unwrap();
        assert_eq!(entry.balance_after, Money::from_major(100_000));
    }

    #[test]
    fn test_adjusted_records_target_and_rebases() {
        let (store, farmer) = seeded(60_000, 0);
        let entry = record(
            &store,
            farmer,
            LedgerOperation::Adjust {
                percentage: Percentage::from_whole(50),
                max_credit_amount: Money::from_major(40_000),
            },
        )
        .unwrap();

        assert_eq!(entry.transaction_type, TransactionType::Adjusted);
        assert_eq!(entry.amount, Money::from_major(40_000));
        assert_eq!(entry.balance_after, Money::from_major(40_000));
        let profile = store.profile(&farmer).unwrap().unwrap();
        assert_eq!(profile.credit_limit_percentage, Percentage::from_whole(50));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let (store, farmer) = seeded(1_000, 0);
        let err = record(&store, farmer, LedgerOperation::Repay { amount: Money::ZERO }).unwrap_err();
        assert!(matches!(err, CreditError::Validation { .. }));

        let err = record(&store, farmer, LedgerOperation::Use { amount: Money::from_major(-5) })
            .unwrap_err();
        assert!(matches!(err, CreditError::Validation { .. }));
    }

    #[test]
    fn test_suspended_profile_blocks_use_but_not_repay() {
        let (store, farmer) = seeded(1_000, 500);
        let mut profile = store.profile(&farmer).unwrap().unwrap();
        profile.suspend("default".to_string(), now());
        store.seed_profile(profile).unwrap();

        let err = record(&store, farmer, LedgerOperation::Use { amount: Money::from_major(10) })
            .unwrap_err();
        assert!(matches!(err, CreditError::CreditSuspended { .. }));

        assert!(record(&store, farmer, LedgerOperation::Repay { amount: Money::from_major(10) }).is_ok());
    }

    #[test]
    fn test_missing_profile_is_not_found() {
        let store = InMemoryStore::new();
        let farmer = store.register_farmer("Mutua").unwrap();
        let err = record(&store, farmer, LedgerOperation::Grant { amount: Money::from_major(1) })
            .unwrap_err();
        assert!(matches!(err, CreditError::NotFound { .. }));
    }

    #[test]
    fn test_sequence_is_contiguous() {
        let (store, farmer) = seeded(5_000, 0);
        for _ in 0..3 {
            record(&store, farmer, LedgerOperation::Use { amount: Money::from_major(100) }).unwrap();
        }
        let sequences: Vec<u64> = store
            .ledger_entries(&farmer)
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }
}
