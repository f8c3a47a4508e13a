use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{CreditPolicy, InitialBalance};
use crate::decimal::{Money, Percentage};
use crate::errors::{CreditError, Result};
use crate::types::FarmerId;

/// per-farmer credit policy and balances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditProfile {
    pub id: Uuid,
    pub farmer_id: FarmerId,

    // policy
    pub credit_limit_percentage: Percentage,
    pub max_credit_amount: Money,

    // balances
    /// credit the farmer may still spend, always within [0, max_credit_amount]
    pub current_credit_balance: Money,
    pub total_credit_used: Money,
    /// spent credit awaiting deduction from milk payments
    pub pending_deductions: Money,

    // settlement
    pub last_settlement_date: Option<NaiveDate>,
    pub next_settlement_date: Option<NaiveDate>,

    // status
    pub is_active: bool,
    pub suspension_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreditProfile {
    /// create a profile from policy defaults
    pub fn new(farmer_id: FarmerId, policy: &CreditPolicy, now: DateTime<Utc>) -> Self {
        let initial_balance = match policy.initial_balance {
            InitialBalance::Zero => Money::ZERO,
            InitialBalance::FullLimit => policy.default_max_amount,
        };

        Self {
            id: Uuid::new_v4(),
            farmer_id,
            credit_limit_percentage: policy.default_percentage,
            max_credit_amount: policy.default_max_amount,
            current_credit_balance: initial_balance,
            total_credit_used: Money::ZERO,
            pending_deductions: Money::ZERO,
            last_settlement_date: None,
            next_settlement_date: None,
            is_active: true,
            suspension_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// room left before the balance reaches the cap
    pub fn headroom(&self) -> Money {
        self.max_credit_amount.saturating_sub(self.current_credit_balance)
    }

    /// share of the cap currently spent, in percent
    pub fn utilization(&self) -> Option<rust_decimal::Decimal> {
        self.headroom().ratio_of(self.max_credit_amount)
    }

    pub fn is_within_bounds(&self) -> bool {
        !self.current_credit_balance.is_negative()
            && self.current_credit_balance <= self.max_credit_amount
    }

    /// settlement deadline has passed and deductions are outstanding
    pub fn is_settlement_overdue(&self, today: NaiveDate) -> bool {
        self.pending_deductions.is_positive()
            && self.next_settlement_date.map(|d| d < today).unwrap_or(false)
    }

    /// record credit spent on a purchase
    pub fn record_usage(
        &mut self,
        amount: Money,
        cycle_days: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.next_settlement_date.is_none() {
            let due = now
                .date_naive()
                .checked_add_signed(Duration::days(i64::from(cycle_days)))
                .ok_or_else(|| {
                    CreditError::validation(format!(
                        "settlement cycle of {} days is out of range",
                        cycle_days
                    ))
                })?;
            self.next_settlement_date = Some(due);
        }

        self.current_credit_balance -= amount;
        self.total_credit_used += amount;
        self.pending_deductions += amount;
        self.updated_at = now;
        Ok(())
    }

    /// record a repayment, returning the balance actually restored
    pub fn record_repayment(&mut self, amount: Money, now: DateTime<Utc>) -> Money {
        let new_balance = (self.current_credit_balance + amount).min(self.max_credit_amount);
        let restored = new_balance - self.current_credit_balance;

        self.current_credit_balance = new_balance;
        self.total_credit_used = self.total_credit_used.saturating_sub(amount);
        self.pending_deductions = self.pending_deductions.saturating_sub(amount);

        if self.pending_deductions.is_zero() && self.next_settlement_date.is_some() {
            self.next_settlement_date = None;
            self.last_settlement_date = Some(now.date_naive());
        }
        self.updated_at = now;

        restored
    }

    /// add granted credit, capped at the maximum
    pub fn record_grant(&mut self, amount: Money, now: DateTime<Utc>) {
        self.current_credit_balance =
            (self.current_credit_balance + amount).min(self.max_credit_amount);
        self.updated_at = now;
    }

    /// change policy, re-basing the balance when it no longer fits under the cap
    pub fn record_adjustment(
        &mut self,
        percentage: Percentage,
        max_amount: Money,
        now: DateTime<Utc>,
    ) {
        self.credit_limit_percentage = percentage;
        self.max_credit_amount = max_amount;
        self.current_credit_balance = self.current_credit_balance.min(max_amount);
        self.updated_at = now;
    }

    pub fn suspend(&mut self, reason: String, now: DateTime<Utc>) {
        self.is_active = false;
        self.suspension_reason = Some(reason);
        self.updated_at = now;
    }

    pub fn reactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = true;
        self.suspension_reason = None;
        self.updated_at = now;
    }
}
