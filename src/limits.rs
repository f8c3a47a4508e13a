use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CreditPolicy;
use crate::decimal::{Money, Percentage};
use crate::errors::{CreditError, Result};
use crate::state::CreditProfile;
use crate::store::UnitOfWork;
use crate::types::FarmerId;

/// what a farmer may borrow right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditQuote {
    pub farmer_id: FarmerId,
    pub available_credit: Money,
    pub pending_payments: Money,
    /// pending payments times the profile percentage, before the cap
    pub credit_limit: Money,
    pub capped_limit: Money,
    pub current_balance: Money,
    pub credit_limit_percentage: Percentage,
    pub max_credit_amount: Money,
}

impl CreditQuote {
    pub fn covers(&self, amount: Money) -> bool {
        amount <= self.available_credit
    }
}

/// derives available credit from pending collections and profile policy
#[derive(Debug, Clone)]
pub struct CreditLimitCalculator {
    policy: CreditPolicy,
}

impl CreditLimitCalculator {
    pub fn new(policy: CreditPolicy) -> Self {
        Self { policy }
    }

    /// pure quote from a profile and the farmer's unpaid collections
    pub fn compute(profile: &CreditProfile, pending_payments: Money) -> CreditQuote {
        let credit_limit = pending_payments.percentage(profile.credit_limit_percentage);
        let capped_limit = credit_limit.min(profile.max_credit_amount);
        let available_credit = capped_limit.min(profile.current_credit_balance).max(Money::ZERO);

        CreditQuote {
            farmer_id: profile.farmer_id,
            available_credit,
            pending_payments,
            credit_limit,
            capped_limit,
            current_balance: profile.current_credit_balance,
            credit_limit_percentage: profile.credit_limit_percentage,
            max_credit_amount: profile.max_credit_amount,
        }
    }

    /// locked profile, created from policy defaults on first use
    pub fn load_or_create(
        &self,
        uow: &mut UnitOfWork<'_>,
        now: DateTime<Utc>,
    ) -> Result<CreditProfile> {
        if let Some(profile) = uow.profile() {
            return Ok(profile.clone());
        }

        let farmer_id = uow.farmer_id();
        if uow.reader().farmer(&farmer_id)?.is_none() {
            return Err(CreditError::not_found("farmer", farmer_id));
        }

        let profile = CreditProfile::new(farmer_id, &self.policy, now);
        uow.put_profile(profile.clone())?;

        info!(
            farmer_id = %farmer_id,
            percentage = %profile.credit_limit_percentage,
            max_credit_amount = %profile.max_credit_amount,
            "credit profile created"
        );
        Ok(profile)
    }

    /// quote for an active profile; suspended profiles cannot borrow
    pub fn quote(&self, uow: &mut UnitOfWork<'_>, now: DateTime<Utc>) -> Result<CreditQuote> {
        let profile = self.load_or_create(uow, now)?;
        if !profile.is_active {
            return Err(CreditError::CreditSuspended {
                farmer_id: profile.farmer_id,
            });
        }

        let pending = uow.reader().pending_collections_total(&profile.farmer_id)?;
        Ok(Self::compute(&profile, pending))
    }
}
