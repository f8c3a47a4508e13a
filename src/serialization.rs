/// serialization support for credit statements
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Percentage};
use crate::defaults::DefaultRecord;
use crate::ledger::LedgerEntry;
use crate::limits::CreditQuote;
use crate::state::CreditProfile;
use crate::types::{FarmerId, Reference, TransactionType};

/// serializable view of a farmer's credit account
#[derive(Debug, Serialize, Deserialize)]
pub struct CreditStatementView {
    pub farmer_id: FarmerId,
    pub farmer_name: String,
    pub generated_at: DateTime<Utc>,
    pub profile: ProfileView,
    /// absent while credit is suspended
    pub quote: Option<CreditQuote>,
    pub ledger: Vec<LedgerLineView>,
    pub open_default: Option<DefaultRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileView {
    pub credit_limit_percentage: Percentage,
    pub max_credit_amount: Money,
    pub current_credit_balance: Money,
    pub total_credit_used: Money,
    pub pending_deductions: Money,
    pub last_settlement_date: Option<NaiveDate>,
    pub next_settlement_date: Option<NaiveDate>,
    pub is_active: bool,
    pub suspension_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerLineView {
    pub sequence: u64,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub balance_after: Money,
    pub reference: Option<Reference>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&LedgerEntry> for LedgerLineView {
    fn from(entry: &LedgerEntry) -> Self {
        LedgerLineView {
            sequence: entry.sequence,
            transaction_type: entry.transaction_type,
            amount: entry.amount,
            balance_after: entry.balance_after,
            reference: entry.reference.clone(),
            description: entry.description.clone(),
            created_at: entry.created_at,
        }
    }
}

impl CreditStatementView {
    pub fn build(
        farmer_name: String,
        profile: &CreditProfile,
        quote: Option<CreditQuote>,
        entries: &[LedgerEntry],
        open_default: Option<DefaultRecord>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        CreditStatementView {
            farmer_id: profile.farmer_id,
            farmer_name,
            generated_at,
            profile: ProfileView {
                credit_limit_percentage: profile.credit_limit_percentage,
                max_credit_amount: profile.max_credit_amount,
                current_credit_balance: profile.current_credit_balance,
                total_credit_used: profile.total_credit_used,
                pending_deductions: profile.pending_deductions,
                last_settlement_date: profile.last_settlement_date,
                next_settlement_date: profile.next_settlement_date,
                is_active: profile.is_active,
                suspension_reason: profile.suspension_reason.clone(),
            },
            quote,
            ledger: entries.iter().map(LedgerLineView::from).collect(),
            open_default,
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
