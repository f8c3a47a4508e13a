pub mod detector;
pub mod recovery;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DefaultPolicy;
use crate::decimal::Money;
use crate::types::{ContactId, DefaultId, FarmerId, RecoveryActionId};

pub use detector::{DefaultDetector, Detection, DetectionReport};
pub use recovery::RecoveryWorkflow;

/// default severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultStatus {
    Overdue,
    PastDue,
    SeverelyOverdue,
    Resolved,
}

impl DefaultStatus {
    /// classify days past the settlement date
    pub fn classify(days_overdue: u32, policy: &DefaultPolicy) -> Self {
        match days_overdue {
            d if d <= policy.overdue_max_days => DefaultStatus::Overdue,
            d if d <= policy.past_due_max_days => DefaultStatus::PastDue,
            _ => DefaultStatus::SeverelyOverdue,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, DefaultStatus::Resolved)
    }
}

impl fmt::Display for DefaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DefaultStatus::Overdue => "overdue",
            DefaultStatus::PastDue => "past_due",
            DefaultStatus::SeverelyOverdue => "severely_overdue",
            DefaultStatus::Resolved => "resolved",
        };
        f.write_str(s)
    }
}

/// a farmer's overdue settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultRecord {
    pub id: DefaultId,
    pub farmer_id: FarmerId,
    pub overdue_amount: Money,
    pub days_overdue: u32,
    pub status: DefaultStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryActionType {
    WithholdCredit,
    SuspendCredit,
    ScheduleVisit,
    Escalate,
    CloseAccount,
}

impl fmt::Display for RecoveryActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecoveryActionType::WithholdCredit => "withhold_credit",
            RecoveryActionType::SuspendCredit => "suspend_credit",
            RecoveryActionType::ScheduleVisit => "schedule_visit",
            RecoveryActionType::Escalate => "escalate",
            RecoveryActionType::CloseAccount => "close_account",
        };
        f.write_str(s)
    }
}

/// recovery action progress, only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryActionStatus {
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for RecoveryActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecoveryActionStatus::Pending => "pending",
            RecoveryActionStatus::InProgress => "in_progress",
            RecoveryActionStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAction {
    pub id: RecoveryActionId,
    pub default_id: DefaultId,
    pub farmer_id: FarmerId,
    pub action_type: RecoveryActionType,
    pub status: RecoveryActionStatus,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    Sms,
    Email,
    Visit,
}

/// append-only record of contact with a defaulting farmer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactHistory {
    pub id: ContactId,
    pub default_id: DefaultId,
    pub farmer_id: FarmerId,
    pub contact_method: ContactMethod,
    pub notes: String,
    pub contacted_by: Option<String>,
    pub created_at: DateTime<Utc>,
}
