pub mod dispatchers;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::defaults::RecoveryActionType;
use crate::events::Event;
use crate::store::StoreReader;
use crate::types::{Farmer, UserId};

pub use dispatchers::{NoopDispatcher, RecordingDispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    CreditGranted,
    CreditUsed,
    LowCredit,
    OverLimit,
    CreditLimitAdjustment,
    CreditRepaid,
    CreditStatus,
    PurchaseCollected,
    CreditDefault,
    CreditRecovery,
    CreditResolution,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::CreditGranted => "credit_granted",
            NotificationCategory::CreditUsed => "credit_used",
            NotificationCategory::LowCredit => "low_credit",
            NotificationCategory::OverLimit => "over_limit",
            NotificationCategory::CreditLimitAdjustment => "credit_limit_adjustment",
            NotificationCategory::CreditRepaid => "credit_repaid",
            NotificationCategory::CreditStatus => "credit_status",
            NotificationCategory::PurchaseCollected => "purchase_collected",
            NotificationCategory::CreditDefault => "credit_default",
            NotificationCategory::CreditRecovery => "credit_recovery",
            NotificationCategory::CreditResolution => "credit_resolution",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub metadata: serde_json::Value,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// fire-and-forget delivery channel
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// renders events for the farmer's account and hands them to a dispatcher
#[derive(Clone)]
pub struct Notifier {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// deliver committed events, logging and skipping any failure
    pub fn dispatch(&self, reader: &dyn StoreReader, events: &[Event]) {
        for event in events {
            let farmer_id = event.farmer_id();
            let farmer = match reader.farmer(&farmer_id) {
                Ok(Some(farmer)) => farmer,
                Ok(None) => {
                    warn!(farmer_id = %farmer_id, "no account for farmer, notification dropped");
                    continue;
                }
                Err(error) => {
                    warn!(farmer_id = %farmer_id, error = %error, "farmer lookup failed, notification dropped");
                    continue;
                }
            };

            let notification = render(event, &farmer);
            let category = notification.category;
            match self.dispatcher.notify(notification) {
                Ok(()) => debug!(farmer_id = %farmer_id, category = %category, "notification sent"),
                Err(error) => warn!(
                    farmer_id = %farmer_id,
                    category = %category,
                    error = %error,
                    "notification failed"
                ),
            }
        }
    }
}

/// message shown to the farmer for an event
pub fn render(event: &Event, farmer: &Farmer) -> Notification {
    let name = &farmer.full_name;

    let (title, message, category, metadata) = match event {
        Event::CreditGranted {
            amount,
            pending_payments,
            ..
        } => (
            "Credit Granted".to_string(),
            format!(
                "Good news {}! Credit of KES {} has been granted to your account based on your pending milk payments of KES {}. You can now purchase agrovet supplies using this credit.",
                name, amount, pending_payments
            ),
            NotificationCategory::CreditGranted,
            json!({ "amount": amount, "pending_payments": pending_payments }),
        ),
        Event::CreditUsed {
            purchase_id,
            amount,
            item_name,
            balance_after,
            ..
        } => (
            "Credit Used".to_string(),
            format!(
                "Dear {}, KES {} of your credit has been used to purchase {}. Your remaining credit balance is KES {}.",
                name, amount, item_name, balance_after
            ),
            NotificationCategory::CreditUsed,
            json!({ "purchase_id": purchase_id, "amount": amount, "balance_after": balance_after }),
        ),
        Event::LowCreditWarning {
            balance,
            max_credit_amount,
            ..
        } => (
            "Low Credit Warning".to_string(),
            format!(
                "Dear {}, you have KES {} remaining out of your KES {} credit limit. Consider making payments to increase your available credit.",
                name, balance, max_credit_amount
            ),
            NotificationCategory::LowCredit,
            json!({ "balance": balance, "max_credit_amount": max_credit_amount }),
        ),
        Event::OverLimitWarning {
            total_used,
            max_credit_amount,
            ..
        } => (
            "Credit Limit Nearly Exhausted".to_string(),
            format!(
                "Dear {}, your current credit usage is KES {} against a limit of KES {}. Please make payments to regularize your account.",
                name, total_used, max_credit_amount
            ),
            NotificationCategory::OverLimit,
            json!({ "total_used": total_used, "max_credit_amount": max_credit_amount }),
        ),
        Event::CreditLimitAdjusted {
            old_max,
            new_max,
            percentage,
            ..
        } => {
            let change = if new_max > old_max { "increased" } else { "decreased" };
            (
                "Credit Limit Updated".to_string(),
                format!(
                    "Dear {}, your credit limit has been {} from KES {} to KES {}.",
                    name, change, old_max, new_max
                ),
                NotificationCategory::CreditLimitAdjustment,
                json!({ "old_max": old_max, "new_max": new_max, "percentage": percentage }),
            )
        }
        Event::CreditRepaid {
            amount,
            method,
            balance_after,
            ..
        } => (
            "Credit Repaid".to_string(),
            format!(
                "Dear {}, we received your {} repayment of KES {}. Your available credit balance is now KES {}.",
                name, method, amount, balance_after
            ),
            NotificationCategory::CreditRepaid,
            json!({ "amount": amount, "method": method, "balance_after": balance_after }),
        ),
        Event::CreditStatusChanged { active, reason, .. } => {
            let (title, state) = if *active {
                ("Credit Reactivated", "reactivated")
            } else {
                ("Credit Frozen", "frozen")
            };
            let message = match reason {
                Some(reason) => format!("Dear {}, your credit facility has been {}. {}", name, state, reason),
                None => format!("Dear {}, your credit facility has been {}.", name, state),
            };
            (
                title.to_string(),
                message,
                NotificationCategory::CreditStatus,
                json!({ "active": active, "reason": reason }),
            )
        }
        Event::PurchaseCollected { purchase_id, .. } => (
            "Purchase Collected".to_string(),
            format!("Dear {}, your purchase has been collected. Thank you.", name),
            NotificationCategory::PurchaseCollected,
            json!({ "purchase_id": purchase_id }),
        ),
        Event::DefaultDetected {
            default_id,
            overdue_amount,
            days_overdue,
            status,
            ..
        } => (
            "Overdue Credit Payment".to_string(),
            format!(
                "Dear {}, your credit account has an overdue amount of KES {} for {} days. Please contact our office immediately to resolve this matter and avoid further action.",
                name, overdue_amount, days_overdue
            ),
            NotificationCategory::CreditDefault,
            json!({
                "default_id": default_id,
                "overdue_amount": overdue_amount,
                "days_overdue": days_overdue,
                "status": status,
            }),
        ),
        Event::RecoveryActionCreated {
            action_type,
            overdue_amount,
            ..
        } => {
            let (title, message) = recovery_message(*action_type, &overdue_amount.to_string());
            (
                title.to_string(),
                message,
                NotificationCategory::CreditRecovery,
                json!({ "action_type": action_type, "overdue_amount": overdue_amount }),
            )
        }
        Event::DefaultResolved { default_id, .. } => (
            "Default Resolved".to_string(),
            format!(
                "Dear {}, your account default has been resolved. Your credit facility may be reinstated after review. Thank you for your cooperation.",
                name
            ),
            NotificationCategory::CreditResolution,
            json!({ "default_id": default_id }),
        ),
    };

    Notification {
        user_id: farmer.user_id,
        title,
        message,
        category,
        metadata,
    }
}

fn recovery_message(action_type: RecoveryActionType, amount: &str) -> (&'static str, String) {
    match action_type {
        RecoveryActionType::WithholdCredit => (
            "Credit Withheld",
            format!("Your credit facility has been temporarily withheld due to an overdue payment of KES {}. Please contact our office to discuss repayment options.", amount),
        ),
        RecoveryActionType::SuspendCredit => (
            "Credit Suspended",
            format!("Your credit facility has been suspended due to an overdue payment of KES {}. Please contact our office immediately to resolve this matter.", amount),
        ),
        RecoveryActionType::ScheduleVisit => (
            "Recovery Visit Scheduled",
            format!("A recovery visit has been scheduled to discuss your overdue payment of KES {}. Our representative will contact you to arrange a meeting.", amount),
        ),
        RecoveryActionType::Escalate => (
            "Account Escalated",
            format!("Your account has been escalated to our collections department due to an overdue payment of KES {}. You will be contacted shortly.", amount),
        ),
        RecoveryActionType::CloseAccount => (
            "Account Closure Notice",
            format!("Your account is being considered for closure due to an overdue payment of KES {}. Immediate action is required to prevent account closure.", amount),
        ),
    }
}
