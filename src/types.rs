use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::Money;

/// unique identifier for a farmer
pub type FarmerId = Uuid;
/// login account that receives notifications for a farmer
pub type UserId = Uuid;
pub type ItemId = Uuid;
pub type PackagingId = Uuid;
pub type PurchaseId = Uuid;
pub type LedgerEntryId = Uuid;
pub type DefaultId = Uuid;
pub type RecoveryActionId = Uuid;
pub type ContactId = Uuid;
pub type CollectionId = Uuid;

/// ledger transaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// credit line funded from pending payments
    Granted,
    /// credit spent on a purchase
    Used,
    /// credit restored by a repayment, settlement or refund
    Repaid,
    /// administrative change of percentage or cap
    Adjusted,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Granted => "granted",
            TransactionType::Used => "used",
            TransactionType::Repaid => "repaid",
            TransactionType::Adjusted => "adjusted",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// what a ledger entry points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Reference {
    Purchase(PurchaseId),
    CreditGrant,
    LimitAdjustment,
    Repayment(Option<String>),
    Settlement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Credit,
}

/// how a repayment reached us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentMethod {
    Cash,
    MobileMoney,
    BankTransfer,
    /// deducted from milk-collection payments
    MilkDeduction,
}

impl fmt::Display for RepaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepaymentMethod::Cash => "cash",
            RepaymentMethod::MobileMoney => "mobile money",
            RepaymentMethod::BankTransfer => "bank transfer",
            RepaymentMethod::MilkDeduction => "milk deduction",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    PendingCollection,
    Completed,
    Cancelled,
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PurchaseStatus::PendingCollection => "pending_collection",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// milk-collection payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionStatus {
    Pending,
    Verified,
    Paid,
}

/// milk collection awaiting payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub farmer_id: FarmerId,
    pub total_amount: Money,
    pub status: CollectionStatus,
}

/// registered farmer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farmer {
    pub id: FarmerId,
    pub user_id: UserId,
    pub full_name: String,
}
