use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Percentage};
use crate::defaults::{DefaultStatus, RecoveryActionType};
use crate::types::{DefaultId, FarmerId, PurchaseId, RecoveryActionId, RepaymentMethod};

/// domain events staged with a transaction and dispatched after commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // ledger events
    CreditGranted {
        farmer_id: FarmerId,
        amount: Money,
        pending_payments: Money,
        timestamp: DateTime<Utc>,
    },
    CreditUsed {
        farmer_id: FarmerId,
        purchase_id: PurchaseId,
        amount: Money,
        item_name: String,
        balance_after: Money,
        timestamp: DateTime<Utc>,
    },
    LowCreditWarning {
        farmer_id: FarmerId,
        balance: Money,
        max_credit_amount: Money,
        timestamp: DateTime<Utc>,
    },
    OverLimitWarning {
        farmer_id: FarmerId,
        total_used: Money,
        max_credit_amount: Money,
        timestamp: DateTime<Utc>,
    },
    CreditLimitAdjusted {
        farmer_id: FarmerId,
        old_max: Money,
        new_max: Money,
        percentage: Percentage,
        timestamp: DateTime<Utc>,
    },
    CreditRepaid {
        farmer_id: FarmerId,
        amount: Money,
        method: RepaymentMethod,
        balance_after: Money,
        timestamp: DateTime<Utc>,
    },
    CreditStatusChanged {
        farmer_id: FarmerId,
        active: bool,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    // purchase events
    PurchaseCollected {
        farmer_id: FarmerId,
        purchase_id: PurchaseId,
        timestamp: DateTime<Utc>,
    },

    // default events
    DefaultDetected {
        farmer_id: FarmerId,
        default_id: DefaultId,
        overdue_amount: Money,
        days_overdue: u32,
        status: DefaultStatus,
        timestamp: DateTime<Utc>,
    },
    RecoveryActionCreated {
        farmer_id: FarmerId,
        default_id: DefaultId,
        action_id: RecoveryActionId,
        action_type: RecoveryActionType,
        overdue_amount: Money,
        timestamp: DateTime<Utc>,
    },
    DefaultResolved {
        farmer_id: FarmerId,
        default_id: DefaultId,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn farmer_id(&self) -> FarmerId {
        match self {
            Event::CreditGranted { farmer_id, .. }
            | Event::CreditUsed { farmer_id, .. }
            | Event::LowCreditWarning { farmer_id, .. }
            | Event::OverLimitWarning { farmer_id, .. }
            | Event::CreditLimitAdjusted { farmer_id, .. }
            | Event::CreditRepaid { farmer_id, .. }
            | Event::CreditStatusChanged { farmer_id, .. }
            | Event::PurchaseCollected { farmer_id, .. }
            | Event::DefaultDetected { farmer_id, .. }
            | Event::RecoveryActionCreated { farmer_id, .. }
            | Event::DefaultResolved { farmer_id, .. } => *farmer_id,
        }
    }
}

/// outbox collecting events during a unit of work
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
