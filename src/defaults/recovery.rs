use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    ContactHistory, ContactMethod, DefaultRecord, DefaultStatus, RecoveryAction,
    RecoveryActionStatus, RecoveryActionType,
};
use crate::errors::{CreditError, Result};
use crate::events::Event;
use crate::store::UnitOfWork;
use crate::types::{DefaultId, RecoveryActionId};

/// operator-driven remediation of a default
#[derive(Debug, Clone, Default)]
pub struct RecoveryWorkflow;

impl RecoveryWorkflow {
    pub fn new() -> Self {
        Self
    }

    /// open an action against an unresolved default; suspend_credit also deactivates the profile
    pub fn create_action(
        &self,
        uow: &mut UnitOfWork<'_>,
        default_id: &DefaultId,
        action_type: RecoveryActionType,
        notes: Option<String>,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RecoveryAction> {
        let record = load_default(uow, default_id)?;
        if record.status.is_resolved() {
            return Err(CreditError::validation(format!(
                "default {} is resolved, no further recovery actions",
                record.id
            )));
        }

        if action_type == RecoveryActionType::SuspendCredit {
            let mut profile = uow.require_profile()?;
            if profile.is_active {
                let reason = format!(
                    "Credit suspended due to default: {}",
                    notes.as_deref().unwrap_or("overdue settlement")
                );
                profile.suspend(reason.clone(), now);
                uow.put_profile(profile)?;
                uow.emit(Event::CreditStatusChanged {
                    farmer_id: record.farmer_id,
                    active: false,
                    reason: Some(reason),
                    timestamp: now,
                });
                info!(farmer_id = %record.farmer_id, default_id = %record.id, "credit suspended");
            }
        }

        let action = RecoveryAction {
            id: Uuid::new_v4(),
            default_id: record.id,
            farmer_id: record.farmer_id,
            action_type,
            status: RecoveryActionStatus::Pending,
            notes,
            created_by: actor.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        uow.put_action(action.clone())?;
        uow.emit(Event::RecoveryActionCreated {
            farmer_id: record.farmer_id,
            default_id: record.id,
            action_id: action.id,
            action_type,
            overdue_amount: record.overdue_amount,
            timestamp: now,
        });

        info!(
            farmer_id = %action.farmer_id,
            default_id = %action.default_id,
            action_id = %action.id,
            action_type = %action.action_type,
            "recovery action created"
        );
        Ok(action)
    }

    /// advance an action; repeating the current status is a no-op
    pub fn update_status(
        &self,
        uow: &mut UnitOfWork<'_>,
        action_id: &RecoveryActionId,
        status: RecoveryActionStatus,
        now: DateTime<Utc>,
    ) -> Result<RecoveryAction> {
        let mut action = uow
            .recovery_action(action_id)?
            .ok_or_else(|| CreditError::not_found("recovery action", action_id))?;

        if status == action.status {
            debug!(action_id = %action.id, status = %status, "recovery action already in status");
            return Ok(action);
        }
        if status < action.status {
            return Err(CreditError::InvalidTransition {
                entity: "recovery action",
                from: action.status.to_string(),
                to: status.to_string(),
            });
        }

        let from = action.status;
        action.status = status;
        action.updated_at = now;
        uow.put_action(action.clone())?;

        info!(action_id = %action.id, from = %from, to = %status, "recovery action advanced");
        Ok(action)
    }

    /// close a default; the profile stays as it is until reactivated explicitly
    pub fn resolve(
        &self,
        uow: &mut UnitOfWork<'_>,
        default_id: &DefaultId,
        notes: Option<String>,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<DefaultRecord> {
        let mut record = load_default(uow, default_id)?;
        if record.status.is_resolved() {
            debug!(default_id = %record.id, "default already resolved");
            return Ok(record);
        }

        record.status = DefaultStatus::Resolved;
        record.resolved_at = Some(now);
        record.updated_at = now;
        uow.put_default(record.clone())?;

        let note = match notes {
            Some(notes) => format!("Default resolved: {}", notes),
            None => "Default resolved".to_string(),
        };
        self.add_contact(uow, default_id, ContactMethod::Visit, note, actor, now)?;
        uow.emit(Event::DefaultResolved {
            farmer_id: record.farmer_id,
            default_id: record.id,
            timestamp: now,
        });

        info!(farmer_id = %record.farmer_id, default_id = %record.id, "default resolved");
        Ok(record)
    }

    /// append to a default's contact trail
    pub fn add_contact(
        &self,
        uow: &mut UnitOfWork<'_>,
        default_id: &DefaultId,
        contact_method: ContactMethod,
        notes: String,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ContactHistory> {
        if notes.trim().is_empty() {
            return Err(CreditError::validation("contact notes must not be empty"));
        }
        let record = load_default(uow, default_id)?;

        let contact = ContactHistory {
            id: Uuid::new_v4(),
            default_id: record.id,
            farmer_id: record.farmer_id,
            contact_method,
            notes,
            contacted_by: actor.map(str::to_string),
            created_at: now,
        };
        uow.append_contact(contact.clone())?;

        debug!(default_id = %record.id, contact_id = %contact.id, "contact recorded");
        Ok(contact)
    }
}

fn load_default(uow: &UnitOfWork<'_>, default_id: &DefaultId) -> Result<DefaultRecord> {
    uow.default_record(default_id)?
        .ok_or_else(|| CreditError::not_found("default record", default_id))
}
