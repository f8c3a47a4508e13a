use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DefaultRecord, DefaultStatus};
use crate::config::DefaultPolicy;
use crate::errors::{CreditError, Result};
use crate::events::Event;
use crate::notifications::Notifier;
use crate::store::{CreditStore, UnitOfWork};
use crate::types::FarmerId;

/// what a detection pass did for one farmer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionReport {
    /// open default for every farmer found overdue, after the upsert
    pub records: Vec<DefaultRecord>,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// farmers skipped because their upsert failed
    pub failures: Vec<(FarmerId, CreditError)>,
}

/// batch scan for profiles past their settlement date
#[derive(Debug, Clone)]
pub struct DefaultDetector {
    policy: DefaultPolicy,
}

impl DefaultDetector {
    pub fn new(policy: DefaultPolicy) -> Self {
        Self { policy }
    }

    /// scan every profile, upserting one open default per overdue farmer
    pub fn run<S: CreditStore>(
        &self,
        store: &S,
        notifier: &Notifier,
        now: DateTime<Utc>,
    ) -> Result<DetectionReport> {
        let today = now.date_naive();
        let candidates: Vec<FarmerId> = store
            .profiles()?
            .into_iter()
            .filter(|p| p.is_settlement_overdue(today))
            .map(|p| p.farmer_id)
            .collect();

        let mut report = DetectionReport::default();

        for farmer_id in candidates {
            match store.transaction(farmer_id, |uow| self.detect(uow, now)) {
                Ok((Some((record, detection)), events)) => {
                    match detection {
                        Detection::Created => report.created += 1,
                        Detection::Updated => report.updated += 1,
                        Detection::Unchanged => report.unchanged += 1,
                    }
                    notifier.dispatch(store, &events);
                    report.records.push(record);
                }
                Ok((None, _)) => {}
                Err(error) => {
                    warn!(farmer_id = %farmer_id, error = %error, "default detection skipped farmer");
                    report.failures.push((farmer_id, error));
                }
            }
        }

        info!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            failures = report.failures.len(),
            "default detection finished"
        );
        Ok(report)
    }

    /// upsert the locked farmer's default; None when nothing is overdue
    pub fn detect(
        &self,
        uow: &mut UnitOfWork<'_>,
        now: DateTime<Utc>,
    ) -> Result<Option<(DefaultRecord, Detection)>> {
        let today = now.date_naive();
        let profile = uow.require_profile()?;

        // re-check under the lock, a repayment may have landed since the scan
        let settlement_date = match profile.next_settlement_date {
            Some(date) if profile.is_settlement_overdue(today) => date,
            _ => return Ok(None),
        };

        let days_overdue = u32::try_from((today - settlement_date).num_days())
            .map_err(|_| CreditError::validation("days overdue out of range"))?;
        let status = DefaultStatus::classify(days_overdue, &self.policy);
        let overdue_amount = profile.pending_deductions;

        match uow.open_default()? {
            Some(mut record) => {
                if record.overdue_amount == overdue_amount
                    && record.days_overdue == days_overdue
                    && record.status == status
                {
                    debug!(farmer_id = %profile.farmer_id, default_id = %record.id, "default unchanged");
                    return Ok(Some((record, Detection::Unchanged)));
                }

                let escalated = record.status != status;
                record.overdue_amount = overdue_amount;
                record.days_overdue = days_overdue;
                record.status = status;
                record.updated_at = now;
                uow.put_default(record.clone())?;

                if escalated {
                    uow.emit(detected_event(&record, now));
                    info!(
                        farmer_id = %record.farmer_id,
                        default_id = %record.id,
                        status = %record.status,
                        days_overdue,
                        "default escalated"
                    );
                }
                Ok(Some((record, Detection::Updated)))
            }
            None => {
                if !profile.is_active {
                    debug!(farmer_id = %profile.farmer_id, "inactive profile without open default skipped");
                    return Ok(None);
                }

                let record = DefaultRecord {
                    id: Uuid::new_v4(),
                    farmer_id: profile.farmer_id,
                    overdue_amount,
                    days_overdue,
                    status,
                    created_at: now,
                    updated_at: now,
                    resolved_at: None,
                };
                uow.put_default(record.clone())?;
                uow.emit(detected_event(&record, now));

                info!(
                    farmer_id = %record.farmer_id,
                    default_id = %record.id,
                    status = %record.status,
                    overdue_amount = %record.overdue_amount,
                    days_overdue,
                    "default recorded"
                );
                Ok(Some((record, Detection::Created)))
            }
        }
    }
}

fn detected_event(record: &DefaultRecord, now: DateTime<Utc>) -> Event {
    Event::DefaultDetected {
        farmer_id: record.farmer_id,
        default_id: record.id,
        overdue_amount: record.overdue_amount,
        days_overdue: record.days_overdue,
        status: record.status,
        timestamp: now,
    }
}
