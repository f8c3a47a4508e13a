use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::decimal::{Money, Percentage};
use crate::defaults::{
    ContactHistory, ContactMethod, DefaultDetector, DefaultRecord, DefaultStatus,
    DetectionReport, RecoveryAction, RecoveryActionStatus, RecoveryActionType, RecoveryWorkflow,
};
use crate::errors::{CreditError, Result};
use crate::events::Event;
use crate::ledger::{
    activity_by_day, CreditLedger, DailyActivity, LedgerEntry, LedgerOperation, LedgerRequest,
    ReconciliationReport,
};
use crate::limits::{CreditLimitCalculator, CreditQuote};
use crate::notifications::{NotificationDispatcher, Notifier};
use crate::purchases::{
    CancelledPurchase, CartLine, CartReceipt, CollectionOutcome, InventoryCatalog, Purchase,
    PurchaseReceipt, PurchaseReservation,
};
use crate::serialization::CreditStatementView;
use crate::state::CreditProfile;
use crate::store::{CreditStore, UnitOfWork};
use crate::types::{
    DefaultId, Farmer, FarmerId, ItemId, PackagingId, PaymentMethod, PurchaseId,
    RecoveryActionId, Reference, RepaymentMethod,
};

/// profile summary with what the farmer can borrow right now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditStatus {
    pub profile: CreditProfile,
    pub pending_payments: Money,
    /// zero while credit is suspended
    pub available_credit: Money,
    pub open_default: Option<DefaultRecord>,
}

/// the credit engine's public surface
pub struct CreditEngine<S: CreditStore> {
    store: S,
    catalog: Arc<dyn InventoryCatalog>,
    notifier: Notifier,
    config: EngineConfig,
    calculator: CreditLimitCalculator,
    ledger: CreditLedger,
    reservation: PurchaseReservation,
    detector: DefaultDetector,
    recovery: RecoveryWorkflow,
}

impl<S: CreditStore> CreditEngine<S> {
    /// create engine from a validated config
    pub fn new(
        store: S,
        catalog: Arc<dyn InventoryCatalog>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let calculator = CreditLimitCalculator::new(config.credit_policy.clone());
        let ledger = CreditLedger::new(config.credit_policy.settlement_cycle_days);
        let reservation = PurchaseReservation::new(
            calculator.clone(),
            ledger.clone(),
            config.utilization_alerts.clone(),
        );

        Ok(Self {
            store,
            catalog,
            notifier: Notifier::new(dispatcher),
            detector: DefaultDetector::new(config.default_policy.clone()),
            recovery: RecoveryWorkflow::new(),
            config,
            calculator,
            ledger,
            reservation,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// run one farmer transaction and dispatch its events once committed
    fn run<T, F>(&self, farmer_id: FarmerId, work: F) -> Result<T>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<T>,
    {
        let (value, events) = self.store.transaction(farmer_id, work)?;
        self.notifier.dispatch(&self.store, &events);
        Ok(value)
    }

    fn require_farmer(&self, farmer_id: &FarmerId) -> Result<Farmer> {
        self.store
            .farmer(farmer_id)?
            .ok_or_else(|| CreditError::not_found("farmer", farmer_id))
    }

    fn require_default(&self, default_id: &DefaultId) -> Result<DefaultRecord> {
        self.store
            .default_record(default_id)?
            .ok_or_else(|| CreditError::not_found("default record", default_id))
    }

    // credit

    pub fn quote_available_credit(
        &self,
        farmer_id: FarmerId,
        time: &SafeTimeProvider,
    ) -> Result<CreditQuote> {
        let now = time.now();
        let quote = self.run(farmer_id, |uow| self.calculator.quote(uow, now))?;
        debug!(
            farmer_id = %farmer_id,
            available = %quote.available_credit,
            pending = %quote.pending_payments,
            "credit quoted"
        );
        Ok(quote)
    }

    /// fund the profile up to its current capped limit
    pub fn grant_credit(
        &self,
        farmer_id: FarmerId,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<LedgerEntry> {
        let now = time.now();
        self.run(farmer_id, |uow| {
            let quote = self.calculator.quote(uow, now)?;
            if quote.capped_limit.is_zero() {
                return Err(CreditError::validation(format!(
                    "no pending payments to grant credit against for farmer {}",
                    farmer_id
                )));
            }

            let amount = quote.capped_limit - quote.current_balance;
            if !amount.is_positive() {
                return Err(CreditError::validation(format!(
                    "credit already granted up to the limit of {}",
                    quote.capped_limit
                )));
            }

            let entry = self.ledger.record_transaction(
                uow,
                LedgerRequest::new(LedgerOperation::Grant { amount })
                    .reference(Reference::CreditGrant)
                    .description(format!(
                        "Credit granted against pending payments of {}",
                        quote.pending_payments
                    ))
                    .created_by(actor),
                now,
            )?;
            uow.emit(Event::CreditGranted {
                farmer_id,
                amount: entry.net_change(),
                pending_payments: quote.pending_payments,
                timestamp: now,
            });
            Ok(entry)
        })
    }

    pub fn adjust_credit_limit(
        &self,
        farmer_id: FarmerId,
        percentage: Decimal,
        max_credit_amount: Money,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<LedgerEntry> {
        let percentage = Percentage::new(percentage).ok_or_else(|| {
            CreditError::validation(format!("percentage {} outside [0, 100]", percentage))
        })?;
        if max_credit_amount.is_negative() {
            return Err(CreditError::validation("max credit amount must be >= 0"));
        }

        let now = time.now();
        self.run(farmer_id, |uow| {
            let old_max = self.calculator.load_or_create(uow, now)?.max_credit_amount;
            let entry = self.ledger.record_transaction(
                uow,
                LedgerRequest::new(LedgerOperation::Adjust {
                    percentage,
                    max_credit_amount,
                })
                .reference(Reference::LimitAdjustment)
                .description(format!(
                    "Credit limit set to {} of pending payments, capped at {}",
                    percentage, max_credit_amount
                ))
                .created_by(actor),
                now,
            )?;
            uow.emit(Event::CreditLimitAdjusted {
                farmer_id,
                old_max,
                new_max: max_credit_amount,
                percentage,
                timestamp: now,
            });
            Ok(entry)
        })
    }

    pub fn repay_credit(
        &self,
        farmer_id: FarmerId,
        amount: Money,
        method: RepaymentMethod,
        reference: Option<String>,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<LedgerEntry> {
        let now = time.now();
        self.run(farmer_id, |uow| {
            self.record_repayment(uow, amount, method, Reference::Repayment(reference), actor, now)
        })
    }

    /// deduct everything pending from this cycle's milk payments
    pub fn settle_pending_deductions(
        &self,
        farmer_id: FarmerId,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<Option<LedgerEntry>> {
        let now = time.now();
        self.run(farmer_id, |uow| {
            let pending = uow.require_profile()?.pending_deductions;
            if pending.is_zero() {
                debug!(farmer_id = %farmer_id, "nothing pending to settle");
                return Ok(None);
            }
            self.record_repayment(
                uow,
                pending,
                RepaymentMethod::MilkDeduction,
                Reference::Settlement,
                actor,
                now,
            )
            .map(Some)
        })
    }

    fn record_repayment(
        &self,
        uow: &mut UnitOfWork<'_>,
        amount: Money,
        method: RepaymentMethod,
        reference: Reference,
        actor: Option<&str>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<LedgerEntry> {
        let entry = self.ledger.record_transaction(
            uow,
            LedgerRequest::new(LedgerOperation::Repay { amount })
                .reference(reference)
                .description(format!("Repayment via {}", method))
                .created_by(actor),
            now,
        )?;
        uow.emit(Event::CreditRepaid {
            farmer_id: entry.farmer_id,
            amount,
            method,
            balance_after: entry.balance_after,
            timestamp: now,
        });
        Ok(entry)
    }

    /// freeze or reactivate a profile; the only way back from suspension
    pub fn set_credit_active(
        &self,
        farmer_id: FarmerId,
        active: bool,
        reason: Option<String>,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<CreditProfile> {
        let now = time.now();
        self.run(farmer_id, |uow| {
            let mut profile = uow.require_profile()?;
            if profile.is_active == active {
                debug!(farmer_id = %farmer_id, active, "credit status unchanged");
                return Ok(profile);
            }

            if active {
                profile.reactivate(now);
            } else {
                profile.suspend(
                    reason.clone().unwrap_or_else(|| "Frozen by administrator".to_string()),
                    now,
                );
            }
            uow.put_profile(profile.clone())?;
            uow.emit(Event::CreditStatusChanged {
                farmer_id,
                active,
                reason,
                timestamp: now,
            });

            info!(farmer_id = %farmer_id, active, actor = actor.unwrap_or("system"), "credit status changed");
            Ok(profile)
        })
    }

    // purchases

    pub fn create_purchase(
        &self,
        farmer_id: FarmerId,
        item_id: ItemId,
        packaging_id: Option<PackagingId>,
        quantity: u32,
        method: PaymentMethod,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<PurchaseReceipt> {
        let line = CartLine {
            item_id,
            packaging_id,
            quantity,
        };
        self.create_cart_purchase(farmer_id, &[line], method, actor, time)?
            .into_single()
    }

    /// buy several lines together; the whole cart succeeds or none of it does
    pub fn create_cart_purchase(
        &self,
        farmer_id: FarmerId,
        lines: &[CartLine],
        method: PaymentMethod,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<CartReceipt> {
        let now = time.now();
        let priced = self.reservation.price_lines(self.catalog.as_ref(), lines)?;
        let receipt = self.run(farmer_id, |uow| {
            self.reservation.reserve(uow, &priced, method, actor, now)
        })?;
        self.reservation.release_stock(self.catalog.as_ref(), &priced);
        Ok(receipt)
    }

    pub fn confirm_collection(
        &self,
        purchase_id: PurchaseId,
        time: &SafeTimeProvider,
    ) -> Result<CollectionOutcome> {
        let purchase = self.require_purchase(&purchase_id)?;
        let now = time.now();
        self.run(purchase.farmer_id, |uow| {
            self.reservation.confirm_collection(uow, &purchase_id, now)
        })
    }

    pub fn cancel_purchase(
        &self,
        purchase_id: PurchaseId,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<CancelledPurchase> {
        let purchase = self.require_purchase(&purchase_id)?;
        let now = time.now();
        self.run(purchase.farmer_id, |uow| {
            self.reservation.cancel(uow, &purchase_id, actor, now)
        })
    }

    fn require_purchase(&self, purchase_id: &PurchaseId) -> Result<Purchase> {
        self.store
            .purchase(purchase_id)?
            .ok_or_else(|| CreditError::not_found("purchase", purchase_id))
    }

    pub fn get_purchase_history(&self, farmer_id: FarmerId) -> Result<Vec<Purchase>> {
        self.require_farmer(&farmer_id)?;
        self.store.purchases_for(&farmer_id)
    }

    // defaults and recovery

    pub fn identify_overdue_farmers(&self, time: &SafeTimeProvider) -> Result<DetectionReport> {
        self.detector.run(&self.store, &self.notifier, time.now())
    }

    pub fn create_recovery_action(
        &self,
        default_id: DefaultId,
        action_type: RecoveryActionType,
        notes: Option<String>,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<RecoveryAction> {
        let record = self.require_default(&default_id)?;
        let now = time.now();
        self.run(record.farmer_id, |uow| {
            self.recovery
                .create_action(uow, &default_id, action_type, notes, actor, now)
        })
    }

    pub fn update_recovery_action_status(
        &self,
        action_id: RecoveryActionId,
        status: RecoveryActionStatus,
        time: &SafeTimeProvider,
    ) -> Result<RecoveryAction> {
        let action = self
            .store
            .recovery_action(&action_id)?
            .ok_or_else(|| CreditError::not_found("recovery action", action_id))?;
        let now = time.now();
        self.run(action.farmer_id, |uow| {
            self.recovery.update_status(uow, &action_id, status, now)
        })
    }

    pub fn resolve_default(
        &self,
        default_id: DefaultId,
        notes: Option<String>,
        actor: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<DefaultRecord> {
        let record = self.require_default(&default_id)?;
        let now = time.now();
        self.run(record.farmer_id, |uow| {
            self.recovery.resolve(uow, &default_id, notes, actor, now)
        })
    }

    pub fn add_contact_history(
        &self,
        default_id: DefaultId,
        contact_method: ContactMethod,
        notes: String,
        contacted_by: Option<&str>,
        time: &SafeTimeProvider,
    ) -> Result<ContactHistory> {
        let record = self.require_default(&default_id)?;
        let now = time.now();
        self.run(record.farmer_id, |uow| {
            self.recovery
                .add_contact(uow, &default_id, contact_method, notes, contacted_by, now)
        })
    }

    pub fn get_default(&self, default_id: DefaultId) -> Result<DefaultRecord> {
        self.require_default(&default_id)
    }

    /// defaults, most days overdue first
    pub fn list_defaults(&self, status: Option<DefaultStatus>) -> Result<Vec<DefaultRecord>> {
        let mut records: Vec<DefaultRecord> = self
            .store
            .default_records()?
            .into_iter()
            .filter(|r| status.map(|s| r.status == s).unwrap_or(true))
            .collect();
        records.sort_by(|a, b| {
            b.days_overdue
                .cmp(&a.days_overdue)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(records)
    }

    pub fn get_recovery_actions(&self, default_id: DefaultId) -> Result<Vec<RecoveryAction>> {
        self.require_default(&default_id)?;
        self.store.recovery_actions(&default_id)
    }

    pub fn get_contact_history(&self, default_id: DefaultId) -> Result<Vec<ContactHistory>> {
        self.require_default(&default_id)?;
        self.store.contact_history(&default_id)
    }

    // reads and audit

    /// ledger in sequence order
    pub fn get_ledger(&self, farmer_id: FarmerId) -> Result<Vec<LedgerEntry>> {
        self.require_farmer(&farmer_id)?;
        self.store.ledger_entries(&farmer_id)
    }

    pub fn get_credit_status(&self, farmer_id: FarmerId) -> Result<CreditStatus> {
        let profile = self.require_profile(&farmer_id)?;
        let pending_payments = self.store.pending_collections_total(&farmer_id)?;
        let available_credit = if profile.is_active {
            CreditLimitCalculator::compute(&profile, pending_payments).available_credit
        } else {
            Money::ZERO
        };

        Ok(CreditStatus {
            open_default: self.store.open_default_for(&farmer_id)?,
            profile,
            pending_payments,
            available_credit,
        })
    }

    pub fn reconcile(&self, farmer_id: FarmerId) -> Result<ReconciliationReport> {
        let profile = self.require_profile(&farmer_id)?;
        let entries = self.store.ledger_entries(&farmer_id)?;
        let report = ReconciliationReport::build(&profile, &entries);
        if !report.is_consistent {
            info!(
                farmer_id = %farmer_id,
                discrepancy = %report.discrepancy(),
                "ledger does not reconcile with profile"
            );
        }
        Ok(report)
    }

    pub fn ledger_activity(&self, farmer_id: FarmerId) -> Result<Vec<DailyActivity>> {
        Ok(activity_by_day(&self.get_ledger(farmer_id)?))
    }

    pub fn statement(
        &self,
        farmer_id: FarmerId,
        time: &SafeTimeProvider,
    ) -> Result<CreditStatementView> {
        let farmer = self.require_farmer(&farmer_id)?;
        let profile = self.require_profile(&farmer_id)?;
        let quote = if profile.is_active {
            let pending = self.store.pending_collections_total(&farmer_id)?;
            Some(CreditLimitCalculator::compute(&profile, pending))
        } else {
            None
        };

        Ok(CreditStatementView::build(
            farmer.full_name,
            &profile,
            quote,
            &self.store.ledger_entries(&farmer_id)?,
            self.store.open_default_for(&farmer_id)?,
            time.now(),
        ))
    }

    fn require_profile(&self, farmer_id: &FarmerId) -> Result<CreditProfile> {
        self.store
            .profile(farmer_id)?
            .ok_or_else(|| CreditError::not_found("credit profile", farmer_id))
    }
}
