pub mod inventory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::UtilizationAlerts;
use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::events::Event;
use crate::ledger::{CreditLedger, LedgerEntry, LedgerOperation, LedgerRequest};
use crate::limits::{CreditLimitCalculator, CreditQuote};
use crate::state::CreditProfile;
use crate::store::UnitOfWork;
use crate::types::{
    FarmerId, ItemId, LedgerEntryId, PackagingId, PaymentMethod, PurchaseId, PurchaseStatus,
    Reference,
};

pub use inventory::{InMemoryCatalog, InventoryCatalog, InventoryItem, Packaging};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub farmer_id: FarmerId,
    pub item_id: ItemId,
    pub packaging_id: Option<PackagingId>,
    pub item_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub status: PurchaseStatus,
    /// `used` entry funding a credit purchase
    pub credit_transaction_id: Option<LedgerEntryId>,
    pub purchased_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// one requested line of a cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub packaging_id: Option<PackagingId>,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(item_id: ItemId, quantity: u32) -> Self {
        Self {
            item_id,
            packaging_id: None,
            quantity,
        }
    }

    pub fn with_packaging(mut self, packaging_id: PackagingId) -> Self {
        self.packaging_id = Some(packaging_id);
        self
    }
}

/// cart line resolved against the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub item_id: ItemId,
    pub packaging_id: Option<PackagingId>,
    pub item_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub total: Money,
    pub credit_eligible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub purchase: Purchase,
    pub transaction: Option<LedgerEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartReceipt {
    pub purchases: Vec<Purchase>,
    pub transactions: Vec<LedgerEntry>,
    pub total_amount: Money,
}

impl CartReceipt {
    /// split a single-line cart into its purchase and ledger entry
    pub fn into_single(mut self) -> Result<PurchaseReceipt> {
        if self.purchases.len() != 1 {
            return Err(CreditError::validation(format!(
                "expected one purchase, cart produced {}",
                self.purchases.len()
            )));
        }
        let purchase = self.purchases.remove(0);
        Ok(PurchaseReceipt {
            purchase,
            transaction: self.transactions.pop(),
        })
    }
}

/// result of confirming collection
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOutcome {
    Confirmed(Purchase),
    AlreadyCompleted(Purchase),
}

impl CollectionOutcome {
    pub fn purchase(&self) -> &Purchase {
        match self {
            CollectionOutcome::Confirmed(p) | CollectionOutcome::AlreadyCompleted(p) => p,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelledPurchase {
    pub purchase: Purchase,
    /// `repaid` entry returning the reserved credit
    pub refund: Option<LedgerEntry>,
}

/// warning event for a profile whose spent share crossed an alert threshold
pub fn utilization_warning(
    profile: &CreditProfile,
    alerts: &UtilizationAlerts,
    now: DateTime<Utc>,
) -> Option<Event> {
    let utilization = profile.utilization()?;

    if utilization > alerts.over_limit_percentage.as_decimal() {
        Some(Event::OverLimitWarning {
            farmer_id: profile.farmer_id,
            total_used: profile.total_credit_used,
            max_credit_amount: profile.max_credit_amount,
            timestamp: now,
        })
    } else if utilization > alerts.low_credit_percentage.as_decimal() {
        Some(Event::LowCreditWarning {
            farmer_id: profile.farmer_id,
            balance: profile.current_credit_balance,
            max_credit_amount: profile.max_credit_amount,
            timestamp: now,
        })
    } else {
        None
    }
}

/// reserves credit for purchases and tracks them to collection
#[derive(Debug, Clone)]
pub struct PurchaseReservation {
    calculator: CreditLimitCalculator,
    ledger: CreditLedger,
    alerts: UtilizationAlerts,
}

impl PurchaseReservation {
    pub fn new(
        calculator: CreditLimitCalculator,
        ledger: CreditLedger,
        alerts: UtilizationAlerts,
    ) -> Self {
        Self {
            calculator,
            ledger,
            alerts,
        }
    }

    /// resolve prices and credit eligibility; packaging overrides the item
    pub fn price_lines(
        &self,
        catalog: &dyn InventoryCatalog,
        lines: &[CartLine],
    ) -> Result<Vec<PricedLine>> {
        if lines.is_empty() {
            return Err(CreditError::validation("cart is empty"));
        }

        lines
            .iter()
            .map(|line| {
                if line.quantity == 0 {
                    return Err(CreditError::validation("quantity must be at least 1"));
                }

                let item = catalog
                    .get_item(&line.item_id)?
                    .ok_or_else(|| CreditError::not_found("item", line.item_id))?;

                let (unit_price, credit_eligible) = match line.packaging_id {
                    Some(packaging_id) => {
                        let packaging = catalog
                            .get_packaging(&line.item_id)?
                            .into_iter()
                            .find(|p| p.id == packaging_id)
                            .ok_or_else(|| CreditError::not_found("packaging", packaging_id))?;
                        (packaging.price_per_unit, packaging.is_credit_eligible)
                    }
                    None => (item.price_per_unit, item.is_credit_eligible),
                };

                Ok(PricedLine {
                    item_id: item.id,
                    packaging_id: line.packaging_id,
                    item_name: item.name,
                    quantity: line.quantity,
                    unit_price,
                    total: unit_price * line.quantity,
                    credit_eligible,
                })
            })
            .collect()
    }

    /// create purchases for a priced cart, all or nothing
    pub fn reserve(
        &self,
        uow: &mut UnitOfWork<'_>,
        lines: &[PricedLine],
        method: PaymentMethod,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CartReceipt> {
        let total_amount: Money = lines.iter().map(|l| l.total).sum();

        match method {
            PaymentMethod::Credit => {
                if let Some(line) = lines.iter().find(|l| !l.credit_eligible) {
                    return Err(CreditError::NotEligible {
                        message: format!("{} cannot be bought on credit", line.item_name),
                    });
                }

                let quote = self.calculator.quote(uow, now)?;
                self.ensure_covers(&quote, total_amount)?;
                self.reserve_on_credit(uow, lines, total_amount, actor, now)
            }
            PaymentMethod::Cash => {
                let farmer_id = uow.farmer_id();
                if uow.reader().farmer(&farmer_id)?.is_none() {
                    return Err(CreditError::not_found("farmer", farmer_id));
                }

                let mut purchases = Vec::with_capacity(lines.len());
                for line in lines {
                    let purchase = new_purchase(
                        farmer_id,
                        line,
                        PaymentMethod::Cash,
                        PurchaseStatus::Completed,
                        actor,
                        now,
                    );
                    uow.put_purchase(purchase.clone())?;
                    purchases.push(purchase);
                }

                info!(farmer_id = %farmer_id, total = %total_amount, lines = lines.len(), "cash purchase recorded");
                Ok(CartReceipt {
                    purchases,
                    transactions: Vec::new(),
                    total_amount,
                })
            }
        }
    }

    fn ensure_covers(&self, quote: &CreditQuote, total: Money) -> Result<()> {
        if !quote.covers(total) {
            return Err(CreditError::InsufficientCredit {
                available: quote.available_credit,
                requested: total,
            });
        }
        Ok(())
    }

    fn reserve_on_credit(
        &self,
        uow: &mut UnitOfWork<'_>,
        lines: &[PricedLine],
        total_amount: Money,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CartReceipt> {
        let farmer_id = uow.farmer_id();
        let mut purchases = Vec::with_capacity(lines.len());
        let mut transactions = Vec::with_capacity(lines.len());

        for line in lines {
            let mut purchase = new_purchase(
                farmer_id,
                line,
                PaymentMethod::Credit,
                PurchaseStatus::PendingCollection,
                actor,
                now,
            );

            let entry = self.ledger.record_transaction(
                uow,
                LedgerRequest::new(LedgerOperation::Use {
                    amount: purchase.total_amount,
                })
                .reference(Reference::Purchase(purchase.id))
                .description(format!("{} x{}", line.item_name, line.quantity))
                .created_by(actor),
                now,
            )?;

            purchase.credit_transaction_id = Some(entry.id);
            uow.put_purchase(purchase.clone())?;
            uow.emit(Event::CreditUsed {
                farmer_id,
                purchase_id: purchase.id,
                amount: purchase.total_amount,
                item_name: purchase.item_name.clone(),
                balance_after: entry.balance_after,
                timestamp: now,
            });

            purchases.push(purchase);
            transactions.push(entry);
        }

        let profile = uow.require_profile()?;
        if let Some(warning) = utilization_warning(&profile, &self.alerts, now) {
            uow.emit(warning);
        }

        info!(
            farmer_id = %farmer_id,
            total = %total_amount,
            lines = lines.len(),
            balance_after = %profile.current_credit_balance,
            "credit purchase reserved"
        );

        Ok(CartReceipt {
            purchases,
            transactions,
            total_amount,
        })
    }

    /// mark a pending purchase collected; repeated confirmation is a no-op
    pub fn confirm_collection(
        &self,
        uow: &mut UnitOfWork<'_>,
        purchase_id: &PurchaseId,
        now: DateTime<Utc>,
    ) -> Result<CollectionOutcome> {
        let mut purchase = uow
            .purchase(purchase_id)?
            .ok_or_else(|| CreditError::not_found("purchase", purchase_id))?;

        match purchase.status {
            PurchaseStatus::Completed => Ok(CollectionOutcome::AlreadyCompleted(purchase)),
            PurchaseStatus::Cancelled => Err(CreditError::InvalidTransition {
                entity: "purchase",
                from: purchase.status.to_string(),
                to: PurchaseStatus::Completed.to_string(),
            }),
            PurchaseStatus::PendingCollection => {
                purchase.status = PurchaseStatus::Completed;
                purchase.updated_at = now;
                uow.put_purchase(purchase.clone())?;
                uow.emit(Event::PurchaseCollected {
                    farmer_id: purchase.farmer_id,
                    purchase_id: purchase.id,
                    timestamp: now,
                });

                info!(purchase_id = %purchase.id, farmer_id = %purchase.farmer_id, "purchase collected");
                Ok(CollectionOutcome::Confirmed(purchase))
            }
        }
    }

    /// cancel an uncollected purchase and refund any credit it reserved
    pub fn cancel(
        &self,
        uow: &mut UnitOfWork<'_>,
        purchase_id: &PurchaseId,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CancelledPurchase> {
        let mut purchase = uow
            .purchase(purchase_id)?
            .ok_or_else(|| CreditError::not_found("purchase", purchase_id))?;

        if purchase.status != PurchaseStatus::PendingCollection {
            return Err(CreditError::InvalidTransition {
                entity: "purchase",
                from: purchase.status.to_string(),
                to: PurchaseStatus::Cancelled.to_string(),
            });
        }

        let refund = match purchase.payment_method {
            PaymentMethod::Credit => Some(self.ledger.record_transaction(
                uow,
                LedgerRequest::new(LedgerOperation::Repay {
                    amount: purchase.total_amount,
                })
                .reference(Reference::Purchase(purchase.id))
                .description(format!("refund for cancelled {}", purchase.item_name))
                .created_by(actor),
                now,
            )?),
            PaymentMethod::Cash => None,
        };

        purchase.status = PurchaseStatus::Cancelled;
        purchase.updated_at = now;
        uow.put_purchase(purchase.clone())?;

        info!(
            purchase_id = %purchase.id,
            farmer_id = %purchase.farmer_id,
            refunded = refund.is_some(),
            "purchase cancelled"
        );
        Ok(CancelledPurchase { purchase, refund })
    }

    /// decrement catalog stock after commit; failures are logged only
    pub fn release_stock(&self, catalog: &dyn InventoryCatalog, lines: &[PricedLine]) {
        for line in lines {
            if let Err(error) = catalog.decrement_stock(&line.item_id, line.quantity) {
                warn!(
                    item_id = %line.item_id,
                    quantity = line.quantity,
                    error = %error,
                    "stock decrement failed, purchase kept"
                );
            }
        }
    }
}

fn new_purchase(
    farmer_id: FarmerId,
    line: &PricedLine,
    payment_method: PaymentMethod,
    status: PurchaseStatus,
    actor: Option<&str>,
    now: DateTime<Utc>,
) -> Purchase {
    Purchase {
        id: Uuid::new_v4(),
        farmer_id,
        item_id: line.item_id,
        packaging_id: line.packaging_id,
        item_name: line.item_name.clone(),
        quantity: line.quantity,
        unit_price: line.unit_price,
        total_amount: line.total,
        payment_method,
        status,
        credit_transaction_id: None,
        purchased_by: actor.map(str::to_string),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreditPolicy;
    use crate::store::{CreditStore, InMemoryStore, StoreReader};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 8, 30, 0).unwrap()
    }

    fn reservation() -> PurchaseReservation {
        PurchaseReservation::new(
            CreditLimitCalculator::new(CreditPolicy::default()),
            CreditLedger::new(30),
            UtilizationAlerts::default(),
        )
    }

    struct Fixture {
        store: InMemoryStore,
        catalog: InMemoryCatalog,
        farmer: FarmerId,
        feed: ItemId,
        dewormer: ItemId,
    }

    /// farmer with 1200 spendable and 2500 of unpaid collections
    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let farmer = store.register_farmer("Nyambura").unwrap();
        store.record_collection(farmer, Money::from_major(1_000)).unwrap();
        store.record_collection(farmer, Money::from_major(1_500)).unwrap();
        let mut profile = CreditProfile::new(farmer, &CreditPolicy::default(), now());
        profile.current_credit_balance = Money::from_major(1_200);
        store.seed_profile(profile).unwrap();

        let catalog = InMemoryCatalog::new();
        let feed = catalog.add_item("Dairy meal", Money::from_major(500), true, 20).unwrap();
        let dewormer = catalog.add_item("Dewormer", Money::from_major(750), false, 20).unwrap();

        Fixture {
            store,
            catalog,
            farmer,
            feed,
            dewormer,
        }
    }

    fn buy(fx: &Fixture, lines: &[CartLine], method: PaymentMethod) -> Result<CartReceipt> {
        let reservation = reservation();
        let priced = reservation.price_lines(&fx.catalog, lines)?;
        fx.store
            .transaction(fx.farmer, |uow| {
                reservation.reserve(uow, &priced, method, Some("agrovet-01"), now())
            })
            .map(|(receipt, _)| receipt)
    }

    #[test]
    fn test_credit_purchase_links_ledger_entry() {
        let fx = fixture();
        let receipt = buy(&fx, &[CartLine::new(fx.feed, 2)], PaymentMethod::Credit).unwrap();

        let purchase = &receipt.purchases[0];
        assert_eq!(purchase.status, PurchaseStatus::PendingCollection);
        assert_eq!(purchase.total_amount, Money::from_major(1_000));
        assert_eq!(purchase.credit_transaction_id, Some(receipt.transactions[0].id));
        assert_eq!(
            receipt.transactions[0].reference,
            Some(Reference::Purchase(purchase.id))
        );

        let profile = fx.store.profile(&fx.farmer).unwrap().unwrap();
        assert_eq!(profile.current_credit_balance, Money::from_major(200));
    }

    #[test]
    fn test_ineligible_item_rejected_for_credit_only() {
        let fx = fixture();
        let err = buy(&fx, &[CartLine::new(fx.dewormer, 1)], PaymentMethod::Credit).unwrap_err();
        assert!(matches!(err, CreditError::NotEligible { .. }));

        let receipt = buy(&fx, &[CartLine::new(fx.dewormer, 1)], PaymentMethod::Cash).unwrap();
        assert_eq!(receipt.purchases[0].status, PurchaseStatus::Completed);
        assert!(receipt.transactions.is_empty());
    }

    #[test]
    fn test_packaging_overrides_item_price_and_eligibility() {
        let fx = fixture();
        let sachet = fx
            .catalog
            .add_packaging(fx.dewormer, "10ml sachet", Money::from_major(150), true)
            .unwrap();

        let receipt = buy(
            &fx,
            &[CartLine::new(fx.dewormer, 2).with_packaging(sachet)],
            PaymentMethod::Credit,
        )
        .unwrap();
        assert_eq!(receipt.total_amount, Money::from_major(300));
    }

    #[test]
    fn test_cart_over_available_credit_rejected_whole() {
        let fx = fixture();
        let err = buy(
            &fx,
            &[CartLine::new(fx.feed, 2), CartLine::new(fx.feed, 3)],
            PaymentMethod::Credit,
        )
        .unwrap_err();

        assert_eq!(
            err,
            CreditError::InsufficientCredit {
                available: Money::from_major(1_200),
                requested: Money::from_major(2_500),
            }
        );
        assert!(fx.store.purchases_for(&fx.farmer).unwrap().is_empty());
        assert!(fx.store.ledger_entries(&fx.farmer).unwrap().is_empty());
    }

    #[test]
    fn test_commit_failure_leaves_no_orphan_purchase() {
        let fx = fixture();
        fx.store.fail_next_commit();
        let err = buy(&fx, &[CartLine::new(fx.feed, 1)], PaymentMethod::Credit).unwrap_err();

        assert!(matches!(err, CreditError::Persistence { .. }));
        assert!(fx.store.purchases_for(&fx.farmer).unwrap().is_empty());
        assert_eq!(
            fx.store.profile(&fx.farmer).unwrap().unwrap().current_credit_balance,
            Money::from_major(1_200)
        );
    }

    #[test]
    fn test_confirm_collection_is_idempotent() {
        let fx = fixture();
        let receipt = buy(&fx, &[CartLine::new(fx.feed, 1)], PaymentMethod::Credit).unwrap();
        let purchase_id = receipt.purchases[0].id;
        let reservation = reservation();

        let (first, events) = fx
            .store
            .transaction(fx.farmer, |uow| reservation.confirm_collection(uow, &purchase_id, now()))
            .unwrap();
        assert!(matches!(first, CollectionOutcome::Confirmed(_)));
        assert_eq!(events.len(), 1);

        let (second, events) = fx
            .store
            .transaction(fx.farmer, |uow| reservation.confirm_collection(uow, &purchase_id, now()))
            .unwrap();
        assert!(matches!(second, CollectionOutcome::AlreadyCompleted(_)));
        assert!(events.is_empty());
    }

    #[test]
    fn test_cancel_refunds_reserved_credit() {
        let fx = fixture();
        let receipt = buy(&fx, &[CartLine::new(fx.feed, 2)], PaymentMethod::Credit).unwrap();
        let purchase_id = receipt.purchases[0].id;
        let reservation = reservation();

        let (cancelled, _) = fx
            .store
            .transaction(fx.farmer, |uow| reservation.cancel(uow, &purchase_id, None, now()))
            .unwrap();

        assert_eq!(cancelled.purchase.status, PurchaseStatus::Cancelled);
        assert_eq!(
            cancelled.refund.map(|e| e.transaction_type),
            Some(crate::types::TransactionType::Repaid)
        );
        let profile = fx.store.profile(&fx.farmer).unwrap().unwrap();
        assert_eq!(profile.current_credit_balance, Money::from_major(1_200));
        assert_eq!(profile.pending_deductions, Money::ZERO);

        let err = fx
            .store
            .transaction(fx.farmer, |uow| reservation.confirm_collection(uow, &purchase_id, now()))
            .unwrap_err();
        assert!(matches!(err, CreditError::InvalidTransition { .. }));
    }

    #[test]
    fn test_utilization_warning_thresholds() {
        let alerts = UtilizationAlerts::default();
        let mut profile = CreditProfile::new(Uuid::new_v4(), &CreditPolicy::default(), now());

        profile.current_credit_balance = Money::from_major(20_000);
        assert!(utilization_warning(&profile, &alerts, now()).is_none());

        profile.current_credit_balance = Money::from_major(15_000);
        assert!(matches!(
            utilization_warning(&profile, &alerts, now()),
            Some(Event::LowCreditWarning { .. })
        ));

        profile.current_credit_balance = Money::from_major(5_000);
        assert!(matches!(
            utilization_warning(&profile, &alerts, now()),
            Some(Event::OverLimitWarning { .. })
        ));
    }

    #[test]
    fn test_release_stock_swallows_failures() {
        let fx = fixture();
        let reservation = reservation();
        let priced = reservation
            .price_lines(&fx.catalog, &[CartLine::new(fx.feed, 3)])
            .unwrap();

        fx.catalog.fail_decrements(true);
        reservation.release_stock(&fx.catalog, &priced);
        assert_eq!(fx.catalog.stock(&fx.feed).unwrap(), Some(20));

        fx.catalog.fail_decrements(false);
        reservation.release_stock(&fx.catalog, &priced);
        assert_eq!(fx.catalog.stock(&fx.feed).unwrap(), Some(17));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let fx = fixture();
        let err = reservation()
            .price_lines(&fx.catalog, &[CartLine::new(fx.feed, 0)])
            .unwrap_err();
        assert!(matches!(err, CreditError::Validation { .. }));
    }
}
