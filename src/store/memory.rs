use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::{DashMap, DashSet};
use tracing::debug;
use uuid::Uuid;

use crate::decimal::Money;
use crate::defaults::{ContactHistory, DefaultRecord, RecoveryAction};
use crate::errors::{CreditError, Result};
use crate::events::Event;
use crate::ledger::LedgerEntry;
use crate::purchases::Purchase;
use crate::state::CreditProfile;
use crate::store::{CreditStore, PendingWrites, StoreReader, UnitOfWork};
use crate::types::{
    Collection, CollectionId, CollectionStatus, DefaultId, Farmer, FarmerId, PurchaseId,
    RecoveryActionId, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    farmers: HashMap<FarmerId, Farmer>,
    profiles: HashMap<FarmerId, CreditProfile>,
    collections: Vec<Collection>,
    ledger: HashMap<FarmerId, Vec<LedgerEntry>>,
    purchases: HashMap<PurchaseId, Purchase>,
    defaults: HashMap<DefaultId, DefaultRecord>,
    actions: HashMap<RecoveryActionId, RecoveryAction>,
    contacts: Vec<ContactHistory>,
}

/// in-process store with one writer per farmer
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    farmer_locks: DashMap<FarmerId, Arc<Mutex<()>>>,
    fail_next_commit: AtomicBool,
    failing_farmers: DashSet<FarmerId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// register a farmer and return its id
    pub fn register_farmer(&self, full_name: &str) -> Result<FarmerId> {
        let farmer = Farmer {
            id: Uuid::new_v4(),
            user_id: UserId::new_v4(),
            full_name: full_name.to_string(),
        };
        let id = farmer.id;
        self.write()?.farmers.insert(id, farmer);
        Ok(id)
    }

    /// record a milk collection awaiting payment
    pub fn record_collection(&self, farmer_id: FarmerId, amount: Money) -> Result<CollectionId> {
        let collection = Collection {
            id: Uuid::new_v4(),
            farmer_id,
            total_amount: amount,
            status: CollectionStatus::Pending,
        };
        let id = collection.id;
        self.write()?.collections.push(collection);
        Ok(id)
    }

    pub fn mark_collection_paid(&self, collection_id: &CollectionId) -> Result<()> {
        let mut tables = self.write()?;
        let collection = tables
            .collections
            .iter_mut()
            .find(|c| c.id == *collection_id)
            .ok_or_else(|| CreditError::not_found("collection", collection_id))?;
        collection.status = CollectionStatus::Paid;
        Ok(())
    }

    /// make the next commit fail as if the database rejected it
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// make every commit for this farmer fail until cleared
    pub fn fail_commits_for(&self, farmer_id: FarmerId) {
        self.failing_farmers.insert(farmer_id);
    }

    pub fn clear_failures(&self) {
        self.fail_next_commit.store(false, Ordering::SeqCst);
        self.failing_farmers.clear();
    }

    /// overwrite a profile outside the ledger, for seeding fixtures
    pub fn seed_profile(&self, profile: CreditProfile) -> Result<()> {
        self.write()?.profiles.insert(profile.farmer_id, profile);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| CreditError::persistence("store tables lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| CreditError::persistence("store tables lock poisoned"))
    }

    fn farmer_lock(&self, farmer_id: FarmerId) -> Arc<Mutex<()>> {
        self.farmer_locks.entry(farmer_id).or_default().clone()
    }

    fn commit(&self, farmer_id: FarmerId, writes: PendingWrites) -> Result<Vec<Event>> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst)
            || self.failing_farmers.contains(&farmer_id)
        {
            return Err(CreditError::persistence(format!(
                "commit rejected for farmer {}",
                farmer_id
            )));
        }

        let mut tables = self.write()?;

        // constraints are checked before anything is applied
        let last = tables
            .ledger
            .get(&farmer_id)
            .and_then(|entries| entries.last())
            .map(|e| e.sequence)
            .unwrap_or(0);
        if let Some(first) = writes.entries.first() {
            if first.sequence != last + 1 {
                return Err(CreditError::persistence(format!(
                    "ledger sequence conflict for farmer {}: head {}, incoming {}",
                    farmer_id, last, first.sequence
                )));
            }
        }

        for record in writes.defaults.iter().filter(|d| !d.status.is_resolved()) {
            let duplicate = tables.defaults.values().any(|existing| {
                existing.farmer_id == record.farmer_id
                    && existing.id != record.id
                    && !existing.status.is_resolved()
            });
            if duplicate {
                return Err(CreditError::persistence(format!(
                    "farmer {} already has an open default record",
                    record.farmer_id
                )));
            }
        }

        if let Some(profile) = writes.profile {
            tables.profiles.insert(profile.farmer_id, profile);
        }
        if !writes.entries.is_empty() {
            tables
                .ledger
                .entry(farmer_id)
                .or_default()
                .extend(writes.entries);
        }
        for purchase in writes.purchases {
            tables.purchases.insert(purchase.id, purchase);
        }
        for record in writes.defaults {
            tables.defaults.insert(record.id, record);
        }
        for action in writes.actions {
            tables.actions.insert(action.id, action);
        }
        tables.contacts.extend(writes.contacts);

        Ok(writes.events)
    }
}

impl StoreReader for InMemoryStore {
    fn farmer(&self, farmer_id: &FarmerId) -> Result<Option<Farmer>> {
        Ok(self.read()?.farmers.get(farmer_id).cloned())
    }

    fn profile(&self, farmer_id: &FarmerId) -> Result<Option<CreditProfile>> {
        Ok(self.read()?.profiles.get(farmer_id).cloned())
    }

    fn profiles(&self) -> Result<Vec<CreditProfile>> {
        let mut profiles: Vec<_> = self.read()?.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }

    fn pending_collections_total(&self, farmer_id: &FarmerId) -> Result<Money> {
        Ok(self
            .read()?
            .collections
            .iter()
            .filter(|c| c.farmer_id == *farmer_id && c.status != CollectionStatus::Paid)
            .map(|c| c.total_amount)
            .sum())
    }

    fn ledger_entries(&self, farmer_id: &FarmerId) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .read()?
            .ledger
            .get(farmer_id)
            .cloned()
            .unwrap_or_default())
    }

    fn purchase(&self, purchase_id: &PurchaseId) -> Result<Option<Purchase>> {
        Ok(self.read()?.purchases.get(purchase_id).cloned())
    }

    fn purchases_for(&self, farmer_id: &FarmerId) -> Result<Vec<Purchase>> {
        let mut purchases: Vec<_> = self
            .read()?
            .purchases
            .values()
            .filter(|p| p.farmer_id == *farmer_id)
            .cloned()
            .collect();
        purchases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(purchases)
    }

    fn default_record(&self, default_id: &DefaultId) -> Result<Option<DefaultRecord>> {
        Ok(self.read()?.defaults.get(default_id).cloned())
    }

    fn default_records(&self) -> Result<Vec<DefaultRecord>> {
        Ok(self.read()?.defaults.values().cloned().collect())
    }

    fn open_default_for(&self, farmer_id: &FarmerId) -> Result<Option<DefaultRecord>> {
        Ok(self
            .read()?
            .defaults
            .values()
            .find(|d| d.farmer_id == *farmer_id && !d.status.is_resolved())
            .cloned())
    }

    fn recovery_action(&self, action_id: &RecoveryActionId) -> Result<Option<RecoveryAction>> {
        Ok(self.read()?.actions.get(action_id).cloned())
    }

    fn recovery_actions(&self, default_id: &DefaultId) -> Result<Vec<RecoveryAction>> {
        let mut actions: Vec<_> = self
            .read()?
            .actions
            .values()
            .filter(|a| a.default_id == *default_id)
            .cloned()
            .collect();
        actions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(actions)
    }

    fn contact_history(&self, default_id: &DefaultId) -> Result<Vec<ContactHistory>> {
        let mut contacts: Vec<_> = self
            .read()?
            .contacts
            .iter()
            .filter(|c| c.default_id == *default_id)
            .cloned()
            .collect();
        contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contacts)
    }
}

impl CreditStore for InMemoryStore {
    fn transaction<T, F>(&self, farmer_id: FarmerId, work: F) -> Result<(T, Vec<Event>)>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<T>,
    {
        let lock = self.farmer_lock(farmer_id);
        // guards no data, so a poisoned lock is still usable
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let profile = self.profile(&farmer_id)?;
        let last_sequence = self
            .ledger_entries(&farmer_id)?
            .last()
            .map(|e| e.sequence)
            .unwrap_or(0);

        let mut uow = UnitOfWork::begin(self, farmer_id, profile, last_sequence);
        let value = work(&mut uow)?;
        let events = self.commit(farmer_id, uow.into_writes())?;

        debug!(farmer_id = %farmer_id, events = events.len(), "transaction committed");
        Ok((value, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CreditPolicy;
    use chrono::{TimeZone, Utc};

    fn profile_for(farmer_id: FarmerId) -> CreditProfile {
        CreditProfile::new(
            farmer_id,
            &CreditPolicy::default(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_pending_collections_exclude_paid() {
        let store = InMemoryStore::new();
        let farmer = store.register_farmer("Wanjiku").unwrap();
        store.record_collection(farmer, Money::from_major(1_000)).unwrap();
        let paid = store.record_collection(farmer, Money::from_major(700)).unwrap();
        store.record_collection(farmer, Money::from_major(1_500)).unwrap();
        store.mark_collection_paid(&paid).unwrap();

        assert_eq!(
            store.pending_collections_total(&farmer).unwrap(),
            Money::from_major(2_500)
        );
    }

    #[test]
    fn test_failed_work_discards_staged_writes() {
        let store = InMemoryStore::new();
        let farmer = store.register_farmer("Otieno").unwrap();

        let result: Result<((), Vec<Event>)> = store.transaction(farmer, |uow| {
            uow.put_profile(profile_for(farmer))?;
            Err(CreditError::validation("abort"))
        });

        assert!(result.is_err());
        assert!(store.profile(&farmer).unwrap().is_none());
    }

    #[test]
    fn test_panicking_work_does_not_lock_out_farmer() {
        let store = InMemoryStore::new();
        let farmer = store.register_farmer("Kiprop").unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<((), Vec<Event>)> = store.transaction(farmer, |uow| {
                uow.put_profile(profile_for(farmer))?;
                panic!("work failed mid-transaction");
            });
        }));
        assert!(outcome.is_err());
        assert!(store.profile(&farmer).unwrap().is_none());

        store
            .transaction(farmer, |uow| uow.put_profile(profile_for(farmer)))
            .unwrap();
        assert!(store.profile(&farmer).unwrap().is_some());
    }

    #[test]
    fn test_injected_commit_failure_rolls_back() {
        let store = InMemoryStore::new();
        let farmer = store.register_farmer("Achieng").unwrap();
        store.fail_next_commit();

        let result = store.transaction(farmer, |uow| uow.put_profile(profile_for(farmer)));
        assert!(matches!(result, Err(CreditError::Persistence { .. })));
        assert!(store.profile(&farmer).unwrap().is_none());

        // the flag is consumed by the failed commit
        store
            .transaction(farmer, |uow| uow.put_profile(profile_for(farmer)))
            .unwrap();
        assert!(store.profile(&farmer).unwrap().is_some());
    }

    #[test]
    fn test_writes_for_other_farmers_are_rejected() {
        let store = InMemoryStore::new();
        let farmer = store.register_farmer("Kamau").unwrap();
        let other = store.register_farmer("Njeri").unwrap();

        let result = store.transaction(farmer, |uow| uow.put_profile(profile_for(other)));
        assert!(matches!(result, Err(CreditError::Persistence { .. })));
    }
}
