pub mod memory;

use crate::decimal::Money;
use crate::defaults::{ContactHistory, DefaultRecord, RecoveryAction};
use crate::errors::{CreditError, Result};
use crate::events::{Event, EventStore};
use crate::ledger::LedgerEntry;
use crate::purchases::Purchase;
use crate::state::CreditProfile;
use crate::types::{DefaultId, Farmer, FarmerId, PurchaseId, RecoveryActionId};

pub use memory::InMemoryStore;

/// committed-state reads
pub trait StoreReader: Send + Sync {
    fn farmer(&self, farmer_id: &FarmerId) -> Result<Option<Farmer>>;

    fn profile(&self, farmer_id: &FarmerId) -> Result<Option<CreditProfile>>;

    fn profiles(&self) -> Result<Vec<CreditProfile>>;

    /// sum of the farmer's collections not yet marked paid
    fn pending_collections_total(&self, farmer_id: &FarmerId) -> Result<Money>;

    /// ledger entries in sequence order
    fn ledger_entries(&self, farmer_id: &FarmerId) -> Result<Vec<LedgerEntry>>;

    fn purchase(&self, purchase_id: &PurchaseId) -> Result<Option<Purchase>>;

    fn purchases_for(&self, farmer_id: &FarmerId) -> Result<Vec<Purchase>>;

    fn default_record(&self, default_id: &DefaultId) -> Result<Option<DefaultRecord>>;

    fn default_records(&self) -> Result<Vec<DefaultRecord>>;

    /// the farmer's single non-resolved default, if any
    fn open_default_for(&self, farmer_id: &FarmerId) -> Result<Option<DefaultRecord>>;

    fn recovery_action(&self, action_id: &RecoveryActionId) -> Result<Option<RecoveryAction>>;

    fn recovery_actions(&self, default_id: &DefaultId) -> Result<Vec<RecoveryAction>>;

    fn contact_history(&self, default_id: &DefaultId) -> Result<Vec<ContactHistory>>;
}

/// transactional store with per-farmer write serialization
pub trait CreditStore: StoreReader {
    /// run `work` as one atomic unit under the farmer's write lock,
    /// returning its value and the committed outbox events
    fn transaction<T, F>(&self, farmer_id: FarmerId, work: F) -> Result<(T, Vec<Event>)>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<T>;
}

/// writes staged by a unit of work, applied together on commit
#[derive(Debug, Default)]
pub struct PendingWrites {
    pub profile: Option<CreditProfile>,
    pub entries: Vec<LedgerEntry>,
    pub purchases: Vec<Purchase>,
    pub defaults: Vec<DefaultRecord>,
    pub actions: Vec<RecoveryAction>,
    pub contacts: Vec<ContactHistory>,
    pub events: Vec<Event>,
}

/// staged changes for one farmer, read-your-writes over committed state
pub struct UnitOfWork<'a> {
    reader: &'a dyn StoreReader,
    farmer_id: FarmerId,
    profile: Option<CreditProfile>,
    profile_dirty: bool,
    last_sequence: u64,
    entries: Vec<LedgerEntry>,
    purchases: Vec<Purchase>,
    defaults: Vec<DefaultRecord>,
    actions: Vec<RecoveryAction>,
    contacts: Vec<ContactHistory>,
    events: EventStore,
}

impl<'a> UnitOfWork<'a> {
    /// open a unit of work; the caller must already hold the farmer's lock
    pub fn begin(
        reader: &'a dyn StoreReader,
        farmer_id: FarmerId,
        profile: Option<CreditProfile>,
        last_sequence: u64,
    ) -> Self {
        Self {
            reader,
            farmer_id,
            profile,
            profile_dirty: false,
            last_sequence,
            entries: Vec::new(),
            purchases: Vec::new(),
            defaults: Vec::new(),
            actions: Vec::new(),
            contacts: Vec::new(),
            events: EventStore::new(),
        }
    }

    pub fn farmer_id(&self) -> FarmerId {
        self.farmer_id
    }

    pub fn reader(&self) -> &dyn StoreReader {
        self.reader
    }

    /// locked profile including staged changes
    pub fn profile(&self) -> Option<&CreditProfile> {
        self.profile.as_ref()
    }

    pub fn require_profile(&self) -> Result<CreditProfile> {
        self.profile
            .clone()
            .ok_or_else(|| CreditError::not_found("credit profile", self.farmer_id))
    }

    pub fn put_profile(&mut self, profile: CreditProfile) -> Result<()> {
        self.ensure_owned(profile.farmer_id, "credit profile")?;
        self.profile = Some(profile);
        self.profile_dirty = true;
        Ok(())
    }

    /// sequence number the next ledger entry must carry
    pub fn next_sequence(&self) -> u64 {
        self.last_sequence + self.entries.len() as u64 + 1
    }

    pub fn append_entry(&mut self, entry: LedgerEntry) -> Result<()> {
        self.ensure_owned(entry.farmer_id, "ledger entry")?;
        if entry.sequence != self.next_sequence() {
            return Err(CreditError::persistence(format!(
                "ledger sequence gap for farmer {}: expected {}, got {}",
                self.farmer_id,
                self.next_sequence(),
                entry.sequence
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn purchase(&self, purchase_id: &PurchaseId) -> Result<Option<Purchase>> {
        if let Some(staged) = self.purchases.iter().find(|p| p.id == *purchase_id) {
            return Ok(Some(staged.clone()));
        }
        self.reader.purchase(purchase_id)
    }

    pub fn put_purchase(&mut self, purchase: Purchase) -> Result<()> {
        self.ensure_owned(purchase.farmer_id, "purchase")?;
        upsert(&mut self.purchases, purchase, |a, b| a.id == b.id);
        Ok(())
    }

    pub fn default_record(&self, default_id: &DefaultId) -> Result<Option<DefaultRecord>> {
        if let Some(staged) = self.defaults.iter().find(|d| d.id == *default_id) {
            return Ok(Some(staged.clone()));
        }
        self.reader.default_record(default_id)
    }

    pub fn open_default(&self) -> Result<Option<DefaultRecord>> {
        if let Some(staged) = self.defaults.iter().find(|d| !d.status.is_resolved()) {
            return Ok(Some(staged.clone()));
        }
        let committed = self.reader.open_default_for(&self.farmer_id)?;
        // a staged resolution hides the committed open record
        Ok(committed.filter(|d| !self.defaults.iter().any(|s| s.id == d.id)))
    }

    pub fn put_default(&mut self, record: DefaultRecord) -> Result<()> {
        self.ensure_owned(record.farmer_id, "default record")?;
        upsert(&mut self.defaults, record, |a, b| a.id == b.id);
        Ok(())
    }

    pub fn recovery_action(&self, action_id: &RecoveryActionId) -> Result<Option<RecoveryAction>> {
        if let Some(staged) = self.actions.iter().find(|a| a.id == *action_id) {
            return Ok(Some(staged.clone()));
        }
        self.reader.recovery_action(action_id)
    }

    pub fn put_action(&mut self, action: RecoveryAction) -> Result<()> {
        self.ensure_owned(action.farmer_id, "recovery action")?;
        upsert(&mut self.actions, action, |a, b| a.id == b.id);
        Ok(())
    }

    pub fn append_contact(&mut self, contact: ContactHistory) -> Result<()> {
        self.ensure_owned(contact.farmer_id, "contact history")?;
        self.contacts.push(contact);
        Ok(())
    }

    /// stage an event for dispatch after commit
    pub fn emit(&mut self, event: Event) {
        self.events.emit(event);
    }

    pub fn into_writes(mut self) -> PendingWrites {
        PendingWrites {
            profile: if self.profile_dirty { self.profile } else { None },
            entries: self.entries,
            purchases: self.purchases,
            defaults: self.defaults,
            actions: self.actions,
            contacts: self.contacts,
            events: self.events.take_events(),
        }
    }

    fn ensure_owned(&self, farmer_id: FarmerId, entity: &str) -> Result<()> {
        if farmer_id != self.farmer_id {
            return Err(CreditError::persistence(format!(
                "{} for farmer {} written outside its transaction (locked farmer {})",
                entity, farmer_id, self.farmer_id
            )));
        }
        Ok(())
    }
}

fn upsert<T>(rows: &mut Vec<T>, row: T, same: impl Fn(&T, &T) -> bool) {
    match rows.iter().position(|existing| same(existing, &row)) {
        Some(index) => rows[index] = row,
        None => rows.push(row),
    }
}
