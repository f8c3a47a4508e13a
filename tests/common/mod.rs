#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use farmer_credit_rs::{
    CreditEngine, CreditProfile, EngineConfig, FarmerId, InMemoryCatalog, InMemoryStore, ItemId,
    Money, RecordingDispatcher, SafeTimeProvider, StoreReader, TimeSource,
};

pub struct TestEnv {
    pub engine: CreditEngine<InMemoryStore>,
    pub catalog: Arc<InMemoryCatalog>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub time: SafeTimeProvider,
}

pub fn test_time() -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
    ))
}

pub fn env() -> TestEnv {
    env_with(EngineConfig::default())
}

pub fn env_with(config: EngineConfig) -> TestEnv {
    let catalog = Arc::new(InMemoryCatalog::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let engine = CreditEngine::new(
        InMemoryStore::new(),
        catalog.clone(),
        dispatcher.clone(),
        config,
    )
    .unwrap();

    TestEnv {
        engine,
        catalog,
        dispatcher,
        time: test_time(),
    }
}

impl TestEnv {
    pub fn store(&self) -> &InMemoryStore {
        self.engine.store()
    }

    pub fn farmer(&self, name: &str, collections: &[i64]) -> FarmerId {
        let farmer = self.store().register_farmer(name).unwrap();
        for amount in collections {
            self.store()
                .record_collection(farmer, Money::from_major(*amount))
                .unwrap();
        }
        farmer
    }

    /// seed a profile with an explicit balance, bypassing the ledger
    pub fn profile(&self, farmer: FarmerId, balance: i64, total_used: i64) -> CreditProfile {
        let mut profile = CreditProfile::new(
            farmer,
            &self.engine.config().credit_policy,
            self.time.now(),
        );
        profile.current_credit_balance = Money::from_major(balance);
        profile.total_credit_used = Money::from_major(total_used);
        self.store().seed_profile(profile.clone()).unwrap();
        profile
    }

    pub fn item(&self, name: &str, price: i64, credit_eligible: bool) -> ItemId {
        self.catalog
            .add_item(name, Money::from_major(price), credit_eligible, 100)
            .unwrap()
    }

    pub fn balance(&self, farmer: FarmerId) -> Money {
        self.store()
            .profile(&farmer)
            .unwrap()
            .unwrap()
            .current_credit_balance
    }
}
