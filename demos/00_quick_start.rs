/// quick start - quote, grant and spend credit for one farmer
use std::sync::Arc;

use farmer_credit_rs::{
    CreditEngine, EngineConfig, InMemoryCatalog, InMemoryStore, Money, NoopDispatcher,
    PaymentMethod, SafeTimeProvider, TimeSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let catalog = Arc::new(InMemoryCatalog::new());
    let engine = CreditEngine::new(
        InMemoryStore::new(),
        catalog.clone(),
        Arc::new(NoopDispatcher),
        EngineConfig::default(),
    )?;
    let time = SafeTimeProvider::new(TimeSource::System);

    // a farmer with two unpaid milk collections
    let farmer = engine.store().register_farmer("Wanjiru Kamau")?;
    engine.store().record_collection(farmer, Money::from_major(1_000))?;
    engine.store().record_collection(farmer, Money::from_major(1_500))?;

    let granted = engine.grant_credit(farmer, Some("admin"), &time)?;
    println!("granted: KES {}", granted.amount);

    let quote = engine.quote_available_credit(farmer, &time)?;
    println!("pending payments: KES {}", quote.pending_payments);
    println!("available credit: KES {}", quote.available_credit);

    let feed = catalog.add_item("Dairy meal 70kg", Money::from_major(1_200), true, 40)?;
    let receipt = engine.create_purchase(farmer, feed, None, 1, PaymentMethod::Credit, Some("agrovet-01"), &time)?;
    println!("purchase {} is {}", receipt.purchase.id, receipt.purchase.status);

    println!("{}", engine.statement(farmer, &time)?.to_json_pretty()?);

    Ok(())
}
