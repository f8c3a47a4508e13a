/// credit purchase - carts, collection, cancellation and repayment
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use farmer_credit_rs::{
    CartLine, CreditEngine, CreditError, EngineConfig, InMemoryCatalog, InMemoryStore, Money,
    PaymentMethod, RecordingDispatcher, RepaymentMethod, SafeTimeProvider, TimeSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== credit purchase example ===\n");

    let catalog = Arc::new(InMemoryCatalog::new());
    let notifications = Arc::new(RecordingDispatcher::new());
    let engine = CreditEngine::new(
        InMemoryStore::new(),
        catalog.clone(),
        notifications.clone(),
        EngineConfig::default(),
    )?;
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
    ));

    let farmer = engine.store().register_farmer("Otieno Ouma")?;
    engine.store().record_collection(farmer, Money::from_major(6_000))?;
    engine.grant_credit(farmer, Some("admin"), &time)?;

    let feed = catalog.add_item("Dairy meal 70kg", Money::from_major(2_800), true, 40)?;
    let dewormer = catalog.add_item("Dewormer", Money::from_major(900), false, 15)?;
    let sachet = catalog.add_packaging(dewormer, "10ml sachet", Money::from_major(150), true)?;

    // the whole cart is quoted together
    let cart = [CartLine::new(feed, 2), CartLine::new(dewormer, 2).with_packaging(sachet)];
    match engine.create_cart_purchase(farmer, &cart, PaymentMethod::Credit, None, &time) {
        Err(CreditError::InsufficientCredit { available, requested }) => {
            println!("cart of KES {} rejected, only KES {} available", requested, available)
        }
        other => println!("unexpected outcome: {:?}", other.map(|r| r.total_amount)),
    }

    let receipt = engine.create_cart_purchase(farmer, &[CartLine::new(feed, 1)], PaymentMethod::Credit, None, &time)?;
    println!("bought feed for KES {}", receipt.total_amount);

    let sachets = engine.create_purchase(farmer, dewormer, Some(sachet), 2, PaymentMethod::Credit, None, &time)?;
    engine.cancel_purchase(sachets.purchase.id, Some("agrovet-01"), &time)?;
    println!("sachet order cancelled and refunded");

    for purchase in &receipt.purchases {
        engine.confirm_collection(purchase.id, &time)?;
    }

    engine.repay_credit(
        farmer,
        Money::from_major(2_000),
        RepaymentMethod::MobileMoney,
        Some("MPESA-7HX2".to_string()),
        None,
        &time,
    )?;

    println!("\nledger:");
    for entry in engine.get_ledger(farmer)? {
        println!(
            "  #{} {:<8} KES {:>10} -> balance KES {}",
            entry.sequence, entry.transaction_type, entry.amount, entry.balance_after
        );
    }

    println!("\nnotifications:");
    for notification in notifications.sent() {
        println!("  [{}] {}", notification.category, notification.title);
    }

    Ok(())
}
