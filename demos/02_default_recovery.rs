/// default recovery - detection, escalation, suspension and resolution
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use farmer_credit_rs::{
    ContactMethod, CreditEngine, EngineConfig, InMemoryCatalog, InMemoryStore, Money,
    PaymentMethod, RecordingDispatcher, RecoveryActionStatus, RecoveryActionType,
    SafeTimeProvider, TimeSource,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== default recovery example ===\n");

    let catalog = Arc::new(InMemoryCatalog::new());
    let notifications = Arc::new(RecordingDispatcher::new());
    let engine = CreditEngine::new(
        InMemoryStore::new(),
        catalog.clone(),
        notifications.clone(),
        EngineConfig::default(),
    )?;
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 10, 7, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let farmer = engine.store().register_farmer("Chebet Langat")?;
    engine.store().record_collection(farmer, Money::from_major(8_000))?;
    engine.grant_credit(farmer, None, &time)?;
    let feed = catalog.add_item("Calf pellets", Money::from_major(1_500), true, 30)?;
    engine.create_purchase(farmer, feed, None, 3, PaymentMethod::Credit, None, &time)?;

    // settlement is due 30 days after first use; let it slip
    for days in [40, 10, 10] {
        controller.advance(Duration::days(days));
        engine.identify_overdue_farmers(&time)?;
        for record in engine.list_defaults(None)? {
            println!(
                "{}: KES {} overdue for {} days ({})",
                time.now().format("%Y-%m-%d"),
                record.overdue_amount,
                record.days_overdue,
                record.status
            );
        }
    }

    let default_id = engine.list_defaults(None)?[0].id;
    let visit = engine.create_recovery_action(default_id, RecoveryActionType::ScheduleVisit, None, Some("officer-3"), &time)?;
    engine.add_contact_history(default_id, ContactMethod::Visit, "farmer promised payment".to_string(), Some("officer-3"), &time)?;
    engine.update_recovery_action_status(visit.id, RecoveryActionStatus::Completed, &time)?;
    engine.create_recovery_action(default_id, RecoveryActionType::SuspendCredit, Some("promise not kept".to_string()), Some("officer-3"), &time)?;

    let status = engine.get_credit_status(farmer)?;
    println!("\ncredit active after suspension: {}", status.profile.is_active);

    engine.settle_pending_deductions(farmer, None, &time)?;
    engine.resolve_default(default_id, Some("settled from milk payments".to_string()), Some("officer-3"), &time)?;
    println!("still suspended after resolution: {}", !engine.get_credit_status(farmer)?.profile.is_active);

    engine.set_credit_active(farmer, true, None, Some("admin"), &time)?;
    println!("reactivated: {}", engine.get_credit_status(farmer)?.profile.is_active);

    println!("\ncontact history:");
    for contact in engine.get_contact_history(default_id)? {
        println!("  {:?}: {}", contact.contact_method, contact.notes);
    }

    println!("\nnotifications:");
    for notification in notifications.sent() {
        println!("  [{}] {}", notification.category, notification.title);
    }

    Ok(())
}
