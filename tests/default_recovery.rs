mod common;

use chrono::Duration;
use farmer_credit_rs::{
    ContactMethod, CreditError, DefaultStatus, FarmerId, Money, NotificationCategory,
    PaymentMethod, RecoveryActionStatus, RecoveryActionType, StoreReader,
};

/// farmer who spent 3000 on credit and let the settlement date pass
fn overdue_farmer(env: &common::TestEnv, days_late: i64) -> FarmerId {
    let farmer = env.farmer("Kibet", &[10_000]);
    let feed = env.item("Dairy meal", 1_000, true);
    env.engine.grant_credit(farmer, None, &env.time).unwrap();
    env.engine
        .create_purchase(farmer, feed, None, 3, PaymentMethod::Credit, None, &env.time)
        .unwrap();

    // settlement falls due 30 days after first use
    env.time
        .test_control()
        .unwrap()
        .advance(Duration::days(30 + days_late));
    farmer
}

#[test]
fn test_detection_twice_is_idempotent() {
    let env = common::env();
    let farmer = overdue_farmer(&env, 10);

    let first = env.engine.identify_overdue_farmers(&env.time).unwrap();
    let second = env.engine.identify_overdue_farmers(&env.time).unwrap();

    assert_eq!(first.created, 1);
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(first.records, second.records);

    let defaults = env.engine.list_defaults(None).unwrap();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].farmer_id, farmer);
    assert_eq!(defaults[0].status, DefaultStatus::Overdue);
    assert_eq!(defaults[0].overdue_amount, Money::from_major(3_000));
    assert_eq!(env.dispatcher.sent_in(NotificationCategory::CreditDefault).len(), 1);
}

#[test]
fn test_severity_boundaries_through_detection() {
    for (days, expected) in [
        (15, DefaultStatus::Overdue),
        (16, DefaultStatus::PastDue),
        (31, DefaultStatus::SeverelyOverdue),
    ] {
        let env = common::env();
        let farmer = overdue_farmer(&env, days);
        env.engine.identify_overdue_farmers(&env.time).unwrap();

        let record = env.store().open_default_for(&farmer).unwrap().unwrap();
        assert_eq!(record.days_overdue, days as u32);
        assert_eq!(record.status, expected);
    }
}

#[test]
fn test_repaid_farmer_is_not_flagged() {
    let env = common::env();
    let farmer = overdue_farmer(&env, 5);
    env.engine.settle_pending_deductions(farmer, None, &env.time).unwrap();

    let report = env.engine.identify_overdue_farmers(&env.time).unwrap();
    assert!(report.records.is_empty());
    assert!(env.engine.list_defaults(None).unwrap().is_empty());
}

#[test]
fn test_suspend_then_resolve_requires_explicit_reactivation() {
    let env = common::env();
    let farmer = overdue_farmer(&env, 40);
    env.engine.identify_overdue_farmers(&env.time).unwrap();
    let default_id = env.engine.list_defaults(None).unwrap()[0].id;

    let action = env
        .engine
        .create_recovery_action(
            default_id,
            RecoveryActionType::SuspendCredit,
            Some("no response to sms".to_string()),
            Some("officer-2"),
            &env.time,
        )
        .unwrap();
    assert!(matches!(
        env.engine.quote_available_credit(farmer, &env.time),
        Err(CreditError::CreditSuspended { .. })
    ));

    env.engine
        .update_recovery_action_status(action.id, RecoveryActionStatus::InProgress, &env.time)
        .unwrap();
    env.engine
        .add_contact_history(
            default_id,
            ContactMethod::Sms,
            "reminder sent".to_string(),
            Some("officer-2"),
            &env.time,
        )
        .unwrap();
    env.engine
        .settle_pending_deductions(farmer, None, &env.time)
        .unwrap();

    let resolved = env
        .engine
        .resolve_default(default_id, Some("settled from milk payments".to_string()), None, &env.time)
        .unwrap();
    assert_eq!(resolved.status, DefaultStatus::Resolved);
    assert_eq!(env.engine.get_default(default_id).unwrap().status, DefaultStatus::Resolved);

    // still suspended until an administrator reactivates
    assert!(matches!(
        env.engine.quote_available_credit(farmer, &env.time),
        Err(CreditError::CreditSuspended { .. })
    ));
    env.engine
        .set_credit_active(farmer, true, None, Some("admin"), &env.time)
        .unwrap();
    assert!(env.engine.quote_available_credit(farmer, &env.time).is_ok());

    let contacts = env.engine.get_contact_history(default_id).unwrap();
    assert_eq!(contacts.len(), 2);
    assert_eq!(env.engine.get_recovery_actions(default_id).unwrap().len(), 1);

    let recovery = env.dispatcher.sent_in(NotificationCategory::CreditRecovery);
    assert_eq!(recovery.len(), 1);
    assert_eq!(recovery[0].title, "Credit Suspended");
    assert_eq!(env.dispatcher.sent_in(NotificationCategory::CreditResolution).len(), 1);
}

#[test]
fn test_recovery_status_cannot_regress() {
    let env = common::env();
    overdue_farmer(&env, 20);
    env.engine.identify_overdue_farmers(&env.time).unwrap();
    let default_id = env.engine.list_defaults(None).unwrap()[0].id;

    let action = env
        .engine
        .create_recovery_action(default_id, RecoveryActionType::ScheduleVisit, None, None, &env.time)
        .unwrap();
    env.engine
        .update_recovery_action_status(action.id, RecoveryActionStatus::Completed, &env.time)
        .unwrap();

    let err = env
        .engine
        .update_recovery_action_status(action.id, RecoveryActionStatus::InProgress, &env.time)
        .unwrap_err();
    assert!(matches!(err, CreditError::InvalidTransition { .. }));
    assert_eq!(err.kind(), farmer_credit_rs::ErrorKind::Conflict);
}

#[test]
fn test_new_default_after_resolution() {
    let env = common::env();
    let farmer = overdue_farmer(&env, 3);
    env.engine.identify_overdue_farmers(&env.time).unwrap();
    let first = env.store().open_default_for(&farmer).unwrap().unwrap();
    env.engine
        .resolve_default(first.id, None, None, &env.time)
        .unwrap();

    // deductions still outstanding, so the next run opens a fresh record
    env.engine.identify_overdue_farmers(&env.time).unwrap();
    let second = env.store().open_default_for(&farmer).unwrap().unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(env.engine.list_defaults(Some(DefaultStatus::Resolved)).unwrap().len(), 1);
}
