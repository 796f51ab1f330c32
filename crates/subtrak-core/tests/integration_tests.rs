//! Integration tests for subtrak-core
//!
//! These tests exercise the full fetch → detect → import → maintain workflow.

use std::io::Write;

use chrono::NaiveDate;
use serde_json::{json, Value};
use subtrak_core::{
    config::MaintenanceConfig,
    db::Database,
    detect_subscriptions, detect_subscriptions_with_shape,
    models::{BillingCycle, ImportCandidate, NewSubscription, SubscriptionFilter},
    reconcile_import, run_maintenance, JsonFileSource, RawTransaction, SourceShape,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn record(value: Value) -> RawTransaction {
    value.as_object().cloned().unwrap()
}

/// Six months of card approvals: a monthly Netflix charge on the 15th,
/// two convenience-store visits with unrelated amounts and a one-off
/// purchase.
fn card_approvals() -> Vec<RawTransaction> {
    let months = [
        "20240115", "20240215", "20240315", "20240415", "20240515", "20240615",
    ];
    let mut records: Vec<RawTransaction> = months
        .iter()
        .map(|d| {
            record(json!({
                "resUsedDate": d,
                "resUsedTime": "093000",
                "resMemberStoreName": "Netflix",
                "resUsedAmount": "13,500",
                "resCardNo": "9410-****-****-1234",
                "resCardName": "Shinhan Deep Dream",
                "resCategory": "digital",
            }))
        })
        .collect();

    records.push(record(json!({
        "resUsedDate": "20240203",
        "resMemberStoreName": "GS25",
        "resUsedAmount": "4,200",
    })));
    records.push(record(json!({
        "resUsedDate": "20240410",
        "resMemberStoreName": "GS25",
        "resUsedAmount": "18,900",
    })));
    records.push(record(json!({
        "resUsedDate": "20240501",
        "resMemberStoreName": "Coupang",
        "resUsedAmount": "32,000",
    })));

    records
}

// =============================================================================
// Detection
// =============================================================================

#[test]
fn test_detects_monthly_netflix() {
    let detected = detect_subscriptions(&card_approvals());

    assert_eq!(detected.len(), 1);
    let netflix = &detected[0];
    assert_eq!(netflix.name, "Netflix");
    assert_eq!(netflix.amount, 13500);
    assert_eq!(netflix.billing_cycle, BillingCycle::Monthly);
    assert_eq!(netflix.billing_day, 15);
    assert_eq!(netflix.occurrence_count, 6);
    assert_eq!(netflix.last_payment_date, "2024-06-15");
    assert_eq!(netflix.card_identifier, "9410-****-****-1234");
}

#[test]
fn test_detects_bank_withdrawals() {
    let records: Vec<RawTransaction> = ["20240105", "20240205", "20240305"]
        .iter()
        .map(|d| {
            record(json!({
                "resAccountTrDate": d,
                "resAccountDesc3": "KT Internet",
                "resAccountOut": "33000",
                "resAccountIn": "0",
            }))
        })
        .collect();

    let detected = detect_subscriptions_with_shape(&records, SourceShape::BankTransaction);
    assert_eq!(detected.len(), 1);
    assert_eq!(detected[0].name, "KT Internet");
    assert_eq!(detected[0].billing_day, 5);

    // Card field names do not match bank records
    assert!(detect_subscriptions(&records).is_empty());
}

#[test]
fn test_detection_from_saved_response() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let response = json!({
        "result": {"code": "CF-00000", "message": "success"},
        "data": {"resApprovalList": card_approvals()},
    });
    write!(file, "{}", response).unwrap();

    let transactions = JsonFileSource::new(file.path()).load().unwrap();
    assert_eq!(transactions.len(), 9);

    let detected = detect_subscriptions(&transactions);
    assert_eq!(detected[0].name, "Netflix");
}

// =============================================================================
// Import and maintenance
// =============================================================================

#[test]
fn test_detect_then_import_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let user_id = db.upsert_user("me@example.com", None).unwrap();
    let card = db
        .find_or_create_payment_method(user_id, "Shinhan Deep Dream")
        .unwrap();
    let today = date(2024, 6, 20);

    let candidates: Vec<ImportCandidate> = detect_subscriptions(&card_approvals())
        .iter()
        .map(ImportCandidate::from)
        .collect();

    let report = db
        .import_candidates(user_id, &candidates, Some(card), today)
        .unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.details, vec!["'Netflix' - ₩13,500 (monthly)"]);

    let subs = db
        .list_subscriptions(user_id, &SubscriptionFilter::active())
        .unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].next_payment_date, date(2024, 7, 15));
    assert_eq!(subs[0].payment_method_id, Some(card));

    // Importing the same detection again is a no-op
    let again = reconcile_import(&db, user_id, &candidates, Some(card), today).unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.skipped, 1);
    assert_eq!(
        db.list_subscriptions(user_id, &SubscriptionFilter::default())
            .unwrap()
            .len(),
        1
    );

    let summary = db.dashboard_summary(user_id, today, 30).unwrap();
    assert_eq!(summary.total_monthly_cost, 13500.0);
    assert_eq!(summary.upcoming_payments.len(), 1);
    assert_eq!(summary.card_breakdown[0].card_name, "Shinhan Deep Dream");
}

#[test]
fn test_maintenance_pass() {
    let db = Database::in_memory().unwrap();
    let user_id = db.upsert_user("me@example.com", None).unwrap();
    let today = date(2024, 6, 10);

    let overdue = db
        .create_subscription(&NewSubscription::new(user_id, "Overdue", 9900.0, date(2024, 6, 1)))
        .unwrap();
    db.create_subscription(&NewSubscription::new(user_id, "Tomorrow", 4900.0, date(2024, 6, 11)))
        .unwrap();

    let config = MaintenanceConfig {
        upcoming_days: 3,
        card_expiry_days: 30,
    };
    let report = run_maintenance(&db, today, &config).unwrap();

    assert_eq!(report.rolled_over.len(), 1);
    assert_eq!(report.rolled_over[0].subscription_id, overdue);
    assert_eq!(report.rolled_over[0].next_date, date(2024, 7, 1));
    assert_eq!(report.still_overdue(today), 0);
    assert_eq!(report.upcoming_payments.len(), 1);
    assert_eq!(report.upcoming_payments[0].payment.subscription_name, "Tomorrow");
    assert!(report.expiring_cards.is_empty());

    // A second pass on the same day changes nothing
    let second = run_maintenance(&db, today, &config).unwrap();
    assert!(second.rolled_over.is_empty());
}
