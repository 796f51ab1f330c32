//! Periodic maintenance pass
//!
//! Meant to run once a day from cron or by hand (`subtrak maintain`). Each
//! job is independent; reminders are logged and returned, delivery is left
//! to the caller.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::MaintenanceConfig;
use crate::db::Database;
use crate::error::Result;
use crate::models::{DuePayment, PaymentMethod, PaymentRollover};

/// What one maintenance pass did and found
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub rolled_over: Vec<PaymentRollover>,
    pub upcoming_payments: Vec<DuePayment>,
    pub expiring_cards: Vec<PaymentMethod>,
}

impl MaintenanceReport {
    /// Subscriptions still behind `today` after this pass
    pub fn still_overdue(&self, today: NaiveDate) -> usize {
        self.rolled_over
            .iter()
            .filter(|r| r.next_date < today)
            .count()
    }
}

/// Roll overdue dates forward, then collect payment and card-expiry reminders
pub fn run_maintenance(
    db: &Database,
    today: NaiveDate,
    config: &MaintenanceConfig,
) -> Result<MaintenanceReport> {
    let rolled_over = db.advance_overdue_payment_dates(today)?;
    let upcoming_payments = db.upcoming_payments_due(today, config.upcoming_days)?;
    let expiring_cards = db.expiring_payment_methods(today, config.card_expiry_days)?;

    for due in &upcoming_payments {
        info!(
            "Payment due: '{}' {:.0} {} on {} (user {})",
            due.payment.subscription_name,
            due.payment.amount,
            due.payment.currency,
            due.payment.date,
            due.user_id
        );
    }

    for card in &expiring_cards {
        if let Some(expiry) = card.expiry_date {
            info!(
                "Card expiring: '{}' on {} (user {})",
                card.name, expiry, card.user_id
            );
        }
    }

    let report = MaintenanceReport {
        rolled_over,
        upcoming_payments,
        expiring_cards,
    };

    let behind = report.still_overdue(today);
    if behind > 0 {
        warn!(
            "{} subscriptions are still overdue; run maintenance again to catch up",
            behind
        );
    }

    info!(
        "Maintenance: {} dates advanced, {} payments due within {} days, {} cards expiring within {} days",
        report.rolled_over.len(),
        report.upcoming_payments.len(),
        config.upcoming_days,
        report.expiring_cards.len(),
        config.card_expiry_days
    );

    Ok(report)
}
