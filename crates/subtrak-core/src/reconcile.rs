//! Import of approved subscription candidates
//!
//! Name equality against the user's *active* subscriptions is the only
//! duplicate check. This is deliberately stricter than the merchant grouping
//! used during detection: two candidates the user approved separately must
//! never be merged silently.

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{
    ImportCandidate, ImportReport, NewSubscription, Subscription, DEFAULT_CURRENCY,
};

/// Persistence the reconciler writes through
pub trait ImportTarget {
    /// Active subscription for `user_id` whose name equals `name` exactly
    fn find_active_subscription_by_name(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Option<Subscription>>;

    /// Insert a subscription, returning its id
    fn create_subscription(&self, subscription: &NewSubscription) -> Result<i64>;
}

/// First charge date for a billing day, seen from `today`.
///
/// If today's day-of-month has reached the billing day, the charge lands in
/// the next month (December rolls into January); otherwise this month.
/// Returns `None` when the billing day does not exist in the target month
/// (day 31 in April, day 30 in February); no clamping is applied.
pub fn next_payment_from_billing_day(today: NaiveDate, billing_day: u32) -> Option<NaiveDate> {
    let (year, month) = target_month(today, billing_day);
    NaiveDate::from_ymd_opt(year, month, billing_day)
}

/// (year, month) the next charge for `billing_day` falls in
fn target_month(today: NaiveDate, billing_day: u32) -> (i32, u32) {
    if today.day() < billing_day {
        (today.year(), today.month())
    } else if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    }
}

/// Persist approved candidates for a user.
///
/// Each candidate is checked and written before the next one, so a name
/// repeated within the same batch is imported once and skipped after.
/// Errors stop the batch; `Database::import_candidates` wraps this in a
/// transaction so nothing from a failed batch is kept.
pub fn reconcile_import<T: ImportTarget + ?Sized>(
    target: &T,
    user_id: i64,
    candidates: &[ImportCandidate],
    payment_method_id: Option<i64>,
    today: NaiveDate,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for candidate in candidates {
        if target
            .find_active_subscription_by_name(user_id, &candidate.name)?
            .is_some()
        {
            report.skipped += 1;
            report
                .details
                .push(format!("'{}' - already registered", candidate.name));
            continue;
        }

        let next_payment = match (1..=31)
            .contains(&candidate.billing_day)
            .then(|| next_payment_from_billing_day(today, candidate.billing_day))
            .flatten()
        {
            Some(date) => date,
            None => {
                warn!(
                    "Skipping '{}': billing day {} has no date after {}",
                    candidate.name, candidate.billing_day, today
                );
                report.skipped += 1;
                report.details.push(format!(
                    "'{}' - billing day {} does not exist in {}",
                    candidate.name,
                    candidate.billing_day,
                    target_month_label(today, candidate.billing_day)
                ));
                continue;
            }
        };

        let subscription = NewSubscription {
            user_id,
            name: candidate.name.clone(),
            amount: candidate.amount as f64,
            currency: DEFAULT_CURRENCY.to_string(),
            billing_cycle: candidate.billing_cycle,
            billing_day: Some(candidate.billing_day),
            next_payment_date: next_payment,
            start_date: today,
            category_id: None,
            payment_method_id,
            cancel_url: None,
            cancel_method: None,
            auto_renew: true,
            notes: None,
        };
        target.create_subscription(&subscription)?;

        report.imported += 1;
        report.details.push(format!(
            "'{}' - ₩{} ({})",
            candidate.name,
            format_grouped(candidate.amount),
            candidate.billing_cycle
        ));
    }

    info!(
        "Import for user {}: {} imported, {} skipped",
        user_id, report.imported, report.skipped
    );

    Ok(report)
}

/// `YYYY-MM` of the month a billing day would land in
fn target_month_label(today: NaiveDate, billing_day: u32) -> String {
    let (year, month) = target_month(today, billing_day);
    format!("{:04}-{:02}", year, month)
}

/// Thousands-separated integer ("13,500")
pub fn format_grouped(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
