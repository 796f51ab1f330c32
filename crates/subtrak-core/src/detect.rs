//! Subscription detection from card/bank transaction history
//!
//! Pipeline:
//! 1. Normalize raw aggregator records (see [`crate::normalize`])
//! 2. Group by merchant key (uppercased, whitespace removed)
//! 3. Run each group through the recurrence gates:
//!    - at least 2 transactions
//!    - at least 2 parseable positive amounts
//!    - every amount within 10% of the mean
//!    - at least 2 valid `YYYYMMDD` dates
//!    - average gap falls in the monthly, yearly or weekly band
//! 4. Sort survivors by amount, highest first
//!
//! Detection is best-effort: a malformed record only removes itself (or its
//! group) from the result, never the whole batch. There is no error path.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::models::{BillingCycle, DetectedSubscription, NormalizedTransaction};
use crate::normalize::{normalize_all, RawTransaction, SourceShape};

/// A single charge can never be "recurring"
pub const MIN_OCCURRENCES: usize = 2;

/// Maximum relative deviation of any amount from the group mean (exclusive)
pub const AMOUNT_TOLERANCE: f64 = 0.10;

/// Average-gap bands in days, inclusive on both ends.
/// Checked in this order; the bands must stay disjoint.
pub const MONTHLY_BAND: (f64, f64) = (20.0, 40.0);
pub const YEARLY_BAND: (f64, f64) = (340.0, 395.0);
pub const WEEKLY_BAND: (f64, f64) = (5.0, 10.0);

/// Transactions that share a merchant key
#[derive(Debug, Clone)]
pub struct MerchantGroup {
    pub key: String,
    pub transactions: Vec<NormalizedTransaction>,
}

/// Canonical merchant key, or `None` when the merchant is blank.
///
/// "Net flix" and "NETFLIX" intentionally collide.
pub fn merchant_key(merchant: &str) -> Option<String> {
    let trimmed = merchant.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(
        trimmed
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect(),
    )
}

/// Bucket transactions by merchant key.
///
/// Groups come back in the order their key was first seen and members keep
/// their input order. Transactions without a merchant are dropped.
pub fn group_by_merchant(transactions: &[NormalizedTransaction]) -> Vec<MerchantGroup> {
    let mut groups: Vec<MerchantGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for tx in transactions {
        let Some(key) = merchant_key(&tx.merchant) else {
            continue;
        };

        match index.get(&key) {
            Some(&i) => groups[i].transactions.push(tx.clone()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(MerchantGroup {
                    key,
                    transactions: vec![tx.clone()],
                });
            }
        }
    }

    groups
}

/// Parse a comma-grouped integer amount. Non-numeric and non-positive
/// values yield `None`.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let cleaned = raw.replace(',', "");
    match cleaned.trim().parse::<i64>() {
        Ok(amount) if amount > 0 => Some(amount),
        _ => None,
    }
}

/// Parse an exactly-8-digit `YYYYMMDD` date
pub fn parse_compact_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = raw[0..4].parse().ok()?;
    let month: u32 = raw[4..6].parse().ok()?;
    let day: u32 = raw[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Map an average gap in days onto a billing cycle
pub fn classify_interval(average_days: f64) -> Option<BillingCycle> {
    let within = |(low, high): (f64, f64)| average_days >= low && average_days <= high;

    if within(MONTHLY_BAND) {
        Some(BillingCycle::Monthly)
    } else if within(YEARLY_BAND) {
        Some(BillingCycle::Yearly)
    } else if within(WEEKLY_BAND) {
        Some(BillingCycle::Weekly)
    } else {
        None
    }
}

/// Run one merchant group through the recurrence gates
pub fn detect_recurrence(group: &MerchantGroup) -> Option<DetectedSubscription> {
    let txs = &group.transactions;
    let first = txs.first()?;

    if txs.len() < MIN_OCCURRENCES {
        return None;
    }

    let amounts: Vec<i64> = txs.iter().filter_map(|tx| parse_amount(&tx.amount)).collect();
    if amounts.len() < MIN_OCCURRENCES {
        debug!(
            "{}: only {} parseable amounts",
            group.key,
            amounts.len()
        );
        return None;
    }

    let mean = amounts.iter().map(|&a| a as f64).sum::<f64>() / amounts.len() as f64;
    if mean == 0.0 {
        return None;
    }

    let consistent = amounts
        .iter()
        .all(|&a| (a as f64 - mean).abs() / mean < AMOUNT_TOLERANCE);
    if !consistent {
        debug!("{}: amounts vary more than 10% around {:.0}", group.key, mean);
        return None;
    }

    let mut dates: Vec<NaiveDate> = txs
        .iter()
        .filter_map(|tx| parse_compact_date(&tx.date))
        .collect();
    dates.sort();

    if dates.len() < MIN_OCCURRENCES {
        debug!("{}: only {} valid dates", group.key, dates.len());
        return None;
    }

    let gaps: Vec<i64> = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect();
    let average_gap = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;

    let Some(billing_cycle) = classify_interval(average_gap) else {
        debug!(
            "{}: average gap of {:.1} days matches no cycle",
            group.key, average_gap
        );
        return None;
    };

    let latest = *dates.last()?;

    Some(DetectedSubscription {
        name: first.merchant.clone(),
        amount: mean as i64,
        billing_cycle,
        billing_day: latest.day(),
        occurrence_count: txs.len(),
        last_payment_date: latest.format("%Y-%m-%d").to_string(),
        card_identifier: first.card_identifier.clone(),
        category: first.category.clone(),
    })
}

/// Detect subscriptions in already-normalized transactions
pub fn detect_from_normalized(transactions: &[NormalizedTransaction]) -> Vec<DetectedSubscription> {
    let groups = group_by_merchant(transactions);

    let mut detected: Vec<DetectedSubscription> =
        groups.iter().filter_map(detect_recurrence).collect();

    // Stable: equal amounts keep first-seen merchant order
    detected.sort_by(|a, b| b.amount.cmp(&a.amount));

    debug!(
        "{} merchant groups, {} look recurring",
        groups.len(),
        detected.len()
    );

    detected
}

/// Detect subscriptions in raw card-approval records
pub fn detect_subscriptions(transactions: &[RawTransaction]) -> Vec<DetectedSubscription> {
    detect_subscriptions_with_shape(transactions, SourceShape::CardApproval)
}

/// Detect subscriptions in raw records of a specific response shape
pub fn detect_subscriptions_with_shape(
    transactions: &[RawTransaction],
    shape: SourceShape,
) -> Vec<DetectedSubscription> {
    detect_from_normalized(&normalize_all(transactions, shape))
}
