//! Cross-user queries behind the periodic maintenance pass

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::params;
use tracing::{debug, warn};

use super::payment_methods::{row_to_payment_method, PAYMENT_METHOD_SELECT};
use super::subscriptions::{row_to_subscription, SUBSCRIPTION_SELECT};
use super::{format_datetime, Database};
use crate::dashboard::upcoming_within;
use crate::error::Result;
use crate::models::{DuePayment, PaymentMethod, PaymentRollover, Subscription};

impl Database {
    /// Move every active subscription whose next payment is before `today`
    /// forward by exactly one billing cycle.
    ///
    /// A subscription several cycles behind needs several passes. The whole
    /// pass commits as one transaction.
    pub fn advance_overdue_payment_dates(&self, today: NaiveDate) -> Result<Vec<PaymentRollover>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let overdue: Vec<Subscription> = {
            let mut stmt = tx.prepare(&format!(
                "{} WHERE is_active = 1 AND next_payment_date < ? ORDER BY next_payment_date, id",
                SUBSCRIPTION_SELECT
            ))?;
            let rows = stmt
                .query_map(params![today.to_string()], row_to_subscription)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let now = format_datetime(Utc::now());
        let mut rolled = Vec::with_capacity(overdue.len());

        for sub in overdue {
            let Some(next_date) = sub.billing_cycle.advance(sub.next_payment_date) else {
                warn!(
                    "Cannot advance '{}' past {}",
                    sub.name, sub.next_payment_date
                );
                continue;
            };

            tx.execute(
                "UPDATE subscriptions SET next_payment_date = ?, updated_at = ? WHERE id = ?",
                params![next_date.to_string(), now, sub.id],
            )?;
            debug!(
                "Advanced '{}' from {} to {}",
                sub.name, sub.next_payment_date, next_date
            );

            rolled.push(PaymentRollover {
                subscription_id: sub.id,
                user_id: sub.user_id,
                subscription_name: sub.name,
                previous_date: sub.next_payment_date,
                next_date,
            });
        }

        tx.commit()?;
        Ok(rolled)
    }

    /// Active payments across all users due within `[today, today + days]`
    pub fn upcoming_payments_due(&self, today: NaiveDate, days: i64) -> Result<Vec<DuePayment>> {
        let until = window_end(today, days);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE is_active = 1 AND next_payment_date >= ? AND next_payment_date <= ?",
            SUBSCRIPTION_SELECT
        ))?;
        let subs = stmt
            .query_map(
                params![today.to_string(), until.to_string()],
                row_to_subscription,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let due = upcoming_within(&subs, today, days)
            .into_iter()
            .filter_map(|payment| {
                subs.iter()
                    .find(|s| s.id == payment.subscription_id)
                    .map(|s| DuePayment {
                        user_id: s.user_id,
                        payment,
                    })
            })
            .collect();
        Ok(due)
    }

    /// Active payment methods across all users expiring within `[today, today + days]`
    pub fn expiring_payment_methods(
        &self,
        today: NaiveDate,
        days: i64,
    ) -> Result<Vec<PaymentMethod>> {
        let until = window_end(today, days);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE is_active = 1 AND expiry_date IS NOT NULL
                AND expiry_date >= ? AND expiry_date <= ?
             ORDER BY expiry_date, id",
            PAYMENT_METHOD_SELECT
        ))?;
        let methods = stmt
            .query_map(
                params![today.to_string(), until.to_string()],
                row_to_payment_method,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(methods)
    }
}

/// Last day of a `[today, today + days]` window, saturating at the calendar's end
fn window_end(today: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days.max(0))
        .and_then(|span| today.checked_add_signed(span))
        .unwrap_or(NaiveDate::MAX)
}
