//! Subscription lifecycle: create, update with price history, cancel

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::info;

use super::{format_datetime, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    BillingCycle, CancellationLog, ImportCandidate, ImportReport, NewSubscription, PriceHistory,
    Subscription, SubscriptionFilter, SubscriptionUpdate,
};
use crate::reconcile::{reconcile_import, ImportTarget};

pub(super) const SUBSCRIPTION_SELECT: &str = r#"
    SELECT id, user_id, name, amount, currency, billing_cycle, billing_day,
           next_payment_date, start_date, category_id, payment_method_id,
           cancel_url, cancel_method, is_active, auto_renew, notes,
           created_at, updated_at
    FROM subscriptions"#;

impl Database {
    /// Create a subscription, returning its id
    pub fn create_subscription(&self, sub: &NewSubscription) -> Result<i64> {
        let conn = self.conn()?;
        insert_subscription(&conn, sub)
    }

    /// Get a subscription by ID
    pub fn get_subscription(&self, id: i64) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        let sub = conn
            .query_row(
                &format!("{} WHERE id = ?", SUBSCRIPTION_SELECT),
                params![id],
                row_to_subscription,
            )
            .optional()?;
        Ok(sub)
    }

    /// List a user's subscriptions, soonest payment first
    pub fn list_subscriptions(
        &self,
        user_id: i64,
        filter: &SubscriptionFilter,
    ) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;

        let mut conditions = vec!["user_id = ?"];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(active) = filter.active {
            conditions.push("is_active = ?");
            params_vec.push(Box::new(active));
        }
        if let Some(category_id) = filter.category_id {
            conditions.push("category_id = ?");
            params_vec.push(Box::new(category_id));
        }
        if let Some(payment_method_id) = filter.payment_method_id {
            conditions.push("payment_method_id = ?");
            params_vec.push(Box::new(payment_method_id));
        }

        let query = format!(
            "{} WHERE {} ORDER BY next_payment_date, name",
            SUBSCRIPTION_SELECT,
            conditions.join(" AND ")
        );

        let mut stmt = conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let subscriptions = stmt
            .query_map(params_refs.as_slice(), row_to_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subscriptions)
    }

    /// Active subscription for a user whose name matches exactly
    pub fn find_active_subscription_by_name(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        active_by_name(&conn, user_id, name)
    }

    /// Reconcile approved candidates inside one transaction.
    ///
    /// Any failure rolls back the whole batch, so either every imported
    /// candidate in the report is stored or none are.
    pub fn import_candidates(
        &self,
        user_id: i64,
        candidates: &[ImportCandidate],
        payment_method_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<ImportReport> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let report = reconcile_import(&tx, user_id, candidates, payment_method_id, today)?;
        tx.commit()?;
        Ok(report)
    }

    /// Resolve a user-supplied reference: a numeric id, else a name.
    ///
    /// Names match exactly first, then case-insensitively. Active
    /// subscriptions win over cancelled ones with the same name.
    pub fn find_subscription(&self, user_id: i64, key: &str) -> Result<Option<Subscription>> {
        if let Ok(id) = key.trim().parse::<i64>() {
            if let Some(sub) = self.get_subscription(id)? {
                if sub.user_id == user_id {
                    return Ok(Some(sub));
                }
            }
        }

        let conn = self.conn()?;
        let exact = conn
            .query_row(
                &format!(
                    "{} WHERE user_id = ? AND name = ? ORDER BY is_active DESC, id DESC LIMIT 1",
                    SUBSCRIPTION_SELECT
                ),
                params![user_id, key],
                row_to_subscription,
            )
            .optional()?;
        if exact.is_some() {
            return Ok(exact);
        }

        let fuzzy = conn
            .query_row(
                &format!(
                    "{} WHERE user_id = ? AND LOWER(name) = LOWER(?) ORDER BY is_active DESC, id DESC LIMIT 1",
                    SUBSCRIPTION_SELECT
                ),
                params![user_id, key],
                row_to_subscription,
            )
            .optional()?;
        Ok(fuzzy)
    }

    /// Apply a partial update.
    ///
    /// When the amount or currency changes, a price history row with the old
    /// and new values is appended in the same transaction.
    pub fn update_subscription(
        &self,
        id: i64,
        update: &SubscriptionUpdate,
        note: Option<&str>,
    ) -> Result<Subscription> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let current = load_subscription(&tx, id)?
            .ok_or_else(|| Error::NotFound(format!("subscription {}", id)))?;

        let mut next = current.clone();
        if let Some(name) = &update.name {
            next.name = name.clone();
        }
        if let Some(amount) = update.amount {
            if amount < 0.0 {
                return Err(Error::InvalidData(format!(
                    "amount must not be negative: {}",
                    amount
                )));
            }
            next.amount = amount;
        }
        if let Some(currency) = &update.currency {
            next.currency = currency.clone();
        }
        if let Some(cycle) = update.billing_cycle {
            next.billing_cycle = cycle;
        }
        if let Some(day) = update.billing_day {
            next.billing_day = day;
        }
        if let Some(date) = update.next_payment_date {
            next.next_payment_date = date;
        }
        if let Some(category_id) = update.category_id {
            next.category_id = category_id;
        }
        if let Some(payment_method_id) = update.payment_method_id {
            next.payment_method_id = payment_method_id;
        }
        if let Some(cancel_url) = &update.cancel_url {
            next.cancel_url = cancel_url.clone();
        }
        if let Some(cancel_method) = &update.cancel_method {
            next.cancel_method = cancel_method.clone();
        }
        if let Some(auto_renew) = update.auto_renew {
            next.auto_renew = auto_renew;
        }
        if let Some(notes) = &update.notes {
            next.notes = notes.clone();
        }

        let price_changed =
            next.amount != current.amount || next.currency != current.currency;
        if price_changed {
            insert_price_history(
                &tx,
                id,
                current.amount,
                next.amount,
                &current.currency,
                &next.currency,
                note,
            )?;
        }

        let now = Utc::now();
        tx.execute(
            r#"
            UPDATE subscriptions SET
                name = ?, amount = ?, currency = ?, billing_cycle = ?, billing_day = ?,
                next_payment_date = ?, category_id = ?, payment_method_id = ?,
                cancel_url = ?, cancel_method = ?, auto_renew = ?, notes = ?,
                updated_at = ?
            WHERE id = ?
            "#,
            params![
                next.name,
                next.amount,
                next.currency,
                next.billing_cycle.as_str(),
                next.billing_day,
                next.next_payment_date.to_string(),
                next.category_id,
                next.payment_method_id,
                next.cancel_url,
                next.cancel_method,
                next.auto_renew,
                next.notes,
                format_datetime(now),
                id,
            ],
        )?;

        tx.commit()?;

        if price_changed {
            info!(
                "Price of '{}' changed: {} {} -> {} {}",
                next.name, current.amount, current.currency, next.amount, next.currency
            );
        }

        next.updated_at = Some(now);
        Ok(next)
    }

    /// Soft delete: the subscription stops counting but keeps its history
    pub fn deactivate_subscription(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE subscriptions SET is_active = 0, updated_at = ? WHERE id = ?",
            params![format_datetime(Utc::now()), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("subscription {}", id)));
        }
        Ok(())
    }

    /// Cancel an active subscription.
    ///
    /// Turns off `is_active` and `auto_renew` and writes exactly one
    /// cancellation log carrying the monthly-equivalent savings.
    pub fn cancel_subscription(&self, id: i64, reason: Option<&str>) -> Result<CancellationLog> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let sub = load_subscription(&tx, id)?
            .ok_or_else(|| Error::NotFound(format!("subscription {}", id)))?;
        if !sub.is_active {
            return Err(Error::InvalidData(format!(
                "subscription '{}' is already inactive",
                sub.name
            )));
        }

        let now = Utc::now();
        let savings = sub.monthly_amount();

        tx.execute(
            "UPDATE subscriptions SET is_active = 0, auto_renew = 0, updated_at = ? WHERE id = ?",
            params![format_datetime(now), id],
        )?;
        tx.execute(
            r#"
            INSERT INTO cancellation_logs (subscription_id, cancelled_at, reason, savings_per_month)
            VALUES (?, ?, ?, ?)
            "#,
            params![id, format_datetime(now), reason, savings],
        )?;
        let log_id = tx.last_insert_rowid();
        tx.commit()?;

        info!(
            "Cancelled '{}' (saves {:.0} {} per month)",
            sub.name, savings, sub.currency
        );

        Ok(CancellationLog {
            id: log_id,
            subscription_id: id,
            subscription_name: Some(sub.name),
            cancelled_at: parse_datetime(&format_datetime(now)),
            reason: reason.map(String::from),
            savings_per_month: savings,
        })
    }

    /// Append a price history row without touching the subscription
    pub fn add_price_history(
        &self,
        subscription_id: i64,
        old_amount: f64,
        new_amount: f64,
        currency: &str,
        notes: Option<&str>,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if load_subscription(&tx, subscription_id)?.is_none() {
            return Err(Error::NotFound(format!("subscription {}", subscription_id)));
        }
        let id = insert_price_history(
            &tx,
            subscription_id,
            old_amount,
            new_amount,
            currency,
            currency,
            notes,
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// Price changes for a subscription, oldest first
    pub fn list_price_history(&self, subscription_id: i64) -> Result<Vec<PriceHistory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, subscription_id, old_amount, new_amount, old_currency, new_currency,
                   changed_at, notes
            FROM price_history
            WHERE subscription_id = ?
            ORDER BY changed_at, id
            "#,
        )?;

        let history = stmt
            .query_map(params![subscription_id], |row| {
                let changed_at: String = row.get(6)?;
                Ok(PriceHistory {
                    id: row.get(0)?,
                    subscription_id: row.get(1)?,
                    old_amount: row.get(2)?,
                    new_amount: row.get(3)?,
                    old_currency: row.get(4)?,
                    new_currency: row.get(5)?,
                    changed_at: parse_datetime(&changed_at),
                    notes: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(history)
    }

    /// Cancellation logs for a user, most recent first
    pub fn list_cancellation_logs(&self, user_id: i64) -> Result<Vec<CancellationLog>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.subscription_id, s.name, c.cancelled_at, c.reason, c.savings_per_month
            FROM cancellation_logs c
            JOIN subscriptions s ON s.id = c.subscription_id
            WHERE s.user_id = ?
            ORDER BY c.cancelled_at DESC, c.id DESC
            "#,
        )?;

        let logs = stmt
            .query_map(params![user_id], |row| {
                let cancelled_at: String = row.get(3)?;
                Ok(CancellationLog {
                    id: row.get(0)?,
                    subscription_id: row.get(1)?,
                    subscription_name: row.get(2)?,
                    cancelled_at: parse_datetime(&cancelled_at),
                    reason: row.get(4)?,
                    savings_per_month: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(logs)
    }
}

impl ImportTarget for Database {
    fn find_active_subscription_by_name(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Option<Subscription>> {
        Database::find_active_subscription_by_name(self, user_id, name)
    }

    fn create_subscription(&self, subscription: &NewSubscription) -> Result<i64> {
        Database::create_subscription(self, subscription)
    }
}

/// Writes go to the open transaction and land only on commit
impl ImportTarget for Transaction<'_> {
    fn find_active_subscription_by_name(
        &self,
        user_id: i64,
        name: &str,
    ) -> Result<Option<Subscription>> {
        active_by_name(self, user_id, name)
    }

    fn create_subscription(&self, subscription: &NewSubscription) -> Result<i64> {
        insert_subscription(self, subscription)
    }
}

fn insert_subscription(conn: &Connection, sub: &NewSubscription) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO subscriptions
            (user_id, name, amount, currency, billing_cycle, billing_day,
             next_payment_date, start_date, category_id, payment_method_id,
             cancel_url, cancel_method, auto_renew, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            sub.user_id,
            sub.name,
            sub.amount,
            sub.currency,
            sub.billing_cycle.as_str(),
            sub.billing_day,
            sub.next_payment_date.to_string(),
            sub.start_date.to_string(),
            sub.category_id,
            sub.payment_method_id,
            sub.cancel_url,
            sub.cancel_method,
            sub.auto_renew,
            sub.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn active_by_name(conn: &Connection, user_id: i64, name: &str) -> Result<Option<Subscription>> {
    let sub = conn
        .query_row(
            &format!(
                "{} WHERE user_id = ? AND name = ? AND is_active = 1 ORDER BY id LIMIT 1",
                SUBSCRIPTION_SELECT
            ),
            params![user_id, name],
            row_to_subscription,
        )
        .optional()?;
    Ok(sub)
}

fn load_subscription(tx: &Transaction, id: i64) -> Result<Option<Subscription>> {
    let sub = tx
        .query_row(
            &format!("{} WHERE id = ?", SUBSCRIPTION_SELECT),
            params![id],
            row_to_subscription,
        )
        .optional()?;
    Ok(sub)
}

fn insert_price_history(
    tx: &Transaction,
    subscription_id: i64,
    old_amount: f64,
    new_amount: f64,
    old_currency: &str,
    new_currency: &str,
    notes: Option<&str>,
) -> Result<i64> {
    tx.execute(
        r#"
        INSERT INTO price_history
            (subscription_id, old_amount, new_amount, old_currency, new_currency, changed_at, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            subscription_id,
            old_amount,
            new_amount,
            old_currency,
            new_currency,
            format_datetime(Utc::now()),
            notes,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

pub(super) fn row_to_subscription(row: &rusqlite::Row) -> rusqlite::Result<Subscription> {
    let cycle: String = row.get(5)?;
    let next_payment: String = row.get(7)?;
    let start: String = row.get(8)?;
    let created_at: String = row.get(16)?;
    let updated_at: Option<String> = row.get(17)?;

    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        amount: row.get(3)?,
        currency: row.get(4)?,
        billing_cycle: cycle.parse().unwrap_or(BillingCycle::Monthly),
        billing_day: row.get(6)?,
        next_payment_date: parse_date(&next_payment)?,
        start_date: parse_date(&start)?,
        category_id: row.get(9)?,
        payment_method_id: row.get(10)?,
        cancel_url: row.get(11)?,
        cancel_method: row.get(12)?,
        is_active: row.get(13)?,
        auto_renew: row.get(14)?,
        notes: row.get(15)?,
        created_at: parse_datetime(&created_at),
        updated_at: updated_at.map(|s| parse_datetime(&s)),
    })
}
