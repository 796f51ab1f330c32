//! Dashboard, savings and calendar queries

use chrono::NaiveDate;
use rusqlite::params;

use super::Database;
use crate::calendar::build_calendar_month;
use crate::dashboard::{card_breakdown, category_breakdown, due_by, total_monthly_cost};
use crate::error::Result;
use crate::models::{
    CalendarMonth, DashboardSummary, SavingsSummary, Subscription, SubscriptionFilter,
    UpcomingPayment,
};

impl Database {
    /// Spending overview for a user as of `today`
    pub fn dashboard_summary(
        &self,
        user_id: i64,
        today: NaiveDate,
        upcoming_days: i64,
    ) -> Result<DashboardSummary> {
        let active = self.list_subscriptions(user_id, &SubscriptionFilter::active())?;
        let categories = self.list_categories(user_id)?;
        let methods = self.list_payment_methods(user_id)?;
        let savings = self.savings_summary(user_id)?;

        let total_monthly_cost = total_monthly_cost(&active);

        Ok(DashboardSummary {
            total_monthly_cost,
            total_yearly_cost: total_monthly_cost * 12.0,
            active_count: active.len(),
            upcoming_payments: due_by(&active, today, upcoming_days),
            category_breakdown: category_breakdown(&active, &categories),
            card_breakdown: card_breakdown(&active, &methods),
            total_savings_from_cancellations: savings.total_monthly_savings,
        })
    }

    /// Active payments due by `today + days`, overdue ones included
    pub fn upcoming_payments(
        &self,
        user_id: i64,
        today: NaiveDate,
        days: i64,
    ) -> Result<Vec<UpcomingPayment>> {
        let active = self.list_subscriptions(user_id, &SubscriptionFilter::active())?;
        Ok(due_by(&active, today, days))
    }

    /// Active subscriptions charged to a payment method, by name.
    ///
    /// This is the list to work through when a card is replaced.
    pub fn card_change_checklist(
        &self,
        user_id: i64,
        payment_method_id: i64,
    ) -> Result<Vec<Subscription>> {
        let mut subs = self.list_subscriptions(
            user_id,
            &SubscriptionFilter {
                active: Some(true),
                payment_method_id: Some(payment_method_id),
                ..Default::default()
            },
        )?;
        subs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(subs)
    }

    /// What cancelling has saved so far
    pub fn savings_summary(&self, user_id: i64) -> Result<SavingsSummary> {
        let conn = self.conn()?;
        let (monthly, count): (f64, i64) = conn.query_row(
            r#"
            SELECT COALESCE(SUM(c.savings_per_month), 0), COUNT(c.id)
            FROM cancellation_logs c
            JOIN subscriptions s ON s.id = c.subscription_id
            WHERE s.user_id = ?
            "#,
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(SavingsSummary {
            total_monthly_savings: monthly,
            total_cumulative_savings: monthly * 12.0,
            cancellation_count: count as usize,
        })
    }

    /// Payment calendar for one month
    pub fn calendar_month(&self, user_id: i64, year: i32, month: u32) -> Result<CalendarMonth> {
        let active = self.list_subscriptions(user_id, &SubscriptionFilter::active())?;
        Ok(build_calendar_month(&active, year, month))
    }
}
