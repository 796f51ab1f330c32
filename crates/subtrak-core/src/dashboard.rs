//! Spending aggregation over a user's subscriptions
//!
//! Everything here is pure: the database layer loads rows and hands them in.
//! Amounts are always compared as monthly equivalents so a yearly plan and a
//! monthly plan land on the same scale.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{
    CardSpending, Category, CategorySpending, PaymentMethod, Subscription, UpcomingPayment,
};

/// Label for subscriptions without a category
pub const UNCATEGORIZED_NAME: &str = "Uncategorized";

/// Color for the uncategorized bucket
pub const UNCATEGORIZED_COLOR: &str = "#94a3b8";

/// Sum of monthly equivalents over active subscriptions
pub fn total_monthly_cost(subscriptions: &[Subscription]) -> f64 {
    subscriptions
        .iter()
        .filter(|s| s.is_active)
        .map(Subscription::monthly_amount)
        .sum()
}

/// Active subscriptions due on or before `today + days`, soonest first.
///
/// Overdue payments stay in the list with a negative `days_until` until the
/// maintenance pass rolls them forward.
pub fn due_by(subscriptions: &[Subscription], today: NaiveDate, days: i64) -> Vec<UpcomingPayment> {
    payments_where(subscriptions, today, |days_until| days_until <= days)
}

/// Active subscriptions whose next payment falls in `[today, today + days]`, soonest first
pub fn upcoming_within(
    subscriptions: &[Subscription],
    today: NaiveDate,
    days: i64,
) -> Vec<UpcomingPayment> {
    payments_where(subscriptions, today, |days_until| (0..=days).contains(&days_until))
}

fn payments_where<F>(
    subscriptions: &[Subscription],
    today: NaiveDate,
    keep: F,
) -> Vec<UpcomingPayment>
where
    F: Fn(i64) -> bool,
{
    let mut payments: Vec<UpcomingPayment> = subscriptions
        .iter()
        .filter(|s| s.is_active)
        .filter_map(|s| {
            let days_until = (s.next_payment_date - today).num_days();
            keep(days_until).then(|| UpcomingPayment {
                subscription_id: s.id,
                subscription_name: s.name.clone(),
                amount: s.amount,
                currency: s.currency.clone(),
                date: s.next_payment_date,
                days_until,
            })
        })
        .collect();

    payments.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.subscription_name.cmp(&b.subscription_name))
    });
    payments
}

/// Monthly spend per category, largest first.
///
/// Only categories with at least one active subscription appear.
pub fn category_breakdown(
    subscriptions: &[Subscription],
    categories: &[Category],
) -> Vec<CategorySpending> {
    let total = total_monthly_cost(subscriptions);
    let by_id: HashMap<i64, &Category> = categories.iter().map(|c| (c.id, c)).collect();

    // Insertion order keeps ties stable
    let mut order: Vec<Option<i64>> = Vec::new();
    let mut sums: HashMap<Option<i64>, f64> = HashMap::new();
    for sub in subscriptions.iter().filter(|s| s.is_active) {
        // A dangling category id counts as uncategorized
        let key = sub.category_id.filter(|id| by_id.contains_key(id));
        if !sums.contains_key(&key) {
            order.push(key);
        }
        *sums.entry(key).or_insert(0.0) += sub.monthly_amount();
    }

    let mut breakdown: Vec<CategorySpending> = order
        .into_iter()
        .map(|key| {
            let amount = sums.get(&key).copied().unwrap_or_default();
            let (name, color) = match key.and_then(|id| by_id.get(&id)) {
                Some(category) => (category.name.clone(), category.color.clone()),
                None => (
                    UNCATEGORIZED_NAME.to_string(),
                    UNCATEGORIZED_COLOR.to_string(),
                ),
            };
            CategorySpending {
                category_name: name,
                color,
                total_amount: amount,
                percentage: if total > 0.0 {
                    amount / total * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();

    breakdown.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));
    breakdown
}

/// Monthly spend per payment method, largest first.
///
/// Subscriptions without a payment method are left out.
pub fn card_breakdown(
    subscriptions: &[Subscription],
    methods: &[PaymentMethod],
) -> Vec<CardSpending> {
    let mut breakdown: Vec<CardSpending> = Vec::new();

    for method in methods {
        let charged: Vec<&Subscription> = subscriptions
            .iter()
            .filter(|s| s.is_active && s.payment_method_id == Some(method.id))
            .collect();
        if charged.is_empty() {
            continue;
        }

        breakdown.push(CardSpending {
            payment_method_id: method.id,
            card_name: method.name.clone(),
            card_last_four: method.card_last_four.clone(),
            total_amount: charged.iter().map(|s| s.monthly_amount()).sum(),
            subscription_count: charged.len(),
        });
    }

    breakdown.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillingCycle, CardType};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sub(id: i64, name: &str, amount: f64, cycle: BillingCycle, next: NaiveDate) -> Subscription {
        Subscription {
            id,
            user_id: 1,
            name: name.to_string(),
            amount,
            currency: "KRW".to_string(),
            billing_cycle: cycle,
            billing_day: None,
            next_payment_date: next,
            start_date: next,
            category_id: None,
            payment_method_id: None,
            cancel_url: None,
            cancel_method: None,
            is_active: true,
            auto_renew: true,
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            user_id: 1,
            name: name.to_string(),
            color: "#ff0000".to_string(),
            icon: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_total_monthly_cost_mixes_cycles() {
        let today = date(2024, 6, 1);
        let mut cancelled = sub(3, "Old", 99999.0, BillingCycle::Monthly, today);
        cancelled.is_active = false;

        let subs = vec![
            sub(1, "Netflix", 13500.0, BillingCycle::Monthly, today),
            sub(2, "Domain", 24000.0, BillingCycle::Yearly, today),
            cancelled,
        ];
        assert_eq!(total_monthly_cost(&subs), 15500.0);
    }

    #[test]
    fn test_upcoming_window_is_inclusive() {
        let today = date(2024, 6, 1);
        let subs = vec![
            sub(1, "Late", 1000.0, BillingCycle::Monthly, date(2024, 6, 4)),
            sub(2, "Today", 1000.0, BillingCycle::Monthly, today),
            sub(3, "Past", 1000.0, BillingCycle::Monthly, date(2024, 5, 31)),
            sub(4, "Far", 1000.0, BillingCycle::Monthly, date(2024, 6, 5)),
        ];

        let upcoming = upcoming_within(&subs, today, 3);
        let names: Vec<_> = upcoming.iter().map(|u| u.subscription_name.as_str()).collect();
        assert_eq!(names, vec!["Today", "Late"]);
        assert_eq!(upcoming[1].days_until, 3);
    }

    #[test]
    fn test_due_by_keeps_overdue() {
        let today = date(2024, 6, 10);
        let subs = vec![
            sub(1, "Overdue", 1000.0, BillingCycle::Monthly, date(2024, 6, 1)),
            sub(2, "Soon", 1000.0, BillingCycle::Monthly, date(2024, 6, 20)),
            sub(3, "Later", 1000.0, BillingCycle::Monthly, date(2024, 8, 1)),
        ];

        let due = due_by(&subs, today, 30);
        let names: Vec<_> = due.iter().map(|u| u.subscription_name.as_str()).collect();
        assert_eq!(names, vec!["Overdue", "Soon"]);
        assert_eq!(due[0].days_until, -9);

        // The reminder window still starts today
        assert_eq!(upcoming_within(&subs, today, 30).len(), 1);
    }

    #[test]
    fn test_category_breakdown_with_uncategorized_bucket() {
        let today = date(2024, 6, 1);
        let mut video = sub(1, "Netflix", 15000.0, BillingCycle::Monthly, today);
        video.category_id = Some(10);
        let plain = sub(2, "Gym", 5000.0, BillingCycle::Monthly, today);

        let breakdown = category_breakdown(&[video, plain], &[category(10, "Video")]);

        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category_name, "Video");
        assert_eq!(breakdown[0].percentage, 75.0);
        assert_eq!(breakdown[1].category_name, UNCATEGORIZED_NAME);
        assert_eq!(breakdown[1].color, UNCATEGORIZED_COLOR);
        assert_eq!(breakdown[1].percentage, 25.0);
    }

    #[test]
    fn test_category_breakdown_empty() {
        assert!(category_breakdown(&[], &[]).is_empty());
    }

    #[test]
    fn test_card_breakdown_skips_unused_cards() {
        let today = date(2024, 6, 1);
        let mut a = sub(1, "A", 1000.0, BillingCycle::Monthly, today);
        a.payment_method_id = Some(1);
        let mut b = sub(2, "B", 12000.0, BillingCycle::Yearly, today);
        b.payment_method_id = Some(1);

        let card = |id: i64, name: &str| PaymentMethod {
            id,
            user_id: 1,
            name: name.to_string(),
            card_last_four: Some("1234".to_string()),
            card_type: CardType::Credit,
            expiry_date: None,
            is_active: true,
            linked_account_id: None,
            notes: None,
            created_at: Utc::now(),
        };

        let breakdown = card_breakdown(&[a, b], &[card(1, "Shinhan"), card(2, "Unused")]);
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].card_name, "Shinhan");
        assert_eq!(breakdown[0].total_amount, 2000.0);
        assert_eq!(breakdown[0].subscription_count, 2);
    }
}
