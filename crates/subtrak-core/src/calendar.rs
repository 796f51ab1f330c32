//! Payment calendar date math

use chrono::{Datelike, NaiveDate};

use crate::models::{BillingCycle, CalendarEvent, CalendarMonth, Subscription};

/// Every date a subscription charges within one calendar month.
///
/// Steps backward from `next_payment_date` by whole cycles until at or before
/// the first of the month, then forward collecting each date inside the month.
/// Returns an empty list for an invalid month.
pub fn payments_in_month(
    next_payment_date: NaiveDate,
    cycle: BillingCycle,
    year: i32,
    month: u32,
) -> Vec<NaiveDate> {
    let Some(month_start) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let Some(month_end) = month_start
        .checked_add_months(chrono::Months::new(1))
        .and_then(|d| d.pred_opt())
    else {
        return Vec::new();
    };

    let mut current = next_payment_date;
    while current > month_start {
        match cycle.retreat(current) {
            Some(prev) => current = prev,
            None => break,
        }
    }

    let mut dates = Vec::new();
    while current <= month_end {
        if current >= month_start {
            dates.push(current);
        }
        match cycle.advance(current) {
            Some(next) if next > current => current = next,
            _ => break,
        }
    }

    dates
}

/// Calendar view of a month for the given subscriptions, sorted by date.
///
/// Inactive subscriptions are ignored.
pub fn build_calendar_month(
    subscriptions: &[Subscription],
    year: i32,
    month: u32,
) -> CalendarMonth {
    let mut events: Vec<CalendarEvent> = subscriptions
        .iter()
        .filter(|s| s.is_active)
        .flat_map(|s| {
            payments_in_month(s.next_payment_date, s.billing_cycle, year, month)
                .into_iter()
                .map(move |date| CalendarEvent {
                    subscription_id: s.id,
                    subscription_name: s.name.clone(),
                    amount: s.amount,
                    currency: s.currency.clone(),
                    date,
                })
        })
        .collect();

    events.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.subscription_id.cmp(&b.subscription_id))
    });
    let total_amount = events.iter().map(|e| e.amount).sum();

    CalendarMonth {
        year,
        month,
        events,
        total_amount,
    }
}

/// `(year, month)` of the month after the given one
pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// `(year, month)` of a date
pub fn month_of(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}
