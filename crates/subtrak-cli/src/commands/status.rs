//! Status-related command implementations (status, dashboard, upcoming, calendar, savings, maintain)

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use subtrak_core::calendar::{month_of, next_month};
use subtrak_core::db::Database;
use subtrak_core::models::{SubscriptionFilter, DEFAULT_CURRENCY};
use subtrak_core::{run_maintenance, Config};

use super::{format_money, open_db, parse_month, truncate};

/// "today", "tomorrow", "in 5 days" or "3 days overdue"
pub fn due_label(days_until: i64) -> String {
    match days_until {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n if n < 0 => format!("{} days overdue", -n),
        n => format!("in {} days", n),
    }
}

pub fn cmd_status(db_path: &Path, no_encrypt: bool) -> Result<()> {
    use std::fs;
    use subtrak_core::db::DB_KEY_ENV;

    println!();
    println!("📊 SubTrak Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if db.is_encrypted()? {
                    println!("   🔑 Opened with SQLCipher key");
                }
                println!();
                for user in db.list_users()? {
                    let subs = db.list_subscriptions(user.id, &SubscriptionFilter::default())?;
                    let active = subs.iter().filter(|s| s.is_active).count();
                    let cards = db.list_payment_methods(user.id)?.len();
                    let accounts = db.list_linked_accounts(user.id)?.len();
                    println!(
                        "   {}: {} active / {} total subscriptions, {} cards, {} linked accounts",
                        user.email,
                        active,
                        subs.len(),
                        cards,
                        accounts
                    );
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_dashboard(
    db: &Database,
    user_id: i64,
    today: NaiveDate,
    upcoming_days: i64,
    json: bool,
) -> Result<()> {
    let summary = db.dashboard_summary(user_id, today, upcoming_days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let money = |amount: f64| format_money(amount, DEFAULT_CURRENCY);

    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│          💳 SubTrak Dashboard           │");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  📋 Active Subscriptions: {}", summary.active_count);
    println!("     Monthly Cost: {}", money(summary.total_monthly_cost));
    println!("     Yearly Cost:  {}", money(summary.total_yearly_cost));
    if summary.total_savings_from_cancellations > 0.0 {
        println!(
            "  💸 Saved by cancelling: {}/mo",
            money(summary.total_savings_from_cancellations)
        );
    }

    if !summary.category_breakdown.is_empty() {
        println!();
        println!("  By category");
        for category in &summary.category_breakdown {
            println!(
                "     {:20} {:>12}  {:>5.1}%",
                truncate(&category.category_name, 20),
                money(category.total_amount),
                category.percentage
            );
        }
    }

    if !summary.card_breakdown.is_empty() {
        println!();
        println!("  By card");
        for card in &summary.card_breakdown {
            let label = match &card.card_last_four {
                Some(last4) => format!("{} ({})", card.card_name, last4),
                None => card.card_name.clone(),
            };
            println!(
                "     {:20} {:>12}  {} subs",
                truncate(&label, 20),
                money(card.total_amount),
                card.subscription_count
            );
        }
    }

    println!();
    if summary.upcoming_payments.is_empty() {
        println!("  No payments in the next {} days.", upcoming_days);
    } else {
        println!("  Next {} days", upcoming_days);
        for payment in &summary.upcoming_payments {
            println!(
                "     {} │ {:20} │ {:>12} │ {}",
                payment.date,
                truncate(&payment.subscription_name, 20),
                format_money(payment.amount, &payment.currency),
                due_label(payment.days_until)
            );
        }
    }
    println!();

    Ok(())
}

pub fn cmd_upcoming(db: &Database, user_id: i64, today: NaiveDate, days: i64) -> Result<()> {
    let payments = db.upcoming_payments(user_id, today, days)?;

    if payments.is_empty() {
        println!("✅ No payments due in the next {} days.", days);
        return Ok(());
    }

    println!();
    println!("📅 Due in the next {} days", days);
    println!("   ─────────────────────────────────────────────────────────────");

    for payment in &payments {
        println!(
            "   {} │ {:20} │ {:>12} │ {}",
            payment.date,
            truncate(&payment.subscription_name, 20),
            format_money(payment.amount, &payment.currency),
            due_label(payment.days_until)
        );
    }

    Ok(())
}

pub fn cmd_calendar(
    db: &Database,
    user_id: i64,
    month: Option<&str>,
    today: NaiveDate,
) -> Result<()> {
    let (year, month) = match month {
        Some(m) => parse_month(m)?,
        None => month_of(today),
    };
    let calendar = db.calendar_month(user_id, year, month)?;

    println!();
    println!("🗓️  {:04}-{:02}", year, month);
    println!("   ─────────────────────────────────────────────────────────────");

    if calendar.events.is_empty() {
        println!("   No payments this month.");
    }
    for event in &calendar.events {
        println!(
            "   {} │ {:20} │ {:>12}",
            event.date,
            truncate(&event.subscription_name, 20),
            format_money(event.amount, &event.currency)
        );
    }

    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Total: {}",
        format_money(calendar.total_amount, DEFAULT_CURRENCY)
    );

    let (next_year, next) = next_month(year, month);
    println!();
    println!(
        "   Next month: subtrak calendar --month {:04}-{:02}",
        next_year, next
    );

    Ok(())
}

pub fn cmd_savings(db: &Database, user_id: i64) -> Result<()> {
    let savings = db.savings_summary(user_id)?;

    if savings.cancellation_count == 0 {
        println!("No cancellations recorded yet. Cancel with:");
        println!("  subtrak subscriptions cancel <name> --reason \"...\"");
        return Ok(());
    }

    println!();
    println!("💸 Savings");
    println!("   ─────────────────────────────");
    println!("   Cancelled: {}", savings.cancellation_count);
    println!(
        "   Per month: {}",
        format_money(savings.total_monthly_savings, DEFAULT_CURRENCY)
    );
    println!(
        "   Per year:  {}",
        format_money(savings.total_cumulative_savings, DEFAULT_CURRENCY)
    );
    println!();

    for log in db.list_cancellation_logs(user_id)? {
        println!(
            "   {} │ {:20} │ {:>12}/mo │ {}",
            log.cancelled_at.format("%Y-%m-%d"),
            truncate(log.subscription_name.as_deref().unwrap_or("?"), 20),
            format_money(log.savings_per_month, DEFAULT_CURRENCY),
            log.reason.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

pub fn cmd_maintain(db: &Database, config: &Config, today: NaiveDate, json: bool) -> Result<()> {
    let report = run_maintenance(db, today, &config.maintenance)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🔄 Maintenance for {}", today);
    println!(
        "   Advanced {} overdue payment dates",
        report.rolled_over.len()
    );
    for rollover in &report.rolled_over {
        println!(
            "     {} : {} → {}",
            rollover.subscription_name, rollover.previous_date, rollover.next_date
        );
    }

    let behind = report.still_overdue(today);
    if behind > 0 {
        println!(
            "   ⚠️  {} still overdue; run `subtrak maintain` again",
            behind
        );
    }

    println!(
        "   {} payments due within {} days",
        report.upcoming_payments.len(),
        config.maintenance.upcoming_days
    );
    for due in &report.upcoming_payments {
        println!(
            "     {} │ {} │ {}",
            due.payment.date,
            due.payment.subscription_name,
            format_money(due.payment.amount, &due.payment.currency)
        );
    }

    println!(
        "   {} cards expiring within {} days",
        report.expiring_cards.len(),
        config.maintenance.card_expiry_days
    );
    for card in &report.expiring_cards {
        if let Some(expiry) = card.expiry_date {
            println!("     {} expires {}", card.name, expiry);
        }
    }

    Ok(())
}
