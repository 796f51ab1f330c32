//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `resolve_user` and the category/card resolvers
//! - Date, month and money parsing/formatting helpers
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate};
use subtrak_core::db::Database;
use subtrak_core::models::{Category, PaymentMethod, DEFAULT_CURRENCY};
use subtrak_core::reconcile::format_grouped;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Database path is not valid UTF-8"))?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// User id for an email, creating the user on first use
pub fn resolve_user(db: &Database, email: &str) -> Result<i64> {
    if let Some(user) = db.get_user_by_email(email)? {
        return Ok(user.id);
    }
    db.upsert_user(email, None)
        .with_context(|| format!("Failed to create user {}", email))
}

/// Find a category by ID or (case-insensitive) name
pub fn resolve_category(db: &Database, user_id: i64, key: &str) -> Result<Category> {
    let categories = db.list_categories(user_id)?;
    let by_id = key.parse::<i64>().ok();

    categories
        .into_iter()
        .find(|c| Some(c.id) == by_id || c.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| anyhow::anyhow!("Category not found: {}", key))
}

/// Find a payment method by ID or (case-insensitive) name
pub fn resolve_card(db: &Database, user_id: i64, key: &str) -> Result<PaymentMethod> {
    let methods = db.list_payment_methods(user_id)?;
    let by_id = key.parse::<i64>().ok();

    methods
        .into_iter()
        .find(|m| Some(m.id) == by_id || m.name.eq_ignore_ascii_case(key))
        .ok_or_else(|| anyhow::anyhow!("Payment method not found: {}", key))
}

/// Parse a `YYYY-MM-DD` argument
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (use YYYY-MM-DD)", s))
}

/// Parse a `YYYY-MM` argument into (year, month)
pub fn parse_month(s: &str) -> Result<(i32, u32)> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .with_context(|| format!("Invalid month '{}' (use YYYY-MM)", s))?;
    Ok((date.year(), date.month()))
}

/// Parse an expiry: a full date, or `YYYY-MM` meaning the last day of that month
pub fn parse_expiry(s: &str) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    let (year, month) = parse_month(s)?;
    last_day_of_month(year, month)
        .ok_or_else(|| anyhow::anyhow!("Invalid expiry '{}'", s))
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

/// Money for display: won without decimals, anything else with two
pub fn format_money(amount: f64, currency: &str) -> String {
    if currency == DEFAULT_CURRENCY {
        format!("₩{}", format_grouped(amount.round() as i64))
    } else {
        format!("{:.2} {}", amount, currency)
    }
}

pub fn cmd_init(db_path: &Path, email: &str, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let user_id = resolve_user(&db, email)?;
    println!("   User: {} (ID: {})", email, user_id);

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Link a card: subtrak accounts add \"Shinhan Card\" --org 0306 --connected-id <id>");
    println!("  2. Find subscriptions: subtrak detect --account 1 --import");
    println!("  3. Or add one by hand: subtrak subscriptions add Netflix 13500 --next 2024-07-15");

    Ok(())
}
