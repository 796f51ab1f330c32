//! Category command implementations

use anyhow::Result;
use subtrak_core::db::Database;
use subtrak_core::models::{SubscriptionFilter, DEFAULT_CURRENCY};

use super::{format_money, resolve_category};

pub fn cmd_categories_list(db: &Database, user_id: i64) -> Result<()> {
    let categories = db.list_categories(user_id)?;

    if categories.is_empty() {
        println!("No categories yet. Add one with:");
        println!("  subtrak categories add Video --color \"#ef4444\"");
        return Ok(());
    }

    println!();
    println!("🏷️  Categories");
    println!("   ─────────────────────────────────────────────");

    for category in categories {
        let subs = db.list_subscriptions(
            user_id,
            &SubscriptionFilter {
                active: Some(true),
                category_id: Some(category.id),
                ..Default::default()
            },
        )?;
        let monthly: f64 = subs.iter().map(|s| s.monthly_amount()).sum();

        println!(
            "   {:>3} {} {:20} {} │ {} subs, {}/mo",
            category.id,
            category.icon.as_deref().unwrap_or(" "),
            category.name,
            category.color,
            subs.len(),
            format_money(monthly, DEFAULT_CURRENCY)
        );
    }

    Ok(())
}

pub fn cmd_categories_add(
    db: &Database,
    user_id: i64,
    name: &str,
    color: Option<&str>,
    icon: Option<&str>,
) -> Result<()> {
    let id = db.create_category(user_id, name, color, icon)?;
    println!("✅ Created category '{}' (ID: {})", name, id);
    Ok(())
}

pub fn cmd_categories_update(
    db: &Database,
    user_id: i64,
    key: &str,
    name: Option<&str>,
    color: Option<&str>,
    icon: Option<&str>,
) -> Result<()> {
    let category = resolve_category(db, user_id, key)?;
    db.update_category(category.id, name, color, icon)?;
    println!(
        "✅ Updated category '{}'",
        name.unwrap_or(&category.name)
    );
    Ok(())
}

pub fn cmd_categories_delete(db: &Database, user_id: i64, key: &str) -> Result<()> {
    let category = resolve_category(db, user_id, key)?;
    db.delete_category(category.id)?;
    println!(
        "✅ Deleted category '{}'; its subscriptions are now uncategorized",
        category.name
    );
    Ok(())
}
