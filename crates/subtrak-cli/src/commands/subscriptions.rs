//! Subscription command implementations

use anyhow::{Context, Result};
use subtrak_core::db::Database;
use subtrak_core::models::{
    BillingCycle, NewSubscription, Subscription, SubscriptionFilter, SubscriptionUpdate,
};

use super::{format_money, parse_date, resolve_card, resolve_category, truncate};

/// Arguments of `subscriptions add`
pub struct NewSubscriptionArgs {
    pub name: String,
    pub amount: f64,
    pub cycle: String,
    pub next: String,
    pub currency: String,
    pub category: Option<String>,
    pub card: Option<String>,
    pub cancel_url: Option<String>,
    pub notes: Option<String>,
}

/// Arguments of `subscriptions update`; unset flags leave the field alone
#[derive(Default)]
pub struct UpdateSubscriptionArgs {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub cycle: Option<String>,
    pub next: Option<String>,
    pub category: Option<String>,
    pub card: Option<String>,
    pub cancel_url: Option<String>,
    pub notes: Option<String>,
}

fn parse_cycle(s: &str) -> Result<BillingCycle> {
    s.parse().map_err(|e: String| anyhow::anyhow!(e))
}

fn find(db: &Database, user_id: i64, name_or_id: &str) -> Result<Subscription> {
    db.find_subscription(user_id, name_or_id)?
        .ok_or_else(|| anyhow::anyhow!("Subscription not found: {}", name_or_id))
}

pub fn cmd_subscriptions_list(
    db: &Database,
    user_id: i64,
    include_inactive: bool,
    category: Option<&str>,
    card: Option<&str>,
) -> Result<()> {
    let filter = SubscriptionFilter {
        active: if include_inactive { None } else { Some(true) },
        category_id: category
            .map(|c| resolve_category(db, user_id, c))
            .transpose()?
            .map(|c| c.id),
        payment_method_id: card
            .map(|c| resolve_card(db, user_id, c))
            .transpose()?
            .map(|m| m.id),
    };
    let subscriptions = db.list_subscriptions(user_id, &filter)?;

    if subscriptions.is_empty() {
        println!("No subscriptions yet. Run:");
        println!("  subtrak detect --account <id> --import");
        return Ok(());
    }

    println!();
    println!("📋 Subscriptions");
    println!("   ─────────────────────────────────────────────────────────────");

    for sub in subscriptions {
        let status_icon = if sub.is_active { "✅" } else { "❌" };
        println!(
            "   {} {:>3} {:20} │ {:>12}/{:<9} │ next {}",
            status_icon,
            sub.id,
            truncate(&sub.name, 20),
            format_money(sub.amount, &sub.currency),
            sub.billing_cycle.as_str(),
            sub.next_payment_date
        );
    }

    Ok(())
}

pub fn cmd_subscriptions_add(db: &Database, user_id: i64, args: NewSubscriptionArgs) -> Result<()> {
    if args.amount < 0.0 {
        anyhow::bail!("Amount must not be negative");
    }

    let next = parse_date(&args.next)?;
    let mut sub = NewSubscription::new(user_id, &args.name, args.amount, next);
    sub.billing_cycle = parse_cycle(&args.cycle)?;
    sub.currency = args.currency.to_uppercase();
    sub.category_id = args
        .category
        .as_deref()
        .map(|c| resolve_category(db, user_id, c))
        .transpose()?
        .map(|c| c.id);
    sub.payment_method_id = args
        .card
        .as_deref()
        .map(|c| resolve_card(db, user_id, c))
        .transpose()?
        .map(|m| m.id);
    sub.cancel_url = args.cancel_url;
    sub.notes = args.notes;

    let id = db
        .create_subscription(&sub)
        .context("Failed to create subscription")?;

    println!(
        "✅ Added '{}' (ID: {}) - {} {}, next payment {}",
        sub.name,
        id,
        format_money(sub.amount, &sub.currency),
        sub.billing_cycle,
        next
    );

    Ok(())
}

pub fn cmd_subscriptions_update(
    db: &Database,
    user_id: i64,
    name_or_id: &str,
    args: UpdateSubscriptionArgs,
    note: Option<&str>,
) -> Result<()> {
    let current = find(db, user_id, name_or_id)?;

    let update = SubscriptionUpdate {
        name: args.name,
        amount: args.amount,
        currency: args.currency.map(|c| c.to_uppercase()),
        billing_cycle: args.cycle.as_deref().map(parse_cycle).transpose()?,
        next_payment_date: args.next.as_deref().map(parse_date).transpose()?,
        category_id: args
            .category
            .as_deref()
            .map(|c| resolve_category(db, user_id, c).map(|c| Some(c.id)))
            .transpose()?,
        payment_method_id: args
            .card
            .as_deref()
            .map(|c| resolve_card(db, user_id, c).map(|m| Some(m.id)))
            .transpose()?,
        cancel_url: args.cancel_url.map(Some),
        notes: args.notes.map(Some),
        ..Default::default()
    };

    let updated = db.update_subscription(current.id, &update, note)?;

    println!("✅ Updated '{}' (ID: {})", updated.name, updated.id);
    if updated.amount != current.amount || updated.currency != current.currency {
        println!(
            "   Price: {} → {}",
            format_money(current.amount, &current.currency),
            format_money(updated.amount, &updated.currency)
        );
    }

    Ok(())
}

pub fn cmd_subscriptions_cancel(
    db: &Database,
    user_id: i64,
    name_or_id: &str,
    reason: Option<&str>,
) -> Result<()> {
    let sub = find(db, user_id, name_or_id)?;
    let log = db.cancel_subscription(sub.id, reason)?;

    println!("✅ Cancelled '{}' (ID: {})", sub.name, sub.id);
    println!(
        "   Saving {} per month",
        format_money(log.savings_per_month, &sub.currency)
    );
    println!("   Savings are tracked in: subtrak savings");

    Ok(())
}

pub fn cmd_subscriptions_remove(db: &Database, user_id: i64, name_or_id: &str) -> Result<()> {
    let sub = find(db, user_id, name_or_id)?;
    db.deactivate_subscription(sub.id)?;
    println!("✅ Stopped tracking '{}' (ID: {})", sub.name, sub.id);
    Ok(())
}

pub fn cmd_subscriptions_history(db: &Database, user_id: i64, name_or_id: &str) -> Result<()> {
    let sub = find(db, user_id, name_or_id)?;
    let history = db.list_price_history(sub.id)?;

    println!();
    println!("📈 Price history: {}", sub.name);
    println!("   ─────────────────────────────────────────────────────────────");

    if history.is_empty() {
        println!(
            "   No changes. Current price {}",
            format_money(sub.amount, &sub.currency)
        );
        return Ok(());
    }

    for entry in history {
        println!(
            "   {} │ {:>12} → {:>12} │ {}",
            entry.changed_at.format("%Y-%m-%d"),
            format_money(entry.old_amount, &entry.old_currency),
            format_money(entry.new_amount, &entry.new_currency),
            entry.notes.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

pub fn cmd_subscriptions_checklist(db: &Database, user_id: i64, card: &str) -> Result<()> {
    let method = resolve_card(db, user_id, card)?;
    let subs = db.card_change_checklist(user_id, method.id)?;

    if subs.is_empty() {
        println!("Nothing is charged to {}.", method.name);
        return Ok(());
    }

    println!();
    println!("🔁 Update these when replacing {}", method.name);
    println!("   ─────────────────────────────────────────────────────────────");
    for sub in subs {
        let how = sub
            .cancel_url
            .as_deref()
            .or(sub.cancel_method.as_deref())
            .unwrap_or("");
        println!(
            "   [ ] {:20} │ {:>12} │ {}",
            truncate(&sub.name, 20),
            format_money(sub.amount, &sub.currency),
            how
        );
    }

    Ok(())
}
