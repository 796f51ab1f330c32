//! Payment method command implementations

use anyhow::Result;
use subtrak_core::db::Database;
use subtrak_core::models::{CardType, NewPaymentMethod};

use super::{parse_expiry, resolve_card};

pub fn cmd_cards_list(db: &Database, user_id: i64) -> Result<()> {
    let methods = db.list_payment_methods(user_id)?;

    if methods.is_empty() {
        println!("No payment methods yet. Add one with:");
        println!("  subtrak cards add \"Shinhan Deep Dream\" --last4 1234 --expiry 2027-08");
        return Ok(());
    }

    println!();
    println!("💳 Payment methods");
    println!("   ─────────────────────────────────────────────────────────────");

    for method in methods {
        let status_icon = if method.is_active { "✅" } else { "💤" };
        println!(
            "   {} {:>3} {:24} │ {:13} │ **** {:4} │ expires {}",
            status_icon,
            method.id,
            method.name,
            method.card_type.as_str(),
            method.card_last_four.as_deref().unwrap_or("----"),
            method
                .expiry_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    Ok(())
}

pub fn cmd_cards_add(
    db: &Database,
    user_id: i64,
    name: &str,
    last4: Option<&str>,
    card_type: &str,
    expiry: Option<&str>,
    notes: Option<&str>,
) -> Result<()> {
    if let Some(digits) = last4 {
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            anyhow::bail!("--last4 must be exactly four digits");
        }
    }

    let method = NewPaymentMethod {
        name: name.to_string(),
        card_last_four: last4.map(String::from),
        card_type: card_type
            .parse::<CardType>()
            .map_err(|e| anyhow::anyhow!(e))?,
        expiry_date: expiry.map(parse_expiry).transpose()?,
        linked_account_id: None,
        notes: notes.map(String::from),
    };

    let id = db.create_payment_method(user_id, &method)?;
    println!("✅ Added payment method '{}' (ID: {})", name, id);
    Ok(())
}

pub fn cmd_cards_retire(db: &Database, user_id: i64, key: &str) -> Result<()> {
    let method = resolve_card(db, user_id, key)?;
    db.set_payment_method_active(method.id, false)?;

    let remaining = db.card_change_checklist(user_id, method.id)?;
    println!("✅ Retired '{}'", method.name);
    if !remaining.is_empty() {
        println!(
            "   ⚠️  {} subscriptions are still charged to it. See:",
            remaining.len()
        );
        println!("   subtrak subscriptions checklist {}", method.id);
    }
    Ok(())
}

pub fn cmd_cards_delete(db: &Database, user_id: i64, key: &str) -> Result<()> {
    let method = resolve_card(db, user_id, key)?;
    db.delete_payment_method(method.id)?;
    println!("✅ Deleted payment method '{}'", method.name);
    Ok(())
}
