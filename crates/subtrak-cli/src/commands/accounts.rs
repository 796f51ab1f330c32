//! Linked aggregator account command implementations

use anyhow::{Context, Result};
use subtrak_core::db::Database;
use subtrak_core::models::{BusinessType, LinkedAccount};
use subtrak_core::{AggregatorClient, Config, RawTransaction};

fn owned_account(db: &Database, user_id: i64, id: i64) -> Result<LinkedAccount> {
    db.get_linked_account(id)?
        .filter(|a| a.user_id == user_id)
        .ok_or_else(|| anyhow::anyhow!("Linked account not found: {}", id))
}

fn card_field<'a>(card: &'a RawTransaction, keys: &[&str]) -> &'a str {
    keys.iter()
        .find_map(|k| card.get(*k).and_then(|v| v.as_str()))
        .unwrap_or("-")
}

pub fn cmd_accounts_list(db: &Database, user_id: i64) -> Result<()> {
    let accounts = db.list_linked_accounts(user_id)?;

    if accounts.is_empty() {
        println!("No linked accounts. Register one with:");
        println!("  subtrak accounts add \"Shinhan Card\" --org 0306 --connected-id <id>");
        return Ok(());
    }

    println!();
    println!("🔗 Linked accounts");
    println!("   ─────────────────────────────────────────────────────────────");

    for account in accounts {
        println!(
            "   {:>3} {:20} │ {:4} │ org {} │ last sync {}",
            account.id,
            account.institution_name,
            account.business_type.as_str(),
            account.organization_code,
            account
                .last_synced_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string())
        );
    }

    Ok(())
}

pub fn cmd_accounts_add(
    db: &Database,
    user_id: i64,
    institution: &str,
    org: &str,
    connected_id: &str,
    business_type: &str,
    number: Option<&str>,
) -> Result<()> {
    let business_type: BusinessType = business_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    if business_type == BusinessType::Bank && number.is_none() {
        anyhow::bail!("Bank accounts need --number to select the account");
    }

    let id = db.create_linked_account(
        user_id,
        institution,
        org,
        connected_id,
        business_type,
        number,
    )?;
    println!("✅ Linked '{}' (ID: {})", institution, id);
    println!("   Detect subscriptions with: subtrak detect --account {}", id);
    Ok(())
}

pub fn cmd_accounts_remove(db: &Database, user_id: i64, id: i64) -> Result<()> {
    let account = owned_account(db, user_id, id)?;
    db.delete_linked_account(account.id)?;
    println!("✅ Removed '{}' (ID: {})", account.institution_name, account.id);
    Ok(())
}

pub async fn cmd_accounts_cards(
    db: &Database,
    user_id: i64,
    config: &Config,
    id: i64,
    save: bool,
) -> Result<()> {
    let account = owned_account(db, user_id, id)?;
    let client = AggregatorClient::from_config(&config.aggregator)
        .context("Aggregator credentials are required to list cards")?;

    let cards = client
        .card_list(&account.connected_id, &account.organization_code)
        .await
        .with_context(|| format!("Failed to list cards at {}", account.institution_name))?;

    println!();
    println!("💳 Cards at {}", account.institution_name);
    println!("   ─────────────────────────────────────────────");
    if cards.is_empty() {
        println!("   (none reported)");
    }
    for card in &cards {
        println!(
            "   {:24} │ {}",
            card_field(card, &["resCardName"]),
            card_field(card, &["resCardNo", "resCardNumber"])
        );
    }

    if save {
        let created = db.save_discovered_cards(&account, &cards)?;
        println!();
        println!("✅ Saved {} new payment methods", created.len());
    }

    Ok(())
}
