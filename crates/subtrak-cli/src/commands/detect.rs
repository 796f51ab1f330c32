//! Detection and import command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use subtrak_core::db::Database;
use subtrak_core::models::{
    DetectedSubscription, ImportCandidate, ImportReport, DEFAULT_CURRENCY,
};
use subtrak_core::{
    detect_subscriptions_with_shape, AggregatorClient, Config, JsonFileSource, SourceShape,
    TransactionSource,
};

use super::{format_money, truncate};

/// Where `detect` reads transactions from
pub enum DetectSource {
    /// A saved response or plain JSON array on disk
    File {
        path: PathBuf,
        shape: SourceShape,
        /// Payment method name for imports
        card: Option<String>,
    },
    /// A linked account, fetched through the aggregator
    Account(i64),
}

pub struct DetectOptions {
    pub months: u32,
    pub import: bool,
    pub json: bool,
}

pub fn parse_shape(s: &str) -> Result<SourceShape> {
    match s.to_lowercase().as_str() {
        "card" => Ok(SourceShape::CardApproval),
        "bank" => Ok(SourceShape::BankTransaction),
        _ => anyhow::bail!("Unknown shape '{}' (use card or bank)", s),
    }
}

pub async fn cmd_detect(
    db: &Database,
    user_id: i64,
    config: &Config,
    source: DetectSource,
    options: &DetectOptions,
    today: NaiveDate,
) -> Result<()> {
    let (detected, card_name) = match source {
        DetectSource::File { path, shape, card } => {
            let source = JsonFileSource::new(&path);
            let transactions = source
                .load()
                .with_context(|| format!("Failed to read transactions from {}", path.display()))?;
            if !options.json {
                println!(
                    "🔍 Scanning {} transactions from {}...",
                    transactions.len(),
                    path.display()
                );
            }
            (detect_subscriptions_with_shape(&transactions, shape), card)
        }
        DetectSource::Account(account_id) => {
            let account = db
                .get_linked_account(account_id)?
                .filter(|a| a.user_id == user_id)
                .ok_or_else(|| anyhow::anyhow!("Linked account not found: {}", account_id))?;

            let client = AggregatorClient::from_config(&config.aggregator)
                .context("Aggregator credentials are required for --account")?;
            if !options.json {
                println!(
                    "🔍 Fetching {} months from {} via {}...",
                    options.months,
                    account.institution_name,
                    client.name()
                );
            }

            let transactions = client
                .fetch_transactions(&account, options.months)
                .await
                .with_context(|| format!("Failed to fetch from {}", account.institution_name))?;
            db.touch_linked_account_synced(account.id, Utc::now())?;

            if !options.json {
                println!("   Found {} transactions", transactions.len());
            }

            let shape = SourceShape::from(account.business_type);
            (
                detect_subscriptions_with_shape(&transactions, shape),
                Some(account.institution_name),
            )
        }
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&detected)?);
    } else {
        print_detected(&detected);
    }

    if options.import && !detected.is_empty() {
        let candidates: Vec<ImportCandidate> =
            detected.iter().map(ImportCandidate::from).collect();
        let report = import_candidates(db, user_id, &candidates, card_name.as_deref(), today)?;
        if !options.json {
            print_report(&report);
        }
    } else if !detected.is_empty() && !options.json {
        println!();
        println!("Run again with --import to add them, or save with --json and use `subtrak import`.");
    }

    Ok(())
}

pub fn cmd_import(
    db: &Database,
    user_id: i64,
    file: &Path,
    card: Option<&str>,
    today: NaiveDate,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to open file: {}", file.display()))?;
    let candidates: Vec<ImportCandidate> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid candidate list in {}", file.display()))?;

    println!(
        "📥 Importing {} candidates from {}...",
        candidates.len(),
        file.display()
    );

    let report = import_candidates(db, user_id, &candidates, card, today)?;
    print_report(&report);

    Ok(())
}

/// Reconcile candidates, charging them to `card` (created if new)
fn import_candidates(
    db: &Database,
    user_id: i64,
    candidates: &[ImportCandidate],
    card: Option<&str>,
    today: NaiveDate,
) -> Result<ImportReport> {
    let payment_method_id = card
        .map(|name| db.find_or_create_payment_method(user_id, name))
        .transpose()?;
    Ok(db.import_candidates(user_id, candidates, payment_method_id, today)?)
}

fn print_detected(detected: &[DetectedSubscription]) {
    if detected.is_empty() {
        println!("✅ No recurring charges found.");
        return;
    }

    println!();
    println!("📋 Recurring charges");
    println!("   ─────────────────────────────────────────────────────────────");
    for sub in detected {
        println!(
            "   {:20} │ {:>12}/{:<7} │ day {:>2} │ {} charges, last {}",
            truncate(&sub.name, 20),
            format_money(sub.amount as f64, DEFAULT_CURRENCY),
            sub.billing_cycle.as_str(),
            sub.billing_day,
            sub.occurrence_count,
            sub.last_payment_date
        );
    }
}

fn print_report(report: &ImportReport) {
    println!();
    println!("✅ Import complete!");
    println!("   Imported: {}", report.imported);
    println!("   Skipped: {}", report.skipped);
    for line in &report.details {
        println!("   - {}", line);
    }
}
