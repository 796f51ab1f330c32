//! Linked aggregator account operations

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::Value;
use tracing::info;

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{BusinessType, CardType, LinkedAccount, NewPaymentMethod};
use crate::normalize::RawTransaction;

impl Database {
    /// Register an aggregator connection for a user
    pub fn create_linked_account(
        &self,
        user_id: i64,
        institution_name: &str,
        organization_code: &str,
        connected_id: &str,
        business_type: BusinessType,
        account_identifier: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO linked_accounts
                (user_id, institution_name, organization_code, connected_id, business_type, account_identifier)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                institution_name,
                organization_code,
                connected_id,
                business_type.as_str(),
                account_identifier,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a linked account by ID
    pub fn get_linked_account(&self, id: i64) -> Result<Option<LinkedAccount>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            r#"
            SELECT id, user_id, institution_name, organization_code, connected_id,
                   business_type, account_identifier, last_synced_at, created_at
            FROM linked_accounts WHERE id = ?
            "#,
            params![id],
            row_to_linked_account,
        );

        match result {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a user's linked accounts
    pub fn list_linked_accounts(&self, user_id: i64) -> Result<Vec<LinkedAccount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, institution_name, organization_code, connected_id,
                   business_type, account_identifier, last_synced_at, created_at
            FROM linked_accounts WHERE user_id = ?
            ORDER BY institution_name
            "#,
        )?;
        let accounts = stmt
            .query_map(params![user_id], row_to_linked_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Record a successful scrape
    pub fn touch_linked_account_synced(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE linked_accounts SET last_synced_at = ? WHERE id = ?",
            params![format_datetime(at), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("linked account {}", id)));
        }
        Ok(())
    }

    /// Remove a linked account. Payment methods discovered through it are kept.
    pub fn delete_linked_account(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM linked_accounts WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("linked account {}", id)));
        }
        Ok(())
    }

    /// Create payment methods for cards discovered on a linked account.
    ///
    /// Cards without a number are ignored; a card whose last four digits
    /// already exist on this account is not added twice. When no card is
    /// usable, one payment method named after the institution stands in.
    /// Returns the ids of the payment methods created.
    pub fn save_discovered_cards(
        &self,
        account: &LinkedAccount,
        cards: &[RawTransaction],
    ) -> Result<Vec<i64>> {
        let mut existing: Vec<Option<String>> = self
            .list_payment_methods(account.user_id)?
            .into_iter()
            .filter(|m| m.linked_account_id == Some(account.id))
            .map(|m| m.card_last_four)
            .collect();

        let card_type = match account.business_type {
            BusinessType::Card => CardType::Credit,
            BusinessType::Bank => CardType::BankTransfer,
        };

        let mut discovered: Vec<NewPaymentMethod> = cards
            .iter()
            .filter_map(|card| {
                let number = text(card, &["resCardNo", "resCardNumber"])?;
                let name = text(card, &["resCardName"])
                    .unwrap_or_else(|| account.institution_name.clone());
                Some(NewPaymentMethod {
                    name,
                    card_last_four: Some(last_four(&number)),
                    card_type,
                    linked_account_id: Some(account.id),
                    ..Default::default()
                })
            })
            .collect();

        if discovered.is_empty() {
            discovered.push(NewPaymentMethod {
                name: account.institution_name.clone(),
                card_last_four: account.account_identifier.as_deref().map(last_four),
                card_type,
                linked_account_id: Some(account.id),
                ..Default::default()
            });
        }

        let mut created = Vec::new();
        for method in discovered {
            let duplicate = existing.contains(&method.card_last_four)
                || (method.card_last_four.is_none() && !existing.is_empty());
            if duplicate {
                continue;
            }
            created.push(self.create_payment_method(account.user_id, &method)?);
            existing.push(method.card_last_four);
        }

        info!(
            "Saved {} payment methods from {}",
            created.len(),
            account.institution_name
        );
        Ok(created)
    }
}

/// First non-empty string under any of `keys`
fn text(record: &RawTransaction, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| match record.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
}

fn last_four(number: &str) -> String {
    let chars: Vec<char> = number.chars().collect();
    chars[chars.len().saturating_sub(4)..].iter().collect()
}

fn row_to_linked_account(row: &rusqlite::Row) -> rusqlite::Result<LinkedAccount> {
    let business_type: String = row.get(5)?;
    let last_synced_at: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;

    Ok(LinkedAccount {
        id: row.get(0)?,
        user_id: row.get(1)?,
        institution_name: row.get(2)?,
        organization_code: row.get(3)?,
        connected_id: row.get(4)?,
        business_type: business_type.parse().unwrap_or_default(),
        account_identifier: row.get(6)?,
        last_synced_at: last_synced_at.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_at),
    })
}
