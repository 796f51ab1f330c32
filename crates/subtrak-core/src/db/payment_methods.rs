//! Payment method operations

use rusqlite::params;
use tracing::info;

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{CardType, NewPaymentMethod, PaymentMethod};

pub(super) const PAYMENT_METHOD_SELECT: &str = "SELECT id, user_id, name, card_last_four, card_type, expiry_date,
        is_active, linked_account_id, notes, created_at
    FROM payment_methods";

impl Database {
    /// Create a payment method
    pub fn create_payment_method(&self, user_id: i64, method: &NewPaymentMethod) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO payment_methods
                (user_id, name, card_last_four, card_type, expiry_date, linked_account_id, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                method.name,
                method.card_last_four,
                method.card_type.as_str(),
                method.expiry_date.map(|d| d.to_string()),
                method.linked_account_id,
                method.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a payment method by ID
    pub fn get_payment_method(&self, id: i64) -> Result<Option<PaymentMethod>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("{} WHERE id = ?", PAYMENT_METHOD_SELECT),
            params![id],
            row_to_payment_method,
        );

        match result {
            Ok(method) => Ok(Some(method)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a user's payment methods, active ones first
    pub fn list_payment_methods(&self, user_id: i64) -> Result<Vec<PaymentMethod>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE user_id = ? ORDER BY is_active DESC, name",
            PAYMENT_METHOD_SELECT
        ))?;
        let methods = stmt
            .query_map(params![user_id], row_to_payment_method)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(methods)
    }

    /// Return the payment method named `name`, creating a credit card entry if absent.
    ///
    /// Used by imports, where the only thing known about the card is the
    /// institution it was scraped from.
    pub fn find_or_create_payment_method(&self, user_id: i64, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        let existing = conn.query_row(
            "SELECT id FROM payment_methods WHERE user_id = ? AND name = ? ORDER BY id LIMIT 1",
            params![user_id, name],
            |row| row.get::<_, i64>(0),
        );

        match existing {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                drop(conn);
                let id = self.create_payment_method(
                    user_id,
                    &NewPaymentMethod {
                        name: name.to_string(),
                        ..Default::default()
                    },
                )?;
                info!("Created payment method '{}' for user {}", name, user_id);
                Ok(id)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the editable fields of a payment method
    pub fn update_payment_method(&self, id: i64, method: &NewPaymentMethod) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE payment_methods SET
                name = ?, card_last_four = ?, card_type = ?, expiry_date = ?,
                linked_account_id = ?, notes = ?
            WHERE id = ?
            "#,
            params![
                method.name,
                method.card_last_four,
                method.card_type.as_str(),
                method.expiry_date.map(|d| d.to_string()),
                method.linked_account_id,
                method.notes,
                id,
            ],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!("payment method {}", id)));
        }
        Ok(())
    }

    /// Mark a payment method active or retired
    pub fn set_payment_method_active(&self, id: i64, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE payment_methods SET is_active = ? WHERE id = ?",
            params![active, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("payment method {}", id)));
        }
        Ok(())
    }

    /// Delete a payment method. Subscriptions charged to it keep running unassigned.
    pub fn delete_payment_method(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM payment_methods WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("payment method {}", id)));
        }
        Ok(())
    }
}

pub(super) fn row_to_payment_method(row: &rusqlite::Row) -> rusqlite::Result<PaymentMethod> {
    let card_type: String = row.get(4)?;
    let expiry: Option<String> = row.get(5)?;
    let created_at: String = row.get(9)?;

    Ok(PaymentMethod {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        card_last_four: row.get(3)?,
        card_type: card_type.parse().unwrap_or(CardType::Credit),
        expiry_date: expiry.as_deref().map(parse_date).transpose()?,
        is_active: row.get(6)?,
        linked_account_id: row.get(7)?,
        notes: row.get(8)?,
        created_at: parse_datetime(&created_at),
    })
}
