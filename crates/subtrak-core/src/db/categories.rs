//! Category operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Category, DEFAULT_CATEGORY_COLOR};

impl Database {
    /// Create a category; `color` defaults to the standard indigo
    pub fn create_category(
        &self,
        user_id: i64,
        name: &str,
        color: Option<&str>,
        icon: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (user_id, name, color, icon) VALUES (?, ?, ?, ?)",
            params![
                user_id,
                name,
                color.unwrap_or(DEFAULT_CATEGORY_COLOR),
                icon
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a category by ID
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT id, user_id, name, color, icon, created_at FROM categories WHERE id = ?",
            params![id],
            row_to_category,
        );

        match result {
            Ok(category) => Ok(Some(category)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List a user's categories by name
    pub fn list_categories(&self, user_id: i64) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, color, icon, created_at FROM categories
             WHERE user_id = ? ORDER BY name",
        )?;
        let categories = stmt
            .query_map(params![user_id], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Rename or recolor a category
    pub fn update_category(
        &self,
        id: i64,
        name: Option<&str>,
        color: Option<&str>,
        icon: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE categories SET
                name = COALESCE(?, name),
                color = COALESCE(?, color),
                icon = COALESCE(?, icon)
             WHERE id = ?",
            params![name, color, icon, id],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!("category {}", id)));
        }
        Ok(())
    }

    /// Delete a category. Subscriptions in it become uncategorized.
    pub fn delete_category(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM categories WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("category {}", id)));
        }
        Ok(())
    }
}

fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    let created_at: String = row.get(5)?;
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        icon: row.get(4)?,
        created_at: parse_datetime(&created_at),
    })
}
