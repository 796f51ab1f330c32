//! User operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::User;

impl Database {
    /// Insert a user by email, or return the existing id.
    ///
    /// A provided name overwrites the stored one.
    pub fn upsert_user(&self, email: &str, name: Option<&str>) -> Result<i64> {
        let conn = self.conn()?;

        let existing: Option<i64> = match conn.query_row(
            "SELECT id FROM users WHERE email = ?",
            params![email],
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(id) = existing {
            if let Some(name) = name {
                conn.execute("UPDATE users SET name = ? WHERE id = ?", params![name, id])?;
            }
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO users (email, name) VALUES (?, ?)",
            params![email, name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.query_user("SELECT id, email, name, created_at FROM users WHERE id = ?", &id)
    }

    /// Get a user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_user(
            "SELECT id, email, name, created_at FROM users WHERE email = ?",
            &email,
        )
    }

    /// List all users
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, email, name, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn query_user(&self, sql: &str, key: &dyn rusqlite::ToSql) -> Result<Option<User>> {
        let conn = self.conn()?;
        match conn.query_row(sql, [key], row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let created_at: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_datetime(&created_at),
    })
}
