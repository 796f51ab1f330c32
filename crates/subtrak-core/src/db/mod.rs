//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - User records
//! - `categories` - Spending categories
//! - `payment_methods` - Cards and bank accounts subscriptions are charged to
//! - `linked_accounts` - Aggregator connections
//! - `subscriptions` - Subscription lifecycle, price history, cancellations
//! - `sharing` - Members splitting a subscription, and seats on sharing platforms
//! - `dashboard` - Spending summaries and the payment calendar
//! - `maintenance` - Queries used by the periodic maintenance pass

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod categories;
mod dashboard;
mod linked_accounts;
mod maintenance;
mod payment_methods;
mod sharing;
mod subscriptions;
mod users;

pub use sharing::DEFAULT_SHARING_PLATFORMS;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "SUBTRAK_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"subtrak-salt-v01";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored `YYYY-MM-DD` date column
pub(crate) fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Format a datetime the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `SUBTRAK_DB_KEY` environment variable to be set.
    /// Returns an error if it is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        // Foreign keys are per-connection in SQLite
        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"'; PRAGMA foreign_keys = ON;", key);

            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            let manager =
                manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because every pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "subtrak_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path.to_string_lossy())
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Users
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Categories (per user)
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                color TEXT NOT NULL DEFAULT '#6366f1',
                icon TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id);

            -- Linked accounts (aggregator connections)
            CREATE TABLE IF NOT EXISTS linked_accounts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                institution_name TEXT NOT NULL,
                organization_code TEXT NOT NULL,
                connected_id TEXT NOT NULL,
                business_type TEXT NOT NULL DEFAULT 'card',   -- card, bank
                account_identifier TEXT,                      -- card no / account no
                last_synced_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_linked_accounts_user ON linked_accounts(user_id);

            -- Payment methods (cards, bank accounts)
            CREATE TABLE IF NOT EXISTS payment_methods (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                card_last_four TEXT,
                card_type TEXT NOT NULL DEFAULT 'credit',
                expiry_date DATE,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                linked_account_id INTEGER REFERENCES linked_accounts(id) ON DELETE SET NULL,
                notes TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_payment_methods_user ON payment_methods(user_id);
            CREATE INDEX IF NOT EXISTS idx_payment_methods_expiry ON payment_methods(expiry_date);

            -- Subscriptions
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL DEFAULT 'KRW',
                billing_cycle TEXT NOT NULL DEFAULT 'monthly',  -- monthly, yearly, weekly, quarterly
                billing_day INTEGER,
                next_payment_date DATE NOT NULL,
                start_date DATE NOT NULL,
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                payment_method_id INTEGER REFERENCES payment_methods(id) ON DELETE SET NULL,
                cancel_url TEXT,
                cancel_method TEXT,
                is_active BOOLEAN NOT NULL DEFAULT 1,
                auto_renew BOOLEAN NOT NULL DEFAULT 1,
                notes TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id, is_active);
            CREATE INDEX IF NOT EXISTS idx_subscriptions_next_payment ON subscriptions(next_payment_date);
            CREATE INDEX IF NOT EXISTS idx_subscriptions_name ON subscriptions(user_id, name);

            -- Price history (append-only)
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY,
                subscription_id INTEGER NOT NULL REFERENCES subscriptions(id),
                old_amount REAL NOT NULL,
                new_amount REAL NOT NULL,
                old_currency TEXT NOT NULL DEFAULT 'KRW',
                new_currency TEXT NOT NULL DEFAULT 'KRW',
                changed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                notes TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_price_history_subscription ON price_history(subscription_id);

            CREATE TRIGGER IF NOT EXISTS price_history_no_update
            BEFORE UPDATE ON price_history
            BEGIN
                SELECT RAISE(ABORT, 'price_history is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS price_history_no_delete
            BEFORE DELETE ON price_history
            BEGIN
                SELECT RAISE(ABORT, 'price_history is append-only');
            END;

            -- Cancellation logs (one per cancellation)
            CREATE TABLE IF NOT EXISTS cancellation_logs (
                id INTEGER PRIMARY KEY,
                subscription_id INTEGER NOT NULL REFERENCES subscriptions(id),
                cancelled_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                reason TEXT,
                savings_per_month REAL NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_cancellation_logs_subscription ON cancellation_logs(subscription_id);

            -- People splitting a subscription's cost
            CREATE TABLE IF NOT EXISTS subscription_members (
                id INTEGER PRIMARY KEY,
                subscription_id INTEGER NOT NULL REFERENCES subscriptions(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                email TEXT,
                share_amount REAL,
                share_percentage REAL,
                is_owner BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_subscription_members_subscription ON subscription_members(subscription_id);

            -- Party-matching services (shared by all users)
            CREATE TABLE IF NOT EXISTS sharing_platforms (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                url TEXT,
                logo_url TEXT,
                description TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Seats held in parties on those services
            CREATE TABLE IF NOT EXISTS shared_subscriptions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                subscription_id INTEGER NOT NULL REFERENCES subscriptions(id) ON DELETE CASCADE,
                platform_id INTEGER NOT NULL REFERENCES sharing_platforms(id),
                my_role TEXT NOT NULL DEFAULT 'member',       -- leader, member
                monthly_share_cost REAL NOT NULL,
                total_members INTEGER NOT NULL DEFAULT 1,
                party_status TEXT NOT NULL DEFAULT 'active',  -- active, matching, ended
                deposit_paid REAL,
                platform_fee REAL,
                external_id TEXT,
                notes TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_shared_subscriptions_user ON shared_subscriptions(user_id);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
