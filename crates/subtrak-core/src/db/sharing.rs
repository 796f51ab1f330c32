//! Cost sharing: members splitting a subscription, and seats held through
//! party-matching platforms

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    NewSharedSubscription, NewSharingPlatform, NewSubscriptionMember, SharedSubscription,
    SharedSubscriptionUpdate, SharingPlatform, SubscriptionMember, SubscriptionMemberUpdate,
};

/// Platforms listed before the user registers any: (name, url)
pub const DEFAULT_SHARING_PLATFORMS: &[(&str, &str)] = &[
    ("Linkid", "https://linkid.pw"),
    ("Pickle Plus", "https://pickle.plus"),
    ("Wizzle", "https://wizzle.co.kr"),
];

const MEMBER_SELECT: &str = r#"
    SELECT id, subscription_id, name, email, share_amount, share_percentage,
           is_owner, created_at
    FROM subscription_members"#;

const SHARED_SELECT: &str = r#"
    SELECT sh.id, sh.user_id, sh.subscription_id, sh.platform_id, sh.my_role,
           sh.monthly_share_cost, sh.total_members, sh.party_status, sh.deposit_paid,
           sh.platform_fee, sh.external_id, sh.notes, sh.created_at, sh.updated_at,
           s.name, p.name
    FROM shared_subscriptions sh
    LEFT JOIN subscriptions s ON s.id = sh.subscription_id
    LEFT JOIN sharing_platforms p ON p.id = sh.platform_id"#;

impl Database {
    /// Add a member to one of the user's subscriptions
    pub fn add_subscription_member(
        &self,
        user_id: i64,
        subscription_id: i64,
        member: &NewSubscriptionMember,
    ) -> Result<i64> {
        validate_member(&member.name, member.share_amount, member.share_percentage)?;

        let conn = self.conn()?;
        ensure_owned_subscription(&conn, user_id, subscription_id)?;
        conn.execute(
            r#"
            INSERT INTO subscription_members
                (subscription_id, name, email, share_amount, share_percentage, is_owner)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                subscription_id,
                member.name,
                member.email,
                member.share_amount,
                member.share_percentage,
                member.is_owner,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Members of one of the user's subscriptions, owner first
    pub fn list_subscription_members(
        &self,
        user_id: i64,
        subscription_id: i64,
    ) -> Result<Vec<SubscriptionMember>> {
        let conn = self.conn()?;
        ensure_owned_subscription(&conn, user_id, subscription_id)?;

        let mut stmt = conn.prepare(&format!(
            "{} WHERE subscription_id = ? ORDER BY is_owner DESC, id",
            MEMBER_SELECT
        ))?;
        let members = stmt
            .query_map(params![subscription_id], row_to_member)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// Apply a partial update to a member, returning the stored result
    pub fn update_subscription_member(
        &self,
        user_id: i64,
        subscription_id: i64,
        member_id: i64,
        update: &SubscriptionMemberUpdate,
    ) -> Result<SubscriptionMember> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_owned_subscription(&tx, user_id, subscription_id)?;

        let mut member = load_member(&tx, subscription_id, member_id)?
            .ok_or_else(|| Error::NotFound(format!("member {}", member_id)))?;

        if let Some(name) = &update.name {
            member.name = name.clone();
        }
        if let Some(email) = &update.email {
            member.email = email.clone();
        }
        if let Some(share_amount) = update.share_amount {
            member.share_amount = share_amount;
        }
        if let Some(share_percentage) = update.share_percentage {
            member.share_percentage = share_percentage;
        }
        if let Some(is_owner) = update.is_owner {
            member.is_owner = is_owner;
        }
        validate_member(&member.name, member.share_amount, member.share_percentage)?;

        tx.execute(
            r#"
            UPDATE subscription_members SET
                name = ?, email = ?, share_amount = ?, share_percentage = ?, is_owner = ?
            WHERE id = ?
            "#,
            params![
                member.name,
                member.email,
                member.share_amount,
                member.share_percentage,
                member.is_owner,
                member.id,
            ],
        )?;
        tx.commit()?;
        Ok(member)
    }

    /// Remove a member from a subscription
    pub fn remove_subscription_member(
        &self,
        user_id: i64,
        subscription_id: i64,
        member_id: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        ensure_owned_subscription(&conn, user_id, subscription_id)?;
        let deleted = conn.execute(
            "DELETE FROM subscription_members WHERE id = ? AND subscription_id = ?",
            params![member_id, subscription_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("member {}", member_id)));
        }
        Ok(())
    }

    /// All sharing platforms by name. An empty table is first filled with
    /// [`DEFAULT_SHARING_PLATFORMS`].
    pub fn list_sharing_platforms(&self) -> Result<Vec<SharingPlatform>> {
        let conn = self.conn()?;

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sharing_platforms", [], |row| row.get(0))?;
        if count == 0 {
            for (name, url) in DEFAULT_SHARING_PLATFORMS {
                conn.execute(
                    "INSERT OR IGNORE INTO sharing_platforms (name, url, description) VALUES (?, ?, ?)",
                    params![name, url, "Subscription sharing platform"],
                )?;
            }
            info!(
                "Seeded {} sharing platforms",
                DEFAULT_SHARING_PLATFORMS.len()
            );
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT id, name, url, logo_url, description, created_at
            FROM sharing_platforms ORDER BY name
            "#,
        )?;
        let platforms = stmt
            .query_map([], row_to_platform)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(platforms)
    }

    /// Register a sharing platform. Names are unique.
    pub fn create_sharing_platform(&self, platform: &NewSharingPlatform) -> Result<i64> {
        let name = platform.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("platform name must not be empty".into()));
        }

        let conn = self.conn()?;
        if platform_id_by_name(&conn, name)?.is_some() {
            return Err(Error::InvalidData(format!(
                "sharing platform already registered: {}",
                name
            )));
        }
        conn.execute(
            "INSERT INTO sharing_platforms (name, url, logo_url, description) VALUES (?, ?, ?, ?)",
            params![name, platform.url, platform.logo_url, platform.description],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Look up a platform by name, registering it if missing
    pub fn find_or_create_sharing_platform(&self, name: &str) -> Result<i64> {
        let conn = self.conn()?;
        if let Some(id) = platform_id_by_name(&conn, name.trim())? {
            return Ok(id);
        }
        drop(conn);
        self.create_sharing_platform(&NewSharingPlatform {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Record a seat the user holds in a shared party
    pub fn create_shared_subscription(
        &self,
        user_id: i64,
        shared: &NewSharedSubscription,
    ) -> Result<i64> {
        validate_party(shared.monthly_share_cost, shared.total_members)?;

        let conn = self.conn()?;
        ensure_owned_subscription(&conn, user_id, shared.subscription_id)?;
        let platform: Option<i64> = conn
            .query_row(
                "SELECT id FROM sharing_platforms WHERE id = ?",
                params![shared.platform_id],
                |row| row.get(0),
            )
            .optional()?;
        if platform.is_none() {
            return Err(Error::NotFound(format!(
                "sharing platform {}",
                shared.platform_id
            )));
        }

        conn.execute(
            r#"
            INSERT INTO shared_subscriptions
                (user_id, subscription_id, platform_id, my_role, monthly_share_cost,
                 total_members, party_status, deposit_paid, platform_fee, external_id, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                shared.subscription_id,
                shared.platform_id,
                shared.my_role.as_str(),
                shared.monthly_share_cost,
                shared.total_members,
                shared.party_status.as_str(),
                shared.deposit_paid,
                shared.platform_fee,
                shared.external_id,
                shared.notes,
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!(
            "Shared subscription {} joined on platform {}",
            shared.subscription_id, shared.platform_id
        );
        Ok(id)
    }

    /// Get one of the user's shared subscriptions with subscription and platform names
    pub fn get_shared_subscription(
        &self,
        user_id: i64,
        id: i64,
    ) -> Result<Option<SharedSubscription>> {
        let conn = self.conn()?;
        load_shared(&conn, user_id, id)
    }

    /// The user's shared subscriptions, newest first
    pub fn list_shared_subscriptions(&self, user_id: i64) -> Result<Vec<SharedSubscription>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE sh.user_id = ? ORDER BY sh.created_at DESC, sh.id DESC",
            SHARED_SELECT
        ))?;
        let shared = stmt
            .query_map(params![user_id], row_to_shared)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(shared)
    }

    /// Apply a partial update, returning the stored result
    pub fn update_shared_subscription(
        &self,
        user_id: i64,
        id: i64,
        update: &SharedSubscriptionUpdate,
    ) -> Result<SharedSubscription> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut shared = load_shared(&tx, user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("shared subscription {}", id)))?;

        if let Some(role) = update.my_role {
            shared.my_role = role;
        }
        if let Some(cost) = update.monthly_share_cost {
            shared.monthly_share_cost = cost;
        }
        if let Some(total) = update.total_members {
            shared.total_members = total;
        }
        if let Some(status) = update.party_status {
            shared.party_status = status;
        }
        if let Some(deposit) = update.deposit_paid {
            shared.deposit_paid = deposit;
        }
        if let Some(fee) = update.platform_fee {
            shared.platform_fee = fee;
        }
        if let Some(external_id) = &update.external_id {
            shared.external_id = external_id.clone();
        }
        if let Some(notes) = &update.notes {
            shared.notes = notes.clone();
        }
        validate_party(shared.monthly_share_cost, shared.total_members)?;

        let now = Utc::now();
        tx.execute(
            r#"
            UPDATE shared_subscriptions SET
                my_role = ?, monthly_share_cost = ?, total_members = ?, party_status = ?,
                deposit_paid = ?, platform_fee = ?, external_id = ?, notes = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![
                shared.my_role.as_str(),
                shared.monthly_share_cost,
                shared.total_members,
                shared.party_status.as_str(),
                shared.deposit_paid,
                shared.platform_fee,
                shared.external_id,
                shared.notes,
                format_datetime(now),
                shared.id,
            ],
        )?;
        tx.commit()?;

        shared.updated_at = Some(now);
        Ok(shared)
    }

    /// Delete one of the user's shared subscriptions
    pub fn delete_shared_subscription(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM shared_subscriptions WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("shared subscription {}", id)));
        }
        Ok(())
    }
}

/// Subscriptions of other users are reported as missing
fn ensure_owned_subscription(conn: &Connection, user_id: i64, subscription_id: i64) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM subscriptions WHERE id = ? AND user_id = ?",
            params![subscription_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(Error::NotFound(format!("subscription {}", subscription_id))),
    }
}

fn validate_member(
    name: &str,
    share_amount: Option<f64>,
    share_percentage: Option<f64>,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidData("member name must not be empty".into()));
    }
    if let Some(amount) = share_amount.filter(|a| *a < 0.0) {
        return Err(Error::InvalidData(format!(
            "share amount must not be negative: {}",
            amount
        )));
    }
    if let Some(pct) = share_percentage.filter(|p| !(0.0..=100.0).contains(p)) {
        return Err(Error::InvalidData(format!(
            "share percentage must be between 0 and 100: {}",
            pct
        )));
    }
    Ok(())
}

fn validate_party(monthly_share_cost: f64, total_members: u32) -> Result<()> {
    if monthly_share_cost < 0.0 {
        return Err(Error::InvalidData(format!(
            "monthly share cost must not be negative: {}",
            monthly_share_cost
        )));
    }
    if total_members == 0 {
        return Err(Error::InvalidData("a party has at least one member".into()));
    }
    Ok(())
}

fn platform_id_by_name(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM sharing_platforms WHERE name = ?",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn load_member(
    conn: &Connection,
    subscription_id: i64,
    member_id: i64,
) -> Result<Option<SubscriptionMember>> {
    let member = conn
        .query_row(
            &format!("{} WHERE id = ? AND subscription_id = ?", MEMBER_SELECT),
            params![member_id, subscription_id],
            row_to_member,
        )
        .optional()?;
    Ok(member)
}

fn load_shared(conn: &Connection, user_id: i64, id: i64) -> Result<Option<SharedSubscription>> {
    let shared = conn
        .query_row(
            &format!("{} WHERE sh.id = ? AND sh.user_id = ?", SHARED_SELECT),
            params![id, user_id],
            row_to_shared,
        )
        .optional()?;
    Ok(shared)
}

fn row_to_member(row: &rusqlite::Row) -> rusqlite::Result<SubscriptionMember> {
    let created_at: String = row.get(7)?;
    Ok(SubscriptionMember {
        id: row.get(0)?,
        subscription_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        share_amount: row.get(4)?,
        share_percentage: row.get(5)?,
        is_owner: row.get(6)?,
        created_at: parse_datetime(&created_at),
    })
}

fn row_to_platform(row: &rusqlite::Row) -> rusqlite::Result<SharingPlatform> {
    let created_at: String = row.get(5)?;
    Ok(SharingPlatform {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        logo_url: row.get(3)?,
        description: row.get(4)?,
        created_at: parse_datetime(&created_at),
    })
}

fn row_to_shared(row: &rusqlite::Row) -> rusqlite::Result<SharedSubscription> {
    let my_role: String = row.get(4)?;
    let party_status: String = row.get(7)?;
    let created_at: String = row.get(12)?;
    let updated_at: Option<String> = row.get(13)?;

    Ok(SharedSubscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        subscription_id: row.get(2)?,
        platform_id: row.get(3)?,
        my_role: my_role.parse().unwrap_or_default(),
        monthly_share_cost: row.get(5)?,
        total_members: row.get(6)?,
        party_status: party_status.parse().unwrap_or_default(),
        deposit_paid: row.get(8)?,
        platform_fee: row.get(9)?,
        external_id: row.get(10)?,
        notes: row.get(11)?,
        created_at: parse_datetime(&created_at),
        updated_at: updated_at.map(|s| parse_datetime(&s)),
        subscription_name: row.get(14)?,
        platform_name: row.get(15)?,
    })
}
