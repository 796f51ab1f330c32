//! Cost sharing command implementations (members, sharing platforms, shared seats)

use anyhow::Result;
use subtrak_core::db::Database;
use subtrak_core::models::{
    NewSharedSubscription, NewSharingPlatform, NewSubscriptionMember, PartyRole, PartyStatus,
    SharedSubscriptionUpdate, Subscription, SubscriptionMemberUpdate, DEFAULT_CURRENCY,
};

use super::{format_money, truncate};

/// Arguments of `members add` and `members update`; unset flags leave the field alone
#[derive(Default)]
pub struct MemberArgs {
    pub name: Option<String>,
    pub email: Option<String>,
    pub amount: Option<f64>,
    pub percent: Option<f64>,
    pub owner: Option<bool>,
}

/// Arguments of `sharing join`
pub struct JoinArgs {
    pub subscription: String,
    pub platform: String,
    pub cost: f64,
    pub members: u32,
    pub role: String,
    pub status: String,
    pub deposit: Option<f64>,
    pub fee: Option<f64>,
    pub external_id: Option<String>,
    pub notes: Option<String>,
}

/// Arguments of `sharing update`; unset flags leave the field alone
#[derive(Default)]
pub struct SharedUpdateArgs {
    pub cost: Option<f64>,
    pub members: Option<u32>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub fee: Option<f64>,
    pub notes: Option<String>,
}

fn subscription(db: &Database, user_id: i64, name_or_id: &str) -> Result<Subscription> {
    db.find_subscription(user_id, name_or_id)?
        .ok_or_else(|| anyhow::anyhow!("Subscription not found: {}", name_or_id))
}

fn parse_role(s: &str) -> Result<PartyRole> {
    s.parse().map_err(|e: String| anyhow::anyhow!(e))
}

fn parse_status(s: &str) -> Result<PartyStatus> {
    s.parse().map_err(|e: String| anyhow::anyhow!(e))
}

pub fn cmd_members_list(db: &Database, user_id: i64, name_or_id: &str) -> Result<()> {
    let sub = subscription(db, user_id, name_or_id)?;
    let members = db.list_subscription_members(user_id, sub.id)?;

    if members.is_empty() {
        println!("Nobody shares '{}' yet. Add someone with:", sub.name);
        println!("  subtrak members add \"{}\" Jisoo --percent 25", sub.name);
        return Ok(());
    }

    println!();
    println!(
        "👥 {} ({}/{})",
        sub.name,
        format_money(sub.amount, &sub.currency),
        sub.billing_cycle
    );
    println!("   ─────────────────────────────────────────────────────────────");

    let mut covered = 0.0;
    for member in &members {
        let share = member.effective_share(sub.amount);
        covered += share.unwrap_or(0.0);
        println!(
            "   {:>3} {} {:16} │ {:>12} │ {}",
            member.id,
            if member.is_owner { "👑" } else { "  " },
            truncate(&member.name, 16),
            share
                .map(|s| format_money(s, &sub.currency))
                .unwrap_or_else(|| "-".to_string()),
            member.email.as_deref().unwrap_or("")
        );
    }

    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Covered: {} of {}",
        format_money(covered, &sub.currency),
        format_money(sub.amount, &sub.currency)
    );
    Ok(())
}

pub fn cmd_members_add(
    db: &Database,
    user_id: i64,
    name_or_id: &str,
    name: &str,
    args: MemberArgs,
) -> Result<()> {
    let sub = subscription(db, user_id, name_or_id)?;
    let member = NewSubscriptionMember {
        name: name.to_string(),
        email: args.email,
        share_amount: args.amount,
        share_percentage: args.percent,
        is_owner: args.owner.unwrap_or(false),
    };

    let id = db.add_subscription_member(user_id, sub.id, &member)?;
    println!("✅ Added {} to '{}' (ID: {})", name, sub.name, id);
    Ok(())
}

pub fn cmd_members_update(
    db: &Database,
    user_id: i64,
    name_or_id: &str,
    member_id: i64,
    args: MemberArgs,
) -> Result<()> {
    let sub = subscription(db, user_id, name_or_id)?;
    // A new amount replaces a percentage and vice versa
    let (share_amount, share_percentage) = match (args.amount, args.percent) {
        (Some(amount), None) => (Some(Some(amount)), Some(None)),
        (None, Some(pct)) => (Some(None), Some(Some(pct))),
        (amount, pct) => (amount.map(Some), pct.map(Some)),
    };
    let update = SubscriptionMemberUpdate {
        name: args.name,
        email: args.email.map(Some),
        share_amount,
        share_percentage,
        is_owner: args.owner,
    };

    let member = db.update_subscription_member(user_id, sub.id, member_id, &update)?;
    println!("✅ Updated {} on '{}'", member.name, sub.name);
    Ok(())
}

pub fn cmd_members_remove(
    db: &Database,
    user_id: i64,
    name_or_id: &str,
    member_id: i64,
) -> Result<()> {
    let sub = subscription(db, user_id, name_or_id)?;
    db.remove_subscription_member(user_id, sub.id, member_id)?;
    println!("✅ Removed member {} from '{}'", member_id, sub.name);
    Ok(())
}

pub fn cmd_sharing_platforms(db: &Database) -> Result<()> {
    println!();
    println!("🤝 Sharing platforms");
    println!("   ─────────────────────────────────────────────");
    for platform in db.list_sharing_platforms()? {
        println!(
            "   {:>3} {:16} │ {}",
            platform.id,
            platform.name,
            platform.url.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub fn cmd_sharing_add_platform(
    db: &Database,
    name: &str,
    url: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let platform = NewSharingPlatform {
        name: name.to_string(),
        url: url.map(String::from),
        logo_url: None,
        description: description.map(String::from),
    };
    let id = db.create_sharing_platform(&platform)?;
    println!("✅ Added sharing platform '{}' (ID: {})", name, id);
    Ok(())
}

pub fn cmd_sharing_list(db: &Database, user_id: i64) -> Result<()> {
    let shared = db.list_shared_subscriptions(user_id)?;

    if shared.is_empty() {
        println!("No shared subscriptions. Record a party seat with:");
        println!("  subtrak sharing join Netflix --platform Linkid --cost 4250 --members 4");
        return Ok(());
    }

    println!();
    println!("🤝 Shared subscriptions");
    println!("   ─────────────────────────────────────────────────────────────");

    let mut monthly = 0.0;
    for seat in &shared {
        if seat.party_status != PartyStatus::Ended {
            monthly += seat.monthly_total();
        }
        println!(
            "   {:>3} {:16} │ {:12} │ {:6} │ {:8} │ {:>2} seats │ {:>10}/mo",
            seat.id,
            truncate(seat.subscription_name.as_deref().unwrap_or("?"), 16),
            truncate(seat.platform_name.as_deref().unwrap_or("?"), 12),
            seat.my_role.as_str(),
            seat.party_status.as_str(),
            seat.total_members,
            format_money(seat.monthly_total(), DEFAULT_CURRENCY)
        );
    }

    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   Paying {} per month for shared seats",
        format_money(monthly, DEFAULT_CURRENCY)
    );
    Ok(())
}

pub fn cmd_sharing_join(db: &Database, user_id: i64, args: JoinArgs) -> Result<()> {
    let sub = subscription(db, user_id, &args.subscription)?;
    let platform_id = db.find_or_create_sharing_platform(&args.platform)?;

    let seat = NewSharedSubscription {
        subscription_id: sub.id,
        platform_id,
        my_role: parse_role(&args.role)?,
        monthly_share_cost: args.cost,
        total_members: args.members,
        party_status: parse_status(&args.status)?,
        deposit_paid: args.deposit,
        platform_fee: args.fee,
        external_id: args.external_id,
        notes: args.notes,
    };

    let id = db.create_shared_subscription(user_id, &seat)?;
    println!(
        "✅ Recorded '{}' shared via {} (ID: {})",
        sub.name, args.platform, id
    );
    Ok(())
}

pub fn cmd_sharing_update(
    db: &Database,
    user_id: i64,
    id: i64,
    args: SharedUpdateArgs,
) -> Result<()> {
    let update = SharedSubscriptionUpdate {
        my_role: args.role.as_deref().map(parse_role).transpose()?,
        monthly_share_cost: args.cost,
        total_members: args.members,
        party_status: args.status.as_deref().map(parse_status).transpose()?,
        platform_fee: args.fee.map(Some),
        notes: args.notes.map(Some),
        ..Default::default()
    };

    let seat = db.update_shared_subscription(user_id, id, &update)?;
    println!(
        "✅ Updated shared '{}' ({})",
        seat.subscription_name.as_deref().unwrap_or("?"),
        seat.party_status
    );
    Ok(())
}

pub fn cmd_sharing_remove(db: &Database, user_id: i64, id: i64) -> Result<()> {
    db.delete_shared_subscription(user_id, id)?;
    println!("✅ Removed shared subscription {}", id);
    Ok(())
}
