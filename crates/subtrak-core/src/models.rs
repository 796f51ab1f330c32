//! Domain models for SubTrak

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default currency for subscriptions created without an explicit one
pub const DEFAULT_CURRENCY: &str = "KRW";

/// Default category color
pub const DEFAULT_CATEGORY_COLOR: &str = "#6366f1";

/// Average number of weeks in a month, used for weekly → monthly conversion
pub const WEEKS_PER_MONTH: f64 = 4.33;

/// A user of the tracker. Every other record hangs off a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// How often a subscription bills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
    Weekly,
    /// Tracked for manually entered subscriptions; never produced by detection
    Quarterly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Weekly => "weekly",
            Self::Quarterly => "quarterly",
        }
    }

    /// Move a billing date forward by exactly one cycle.
    ///
    /// Month-based cycles clamp to the last day of the target month
    /// (Jan 31 + 1 month = Feb 28/29).
    pub fn advance(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Monthly => date.checked_add_months(Months::new(1)),
            Self::Yearly => date.checked_add_months(Months::new(12)),
            Self::Quarterly => date.checked_add_months(Months::new(3)),
            Self::Weekly => date.checked_add_signed(Duration::weeks(1)),
        }
    }

    /// Move a billing date back by exactly one cycle
    pub fn retreat(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Monthly => date.checked_sub_months(Months::new(1)),
            Self::Yearly => date.checked_sub_months(Months::new(12)),
            Self::Quarterly => date.checked_sub_months(Months::new(3)),
            Self::Weekly => date.checked_sub_signed(Duration::weeks(1)),
        }
    }

    /// Convert a per-cycle amount into its monthly equivalent
    pub fn monthly_equivalent(&self, amount: f64) -> f64 {
        match self {
            Self::Monthly => amount,
            Self::Yearly => amount / 12.0,
            Self::Weekly => amount * WEEKS_PER_MONTH,
            Self::Quarterly => amount / 3.0,
        }
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "yearly" | "annual" | "annually" => Ok(Self::Yearly),
            "weekly" => Ok(Self::Weekly),
            "quarterly" => Ok(Self::Quarterly),
            _ => Err(format!("Unknown billing cycle: {}", s)),
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-defined spending category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub color: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Kind of payment instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    #[default]
    Credit,
    Debit,
    Prepaid,
    BankTransfer,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::Prepaid => "prepaid",
            Self::BankTransfer => "bank_transfer",
        }
    }
}

impl std::str::FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "credit" => Ok(Self::Credit),
            "debit" | "check" => Ok(Self::Debit),
            "prepaid" => Ok(Self::Prepaid),
            "bank_transfer" | "bank" => Ok(Self::BankTransfer),
            _ => Err(format!("Unknown card type: {}", s)),
        }
    }
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A card or bank account that subscriptions are charged to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub card_last_four: Option<String>,
    pub card_type: CardType,
    pub expiry_date: Option<NaiveDate>,
    pub is_active: bool,
    /// Aggregator connection this card was discovered through
    pub linked_account_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a payment method
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPaymentMethod {
    pub name: String,
    pub card_last_four: Option<String>,
    pub card_type: CardType,
    pub expiry_date: Option<NaiveDate>,
    pub linked_account_id: Option<i64>,
    pub notes: Option<String>,
}

/// What kind of institution an aggregator connection points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusinessType {
    #[default]
    Card,
    Bank,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Bank => "bank",
        }
    }
}

impl std::str::FromStr for BusinessType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "card" | "cd" => Ok(Self::Card),
            "bank" | "bk" => Ok(Self::Bank),
            _ => Err(format!("Unknown business type: {}", s)),
        }
    }
}

/// A card/bank login registered with the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub id: i64,
    pub user_id: i64,
    pub institution_name: String,
    /// Aggregator organization code (e.g. "0306")
    pub organization_code: String,
    /// Aggregator-issued handle for the stored credentials
    pub connected_id: String,
    pub business_type: BusinessType,
    /// Card number or bank account number to filter on
    pub account_identifier: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A recurring charge the user pays for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub amount: f64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub billing_day: Option<u32>,
    pub next_payment_date: NaiveDate,
    pub start_date: NaiveDate,
    pub category_id: Option<i64>,
    pub payment_method_id: Option<i64>,
    pub cancel_url: Option<String>,
    pub cancel_method: Option<String>,
    pub is_active: bool,
    pub auto_renew: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Cost of this subscription expressed per month
    pub fn monthly_amount(&self) -> f64 {
        self.billing_cycle.monthly_equivalent(self.amount)
    }
}

/// Fields for creating a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscription {
    pub user_id: i64,
    pub name: String,
    pub amount: f64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub billing_day: Option<u32>,
    pub next_payment_date: NaiveDate,
    pub start_date: NaiveDate,
    pub category_id: Option<i64>,
    pub payment_method_id: Option<i64>,
    pub cancel_url: Option<String>,
    pub cancel_method: Option<String>,
    pub auto_renew: bool,
    pub notes: Option<String>,
}

impl NewSubscription {
    /// Minimal active monthly subscription first charged on `next_payment_date`
    pub fn new(user_id: i64, name: &str, amount: f64, next_payment_date: NaiveDate) -> Self {
        Self {
            user_id,
            name: name.to_string(),
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            billing_cycle: BillingCycle::Monthly,
            billing_day: None,
            next_payment_date,
            start_date: next_payment_date,
            category_id: None,
            payment_method_id: None,
            cancel_url: None,
            cancel_method: None,
            auto_renew: true,
            notes: None,
        }
    }
}

/// Partial update for a subscription. `None` leaves the field unchanged;
/// for nullable columns `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub billing_cycle: Option<BillingCycle>,
    pub billing_day: Option<Option<u32>>,
    pub next_payment_date: Option<NaiveDate>,
    pub category_id: Option<Option<i64>>,
    pub payment_method_id: Option<Option<i64>>,
    pub cancel_url: Option<Option<String>>,
    pub cancel_method: Option<Option<String>>,
    pub auto_renew: Option<bool>,
    pub notes: Option<Option<String>>,
}

/// Filters for listing subscriptions. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionFilter {
    pub active: Option<bool>,
    pub category_id: Option<i64>,
    pub payment_method_id: Option<i64>,
}

impl SubscriptionFilter {
    pub fn active() -> Self {
        Self {
            active: Some(true),
            ..Default::default()
        }
    }
}

/// An append-only record of a subscription price change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: i64,
    pub subscription_id: i64,
    pub old_amount: f64,
    pub new_amount: f64,
    pub old_currency: String,
    pub new_currency: String,
    pub changed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Written exactly once when a subscription is cancelled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationLog {
    pub id: i64,
    pub subscription_id: i64,
    /// Name of the cancelled subscription (joined for display)
    pub subscription_name: Option<String>,
    pub cancelled_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub savings_per_month: f64,
}

/// A card/bank transaction mapped onto canonical fields.
///
/// All fields are kept as strings; amount and date parsing happen in the
/// recurrence detector so a malformed value only excludes that one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    /// `YYYYMMDD`
    pub date: String,
    pub time: String,
    pub merchant: String,
    /// Integer amount, possibly comma-grouped ("12,900")
    pub amount: String,
    pub status: String,
    pub card_name: String,
    pub card_identifier: String,
    pub category: String,
}

/// A merchant that looks like a recurring subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedSubscription {
    /// Merchant name as it appeared on the first transaction of the group
    pub name: String,
    /// Average charge, truncated to a whole amount
    pub amount: i64,
    pub billing_cycle: BillingCycle,
    /// Day of month of the most recent charge
    pub billing_day: u32,
    pub occurrence_count: usize,
    /// ISO date of the most recent charge
    pub last_payment_date: String,
    pub card_identifier: String,
    pub category: String,
}

/// A detected subscription the user approved for import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportCandidate {
    pub name: String,
    pub amount: i64,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    #[serde(default = "default_billing_day")]
    pub billing_day: u32,
}

fn default_billing_day() -> u32 {
    1
}

impl From<&DetectedSubscription> for ImportCandidate {
    fn from(detected: &DetectedSubscription) -> Self {
        Self {
            name: detected.name.clone(),
            amount: detected.amount,
            billing_cycle: detected.billing_cycle,
            billing_day: detected.billing_day,
        }
    }
}

/// Outcome of importing a batch of candidates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    /// One human-readable line per candidate, in input order
    pub details: Vec<String>,
}

/// A payment that falls due soon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingPayment {
    pub subscription_id: i64,
    pub subscription_name: String,
    pub amount: f64,
    pub currency: String,
    pub date: NaiveDate,
    pub days_until: i64,
}

/// An upcoming payment tagged with its owner, for cross-user jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuePayment {
    pub user_id: i64,
    #[serde(flatten)]
    pub payment: UpcomingPayment,
}

/// One overdue next-payment date moved forward by the rollover job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRollover {
    pub subscription_id: i64,
    pub user_id: i64,
    pub subscription_name: String,
    pub previous_date: NaiveDate,
    pub next_date: NaiveDate,
}

/// Monthly spend grouped by category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category_name: String,
    pub color: String,
    pub total_amount: f64,
    pub percentage: f64,
}

/// Monthly spend grouped by payment method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSpending {
    pub payment_method_id: i64,
    pub card_name: String,
    pub card_last_four: Option<String>,
    pub total_amount: f64,
    pub subscription_count: usize,
}

/// Dashboard overview for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_monthly_cost: f64,
    pub total_yearly_cost: f64,
    pub active_count: usize,
    pub upcoming_payments: Vec<UpcomingPayment>,
    pub category_breakdown: Vec<CategorySpending>,
    pub card_breakdown: Vec<CardSpending>,
    pub total_savings_from_cancellations: f64,
}

/// Totals across all cancellations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsSummary {
    pub total_monthly_savings: f64,
    pub total_cumulative_savings: f64,
    pub cancellation_count: usize,
}

/// One charge on the calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub subscription_id: i64,
    pub subscription_name: String,
    pub amount: f64,
    pub currency: String,
    pub date: NaiveDate,
}

/// All charges falling in one calendar month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub events: Vec<CalendarEvent>,
    pub total_amount: f64,
}

/// Someone splitting the cost of one of the user's subscriptions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionMember {
    pub id: i64,
    pub subscription_id: i64,
    pub name: String,
    pub email: Option<String>,
    /// Fixed amount this member pays, in the subscription's currency
    pub share_amount: Option<f64>,
    /// Percentage of the price this member pays, 0 to 100
    pub share_percentage: Option<f64>,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionMember {
    /// What this member pays out of `subscription_amount`. A fixed amount
    /// wins over a percentage.
    pub fn effective_share(&self, subscription_amount: f64) -> Option<f64> {
        self.share_amount
            .or_else(|| self.share_percentage.map(|p| subscription_amount * p / 100.0))
    }
}

/// Fields for adding a member
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubscriptionMember {
    pub name: String,
    pub email: Option<String>,
    pub share_amount: Option<f64>,
    pub share_percentage: Option<f64>,
    pub is_owner: bool,
}

/// Partial update for a member; `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionMemberUpdate {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub share_amount: Option<Option<f64>>,
    pub share_percentage: Option<Option<f64>>,
    pub is_owner: Option<bool>,
}

/// A party-matching service where subscriptions are shared with strangers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingPlatform {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub logo_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSharingPlatform {
    pub name: String,
    pub url: Option<String>,
    pub logo_url: Option<String>,
    pub description: Option<String>,
}

/// The user's seat in a shared party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    Leader,
    #[default]
    Member,
}

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leader => "leader",
            Self::Member => "member",
        }
    }
}

impl std::str::FromStr for PartyRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "leader" | "파티장" => Ok(Self::Leader),
            "member" | "파티원" => Ok(Self::Member),
            _ => Err(format!("Unknown party role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    #[default]
    Active,
    /// Still waiting for the party to fill
    Matching,
    Ended,
}

impl PartyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Matching => "matching",
            Self::Ended => "ended",
        }
    }
}

impl std::str::FromStr for PartyStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "matching" => Ok(Self::Matching),
            "ended" => Ok(Self::Ended),
            _ => Err(format!("Unknown party status: {}", s)),
        }
    }
}

impl std::fmt::Display for PartyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A subscription the user joined (or hosts) through a sharing platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedSubscription {
    pub id: i64,
    pub user_id: i64,
    pub subscription_id: i64,
    pub platform_id: i64,
    pub my_role: PartyRole,
    /// What the user pays each month for their seat
    pub monthly_share_cost: f64,
    pub total_members: u32,
    pub party_status: PartyStatus,
    pub deposit_paid: Option<f64>,
    pub platform_fee: Option<f64>,
    /// Party id on the platform
    pub external_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub subscription_name: Option<String>,
    pub platform_name: Option<String>,
}

impl SharedSubscription {
    /// Seat cost plus the platform's monthly fee
    pub fn monthly_total(&self) -> f64 {
        self.monthly_share_cost + self.platform_fee.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSharedSubscription {
    pub subscription_id: i64,
    pub platform_id: i64,
    pub my_role: PartyRole,
    pub monthly_share_cost: f64,
    pub total_members: u32,
    pub party_status: PartyStatus,
    pub deposit_paid: Option<f64>,
    pub platform_fee: Option<f64>,
    pub external_id: Option<String>,
    pub notes: Option<String>,
}

impl NewSharedSubscription {
    /// Active member seat in a party of one
    pub fn new(subscription_id: i64, platform_id: i64, monthly_share_cost: f64) -> Self {
        Self {
            subscription_id,
            platform_id,
            my_role: PartyRole::Member,
            monthly_share_cost,
            total_members: 1,
            party_status: PartyStatus::Active,
            deposit_paid: None,
            platform_fee: None,
            external_id: None,
            notes: None,
        }
    }
}

/// Partial update for a shared subscription; `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedSubscriptionUpdate {
    pub my_role: Option<PartyRole>,
    pub monthly_share_cost: Option<f64>,
    pub total_members: Option<u32>,
    pub party_status: Option<PartyStatus>,
    pub deposit_paid: Option<Option<f64>>,
    pub platform_fee: Option<Option<f64>>,
    pub external_id: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_billing_cycle_parse() {
        assert_eq!("monthly".parse::<BillingCycle>(), Ok(BillingCycle::Monthly));
        assert_eq!("Yearly".parse::<BillingCycle>(), Ok(BillingCycle::Yearly));
        assert_eq!("annual".parse::<BillingCycle>(), Ok(BillingCycle::Yearly));
        assert!("daily".parse::<BillingCycle>().is_err());
        assert_eq!(BillingCycle::Quarterly.to_string(), "quarterly");
    }

    #[test]
    fn test_advance_clamps_to_month_end() {
        assert_eq!(
            BillingCycle::Monthly.advance(date(2024, 1, 31)),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            BillingCycle::Yearly.advance(date(2024, 2, 29)),
            Some(date(2025, 2, 28))
        );
        assert_eq!(
            BillingCycle::Weekly.advance(date(2024, 12, 28)),
            Some(date(2025, 1, 4))
        );
        assert_eq!(
            BillingCycle::Quarterly.advance(date(2024, 11, 15)),
            Some(date(2025, 2, 15))
        );
    }

    #[test]
    fn test_retreat() {
        assert_eq!(
            BillingCycle::Monthly.retreat(date(2024, 3, 31)),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            BillingCycle::Weekly.retreat(date(2024, 1, 3)),
            Some(date(2023, 12, 27))
        );
    }

    #[test]
    fn test_monthly_equivalent() {
        assert_eq!(BillingCycle::Monthly.monthly_equivalent(13500.0), 13500.0);
        assert_eq!(BillingCycle::Yearly.monthly_equivalent(120000.0), 10000.0);
        assert_eq!(BillingCycle::Quarterly.monthly_equivalent(30000.0), 10000.0);
        assert!((BillingCycle::Weekly.monthly_equivalent(1000.0) - 4330.0).abs() < 1e-9);
    }

    #[test]
    fn test_import_candidate_defaults() {
        let candidate: ImportCandidate =
            serde_json::from_str(r#"{"name": "Netflix", "amount": 13500}"#).unwrap();
        assert_eq!(candidate.billing_cycle, BillingCycle::Monthly);
        assert_eq!(candidate.billing_day, 1);
    }

    #[test]
    fn test_member_effective_share() {
        let mut member = SubscriptionMember {
            id: 1,
            subscription_id: 1,
            name: "Jisoo".to_string(),
            email: None,
            share_amount: None,
            share_percentage: Some(25.0),
            is_owner: false,
            created_at: Utc::now(),
        };
        assert_eq!(member.effective_share(17000.0), Some(4250.0));

        member.share_amount = Some(5000.0);
        assert_eq!(member.effective_share(17000.0), Some(5000.0));

        member.share_amount = None;
        member.share_percentage = None;
        assert_eq!(member.effective_share(17000.0), None);
    }

    #[test]
    fn test_party_parse() {
        assert_eq!("Leader".parse::<PartyRole>(), Ok(PartyRole::Leader));
        assert_eq!("파티원".parse::<PartyRole>(), Ok(PartyRole::Member));
        assert!("host".parse::<PartyRole>().is_err());
        assert_eq!("matching".parse::<PartyStatus>(), Ok(PartyStatus::Matching));
        assert!("paused".parse::<PartyStatus>().is_err());
        assert_eq!(PartyStatus::Ended.to_string(), "ended");
    }
}
