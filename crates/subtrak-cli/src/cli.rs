//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// SubTrak - Keep track of what you pay for every month
#[derive(Parser)]
#[command(name = "subtrak")]
#[command(about = "Self-hosted subscription tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "subtrak.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set SUBTRAK_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Config file (defaults to ~/.config/subtrak/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Email of the user to act as (created on first use)
    #[arg(long, default_value = "me@localhost", global = true)]
    pub user: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show database status (encryption, size, counts)
    Status,

    /// Manage subscriptions
    Subscriptions {
        #[command(subcommand)]
        action: Option<SubscriptionsAction>,
    },

    /// Find recurring charges in card/bank history
    Detect {
        /// Saved aggregator response or JSON array of transactions
        #[arg(short, long, conflicts_with = "account")]
        file: Option<PathBuf>,

        /// Linked account ID to fetch from the aggregator
        #[arg(short, long)]
        account: Option<i64>,

        /// Record shape for --file: card or bank
        #[arg(long, default_value = "card")]
        shape: String,

        /// Months of history to fetch (defaults to config)
        #[arg(short, long)]
        months: Option<u32>,

        /// Import every detected subscription
        #[arg(long)]
        import: bool,

        /// Payment method name for imports from --file
        #[arg(long)]
        card: Option<String>,

        /// Print detected subscriptions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import approved candidates from a JSON file
    ///
    /// Accepts the output of `detect --json`, trimmed to the entries you want.
    Import {
        /// JSON array of candidates (name, amount, billing_cycle, billing_day)
        file: PathBuf,

        /// Payment method name to charge them to
        #[arg(long)]
        card: Option<String>,
    },

    /// Show dashboard summary
    Dashboard {
        /// Upcoming-payment window in days (defaults to config)
        #[arg(long)]
        days: Option<i64>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List payments due soon
    Upcoming {
        /// Window in days
        #[arg(long, default_value = "7")]
        days: i64,
    },

    /// Show the payment calendar for a month
    Calendar {
        /// Month as YYYY-MM (defaults to the current month)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Show savings from cancelled subscriptions
    Savings,

    /// Advance overdue payment dates and list reminders
    ///
    /// Meant to run once a day, e.g. from cron.
    Maintain {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Manage payment methods (cards and bank accounts)
    Cards {
        #[command(subcommand)]
        action: Option<CardsAction>,
    },

    /// Manage linked aggregator accounts
    Accounts {
        #[command(subcommand)]
        action: Option<AccountsAction>,
    },

    /// Manage the people splitting a subscription
    Members {
        #[command(subcommand)]
        action: MembersAction,
    },

    /// Track seats held through subscription sharing platforms
    Sharing {
        #[command(subcommand)]
        action: Option<SharingAction>,
    },
}

#[derive(Subcommand)]
pub enum SubscriptionsAction {
    /// List subscriptions
    List {
        /// Include cancelled subscriptions
        #[arg(long)]
        all: bool,

        /// Only this category (name or ID)
        #[arg(long)]
        category: Option<String>,

        /// Only this payment method (name or ID)
        #[arg(long)]
        card: Option<String>,
    },

    /// Add a subscription by hand
    Add {
        /// Service name
        name: String,

        /// Amount per billing cycle
        amount: f64,

        /// Billing cycle: monthly, yearly, weekly, quarterly
        #[arg(long, default_value = "monthly")]
        cycle: String,

        /// Next payment date (YYYY-MM-DD)
        #[arg(long)]
        next: String,

        /// Currency code
        #[arg(long, default_value = "KRW")]
        currency: String,

        /// Category (name or ID)
        #[arg(long)]
        category: Option<String>,

        /// Payment method (name or ID)
        #[arg(long)]
        card: Option<String>,

        /// Where to cancel it
        #[arg(long)]
        cancel_url: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Update a subscription
    Update {
        /// Subscription name or ID
        name_or_id: String,

        #[arg(long)]
        name: Option<String>,

        /// New amount (recorded in price history)
        #[arg(long)]
        amount: Option<f64>,

        #[arg(long)]
        currency: Option<String>,

        #[arg(long)]
        cycle: Option<String>,

        /// Next payment date (YYYY-MM-DD)
        #[arg(long)]
        next: Option<String>,

        /// Category (name or ID)
        #[arg(long)]
        category: Option<String>,

        /// Payment method (name or ID)
        #[arg(long)]
        card: Option<String>,

        #[arg(long)]
        cancel_url: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Note stored with the price change
        #[arg(long)]
        note: Option<String>,
    },

    /// Cancel a subscription and record the savings
    Cancel {
        /// Subscription name or ID
        name_or_id: String,

        /// Why it was cancelled
        #[arg(long)]
        reason: Option<String>,
    },

    /// Stop tracking a subscription without recording a cancellation
    Remove {
        /// Subscription name or ID
        name_or_id: String,
    },

    /// Show price history
    History {
        /// Subscription name or ID
        name_or_id: String,
    },

    /// Subscriptions to update when a card is replaced
    Checklist {
        /// Payment method (name or ID)
        card: String,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories
    List,

    /// Add a category
    Add {
        name: String,

        /// Hex color, e.g. #ef4444
        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        icon: Option<String>,
    },

    /// Rename or recolor a category
    Update {
        /// Category name or ID
        category: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        icon: Option<String>,
    },

    /// Delete a category (its subscriptions become uncategorized)
    Delete {
        /// Category name or ID
        category: String,
    },
}

#[derive(Subcommand)]
pub enum CardsAction {
    /// List payment methods
    List,

    /// Add a payment method
    Add {
        name: String,

        /// Last four digits
        #[arg(long)]
        last4: Option<String>,

        /// credit, debit, prepaid, bank_transfer
        #[arg(long, default_value = "credit")]
        r#type: String,

        /// Expiry date (YYYY-MM-DD, or YYYY-MM for the end of that month)
        #[arg(long)]
        expiry: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Mark a payment method as no longer in use
    Retire {
        /// Payment method name or ID
        card: String,
    },

    /// Delete a payment method (its subscriptions keep running, unassigned)
    Delete {
        /// Payment method name or ID
        card: String,
    },
}

#[derive(Subcommand)]
pub enum AccountsAction {
    /// List linked accounts
    List,

    /// Register an aggregator connection
    Add {
        /// Institution name, e.g. "Shinhan Card"
        institution: String,

        /// Aggregator organization code, e.g. 0306
        #[arg(long)]
        org: String,

        /// Aggregator connected ID
        #[arg(long)]
        connected_id: String,

        /// card or bank
        #[arg(long, default_value = "card")]
        r#type: String,

        /// Card or account number to query (required for banks)
        #[arg(long)]
        number: Option<String>,
    },

    /// Remove a linked account
    Remove { id: i64 },

    /// List cards held at a linked card company
    Cards {
        id: i64,

        /// Save them as payment methods
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand)]
pub enum MembersAction {
    /// List members and their shares
    List {
        /// Subscription name or ID
        subscription: String,
    },

    /// Add a member
    Add {
        /// Subscription name or ID
        subscription: String,

        /// Member name
        name: String,

        #[arg(long)]
        email: Option<String>,

        /// Fixed amount they pay
        #[arg(long, conflicts_with = "percent")]
        amount: Option<f64>,

        /// Percentage of the price they pay
        #[arg(long)]
        percent: Option<f64>,

        /// Mark as the account owner
        #[arg(long)]
        owner: bool,
    },

    /// Update a member
    Update {
        /// Subscription name or ID
        subscription: String,

        /// Member ID
        member: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, conflicts_with = "percent")]
        amount: Option<f64>,

        #[arg(long)]
        percent: Option<f64>,

        #[arg(long)]
        owner: Option<bool>,
    },

    /// Remove a member
    Remove {
        /// Subscription name or ID
        subscription: String,

        /// Member ID
        member: i64,
    },
}

#[derive(Subcommand)]
pub enum SharingAction {
    /// List your shared seats
    List,

    /// List sharing platforms
    Platforms,

    /// Register a sharing platform
    AddPlatform {
        name: String,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Record a seat in a shared party
    Join {
        /// Subscription name or ID
        subscription: String,

        /// Platform name (registered if new)
        #[arg(long)]
        platform: String,

        /// What you pay per month
        #[arg(long)]
        cost: f64,

        /// Party size
        #[arg(long, default_value = "1")]
        members: u32,

        /// leader or member
        #[arg(long, default_value = "member")]
        role: String,

        /// active, matching or ended
        #[arg(long, default_value = "active")]
        status: String,

        #[arg(long)]
        deposit: Option<f64>,

        /// Monthly platform fee
        #[arg(long)]
        fee: Option<f64>,

        /// Party ID on the platform
        #[arg(long)]
        external_id: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Update a shared seat
    Update {
        id: i64,

        #[arg(long)]
        cost: Option<f64>,

        #[arg(long)]
        members: Option<u32>,

        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        fee: Option<f64>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Forget a shared seat
    Remove { id: i64 },
}
