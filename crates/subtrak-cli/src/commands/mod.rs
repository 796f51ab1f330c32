//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `accounts` - Linked aggregator accounts (list, add, remove, cards)
//! - `cards` - Payment method management
//! - `categories` - Category management
//! - `core` - Core commands (init) and shared utilities (open_db, resolvers, formatting)
//! - `detect` - Detection from the aggregator or a file, candidate import
//! - `sharing` - Subscription members, sharing platforms and shared seats
//! - `status` - Status/dashboard/upcoming/calendar/savings/maintain commands
//! - `subscriptions` - Subscription management commands

pub mod accounts;
pub mod cards;
pub mod categories;
pub mod core;
pub mod detect;
pub mod sharing;
pub mod status;
pub mod subscriptions;

// Re-export command functions for main.rs
pub use accounts::*;
pub use cards::*;
pub use categories::*;
pub use core::*;
pub use detect::*;
pub use sharing::*;
pub use status::*;
pub use subscriptions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
