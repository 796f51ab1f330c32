//! SubTrak Core Library
//!
//! Shared functionality for the SubTrak subscription tracker:
//! - Transaction normalization and recurring-charge detection
//! - Import reconciliation of approved candidates
//! - Database access and migrations (SQLCipher)
//! - Dashboard, calendar and maintenance jobs
//! - Aggregator client and other transaction sources
//! - Layered configuration

pub mod aggregator;
pub mod calendar;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod detect;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod normalize;
pub mod reconcile;

/// Test utilities including mock aggregator server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregator::{
    AggregatorClient, AggregatorEnvironment, JsonFileSource, TokenCache, TransactionSource,
};
pub use config::Config;
pub use db::Database;
pub use detect::{detect_subscriptions, detect_subscriptions_with_shape};
pub use error::{Error, Result};
pub use maintenance::{run_maintenance, MaintenanceReport};
pub use normalize::{normalize_transaction, RawTransaction, SourceShape};
pub use reconcile::{reconcile_import, ImportTarget};
