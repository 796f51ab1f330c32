//! Transaction sources
//!
//! Detection consumes raw transaction lists and does not care where they came
//! from. Two sources are provided:
//! - [`AggregatorClient`] - the Korean card/bank data aggregator (CODEF) over HTTPS
//! - [`JsonFileSource`] - a saved response or plain JSON array on disk

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::LinkedAccount;
use crate::normalize::RawTransaction;

mod client;
pub mod encoding;
mod token;

pub use client::{AggregatorClient, DEFAULT_TOKEN_URL, SUCCESS_CODE};
pub use token::TokenCache;

/// Keys a transaction list may be stored under, in lookup order
pub const TRANSACTION_LIST_KEYS: &[&str] = &["resList", "resApprovalList", "resTrHistoryList"];

/// Aggregator deployment to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregatorEnvironment {
    /// Fixed canned responses
    #[default]
    Sandbox,
    /// Real institutions, demo quota
    Development,
    Production,
}

impl AggregatorEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// API base URL for this environment
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.codef.io",
            Self::Development => "https://development.codef.io",
            Self::Production => "https://api.codef.io",
        }
    }
}

impl std::str::FromStr for AggregatorEnvironment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "development" | "dev" | "demo" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("Unknown aggregator environment: {}", s)),
        }
    }
}

impl std::fmt::Display for AggregatorEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Anything that can produce raw transactions for a linked account
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetch roughly the last `months_back` months of transactions
    async fn fetch_transactions(
        &self,
        account: &LinkedAccount,
        months_back: u32,
    ) -> Result<Vec<RawTransaction>>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Pull the transaction list out of a response `data` value.
///
/// `data` is either the list itself or an object holding it under one of
/// [`TRANSACTION_LIST_KEYS`]. Non-object entries are dropped. Returns `None`
/// when no list can be found.
pub fn extract_transaction_list(data: &Value) -> Option<Vec<RawTransaction>> {
    let list = match data {
        Value::Array(items) => items,
        Value::Object(map) => {
            let (key, items) = TRANSACTION_LIST_KEYS
                .iter()
                .find_map(|key| match map.get(*key) {
                    Some(Value::Array(items)) => Some((*key, items)),
                    _ => None,
                })?;
            debug!("Transaction list found under '{}'", key);
            items
        }
        _ => return None,
    };

    let total = list.len();
    let records: Vec<RawTransaction> = list
        .iter()
        .filter_map(|item| item.as_object().cloned())
        .collect();

    if records.len() < total {
        warn!(
            "Dropped {} non-object entries from transaction list",
            total - records.len()
        );
    }

    Some(records)
}

/// Reads transactions from a JSON file.
///
/// Accepts a bare array of records, an object holding the list, or a full
/// aggregator response with the list under `data`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse and extract the transaction list
    pub fn load(&self) -> Result<Vec<RawTransaction>> {
        let content = std::fs::read_to_string(&self.path)?;
        let value: Value = serde_json::from_str(&content)?;

        let data = match value.get("data") {
            Some(data) if value.get("result").is_some() => data,
            _ => &value,
        };

        extract_transaction_list(data).ok_or_else(|| {
            Error::InvalidData(format!(
                "No transaction list found in {}",
                self.path.display()
            ))
        })
    }
}

#[async_trait]
impl TransactionSource for JsonFileSource {
    async fn fetch_transactions(
        &self,
        _account: &LinkedAccount,
        _months_back: u32,
    ) -> Result<Vec<RawTransaction>> {
        self.load()
    }

    fn name(&self) -> &str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_environment_parse() {
        assert_eq!(
            "prod".parse::<AggregatorEnvironment>(),
            Ok(AggregatorEnvironment::Production)
        );
        assert_eq!(
            AggregatorEnvironment::Development.base_url(),
            "https://development.codef.io"
        );
        assert!("staging".parse::<AggregatorEnvironment>().is_err());
    }

    #[test]
    fn test_extract_prefers_res_list() {
        let data = json!({
            "resApprovalList": [{"resUsedDate": "20240101"}],
            "resList": [{"resUsedDate": "20240202"}, {"resUsedDate": "20240303"}],
        });
        let list = extract_transaction_list(&data).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["resUsedDate"], "20240202");
    }

    #[test]
    fn test_extract_falls_back_to_approval_list() {
        let data = json!({"resApprovalList": [{"resUsedDate": "20240101"}, "junk"]});
        let list = extract_transaction_list(&data).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_extract_bare_array_and_missing() {
        assert_eq!(
            extract_transaction_list(&json!([{"a": 1}, {"b": 2}]))
                .unwrap()
                .len(),
            2
        );
        assert!(extract_transaction_list(&json!({"other": []})).is_none());
        assert!(extract_transaction_list(&json!("text")).is_none());
    }

    #[test]
    fn test_json_file_source_shapes() {
        let mut bare = tempfile::NamedTempFile::new().unwrap();
        write!(bare, "{}", json!([{"resUsedDate": "20240101"}])).unwrap();
        assert_eq!(JsonFileSource::new(bare.path()).load().unwrap().len(), 1);

        let mut response = tempfile::NamedTempFile::new().unwrap();
        write!(
            response,
            "{}",
            json!({
                "result": {"code": "CF-00000"},
                "data": {"resList": [{"resUsedDate": "20240101"}, {"resUsedDate": "20240201"}]}
            })
        )
        .unwrap();
        assert_eq!(JsonFileSource::new(response.path()).load().unwrap().len(), 2);

        let mut empty = tempfile::NamedTempFile::new().unwrap();
        write!(empty, "{}", json!({"nothing": true})).unwrap();
        assert!(matches!(
            JsonFileSource::new(empty.path()).load(),
            Err(Error::InvalidData(_))
        ));
    }
}
