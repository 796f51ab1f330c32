//! HTTP client for the card/bank data aggregator

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{Local, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::encoding::{decode_form, encode_component};
use super::token::TokenCache;
use super::{extract_transaction_list, AggregatorEnvironment, TransactionSource};
use crate::config::{AggregatorConfig, CLIENT_ID_ENV, CLIENT_SECRET_ENV};
use crate::error::{Error, Result};
use crate::models::{BusinessType, LinkedAccount};
use crate::normalize::RawTransaction;

/// Result code the aggregator uses for success
pub const SUCCESS_CODE: &str = "CF-00000";

/// Default OAuth token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.codef.io/oauth/token";

const CARD_APPROVAL_PATH: &str = "/v1/kr/card/p/account/approval-list";
const CARD_LIST_PATH: &str = "/v1/kr/card/p/account/card-list";
const BANK_TRANSACTION_PATH: &str = "/v1/kr/bank/p/account/transaction-list";

const CARD_LIST_KEYS: &[&str] = &["resList", "resCardList"];

/// Days per month when turning `months_back` into a start date
const DAYS_PER_MONTH: i64 = 30;

/// Client for the aggregator's REST API.
///
/// Every call is a POST whose JSON body is URL-encoded; responses come back
/// URL-encoded too. The OAuth token is cached and shared between clones.
#[derive(Clone)]
pub struct AggregatorClient {
    http_client: Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Arc<Mutex<TokenCache>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

impl AggregatorClient {
    /// Create a client for an environment with the default token endpoint
    pub fn new(client_id: &str, client_secret: &str, environment: AggregatorEnvironment) -> Self {
        Self::with_urls(
            environment.base_url(),
            DEFAULT_TOKEN_URL,
            client_id,
            client_secret,
            Duration::from_secs(30),
        )
    }

    /// Create a client against explicit URLs (mock servers, proxies)
    pub fn with_urls(
        base_url: &str,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        timeout: Duration,
    ) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Arc::new(Mutex::new(TokenCache::new())),
        }
    }

    /// Create from resolved configuration. Fails when credentials are missing.
    pub fn from_config(config: &AggregatorConfig) -> Result<Self> {
        let (client_id, client_secret) = match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => {
                return Err(Error::NotConfigured(format!(
                    "set {} and {}",
                    CLIENT_ID_ENV, CLIENT_SECRET_ENV
                )))
            }
        };

        Ok(Self::with_urls(
            config
                .base_url
                .as_deref()
                .unwrap_or_else(|| config.environment.base_url()),
            &config.token_url,
            client_id,
            client_secret,
            config.timeout,
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cached token, or a fresh one from the token endpoint
    async fn access_token(&self) -> Result<String> {
        let cached = self.lock_token()?.get(Utc::now()).map(str::to_string);
        if let Some(token) = cached {
            return Ok(token);
        }

        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http_client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Authorization", format!("Basic {}", credentials))
            .body("grant_type=client_credentials&scope=read")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Aggregator token error: {} {}", status, body);
            return Err(Error::Aggregator(format!(
                "token request failed: HTTP {}",
                status.as_u16()
            )));
        }

        let issued: TokenResponse = response.json().await?;
        self.lock_token()?
            .store(issued.access_token.clone(), issued.expires_in, Utc::now());
        info!("Aggregator access token issued");

        Ok(issued.access_token)
    }

    fn lock_token(&self) -> Result<std::sync::MutexGuard<'_, TokenCache>> {
        self.token
            .lock()
            .map_err(|_| Error::InvalidData("Failed to acquire token cache lock".into()))
    }

    async fn post(&self, url: &str, token: &str, body: &str) -> Result<reqwest::Response> {
        Ok(self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", token))
            .body(body.to_string())
            .send()
            .await?)
    }

    /// POST a request body to an API path and return the decoded response.
    ///
    /// A 401 invalidates the cached token and retries exactly once.
    pub async fn request(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let encoded = encode_component(&serde_json::to_string(body)?);

        let token = self.access_token().await?;
        let mut response = self.post(&url, &token, &encoded).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Aggregator rejected token, refreshing");
            self.lock_token()?.invalidate();
            let token = self.access_token().await?;
            response = self.post(&url, &token, &encoded).await?;
        }

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            error!("Aggregator API error: {} {}", status, text);
            return Err(Error::Aggregator(format!("HTTP {}", status.as_u16())));
        }

        let text = response.text().await?;
        let result: Value = serde_json::from_str(&decode_form(&text))?;
        check_result(&result)?;

        Ok(result)
    }

    /// Card approval history between two dates (inclusive), newest first
    pub async fn card_approvals(
        &self,
        connected_id: &str,
        organization: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawTransaction>> {
        let body = json!({
            "connectedId": connected_id,
            "organization": organization,
            "startDate": compact_date(start),
            "endDate": compact_date(end),
            "orderBy": "1",
            "inquiryType": "0",
        });
        let result = self.request(CARD_APPROVAL_PATH, &body).await?;
        Ok(transactions_from_result(&result))
    }

    /// Bank account transaction history between two dates (inclusive)
    pub async fn bank_transactions(
        &self,
        connected_id: &str,
        organization: &str,
        account: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawTransaction>> {
        let body = json!({
            "connectedId": connected_id,
            "organization": organization,
            "account": account,
            "startDate": compact_date(start),
            "endDate": compact_date(end),
            "orderBy": "0",
            "inquiryType": "1",
        });
        let result = self.request(BANK_TRANSACTION_PATH, &body).await?;
        Ok(transactions_from_result(&result))
    }

    /// Cards held at an institution, as raw records (`resCardName`, `resCardNo`, ...)
    pub async fn card_list(
        &self,
        connected_id: &str,
        organization: &str,
    ) -> Result<Vec<RawTransaction>> {
        let body = json!({
            "connectedId": connected_id,
            "organization": organization,
        });
        let result = self.request(CARD_LIST_PATH, &body).await?;

        let objects = |items: &[Value]| -> Vec<RawTransaction> {
            items
                .iter()
                .filter_map(|v| v.as_object().cloned())
                .collect()
        };

        // A bare list, a wrapper object, or a single card
        let cards = match result.get("data") {
            Some(Value::Array(items)) => objects(items),
            Some(Value::Object(map)) => CARD_LIST_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))
                .map(|items| objects(items))
                .unwrap_or_else(|| vec![map.clone()]),
            _ => Vec::new(),
        };
        Ok(cards)
    }
}

#[async_trait]
impl TransactionSource for AggregatorClient {
    async fn fetch_transactions(
        &self,
        account: &LinkedAccount,
        months_back: u32,
    ) -> Result<Vec<RawTransaction>> {
        let end = Local::now().date_naive();
        let start = chrono::Duration::try_days(i64::from(months_back) * DAYS_PER_MONTH)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                Error::InvalidData(format!("months_back out of range: {}", months_back))
            })?;

        let transactions = match account.business_type {
            BusinessType::Card => {
                self.card_approvals(&account.connected_id, &account.organization_code, start, end)
                    .await?
            }
            BusinessType::Bank => {
                let number = account.account_identifier.as_deref().ok_or_else(|| {
                    Error::InvalidData(format!(
                        "bank account '{}' has no account number",
                        account.institution_name
                    ))
                })?;
                self.bank_transactions(
                    &account.connected_id,
                    &account.organization_code,
                    number,
                    start,
                    end,
                )
                .await?
            }
        };

        info!(
            "Fetched {} transactions from {} ({} to {})",
            transactions.len(),
            account.institution_name,
            start,
            end
        );
        Ok(transactions)
    }

    fn name(&self) -> &str {
        "aggregator"
    }
}

/// Fail unless the response carries the success code.
///
/// Wrapper errors carry the real cause in `data.errorList`; it is folded
/// into the message.
fn check_result(result: &Value) -> Result<()> {
    let outcome = result.get("result");
    let code = outcome
        .and_then(|r| r.get("code"))
        .and_then(Value::as_str)
        .unwrap_or("");

    if code == SUCCESS_CODE {
        return Ok(());
    }

    let message = outcome
        .and_then(|r| r.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let extra = outcome
        .and_then(|r| r.get("extraMessage"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let detail: Vec<String> = result
        .get("data")
        .and_then(|d| d.get("errorList"))
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .map(|e| {
                    format!(
                        "[{}] {}",
                        e.get("code").and_then(Value::as_str).unwrap_or(""),
                        e.get("message").and_then(Value::as_str).unwrap_or("")
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let mut full = format!("[{}] {}", code, message);
    if !extra.is_empty() {
        full.push(' ');
        full.push_str(extra);
    }
    if !detail.is_empty() {
        full.push_str(&format!(" (detail: {})", detail.join(", ")));
    }

    error!("Aggregator business error: {}", full);
    Err(Error::Aggregator(full))
}

/// Transactions from a successful response; an unrecognized payload is an empty list
fn transactions_from_result(result: &Value) -> Vec<RawTransaction> {
    match result.get("data").and_then(extract_transaction_list) {
        Some(list) => list,
        None => {
            debug!("Response carried no transaction list");
            Vec::new()
        }
    }
}

fn compact_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}
