//! Test utilities for subtrak-core
//!
//! This module provides a mock aggregator server (token endpoint plus the
//! transaction endpoints) for development and integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::aggregator::encoding::{decode_form, encode_component};

/// Shared state behind the mock endpoints
#[derive(Default)]
struct MockState {
    transactions: Mutex<Vec<Value>>,
    cards: Mutex<Vec<Value>>,
    tokens_issued: AtomicUsize,
    api_calls: AtomicUsize,
    reject_next_call: AtomicBool,
    result_code: Mutex<Option<String>>,
    last_body: Mutex<Option<Value>>,
}

/// Mock aggregator server for testing and development
pub struct MockAggregatorServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockAggregatorServer {
    /// Start the mock server on an available port, serving `transactions`
    pub async fn start(transactions: Vec<Value>) -> Self {
        let state = Arc::new(MockState {
            transactions: Mutex::new(transactions),
            ..Default::default()
        });

        let app = Router::new()
            .route("/oauth/token", post(handle_token))
            .route("/v1/kr/card/p/account/approval-list", post(handle_list))
            .route("/v1/kr/bank/p/account/transaction-list", post(handle_list))
            .route("/v1/kr/card/p/account/card-list", post(handle_cards))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for API calls
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Token endpoint URL
    pub fn token_url(&self) -> String {
        format!("http://{}/oauth/token", self.addr)
    }

    /// Cards returned by the card-list endpoint
    pub fn set_cards(&self, cards: Vec<Value>) {
        *self.state.cards.lock().unwrap() = cards;
    }

    /// Answer the next API call with 401, as if the token had been revoked
    pub fn reject_next_call(&self) {
        self.state.reject_next_call.store(true, Ordering::SeqCst);
    }

    /// Answer API calls with this business result code instead of success
    pub fn fail_with(&self, code: &str) {
        *self.state.result_code.lock().unwrap() = Some(code.to_string());
    }

    /// Number of tokens handed out so far
    pub fn tokens_issued(&self) -> usize {
        self.state.tokens_issued.load(Ordering::SeqCst)
    }

    /// Number of API calls received, including rejected ones
    pub fn api_calls(&self) -> usize {
        self.state.api_calls.load(Ordering::SeqCst)
    }

    /// Decoded body of the most recent API call
    pub fn last_body(&self) -> Option<Value> {
        self.state.last_body.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockAggregatorServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// OAuth client-credentials endpoint
async fn handle_token(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let n = state.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "access_token": format!("mock-token-{}", n),
        "token_type": "bearer",
        "expires_in": 604799,
    }))
    .into_response()
}

/// Count the call, check the bearer token and record the decoded body.
/// Returns the rejection to send, if any.
fn accept_call(state: &MockState, headers: &HeaderMap, body: &str) -> Option<Response> {
    state.api_calls.fetch_add(1, Ordering::SeqCst);

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer mock-token-"));
    if !bearer || state.reject_next_call.swap(false, Ordering::SeqCst) {
        return Some(StatusCode::UNAUTHORIZED.into_response());
    }

    let request: Value = serde_json::from_str(&decode_form(body)).unwrap_or(Value::Null);
    *state.last_body.lock().unwrap() = Some(request);
    None
}

/// Encoded response: the configured failure, or success carrying `data`
fn respond(state: &MockState, data: Value) -> Response {
    let payload = match state.result_code.lock().unwrap().clone() {
        Some(code) => json!({
            "result": {"code": code, "message": "mock failure", "extraMessage": ""},
            "data": {"errorList": [{"code": "CF-12100", "message": "mock detail"}]},
        }),
        None => json!({
            "result": {"code": "CF-00000", "message": "success"},
            "data": data,
        }),
    };

    encode_component(&payload.to_string()).into_response()
}

/// Transaction list endpoint (card approvals and bank history)
async fn handle_list(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Some(rejection) = accept_call(&state, &headers, &body) {
        return rejection;
    }
    let transactions = state.transactions.lock().unwrap().clone();
    respond(&state, json!({ "resList": transactions }))
}

/// Card list endpoint
async fn handle_cards(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Some(rejection) = accept_call(&state, &headers, &body) {
        return rejection;
    }
    let cards = state.cards.lock().unwrap().clone();
    respond(&state, Value::Array(cards))
}
