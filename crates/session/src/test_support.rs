// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a scripted storefront backend and a store
//! with injectable failures.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::SessionConfig;
use crate::error::StoreError;
use crate::store::{CredentialStore, MemoryStore, StoreFuture};

/// Recorded traffic and scripted responses for [`MockBackend`].
pub struct MockState {
    pub refresh_calls: AtomicU32,
    pub refresh_bodies: Mutex<Vec<Value>>,
    /// `Authorization` header seen on each auth-endpoint call.
    pub auth_endpoint_headers: Mutex<Vec<Option<String>>>,
    /// Bearer token presented on each resource request, in arrival order.
    pub resource_tokens: Mutex<Vec<Option<String>>>,
    refresh_script: Mutex<VecDeque<(u16, Value)>>,
    refresh_delay: Mutex<Duration>,
    slow_delay: Mutex<Duration>,
    valid_token: Mutex<String>,
}

impl MockState {
    fn new() -> Self {
        Self {
            refresh_calls: AtomicU32::new(0),
            refresh_bodies: Mutex::new(Vec::new()),
            auth_endpoint_headers: Mutex::new(Vec::new()),
            resource_tokens: Mutex::new(Vec::new()),
            refresh_script: Mutex::new(VecDeque::new()),
            refresh_delay: Mutex::new(Duration::ZERO),
            slow_delay: Mutex::new(Duration::ZERO),
            valid_token: Mutex::new("a1".to_owned()),
        }
    }

    pub fn refresh_count(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

/// Storefront backend on `127.0.0.1:0`.
///
/// - `POST /api/auth/login/`: password `secret` yields `a1`/`r1` for user 1.
/// - `POST /api/auth/token/refresh/`: scripted; a 200 with `access` makes that
///   token the only one resource routes accept. Unscripted calls return 401.
/// - `GET /api/orders/`: 200 with the presented token if it is current, else 401.
/// - `GET /api/slow-orders/`: as `/orders/`, but the token is checked only after
///   the slow delay.
/// - `GET /api/always-401/`, `GET /api/broken/`: fixed 401 / 500.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let app = Router::new()
            .route("/api/auth/login/", post(login))
            .route("/api/auth/token/refresh/", post(refresh))
            .route("/api/orders/", get(orders))
            .route("/api/slow-orders/", get(slow_orders))
            .route("/api/always-401/", get(always_unauthorized))
            .route("/api/broken/", get(broken))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, state }
    }

    pub fn config(&self) -> SessionConfig {
        SessionConfig::new(format!("http://{}/api", self.addr))
    }

    /// Queue responses for successive refresh calls.
    pub fn script_refresh(&self, responses: Vec<(u16, Value)>) {
        self.state.refresh_script.lock().extend(responses);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock() = delay;
    }

    pub fn set_slow_delay(&self, delay: Duration) {
        *self.state.slow_delay.lock() = delay;
    }

    pub fn set_valid_token(&self, token: &str) {
        *self.state.valid_token.lock() = token.to_owned();
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn reply(status: u16, body: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(body))
}

async fn login(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.auth_endpoint_headers.lock().push(headers.get("authorization").map(header_text));
    if body["password"] != "secret" {
        return reply(401, json!({ "detail": "invalid credentials" }));
    }
    reply(
        200,
        json!({
            "access": "a1",
            "refresh": "r1",
            "expires_in": 3600,
            "user": {
                "id": 1,
                "email": body["email"],
                "full_name": "Ada Shopper",
                "phone_number": "+15550100",
                "is_verified": true
            }
        }),
    )
}

async fn refresh(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    state.refresh_bodies.lock().push(body);
    state.auth_endpoint_headers.lock().push(headers.get("authorization").map(header_text));

    let delay = *state.refresh_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let (status, body) = state
        .refresh_script
        .lock()
        .pop_front()
        .unwrap_or((401, json!({ "detail": "token_not_valid" })));
    if status == 200 {
        if let Some(access) = body["access"].as_str() {
            *state.valid_token.lock() = access.to_owned();
        }
    }
    reply(status, body)
}

async fn orders(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let token = bearer(&headers);
    state.resource_tokens.lock().push(token.clone());
    check_token(&state, token)
}

async fn slow_orders(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let token = bearer(&headers);
    state.resource_tokens.lock().push(token.clone());
    let delay = *state.slow_delay.lock();
    tokio::time::sleep(delay).await;
    check_token(&state, token)
}

fn check_token(state: &MockState, token: Option<String>) -> (StatusCode, Json<Value>) {
    let valid = state.valid_token.lock().clone();
    match token {
        Some(t) if t == valid => reply(200, json!({ "token": t, "orders": [] })),
        _ => reply(401, json!({ "detail": "token_not_valid" })),
    }
}

async fn always_unauthorized(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.resource_tokens.lock().push(bearer(&headers));
    reply(401, json!({ "detail": "token_not_valid" }))
}

async fn broken() -> (StatusCode, Json<Value>) {
    reply(500, json!({ "detail": "boom" }))
}

fn header_text(v: &axum::http::HeaderValue) -> String {
    v.to_str().unwrap_or_default().to_owned()
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// [`MemoryStore`] with switchable failures.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    /// Writes to this key fail.
    pub fail_set_key: Mutex<Option<String>>,
    pub fail_reads: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn unavailable(op: &str) -> StoreError {
        StoreError::Unavailable(format!("injected {op} failure"))
    }
}

impl CredentialStore for FlakyStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Box::pin(async { Err(Self::unavailable("read")) });
        }
        self.inner.get(key)
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        if self.fail_set_key.lock().as_deref() == Some(key) {
            return Box::pin(async { Err(Self::unavailable("write")) });
        }
        self.inner.set(key, value)
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Box::pin(async { Err(Self::unavailable("delete")) });
        }
        self.inner.delete(key)
    }
}
