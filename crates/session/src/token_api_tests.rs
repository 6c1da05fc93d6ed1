// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::Ordering;

use serde_json::json;

use super::*;
use crate::test_support::MockBackend;

#[tokio::test]
async fn refresh_success_without_rotation() -> anyhow::Result<()> {
    let backend = MockBackend::start().await;
    backend.script_refresh(vec![(200, json!({ "access": "a2" }))]);
    let api = TokenApi::new(&backend.config());

    let grant = api.refresh("r1").await?;
    assert_eq!(grant, RefreshGrant { access: "a2".into(), refresh: None, expires_in: None });

    assert_eq!(backend.state.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.state.refresh_bodies.lock().clone(), vec![json!({ "refresh": "r1" })]);
    Ok(())
}

#[tokio::test]
async fn refresh_success_with_rotation_and_lifetime() -> anyhow::Result<()> {
    let backend = MockBackend::start().await;
    backend.script_refresh(vec![(200, json!({ "access": "a2", "refresh": "r2", "expires_in": 900 }))]);
    let api = TokenApi::new(&backend.config());

    let grant = api.refresh("r1").await?;
    assert_eq!(grant.refresh.as_deref(), Some("r2"));
    assert_eq!(grant.expires_in, Some(900));
    Ok(())
}

#[yare::parameterized(
    unauthorized = { 401, true },
    forbidden = { 403, true },
    bad_request = { 400, false },
    server_error = { 500, false },
    unavailable = { 503, false },
)]
#[test_macro(tokio::test)]
async fn refresh_error_classification(status: u16, rejected: bool) {
    let backend = MockBackend::start().await;
    backend.script_refresh(vec![(status, json!({ "detail": "nope" }))]);
    let api = TokenApi::new(&backend.config());

    match api.refresh("r1").await {
        Err(e) => assert_eq!(e.is_rejection(), rejected, "status {status}: {e}"),
        Ok(grant) => panic!("expected failure for {status}, got {grant:?}"),
    }
}

#[tokio::test]
async fn refresh_without_access_is_transient() {
    let backend = MockBackend::start().await;
    backend.script_refresh(vec![(200, json!({ "refresh": "r2" }))]);
    let api = TokenApi::new(&backend.config());

    let err = api.refresh("r1").await;
    assert!(matches!(err, Err(RefreshError::Transient(_))), "got {err:?}");
}

#[tokio::test]
async fn refresh_network_error_is_transient() {
    let mut config = SessionConfig::new("http://127.0.0.1:1/api");
    config.request_timeout_secs = 2;
    let api = TokenApi::new(&config);

    let err = api.refresh("r1").await;
    assert!(matches!(err, Err(RefreshError::Transient(_))), "got {err:?}");
}

#[tokio::test]
async fn login_returns_grant_and_user() -> anyhow::Result<()> {
    let backend = MockBackend::start().await;
    let api = TokenApi::new(&backend.config());

    let grant = api.login("x@y.com", "secret").await?;
    assert_eq!(grant.access, "a1");
    assert_eq!(grant.refresh, "r1");
    assert_eq!(grant.user.id, "1");
    assert_eq!(grant.user.email, "x@y.com");
    Ok(())
}

#[tokio::test]
async fn login_bad_password_is_status_error() {
    let backend = MockBackend::start().await;
    let api = TokenApi::new(&backend.config());

    let err = api.login("x@y.com", "wrong").await;
    match err {
        Err(e) => assert_eq!(e.status(), Some(StatusCode::UNAUTHORIZED)),
        Ok(grant) => panic!("expected 401, got {grant:?}"),
    }
}
