// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn profile() -> UserProfile {
    UserProfile {
        id: "1".into(),
        email: "x@y.com".into(),
        full_name: "Ada Shopper".into(),
        phone_number: "+15550100".into(),
        is_verified: false,
    }
}

#[test]
fn new_state_is_unauthenticated() {
    let state = SessionState::new();
    assert_eq!(state.current(), None);
    assert_eq!(state.state(), AuthState::Unauthenticated);
}

#[test]
fn loading_reports_restoring() {
    let state = SessionState::new();
    state.set_loading(true);
    assert_eq!(state.state(), AuthState::Restoring);
    state.set_loading(false);
    assert_eq!(state.state(), AuthState::Unauthenticated);
}

#[test]
fn set_and_clear() {
    let state = SessionState::new();
    state.set(Session::new(profile(), false, "a1".into()));
    assert_eq!(state.state(), AuthState::Authenticated);

    let cleared = state.clear();
    assert_eq!(cleared.map(|s| s.access_token), Some("a1".to_owned()));
    assert!(state.clear().is_none());
}

#[test]
fn replace_access_token_only_when_logged_in() {
    let state = SessionState::new();
    assert!(!state.replace_access_token("a2"));

    state.set(Session::new(profile(), false, "a1".into()));
    assert!(state.replace_access_token("a2"));
    assert_eq!(state.current().map(|s| s.access_token), Some("a2".to_owned()));
}

#[test]
fn merge_is_partial() {
    let state = SessionState::new();
    assert!(state.merge(UserUpdate::default()).is_none());

    state.set(Session::new(profile(), true, "a1".into()));
    let merged = state
        .merge(UserUpdate {
            full_name: Some("Ada L. Shopper".into()),
            is_verified: Some(true),
            must_change_password: Some(false),
            ..Default::default()
        })
        .expect("merged session");

    assert_eq!(merged.full_name, "Ada L. Shopper");
    assert!(merged.is_verified);
    assert!(!merged.must_change_password);
    assert_eq!(merged.email, "x@y.com");
    assert_eq!(merged.phone_number, "+15550100");
    assert_eq!(merged.access_token, "a1");
}

#[test]
fn profile_accepts_numeric_id() -> anyhow::Result<()> {
    let user: UserProfile =
        serde_json::from_value(serde_json::json!({ "id": 42, "email": "x@y.com" }))?;
    assert_eq!(user.id, "42");
    assert_eq!(user.full_name, "");
    assert!(!user.is_verified);

    let user: UserProfile = serde_json::from_value(serde_json::json!({ "id": "u-7" }))?;
    assert_eq!(user.id, "u-7");
    Ok(())
}

#[test]
fn session_json_omits_token() -> anyhow::Result<()> {
    let session = Session::new(profile(), false, "secret".into());
    let json = serde_json::to_string(&session)?;
    assert!(!json.contains("secret"));
    assert!(json.contains("x@y.com"));
    Ok(())
}
