// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory session state shared with the UI layer.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};

/// User fields returned by the backend and mirrored into the credential store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend user id. Numeric ids are accepted and kept as text.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub is_verified: bool,
}

fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(de)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Partial user update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_change_password: Option<bool>,
}

/// The authenticated identity held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub is_verified: bool,
    pub must_change_password: bool,
    #[serde(skip_serializing)]
    pub access_token: String,
}

impl Session {
    pub fn new(user: UserProfile, must_change_password: bool, access_token: String) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            phone_number: user.phone_number,
            is_verified: user.is_verified,
            must_change_password,
            access_token,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            phone_number: self.phone_number.clone(),
            is_verified: self.is_verified,
        }
    }

    fn apply(&mut self, update: UserUpdate) {
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(name) = update.full_name {
            self.full_name = name;
        }
        if let Some(phone) = update.phone_number {
            self.phone_number = phone;
        }
        if let Some(verified) = update.is_verified {
            self.is_verified = verified;
        }
        if let Some(must_change) = update.must_change_password {
            self.must_change_password = must_change;
        }
    }
}

/// Authentication state as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// Reading the credential store at startup.
    Restoring,
    Authenticated,
    Unauthenticated,
}

/// Current session plus the restore flag. Never locked across an await.
#[derive(Debug, Default)]
pub struct SessionState {
    current: RwLock<Option<Session>>,
    loading: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::Release);
    }

    pub fn state(&self) -> AuthState {
        if self.is_loading() {
            AuthState::Restoring
        } else if self.is_authenticated() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    pub(crate) fn set(&self, session: Session) {
        *self.current.write() = Some(session);
    }

    /// Clear the session, returning what was there.
    pub(crate) fn clear(&self) -> Option<Session> {
        self.current.write().take()
    }

    /// Swap in a refreshed access token. No-op when logged out.
    pub(crate) fn replace_access_token(&self, token: &str) -> bool {
        match self.current.write().as_mut() {
            Some(session) => {
                session.access_token = token.to_owned();
                true
            }
            None => false,
        }
    }

    /// Merge a partial update, returning the merged session.
    pub(crate) fn merge(&self, update: UserUpdate) -> Option<Session> {
        let mut current = self.current.write();
        let session = current.as_mut()?;
        session.apply(update);
        Some(session.clone())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
