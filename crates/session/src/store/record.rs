// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential record: the durable token pair, expiry, and denormalized user
//! fields, mapped onto individual store keys.

use tracing::warn;

use super::*;
use crate::clock::parse_expiry;
use crate::session::UserProfile;

/// Everything needed to restore a session without a network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as epoch millis; `None` if missing or unparseable.
    pub token_expiry: Option<u64>,
    pub user: UserProfile,
    pub must_change_password: bool,
}

impl CredentialRecord {
    /// Key/value pairs in write order.
    fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            (ACCESS_TOKEN, self.access_token.clone()),
            (REFRESH_TOKEN, self.refresh_token.clone()),
        ];
        if let Some(expiry) = self.token_expiry {
            entries.push((TOKEN_EXPIRY, expiry.to_string()));
        }
        entries.extend(user_entries(&self.user, self.must_change_password));
        entries
    }
}

fn user_entries(user: &UserProfile, must_change_password: bool) -> Vec<(&'static str, String)> {
    vec![
        (USER_ID, user.id.clone()),
        (USER_EMAIL, user.email.clone()),
        (USER_NAME, user.full_name.clone()),
        (USER_PHONE, user.phone_number.clone()),
        (IS_VERIFIED, user.is_verified.to_string()),
        (MUST_CHANGE_PASSWORD, must_change_password.to_string()),
    ]
}

fn flag(value: Option<String>) -> bool {
    value.as_deref() == Some("true")
}

/// Read the record. A store holding only one of the two tokens has no record.
pub async fn load(store: &dyn CredentialStore) -> Result<Option<CredentialRecord>, StoreError> {
    let access = store.get(ACCESS_TOKEN).await?;
    let refresh = store.get(REFRESH_TOKEN).await?;
    let (access_token, refresh_token) = match (access, refresh) {
        (Some(a), Some(r)) => (a, r),
        (None, None) => return Ok(None),
        (a, _) => {
            warn!(has_access = a.is_some(), "credential store holds half a token pair, ignoring");
            return Ok(None);
        }
    };

    let token_expiry = store.get(TOKEN_EXPIRY).await?.as_deref().and_then(parse_expiry);
    let user = UserProfile {
        id: store.get(USER_ID).await?.unwrap_or_default(),
        email: store.get(USER_EMAIL).await?.unwrap_or_default(),
        full_name: store.get(USER_NAME).await?.unwrap_or_default(),
        phone_number: store.get(USER_PHONE).await?.unwrap_or_default(),
        is_verified: flag(store.get(IS_VERIFIED).await?),
    };
    let must_change_password = flag(store.get(MUST_CHANGE_PASSWORD).await?);

    Ok(Some(CredentialRecord {
        access_token,
        refresh_token,
        token_expiry,
        user,
        must_change_password,
    }))
}

/// Write every field of the record, stopping at the first failure.
pub async fn save(store: &dyn CredentialStore, record: &CredentialRecord) -> Result<(), StoreError> {
    for (key, value) in record.entries() {
        store.set(key, &value).await?;
    }
    Ok(())
}

/// Write only the denormalized user fields.
pub async fn save_user(
    store: &dyn CredentialStore,
    user: &UserProfile,
    must_change_password: bool,
) -> Result<(), StoreError> {
    for (key, value) in user_entries(user, must_change_password) {
        store.set(key, &value).await?;
    }
    Ok(())
}

/// Read the persisted expiry alone.
pub async fn load_expiry(store: &dyn CredentialStore) -> Result<Option<u64>, StoreError> {
    Ok(store.get(TOKEN_EXPIRY).await?.as_deref().and_then(parse_expiry))
}

/// Delete every record key. Keeps going past failures and returns the first.
pub async fn clear(store: &dyn CredentialStore) -> Result<(), StoreError> {
    let mut first_err = None;
    for key in ALL_KEYS {
        if let Err(e) = store.delete(key).await {
            warn!(key, err = %e, "failed to delete credential key");
            first_err.get_or_insert(e);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
