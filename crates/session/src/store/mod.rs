// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secure credential store: async string key/value storage plus the
//! credential record layout persisted in it.

pub mod file;
pub mod memory;
pub mod record;

use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;

pub use file::EncryptedFileStore;
pub use memory::MemoryStore;
pub use record::CredentialRecord;

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const TOKEN_EXPIRY: &str = "token_expiry";
pub const USER_ID: &str = "user_id";
pub const USER_EMAIL: &str = "user_email";
pub const USER_NAME: &str = "user_name";
pub const USER_PHONE: &str = "user_phone";
pub const IS_VERIFIED: &str = "is_verified";
pub const MUST_CHANGE_PASSWORD: &str = "must_change_password";

/// Every key owned by the credential record, in write order.
pub const ALL_KEYS: &[&str] = &[
    ACCESS_TOKEN,
    REFRESH_TOKEN,
    TOKEN_EXPIRY,
    USER_ID,
    USER_EMAIL,
    USER_NAME,
    USER_PHONE,
    IS_VERIFIED,
    MUST_CHANGE_PASSWORD,
];

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Encrypted-at-rest key/value store for credentials.
///
/// Object-safe for use as `Arc<dyn CredentialStore>`. Deleting an absent key
/// succeeds.
pub trait CredentialStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()>;

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}
