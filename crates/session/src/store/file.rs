// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Encrypted-at-rest credential file.
//!
//! The whole key/value map is JSON-encoded and sealed with AES-256-GCM under
//! a caller-supplied 32-byte key. File layout: `SFS1 | nonce (12) | ciphertext+tag`.
//! Every write re-seals with a fresh nonce and replaces the file atomically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use super::{CredentialStore, StoreFuture};
use crate::error::StoreError;

const MAGIC: &[u8; 4] = b"SFS1";

type Entries = BTreeMap<String, String>;

pub struct EncryptedFileStore {
    path: PathBuf,
    key: LessSafeKey,
    rng: SystemRandom,
    /// Serializes read-modify-write cycles on the file.
    io: Mutex<()>,
}

impl EncryptedFileStore {
    /// Open (or lazily create) the store at `path` with a raw 32-byte key.
    pub fn new(path: impl Into<PathBuf>, key: &[u8]) -> Result<Self, StoreError> {
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| StoreError::Key(format!("expected 32 bytes, got {}", key.len())))?;
        Ok(Self {
            path: path.into(),
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
            io: Mutex::new(()),
        })
    }

    /// Open the store with a base64-encoded key.
    pub fn with_base64_key(path: impl Into<PathBuf>, key_b64: &str) -> Result<Self, StoreError> {
        let key = STANDARD.decode(key_b64.trim()).map_err(|e| StoreError::Key(e.to_string()))?;
        Self::new(path, &key)
    }

    /// Generate a fresh random key, base64-encoded.
    pub fn generate_key() -> Result<String, StoreError> {
        let mut key = [0u8; 32];
        SystemRandom::new().fill(&mut key).map_err(|_| StoreError::Crypto)?;
        Ok(STANDARD.encode(key))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Entries, StoreError> {
        let data = match std::fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        if data.len() < MAGIC.len() + NONCE_LEN || !data.starts_with(MAGIC) {
            return Err(StoreError::Corrupt("unrecognized file header".into()));
        }
        let (nonce, sealed) = data[MAGIC.len()..].split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| StoreError::Crypto)?;
        let mut buf = sealed.to_vec();
        let plain = self
            .key
            .open_in_place(nonce, Aad::from(MAGIC), &mut buf)
            .map_err(|_| StoreError::Crypto)?;
        serde_json::from_slice(plain).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Seal and write atomically (write tmp + rename).
    fn save(&self, entries: &Entries) -> Result<(), StoreError> {
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        let mut buf =
            serde_json::to_vec(entries).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce).map_err(|_| StoreError::Crypto)?;
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::from(MAGIC),
                &mut buf,
            )
            .map_err(|_| StoreError::Crypto)?;

        let mut out = Vec::with_capacity(MAGIC.len() + NONCE_LEN + buf.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&buf);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, out)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Entries) -> bool) -> Result<(), StoreError> {
        let _io = self.io.lock();
        let mut entries = self.load()?;
        if apply(&mut entries) {
            self.save(&entries)?;
        }
        Ok(())
    }
}

impl CredentialStore for EncryptedFileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let _io = self.io.lock();
            Ok(self.load()?.remove(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.update(|entries| {
                entries.insert(key.to_owned(), value.to_owned());
                true
            })
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.update(|entries| entries.remove(key).is_some()) })
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
