//! # Secure store abstraction
//!
//! The gateway persists OAuth provider descriptors and refresh tokens in an
//! external secure key-value store. The store is an external collaborator:
//! this module defines the contract plus an in-memory implementation used by
//! the default wiring and tests. Each operation is individually atomic; no
//! cross-key transactions are offered.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// Errors surfaced by a [`SecretStore`] backend.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    /// The backend failed to read or write
    #[error("secure store failure: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl SecretStoreError {
    /// Create a backend error
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }
}

/// Result type for secure-store operations.
pub type SecretStoreResult<T> = std::result::Result<T, SecretStoreError>;

/// Opaque key-value secret store.
///
/// Values are raw bytes; serialization policy belongs to callers. Writes to
/// the same key are last-writer-wins.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> SecretStoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Vec<u8>) -> SecretStoreResult<()>;

    /// List all keys beginning with `prefix`.
    async fn list(&self, prefix: &str) -> SecretStoreResult<Vec<String>>;
}

/// In-memory [`SecretStore`] backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemorySecretStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, key: &str) -> SecretStoreResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> SecretStoreResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> SecretStoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }
}
