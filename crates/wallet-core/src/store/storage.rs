//! Key-value persistence contract used by the store.
//!
//! The backends (keychain, preferences, files) live outside this crate;
//! [`MemoryStorage`] is the in-process implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::OperationError;

pub struct StorageKey;

impl StorageKey {
    /// Secure storage only.
    pub const MNEMONIC: &'static str = "MNEMONIC";
    /// Secure storage only, suffixed with the account address.
    pub const PRIVATE_KEY: &'static str = "PRIVATE_KEY";
    pub const ACCOUNTS: &'static str = "ACCOUNTS";
    pub const SELECTED_ACCOUNT: &'static str = "SELECTED_ACCOUNT";
    pub const ADDRESS_BOOK: &'static str = "ADDRESS_BOOK";
    pub const USER_CURRENCY: &'static str = "USER_CURRENCY";
    /// Suffixed with the account address.
    pub const LATEST_TRANSACTIONS: &'static str = "LATEST_TRANSACTIONS";
    /// Suffixed with the account address.
    pub const HARVESTING: &'static str = "HARVESTING";
    pub const NETWORK_PROPERTIES: &'static str = "NETWORK_PROPERTIES";

    pub fn for_account(key: &str, address: &str) -> String {
        format!("{key}.{}", address.to_ascii_uppercase())
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, OperationError>;

    async fn set(&self, key: &str, value: String) -> Result<(), OperationError>;

    async fn remove(&self, key: &str) -> Result<(), OperationError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, OperationError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), OperationError> {
        self.entries.lock().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), OperationError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Prefixes every key, so one backend can serve several networks.
pub struct ScopedStorage {
    inner: Arc<dyn Storage>,
    scope: String,
}

impl ScopedStorage {
    pub fn new(inner: Arc<dyn Storage>, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}/{key}", self.scope)
    }
}

#[async_trait]
impl Storage for ScopedStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, OperationError> {
        self.inner.get(&self.key(key)).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), OperationError> {
        self.inner.set(&self.key(key), value).await
    }

    async fn remove(&self, key: &str) -> Result<(), OperationError> {
        self.inner.remove(&self.key(key)).await
    }
}

pub async fn load_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, OperationError> {
    match storage.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| OperationError::Storage(format!("corrupted entry {key}: {e}"))),
        None => Ok(None),
    }
}

pub async fn save_json<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), OperationError> {
    let raw = serde_json::to_string(value)
        .map_err(|e| OperationError::Storage(format!("cannot serialize {key}: {e}")))?;
    storage.set(key, raw).await
}
