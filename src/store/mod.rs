//! Flat key-value storage and the typed repository built on it.
//!
//! Every persisted value is UTF-8 JSON text under one of four keys:
//! [`CURRENT_USER_KEY`], [`USERS_KEY`], [`APPOINTMENTS_KEY`] and [`DARK_MODE_KEY`].
//! Backends only move strings around; the [`Repository`] owns the JSON encoding.

mod durable;
mod memory;
mod repository;

pub use durable::DurableStore;
pub use memory::MemoryStore;
pub use repository::Repository;

use async_trait::async_trait;

pub const CURRENT_USER_KEY: &str = "currentUser";
pub const USERS_KEY: &str = "users";
pub const APPOINTMENTS_KEY: &str = "appointments";
pub const DARK_MODE_KEY: &str = "darkMode";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log writer unavailable: {0}")]
    WriterClosed(&'static str),

    #[error("corrupt value under {key:?}: {source}")]
    Corrupt {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for {key:?}: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A flat string key-value store. Each call replaces or reads one whole value;
/// there are no multi-key transactions.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
