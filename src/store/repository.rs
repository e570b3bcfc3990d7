use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::{Appointment, Identity};

use super::{Storage, StorageError, APPOINTMENTS_KEY, CURRENT_USER_KEY, DARK_MODE_KEY, USERS_KEY};

/// Typed access to the four persisted collections.
///
/// Every read goes to storage and every write replaces the whole value; the
/// repository holds no state of its own.
#[derive(Clone)]
pub struct Repository {
    storage: Arc<dyn Storage>,
}

impl Repository {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn read<T: DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>, StorageError> {
        match self.storage.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StorageError::Corrupt { key, source }),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &'static str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode { key, source })?;
        self.storage.set(key, raw).await
    }

    // ── users ────────────────────────────────────────────────

    pub async fn users(&self) -> Result<Vec<Identity>, StorageError> {
        Ok(self.read(USERS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_users(&self, users: &[Identity]) -> Result<(), StorageError> {
        self.write(USERS_KEY, users).await
    }

    // ── appointments ─────────────────────────────────────────

    pub async fn appointments(&self) -> Result<Vec<Appointment>, StorageError> {
        Ok(self.read(APPOINTMENTS_KEY).await?.unwrap_or_default())
    }

    pub async fn save_appointments(&self, appointments: &[Appointment]) -> Result<(), StorageError> {
        self.write(APPOINTMENTS_KEY, appointments).await
    }

    // ── session ──────────────────────────────────────────────

    pub async fn current_user(&self) -> Result<Option<Identity>, StorageError> {
        self.read(CURRENT_USER_KEY).await
    }

    pub async fn set_current_user(&self, user: &Identity) -> Result<(), StorageError> {
        self.write(CURRENT_USER_KEY, user).await
    }

    pub async fn clear_current_user(&self) -> Result<(), StorageError> {
        self.storage.remove(CURRENT_USER_KEY).await
    }

    // ── preferences ──────────────────────────────────────────

    pub async fn dark_mode(&self) -> Result<bool, StorageError> {
        Ok(self.read(DARK_MODE_KEY).await?.unwrap_or(false))
    }

    pub async fn set_dark_mode(&self, enabled: bool) -> Result<(), StorageError> {
        self.write(DARK_MODE_KEY, &enabled).await
    }
}
