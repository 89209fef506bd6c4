//! Session store
//!
//! Persists the authenticated user, access token and refresh token in a
//! `KeyValueStore`. Backend faults are logged and swallowed: reads come back
//! as `None`, writes become no-ops.

mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::User;

pub const USER_KEY: &str = "paydesk:user";
pub const TOKEN_KEY: &str = "paydesk:token";
pub const REFRESH_KEY: &str = "paydesk:refresh";

/// Point-in-time copy of the persisted session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl Session {
    /// Both a user record and an access token are present
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }
}

/// Shared session storage
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    // ==================== Generic access ====================

    pub fn get_raw(&self, key: &str) -> Option<String> {
        match self.backend.get_item(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Error while retrieving data");
                None
            }
        }
    }

    pub fn set_raw(&self, key: &str, value: &str) {
        if let Err(e) = self.backend.set_item(key, value) {
            warn!(key, error = %e, "Error while storing data");
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Stored value is not valid JSON");
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, &raw),
            Err(e) => warn!(key, error = %e, "Error while serializing data"),
        }
    }

    /// Shallow-merge `data` into the JSON object stored under `key`.
    ///
    /// Returns the merged object, or `data` unchanged when nothing mergeable
    /// is stored (in which case the store is not written).
    pub fn merge(&self, key: &str, data: serde_json::Value) -> serde_json::Value {
        let Some(serde_json::Value::Object(mut stored)) = self.get_json::<serde_json::Value>(key)
        else {
            return data;
        };

        match data {
            serde_json::Value::Object(update) => {
                stored.extend(update);
                let merged = serde_json::Value::Object(stored);
                self.set_json(key, &merged);
                merged
            }
            other => other,
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove_item(key) {
            warn!(key, error = %e, "Error while removing data");
        }
    }

    // ==================== Session keys ====================

    pub fn set_token(&self, access: &str) {
        self.set_raw(TOKEN_KEY, access);
    }

    pub fn get_token(&self) -> Option<String> {
        self.get_raw(TOKEN_KEY)
    }

    pub fn set_refresh(&self, refresh: &str) {
        self.set_raw(REFRESH_KEY, refresh);
    }

    pub fn get_refresh(&self) -> Option<String> {
        self.get_raw(REFRESH_KEY)
    }

    pub fn set_user(&self, user: &User) {
        self.set_json(USER_KEY, user);
    }

    pub fn get_user(&self) -> Option<User> {
        self.get_json(USER_KEY)
    }

    /// Remove token, refresh token and user
    pub fn clear(&self) {
        for key in [TOKEN_KEY, REFRESH_KEY, USER_KEY] {
            self.remove(key);
        }
    }

    pub fn snapshot(&self) -> Session {
        Session {
            access_token: self.get_token(),
            refresh_token: self.get_refresh(),
            user: self.get_user(),
        }
    }
}
