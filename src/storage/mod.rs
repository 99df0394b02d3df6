//! Durable keyed records.
//!
//! A [`Store`] only knows raw string values under string keys. [`Repository`]
//! layers the typed records on top of it. Loads never fail: a missing or
//! unreadable record comes back as the empty default and is logged. Saves
//! always replace the whole value.

mod file;
mod memory;
#[cfg(test)]
mod recording;
mod sqlite;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
#[cfg(test)]
pub(crate) use recording::RecordingStore;
pub use sqlite::SqliteStore;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::model::{RestState, Session, WorkoutPlan};

pub const PLANS_KEY: &str = "workout-plans";
pub const SESSIONS_KEY: &str = "sessions";
pub const REST_STATE_KEY: &str = "rest-state";
pub const LAST_COMPLETED_KEY: &str = "last-completed-session";
pub const ACTIVE_SESSION_KEY: &str = "active-session";
pub const MIRRORED_SESSIONS_KEY: &str = "mirrored-sessions";
pub const DEVICE_ID_KEY: &str = "device-id";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait Store {
    fn read(&self, key: &str) -> StoreResult<Option<String>>;
    fn write(&self, key: &str, value: &str) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}

impl<T: Store + ?Sized> Store for Box<T> {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

/// Opens the configured backend rooted at `data_dir`.
pub fn open_store(backend: StorageBackend, data_dir: &Path) -> StoreResult<Box<dyn Store>> {
    Ok(match backend {
        StorageBackend::Json => Box::new(JsonFileStore::new(data_dir)?),
        StorageBackend::Sqlite => Box::new(SqliteStore::open(data_dir.join("setwise.db"))?),
    })
}

#[derive(Debug)]
pub struct Repository<S> {
    store: S,
}

impl<S: Store> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "failed to read record, using default");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "corrupt record, using default");
                None
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.write(key, &raw)?;
        debug!(key, bytes = raw.len(), "record saved");
        Ok(())
    }

    pub fn load_plans(&self) -> Vec<WorkoutPlan> {
        self.load(PLANS_KEY).unwrap_or_default()
    }

    pub fn save_plans(&self, plans: &[WorkoutPlan]) -> StoreResult<()> {
        self.save(PLANS_KEY, plans)
    }

    pub fn load_sessions(&self) -> Vec<Session> {
        self.load(SESSIONS_KEY).unwrap_or_default()
    }

    pub fn save_sessions(&self, sessions: &[Session]) -> StoreResult<()> {
        self.save(SESSIONS_KEY, sessions)
    }

    /// Replaces the stored session with the same id, or appends it.
    pub fn upsert_session(&self, session: &Session) -> StoreResult<()> {
        let mut sessions = self.load_sessions();
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        self.save_sessions(&sessions)
    }

    pub fn load_rest_state(&self) -> Option<RestState> {
        self.load(REST_STATE_KEY)
    }

    pub fn save_rest_state(&self, state: &RestState) -> StoreResult<()> {
        self.save(REST_STATE_KEY, state)
    }

    pub fn clear_rest_state(&self) -> StoreResult<()> {
        self.store.remove(REST_STATE_KEY)
    }

    pub fn load_last_completed(&self) -> Option<String> {
        self.load(LAST_COMPLETED_KEY)
    }

    pub fn save_last_completed(&self, session_id: &str) -> StoreResult<()> {
        self.save(LAST_COMPLETED_KEY, session_id)
    }

    pub fn load_active_session_id(&self) -> Option<String> {
        self.load(ACTIVE_SESSION_KEY)
    }

    pub fn save_active_session_id(&self, session_id: &str) -> StoreResult<()> {
        self.save(ACTIVE_SESSION_KEY, session_id)
    }

    pub fn clear_active_session_id(&self) -> StoreResult<()> {
        self.store.remove(ACTIVE_SESSION_KEY)
    }

    pub fn load_mirrored_sessions(&self) -> Vec<String> {
        self.load(MIRRORED_SESSIONS_KEY).unwrap_or_default()
    }

    pub fn mark_session_mirrored(&self, session_id: &str) -> StoreResult<()> {
        let mut ids = self.load_mirrored_sessions();
        if !ids.iter().any(|id| id == session_id) {
            ids.push(session_id.to_string());
            self.save(MIRRORED_SESSIONS_KEY, &ids)?;
        }
        Ok(())
    }

    pub fn load_device_id(&self) -> Option<String> {
        self.load(DEVICE_ID_KEY)
    }

    pub fn save_device_id(&self, device_id: &str) -> StoreResult<()> {
        self.save(DEVICE_ID_KEY, device_id)
    }
}
