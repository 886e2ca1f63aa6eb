//! Persistence behind a single interface.
//!
//! The SQLite database is preferred. When it cannot be opened the session falls
//! back to a JSON file in the same data directory and keeps using it until the
//! store is dropped; call sites never branch on the backend.

mod local;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::db::{AttendanceRecord, Database};

pub use local::LocalStore;

pub const DATABASE_FILE: &str = "attendance.sqlite3";
pub const LOCAL_FILE: &str = "attendance.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoragePreference {
    /// Database first, local file if the database is unavailable.
    #[default]
    Auto,
    /// Always use the local file.
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Database,
    Local,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Database => "database",
            StorageBackend::Local => "local",
        }
    }
}

#[derive(Clone)]
pub enum AttendanceStore {
    Database(Database),
    Local(Arc<LocalStore>),
}

impl AttendanceStore {
    /// Pick the backend for this session.
    pub fn open(data_dir: &Path, preference: StoragePreference) -> Result<Self> {
        let local_path = data_dir.join(LOCAL_FILE);

        let store = match preference {
            StoragePreference::Local => Self::local(local_path)?,
            StoragePreference::Auto => match Database::new(data_dir.join(DATABASE_FILE)) {
                Ok(db) => Self::Database(db),
                Err(err) => {
                    warn!("Database unavailable ({err:#}); falling back to local storage");
                    Self::local(local_path)?
                }
            },
        };

        info!(
            "Using {} storage at {}",
            store.backend().as_str(),
            store.location().display()
        );
        Ok(store)
    }

    pub fn local(path: PathBuf) -> Result<Self> {
        Ok(Self::Local(Arc::new(LocalStore::new(path)?)))
    }

    pub fn backend(&self) -> StorageBackend {
        match self {
            Self::Database(_) => StorageBackend::Database,
            Self::Local(_) => StorageBackend::Local,
        }
    }

    pub fn location(&self) -> &Path {
        match self {
            Self::Database(db) => db.path(),
            Self::Local(local) => local.path(),
        }
    }

    pub async fn insert(&self, record: &AttendanceRecord) -> Result<()> {
        match self {
            Self::Database(db) => db.insert_record(record).await,
            Self::Local(local) => local.insert(record),
        }
    }

    /// Every record, newest scan first.
    pub async fn list(&self) -> Result<Vec<AttendanceRecord>> {
        match self {
            Self::Database(db) => db.list_records().await,
            Self::Local(local) => Ok(local.list()),
        }
    }

    pub async fn get(&self, record_id: &str) -> Result<Option<AttendanceRecord>> {
        match self {
            Self::Database(db) => db.get_record(record_id).await,
            Self::Local(local) => Ok(local.get(record_id)),
        }
    }

    pub async fn find_by_payload(&self, raw_qr_data: &str) -> Result<Option<AttendanceRecord>> {
        match self {
            Self::Database(db) => db.find_record_by_payload(raw_qr_data).await,
            Self::Local(local) => Ok(local.find_by_payload(raw_qr_data)),
        }
    }

    pub async fn delete(&self, record_id: &str) -> Result<Option<AttendanceRecord>> {
        match self {
            Self::Database(db) => db.delete_record(record_id).await,
            Self::Local(local) => local.delete(record_id),
        }
    }

    pub async fn clear(&self) -> Result<usize> {
        match self {
            Self::Database(db) => db.clear_records().await,
            Self::Local(local) => local.clear(),
        }
    }

    pub async fn count(&self) -> Result<u64> {
        match self {
            Self::Database(db) => db.count_records().await,
            Self::Local(local) => Ok(local.count()),
        }
    }
}
