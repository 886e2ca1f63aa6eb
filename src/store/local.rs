use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use anyhow::{bail, Context, Result};
use log::debug;

use crate::db::{sort_newest_first, AttendanceRecord};

/// Record list kept in a single JSON file. Used when the database cannot be
/// opened, mirroring the browser's local-storage fallback.
pub struct LocalStore {
    path: PathBuf,
    data: RwLock<Vec<AttendanceRecord>>,
}

impl LocalStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read records from {}", path.display()))?;
            if contents.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse records in {}", path.display()))?
            }
        } else {
            Vec::new()
        };

        debug!("Local store at {} holds {} records", path.display(), data.len());

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<AttendanceRecord>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<AttendanceRecord>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, record: &AttendanceRecord) -> Result<()> {
        let mut guard = self.write();
        if guard.iter().any(|existing| existing.id == record.id) {
            bail!("attendance record {} already exists", record.id);
        }
        if guard
            .iter()
            .any(|existing| existing.raw_qr_data == record.raw_qr_data)
        {
            bail!("payload already recorded");
        }

        guard.push(record.clone());
        if let Err(err) = self.persist(&guard) {
            guard.pop();
            return Err(err);
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<AttendanceRecord> {
        let mut records = self.read().clone();
        sort_newest_first(&mut records);
        records
    }

    pub fn get(&self, record_id: &str) -> Option<AttendanceRecord> {
        self.read()
            .iter()
            .find(|record| record.id == record_id)
            .cloned()
    }

    pub fn find_by_payload(&self, raw_qr_data: &str) -> Option<AttendanceRecord> {
        self.read()
            .iter()
            .find(|record| record.raw_qr_data == raw_qr_data)
            .cloned()
    }

    pub fn delete(&self, record_id: &str) -> Result<Option<AttendanceRecord>> {
        let mut guard = self.write();
        let Some(index) = guard.iter().position(|record| record.id == record_id) else {
            return Ok(None);
        };

        let removed = guard.remove(index);
        if let Err(err) = self.persist(&guard) {
            guard.insert(index, removed);
            return Err(err);
        }
        Ok(Some(removed))
    }

    pub fn clear(&self) -> Result<usize> {
        let mut guard = self.write();
        let previous = std::mem::take(&mut *guard);
        if let Err(err) = self.persist(&guard) {
            *guard = previous;
            return Err(err);
        }
        Ok(previous.len())
    }

    pub fn count(&self) -> u64 {
        self.read().len() as u64
    }

    fn persist(&self, records: &[AttendanceRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let serialized = serde_json::to_string_pretty(records)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("Failed to write records to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Identity;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn record(payload: &str, second: u32) -> AttendanceRecord {
        AttendanceRecord::new(
            Identity::new("DOE, John", "USA"),
            payload,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, second).unwrap(),
        )
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attendance.json");

        let store = LocalStore::new(path.clone()).unwrap();
        store.insert(&record("a", 1)).unwrap();
        store.insert(&record("b", 2)).unwrap();
        drop(store);

        let reopened = LocalStore::new(path).unwrap();
        let payloads: Vec<_> = reopened
            .list()
            .into_iter()
            .map(|record| record.raw_qr_data)
            .collect();
        assert_eq!(payloads, vec!["b", "a"]);
    }

    #[test]
    fn duplicate_payload_is_refused() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("attendance.json")).unwrap();
        store.insert(&record("a", 1)).unwrap();

        assert!(store.insert(&record("a", 2)).is_err());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn delete_and_clear() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("attendance.json")).unwrap();
        let first = record("a", 1);
        store.insert(&first).unwrap();
        store.insert(&record("b", 2)).unwrap();

        let removed = store.delete(&first.id).unwrap().unwrap();
        assert_eq!(removed.raw_qr_data, "a");
        assert!(store.delete(&first.id).unwrap().is_none());
        assert!(store.find_by_payload("a").is_none());

        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.list().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attendance.json");
        fs::write(&path, "{ not records").unwrap();

        assert!(LocalStore::new(path).is_err());
    }
}
