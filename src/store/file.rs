//! JSON file store
//!
//! The whole state map lives in one human-readable JSON document. Every `put`
//! rewrites it through a temporary sibling file that is synced and then renamed
//! over the live file, so readers and crashes only ever see a complete document.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::{StateStore, StoreError};
use crate::monitor::TargetState;

pub struct JsonFileStore {
    path: PathBuf,
    /// In-memory copy of the document; the lock also serializes file writes
    records: Mutex<BTreeMap<String, TargetState>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading any existing document
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }

        let records = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| io_error(&path, source))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| StoreError::Corrupted {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), records = records.len(), "State store opened");

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    fn write_document(&self, records: &BTreeMap<String, TargetState>) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp_path = self.temp_path();
        let mut file = File::create(&tmp_path).map_err(|source| io_error(&tmp_path, source))?;
        file.write_all(&data)
            .and_then(|_| file.sync_all())
            .map_err(|source| io_error(&tmp_path, source))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|source| io_error(&self.path, source))?;
        self.sync_parent_dir()
    }

    // The rename is only durable once the directory entry is synced
    #[cfg(unix)]
    fn sync_parent_dir(&self) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)
            .and_then(|dir| dir.sync_all())
            .map_err(|source| {
                tracing::error!(path = %parent.display(), error = %source, "Failed to sync state directory");
                io_error(parent, source)
            })
    }

    #[cfg(not(unix))]
    fn sync_parent_dir(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, target_id: &str) -> Result<TargetState, StoreError> {
        let records = self.records.lock();
        Ok(records.get(target_id).cloned().unwrap_or_default())
    }

    fn put(&self, target_id: &str, state: &TargetState) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        let previous = records.insert(target_id.to_string(), state.clone());

        if let Err(e) = self.write_document(&records) {
            // Keep memory in line with what is on disk
            match previous {
                Some(prev) => records.insert(target_id.to_string(), prev),
                None => records.remove(target_id),
            };
            return Err(e);
        }

        Ok(())
    }

    fn snapshot(&self) -> Result<BTreeMap<String, TargetState>, StoreError> {
        Ok(self.records.lock().clone())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Slot;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn available_state() -> TargetState {
        TargetState {
            last_check: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            dates_available: true,
            available_slots: vec![Slot::new("12", "Dec 12"), Slot::new("13", "Dec 13")],
            consecutive_errors: 0,
            error_notified: false,
        }
    }

    #[test]
    fn test_unknown_target_gets_default() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp_dir.path().join("state.json")).unwrap();

        assert_eq!(store.get("nope").unwrap(), TargetState::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("state.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.put("hall", &available_state()).unwrap();
        store
            .put(
                "tent",
                &TargetState {
                    consecutive_errors: 2,
                    error_notified: true,
                    ..Default::default()
                },
            )
            .unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("hall").unwrap(), available_state());
        assert_eq!(reopened.get("tent").unwrap().consecutive_errors, 2);
        assert_eq!(reopened.snapshot().unwrap().len(), 2);
        assert!(!temp_dir.path().join("nested").join(".state.json.tmp").exists());
    }

    #[test]
    fn test_document_is_readable_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put("hall", &available_state()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["hall"]["dates_available"], true);
        assert_eq!(doc["hall"]["available_slots"][1]["value"], "13");
        assert!(raw.contains('\n'));
    }

    #[test]
    fn test_corrupted_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(&path, "{\"hall\": {\"dates_available\": tr").unwrap();

        let result = JsonFileStore::open(&path);
        assert!(matches!(result, Err(StoreError::Corrupted { .. })));
    }

    #[test]
    fn test_failed_write_keeps_previous_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put("hall", &available_state()).unwrap();

        // A directory where the temp file should go makes the write fail
        fs::create_dir(temp_dir.path().join(".state.json.tmp")).unwrap();
        let err = store.put("hall", &TargetState::default());
        assert!(matches!(err, Err(StoreError::Io { .. })));

        assert_eq!(store.get("hall").unwrap(), available_state());
        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("hall").unwrap(), available_state());
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_sync_failure_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("state");
        let store = JsonFileStore::open(dir.join("state.json")).unwrap();
        store.put("main-hall", &available_state()).unwrap();

        fs::remove_dir_all(&dir).unwrap();
        let err = store.sync_parent_dir().unwrap_err();
        assert!(matches!(err, StoreError::Io { path, .. } if path.ends_with("state")));
    }

    #[test]
    fn test_legacy_document_loads() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"tent": {"last_check": null, "dates_available": false, "available_dates": [], "consecutive_errors": 7}}"#,
        )
        .unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        let state = store.get("tent").unwrap();
        assert_eq!(state.consecutive_errors, 7);
        assert!(!state.error_notified);
    }
}
