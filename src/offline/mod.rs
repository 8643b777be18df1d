use std::fs;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::pipeline::submission::ReportSubmission;

/// Key for an offline-saved submission, derived from the submission
/// timestamp in epoch milliseconds.
pub fn offline_key(timestamp_millis: i64) -> String {
    format!("offlineReport_{timestamp_millis}")
}

/// Local fallback persistence used when the caller reports no connectivity.
/// Saved payloads wait for a later resubmission flow; none is defined yet,
/// so the store only needs durable writes and faithful reads.
pub trait OfflineStore: Send + Sync {
    fn save(&self, key: &str, submission: &ReportSubmission) -> AppResult<()>;
    fn load(&self, key: &str) -> AppResult<Option<ReportSubmission>>;
    fn keys(&self) -> AppResult<Vec<String>>;
}

/// One JSON file per key under a configured directory.
pub struct FileOfflineStore {
    dir: PathBuf,
}

impl FileOfflineStore {
    pub fn new(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::Internal(format!("offline store dir: {e}")))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl OfflineStore for FileOfflineStore {
    fn save(&self, key: &str, submission: &ReportSubmission) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(submission)
            .map_err(|e| AppError::Internal(format!("offline serialize: {e}")))?;
        fs::write(self.path_for(key), json)
            .map_err(|e| AppError::Internal(format!("offline write: {e}")))?;

        tracing::info!(key, "Submission saved to offline store");
        Ok(())
    }

    fn load(&self, key: &str) -> AppResult<Option<ReportSubmission>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes =
            fs::read(&path).map_err(|e| AppError::Internal(format!("offline read: {e}")))?;
        let submission = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Internal(format!("offline deserialize: {e}")))?;
        Ok(Some(submission))
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| AppError::Internal(format!("offline list: {e}")))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AppError::Internal(format!("offline list: {e}")))?;
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(|n| n.strip_suffix(".json")) {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::submission::sample_submission;

    #[test]
    fn test_offline_key_format() {
        assert_eq!(offline_key(1678899600000), "offlineReport_1678899600000");
    }

    #[test]
    fn test_round_trip_field_for_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOfflineStore::new(dir.path()).unwrap();

        let submission = sample_submission();
        store.save("offlineReport_1678899600000", &submission).unwrap();

        let loaded = store
            .load("offlineReport_1678899600000")
            .unwrap()
            .expect("payload should exist");
        assert_eq!(loaded, submission);
    }

    #[test]
    fn test_load_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOfflineStore::new(dir.path()).unwrap();
        assert!(store.load("offlineReport_0").unwrap().is_none());
    }

    #[test]
    fn test_keys_lists_saved_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileOfflineStore::new(dir.path()).unwrap();

        let submission = sample_submission();
        store.save("offlineReport_1", &submission).unwrap();
        store.save("offlineReport_2", &submission).unwrap();

        assert_eq!(
            store.keys().unwrap(),
            vec!["offlineReport_1".to_string(), "offlineReport_2".to_string()]
        );
    }
}
