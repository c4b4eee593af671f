use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::Exchange;
use crate::constants::paths;
use crate::error::TilbotError;

/// On-disk form of the whole store: user key to chronological exchanges.
pub type SnapshotData = BTreeMap<String, Vec<Exchange>>;

/// Where the in-memory state came from at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Empty,
}

/// `<path>.backup`, the sibling copy of the last successfully loaded snapshot.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(paths::BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// JSON snapshot file plus its backup sibling.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    backup: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup = backup_path_for(&path);
        Self { path, backup }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Load the primary snapshot, refreshing the backup from it. If the
    /// primary is missing or unreadable, fall back to the backup, then to an
    /// empty map. Never fails.
    pub fn load(&self) -> (SnapshotData, LoadSource) {
        match Self::read(&self.path) {
            Ok(data) => {
                if let Err(e) = Self::write_atomic(&self.backup, &data) {
                    tracing::warn!("Failed to refresh backup {}: {}", self.backup.display(), e);
                }
                return (data, LoadSource::Primary);
            }
            Err(e) if self.path.exists() => {
                tracing::warn!("Failed to load history {}: {}", self.path.display(), e);
            }
            Err(_) => {
                tracing::info!("No history file at {}", self.path.display());
            }
        }

        if self.backup.exists() {
            match Self::read(&self.backup) {
                Ok(data) => {
                    tracing::info!("Recovered history from backup {}", self.backup.display());
                    return (data, LoadSource::Backup);
                }
                Err(e) => {
                    tracing::warn!("Backup {} is unusable too: {}", self.backup.display(), e);
                }
            }
        }

        (SnapshotData::new(), LoadSource::Empty)
    }

    pub fn write(&self, data: &SnapshotData) -> Result<(), TilbotError> {
        Self::write_atomic(&self.path, data)
    }

    fn read(path: &Path) -> Result<SnapshotData, TilbotError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            TilbotError::storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            TilbotError::storage(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn write_atomic(path: &Path, data: &SnapshotData) -> Result<(), TilbotError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(data)?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, contents).map_err(|e| {
            TilbotError::storage(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        fs::rename(&tmp_path, path).map_err(|e| {
            TilbotError::storage(format!("Failed to rename {}: {}", tmp_path.display(), e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ExchangeCaps;
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn sample() -> SnapshotData {
        let mut data = SnapshotData::new();
        data.insert(
            "42".to_string(),
            vec![Exchange::recorded_at(
                "Сәлем",
                "Сәлеметсіз бе!",
                "llama-3.3-70b-versatile",
                ExchangeCaps::default(),
                DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            )],
        );
        data
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path_for(Path::new("data/bot_memory.json")),
            PathBuf::from("data/bot_memory.json.backup")
        );
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path().join("memory.json"));
        let (data, source) = file.load();
        assert!(data.is_empty());
        assert_eq!(source, LoadSource::Empty);
        assert!(!file.backup_path().exists());
    }

    #[test]
    fn test_load_primary_writes_backup() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path().join("memory.json"));
        file.write(&sample()).unwrap();

        let (data, source) = file.load();
        assert_eq!(source, LoadSource::Primary);
        assert_eq!(data, sample());
        assert!(file.backup_path().exists());
    }

    #[test]
    fn test_corrupt_primary_recovers_from_backup() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path().join("memory.json"));
        file.write(&sample()).unwrap();
        let _ = file.load();

        fs::write(file.path(), "{ not json").unwrap();
        let (data, source) = file.load();
        assert_eq!(source, LoadSource::Backup);
        assert_eq!(data, sample());
    }

    #[test]
    fn test_corrupt_primary_and_backup_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path().join("memory.json"));
        fs::write(file.path(), "garbage").unwrap();
        fs::write(file.backup_path(), "more garbage").unwrap();

        let (data, source) = file.load();
        assert!(data.is_empty());
        assert_eq!(source, LoadSource::Empty);
    }

    #[test]
    fn test_write_creates_parent_dirs_and_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested").join("memory.json"));
        file.write(&sample()).unwrap();
        assert!(file.path().exists());
        assert!(!dir.path().join("nested").join("memory.json.tmp").exists());
    }
}
