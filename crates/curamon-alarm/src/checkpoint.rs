use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Durable scan cursor: the timestamp up to which readings have already
/// been scanned.
///
/// Stored as a single RFC-3339 line, overwritten in place on every
/// advance. A missing file means "scan the entire history".
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<DateTime<Utc>> {
        if !self.path.is_file() {
            return Ok(DateTime::<Utc>::MIN_UTC);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read checkpoint {}", self.path.display()))?;
        let ts = DateTime::parse_from_rfc3339(content.trim())
            .with_context(|| format!("Malformed checkpoint {}", self.path.display()))?;
        Ok(ts.with_timezone(&Utc))
    }

    pub fn save(&self, ts: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, ts.to_rfc3339())
            .with_context(|| format!("Failed to write checkpoint {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_means_scan_everything() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(&dir.path().join("checkpoint"));
        assert_eq!(store.load().unwrap(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(&dir.path().join("state/checkpoint"));

        let ts = Utc::now();
        store.save(ts).unwrap();
        assert_eq!(store.load().unwrap(), ts);

        // Overwrite in place with a later value.
        let later = ts + chrono::Duration::seconds(90);
        store.save(later).unwrap();
        assert_eq!(store.load().unwrap(), later);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint");
        std::fs::write(&path, "not a timestamp").unwrap();
        assert!(CheckpointStore::new(&path).load().is_err());
    }
}
