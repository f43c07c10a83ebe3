//! Local tree validation by SHA-1

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::fetch::sha1_file;
use crate::manifest::FileRecord;

/// Whether a local file matches its manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Current,
    Missing,
    Mismatch,
}

impl FileStatus {
    pub fn is_stale(self) -> bool {
        self != FileStatus::Current
    }
}

/// Compares files under a destination root against manifest hashes
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    root: PathBuf,
}

impl ValidationEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Destination root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classify one record against the file on disk
    ///
    /// An unreadable file is reported as a mismatch so that it gets
    /// downloaded again.
    pub fn status(&self, record: &FileRecord) -> FileStatus {
        classify(&record.destination(&self.root), &record.hash)
    }

    /// Classify on the blocking pool, handing the record back
    pub async fn check(&self, record: FileRecord) -> (FileRecord, FileStatus) {
        let path = record.destination(&self.root);
        let expected = record.hash.clone();

        let status = tokio::task::spawn_blocking(move || classify(&path, &expected))
            .await
            .unwrap_or_else(|e| {
                warn!(path = %record.relative_path(), error = %e, "Hash task failed, treating as stale");
                FileStatus::Mismatch
            });

        (record, status)
    }
}

fn classify(path: &Path, expected: &str) -> FileStatus {
    match sha1_file(path) {
        Ok(actual) if actual.eq_ignore_ascii_case(expected) => FileStatus::Current,
        Ok(actual) => {
            debug!(path = %path.display(), expected, actual = %actual, "Hash mismatch");
            FileStatus::Mismatch
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => FileStatus::Missing,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read local file, treating as stale");
            FileStatus::Mismatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::sha1_hex;
    use std::fs;
    use tempfile::TempDir;

    fn record(path: &str, name: &str, hash: &str) -> FileRecord {
        FileRecord {
            path: path.into(),
            name: name.into(),
            hash: hash.into(),
            url: format!("http://m/1.0/{}.gz", name),
            size: None,
            attempts: 0,
        }
    }

    #[test]
    fn test_status_classification() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("ok.txt"), b"good").unwrap();
        fs::write(dir.path().join("bad.txt"), b"stale").unwrap();

        let engine = ValidationEngine::new(dir.path());

        let good = record("sub", "ok.txt", &sha1_hex(b"good").to_uppercase());
        assert_eq!(engine.status(&good), FileStatus::Current);

        let bad = record("", "bad.txt", &sha1_hex(b"fresh"));
        assert_eq!(engine.status(&bad), FileStatus::Mismatch);

        let missing = record("sub", "gone.txt", &sha1_hex(b"x"));
        assert_eq!(engine.status(&missing), FileStatus::Missing);
        assert!(FileStatus::Missing.is_stale());
        assert!(!FileStatus::Current.is_stale());
    }

    #[tokio::test]
    async fn test_check_returns_record() {
        let dir = TempDir::new().unwrap();
        let engine = ValidationEngine::new(dir.path());
        let (record, status) = engine.check(record("", "a.txt", "00")).await;
        assert_eq!(record.name, "a.txt");
        assert_eq!(status, FileStatus::Missing);
    }
}
