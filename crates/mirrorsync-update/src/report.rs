//! Cycle-scoped transfer counters and failure list

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::error::SyncError;
use crate::manifest::FileRecord;

/// A file that used up every download attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub record: FileRecord,
    pub attempts: u32,
    pub last_error: String,
}

impl FailureRecord {
    /// The terminal error for this file
    pub fn to_error(&self) -> SyncError {
        SyncError::MaxAttemptsExceeded {
            path: self.record.relative_path(),
            attempts: self.attempts,
            last_error: self.last_error.clone(),
        }
    }
}

/// A file installed after verification, with the attempt that succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedRecord {
    pub path: String,
    pub attempts: u32,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSnapshot {
    /// Records checked against the local tree
    pub validated: usize,
    /// Records found stale and queued for download
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// `total - completed`
    pub remaining: usize,
    /// Manifest version selected for this cycle
    pub version: Option<String>,
}

#[derive(Debug, Default)]
struct ReportState {
    validated: usize,
    total: usize,
    completions: Vec<CompletedRecord>,
    failures: Vec<FailureRecord>,
    version: Option<String>,
}

/// Counters shared by both worker pools
///
/// All mutation happens under one lock. Readers get consistent values
/// through [`TransferReport::snapshot`].
#[derive(Debug, Default)]
pub struct TransferReport {
    state: Mutex<ReportState>,
}

impl TransferReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ReportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear everything for a new cycle
    pub fn reset(&self) {
        *self.lock() = ReportState::default();
    }

    pub fn set_version(&self, version: impl Into<String>) {
        self.lock().version = Some(version.into());
    }

    pub(crate) fn record_validated(&self) {
        self.lock().validated += 1;
    }

    pub(crate) fn record_queued(&self) {
        self.lock().total += 1;
    }

    pub(crate) fn record_completed(&self, record: &FileRecord) {
        self.lock().completions.push(CompletedRecord {
            path: record.relative_path(),
            attempts: record.attempts,
        });
    }

    pub(crate) fn record_failure(&self, failure: FailureRecord) {
        self.lock().failures.push(failure);
    }

    pub fn total(&self) -> usize {
        self.lock().total
    }

    pub fn completed(&self) -> usize {
        self.lock().completions.len()
    }

    /// Attempts it took to install `relative`, if it completed this cycle
    pub fn attempts_for(&self, relative: &str) -> Option<u32> {
        self.lock()
            .completions
            .iter()
            .find(|c| c.path == relative)
            .map(|c| c.attempts)
    }

    pub fn completions(&self) -> Vec<CompletedRecord> {
        self.lock().completions.clone()
    }

    pub fn failed(&self) -> usize {
        self.lock().failures.len()
    }

    pub fn remaining(&self) -> usize {
        let state = self.lock();
        state.total.saturating_sub(state.completions.len())
    }

    pub fn version(&self) -> Option<String> {
        self.lock().version.clone()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.lock().failures.clone()
    }

    pub fn snapshot(&self) -> ReportSnapshot {
        let state = self.lock();
        ReportSnapshot {
            validated: state.validated,
            total: state.total,
            completed: state.completions.len(),
            failed: state.failures.len(),
            remaining: state.total.saturating_sub(state.completions.len()),
            version: state.version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, attempts: u32) -> FileRecord {
        FileRecord {
            path: "sub".into(),
            name: name.into(),
            hash: "h".into(),
            url: "http://m".into(),
            size: None,
            attempts,
        }
    }

    fn failure(name: &str) -> FailureRecord {
        FailureRecord {
            record: file(name, 3),
            attempts: 3,
            last_error: "HTTP 500".into(),
        }
    }

    #[test]
    fn test_counters_and_remaining() {
        let report = TransferReport::new();
        for _ in 0..3 {
            report.record_validated();
        }
        report.record_queued();
        report.record_queued();
        report.record_completed(&file("y.txt", 2));
        report.record_failure(failure("x.txt"));

        assert_eq!(report.attempts_for("sub/y.txt"), Some(2));
        assert_eq!(report.attempts_for("sub/x.txt"), None);
        let snapshot = report.snapshot();
        assert_eq!(snapshot.validated, 3);
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.remaining, 1);
        assert_eq!(report.remaining(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let report = TransferReport::new();
        report.set_version("1.0");
        report.record_validated();
        report.record_queued();
        report.record_failure(failure("x.txt"));
        report.reset();
        assert_eq!(report.snapshot(), ReportSnapshot::default());
    }

    #[test]
    fn test_failure_to_error() {
        let err = failure("x.txt").to_error();
        let message = err.to_string();
        assert!(message.contains("sub/x.txt"));
        assert!(message.contains("3 attempts"));
    }
}
