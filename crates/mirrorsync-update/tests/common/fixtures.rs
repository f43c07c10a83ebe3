//! Local tree and engine fixtures

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use mirrorsync_core::types::{NetworkConfig, RetryPolicy};
use mirrorsync_update::{Fetcher, TransferSettings};

pub fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Deterministic, poorly compressible content of `len` bytes
pub fn large_content(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// Sorted file names directly under `dir`; empty if it does not exist
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Write `content` at `relative` under `root`, creating directories
pub fn write_local(root: &Path, relative: &str, content: &[u8]) {
    let target = root.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(target, content).expect("write local file");
}

pub fn read_local(root: &Path, relative: &str) -> Vec<u8> {
    fs::read(root.join(relative)).expect("read local file")
}

/// Fetcher with short timeouts for tests
pub fn test_fetcher() -> Fetcher {
    Fetcher::new(&NetworkConfig::default())
        .expect("http client")
        .with_timeouts(Duration::from_secs(5), Duration::from_secs(5))
}

/// Small pools with immediate retries and no jitter
pub fn fast_settings(max_attempts: u32) -> TransferSettings {
    TransferSettings {
        validate_workers: 4,
        download_workers: 2,
        max_attempts,
        retry_policy: RetryPolicy::immediate(max_attempts),
        jitter: false,
    }
}
