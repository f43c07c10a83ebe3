//! Mirror arbitration
//!
//! Every mirror of a channel is probed at once. As probes finish, each
//! decoded manifest is offered to a shared slot holding the current best:
//! a newer version always wins, an older one is dropped, and an equal one
//! wins only when it answered strictly faster. Mirrors that fail are logged
//! and skipped.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::error::{FetchError, Result, SyncError};
use crate::fetch::Fetcher;
use crate::manifest::Manifest;

/// Picks the best manifest among a set of mirrors
#[derive(Debug, Clone)]
pub struct MirrorArbiter {
    fetcher: Fetcher,
}

impl MirrorArbiter {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Probe every mirror concurrently and return the winning manifest
    ///
    /// Fails with [`SyncError::NoManifestAvailable`] only when no mirror
    /// produced a valid manifest. A manifest with zero files is a success.
    pub async fn select_best(&self, mirrors: &[String]) -> Result<Manifest> {
        let best: Arc<Mutex<Option<Manifest>>> = Arc::new(Mutex::new(None));

        let probes = mirrors.iter().map(|url| {
            let fetcher = self.fetcher.clone();
            let best = best.clone();
            let url = url.clone();

            tokio::spawn(async move {
                match probe(&fetcher, &url).await {
                    Ok(manifest) => offer(&best, manifest),
                    Err(e) => warn!(mirror = %url, error = %e, "Manifest fetch failed"),
                }
            })
        });

        for result in join_all(probes).await {
            if let Err(e) = result {
                error!("Mirror probe task failed: {}", e);
            }
        }

        let winner = best.lock().unwrap_or_else(PoisonError::into_inner).take();

        match winner {
            Some(manifest) => {
                info!(
                    mirror = %manifest.source,
                    version = %manifest.version,
                    latency_ms = manifest.latency.as_millis() as u64,
                    files = manifest.file_count(),
                    "Selected manifest"
                );
                Ok(manifest)
            }
            None => Err(SyncError::no_manifest_available(mirrors.len())),
        }
    }
}

/// Fetch and decode one mirror's manifest
pub async fn probe(fetcher: &Fetcher, url: &str) -> std::result::Result<Manifest, FetchError> {
    let (body, latency) = fetcher.get_document(url).await?;
    Manifest::from_slice(&body, url, latency).map_err(|source| FetchError::Manifest {
        url: url.to_string(),
        source,
    })
}

/// True when `candidate` should replace `current`
pub fn prefers(current: &Manifest, candidate: &Manifest) -> bool {
    match candidate.version.cmp(&current.version) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.latency < current.latency,
    }
}

fn offer(best: &Mutex<Option<Manifest>>, candidate: Manifest) {
    let mut slot = best.lock().unwrap_or_else(PoisonError::into_inner);

    let replace = match slot.as_ref() {
        None => true,
        Some(current) => prefers(current, &candidate),
    };

    if replace {
        debug!(
            mirror = %candidate.source,
            version = %candidate.version,
            latency_ms = candidate.latency.as_millis() as u64,
            "New best manifest"
        );
        *slot = Some(candidate);
    } else {
        debug!(
            mirror = %candidate.source,
            version = %candidate.version,
            "Manifest discarded"
        );
    }
}
