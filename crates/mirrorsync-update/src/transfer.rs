//! Validate and download worker pools
//!
//! Two queues feed two independent pools of tokio tasks. Validation workers
//! hash local files and move stale records onto the download queue. Download
//! workers fetch, verify and install each record, putting it back on the same
//! queue after the retry delay until its attempts run out.
//!
//! Each queue tracks items that were pushed but not yet finished, so a pool
//! can be joined once its queue has fully drained, including records waiting
//! out a retry delay.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mirrorsync_core::retry::calculate_delay;
use mirrorsync_core::types::{RetryPolicy, RuntimeConfig};
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SyncError};
use crate::fetch::Fetcher;
use crate::manifest::{FileRecord, Manifest};
use crate::report::{FailureRecord, TransferReport};
use crate::validate::ValidationEngine;

/// Invoked once per finished unit of work, with no payload
///
/// Calls are serialized across both pools. The callback must not install a
/// new callback on the same engine.
pub type ProgressCallback = Arc<dyn Fn() + Send + Sync>;

/// Pool sizing and retry behaviour
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub validate_workers: usize,
    pub download_workers: usize,

    /// Attempts per file, including the first
    pub max_attempts: u32,

    /// Delay schedule between attempts of one file. Its `max_attempts` is
    /// not consulted; `max_attempts` above is the cap.
    pub retry_policy: RetryPolicy,

    /// Randomize retry delays
    pub jitter: bool,
}

impl TransferSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let max_attempts = config.transfer.max_attempts;
        let mut retry_policy = config.retry_policy("download");
        if retry_policy.max_attempts != max_attempts {
            debug!(
                policy = retry_policy.max_attempts,
                transfer = max_attempts,
                "Download attempts come from transfer.max-attempts"
            );
            retry_policy.max_attempts = max_attempts;
        }

        Self {
            validate_workers: config.transfer.validate_workers,
            download_workers: config.transfer.download_workers,
            max_attempts,
            retry_policy,
            jitter: true,
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

/// Count of pushed-but-unfinished items with a drained signal
#[derive(Debug, Default)]
struct Pending {
    count: AtomicUsize,
    drained: Notify,
}

impl Pending {
    fn add(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn done(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }

    fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    async fn wait_empty(&self) {
        loop {
            let notified = self.drained.notified();
            if self.get() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Multi-consumer work queue with join semantics
///
/// Workers block on [`WorkQueue::pop`] and must call
/// [`WorkQueue::task_done`] once per popped item.
pub struct WorkQueue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<T>>>,
    pending: Arc<Pending>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(AsyncMutex::new(rx)),
            pending: Arc::new(Pending::default()),
        }
    }

    pub fn push(&self, item: T) {
        self.pending.add();
        if self.tx.send(item).is_err() {
            self.pending.done();
        }
    }

    /// Push after `delay` without holding a worker
    ///
    /// The item counts as pending immediately, so a join cannot complete
    /// while it waits.
    pub fn push_after(&self, item: T, delay: Duration, cancel: CancellationToken) {
        if delay.is_zero() {
            self.push(item);
            return;
        }

        self.pending.add();
        let tx = self.tx.clone();
        let pending = self.pending.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => pending.done(),
                _ = tokio::time::sleep(delay) => {
                    if tx.send(item).is_err() {
                        pending.done();
                    }
                }
            }
        });
    }

    /// Wait for the next item
    pub async fn pop(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Mark one popped item as finished
    pub fn task_done(&self) {
        self.pending.done();
    }

    /// Items pushed and not yet finished
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Remove every item currently queued
    pub async fn drain(&self) -> Vec<T> {
        let mut rx = self.rx.lock().await;
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            self.pending.done();
            items.push(item);
        }
        items
    }

    /// Wait until every pushed item has been finished
    pub async fn join(&self) {
        self.pending.wait_empty().await
    }
}

impl<T: Send + 'static> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A running pool of workers
///
/// Dropping the handle leaves the workers running until the engine's
/// cancellation token fires.
pub struct PoolHandle {
    name: &'static str,
    pending: Arc<Pending>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl PoolHandle {
    /// Wait for the queue to drain, then stop the workers
    ///
    /// Returns [`SyncError::Cancelled`] if cancellation fired first.
    pub async fn join(self) -> Result<()> {
        let drained = tokio::select! {
            _ = self.pending.wait_empty() => true,
            _ = self.cancel.cancelled() => false,
        };

        self.stop().await;

        if drained {
            Ok(())
        } else {
            Err(SyncError::Cancelled)
        }
    }

    /// Stop the workers without waiting for the queue
    pub async fn shutdown(self) {
        self.stop().await
    }

    /// Items still pending on this pool's queue
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    async fn stop(self) {
        self.cancel.cancel();
        for worker in self.workers {
            if let Err(e) = worker.await {
                if e.is_panic() {
                    error!(pool = self.name, "Worker panicked: {}", e);
                }
            }
        }
        debug!(pool = self.name, "Pool stopped");
    }
}

struct Shared {
    fetcher: Fetcher,
    validator: ValidationEngine,
    settings: TransferSettings,
    validate_queue: WorkQueue<FileRecord>,
    download_queue: WorkQueue<FileRecord>,
    report: Arc<TransferReport>,
    callback: Mutex<Option<ProgressCallback>>,
}

impl Shared {
    fn notify_progress(&self) {
        let callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(callback) = callback.as_ref() {
            callback();
        }
    }

    fn queue_download(&self, record: FileRecord) {
        self.report.record_queued();
        self.download_queue.push(record);
    }
}

/// Validation and download engine for one destination tree
pub struct TransferEngine {
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl TransferEngine {
    pub fn new(fetcher: Fetcher, validator: ValidationEngine, settings: TransferSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                validator,
                settings,
                validate_queue: WorkQueue::new(),
                download_queue: WorkQueue::new(),
                report: Arc::new(TransferReport::new()),
                callback: Mutex::new(None),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `token` between queue items
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Install the progress callback, replacing any previous one
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut slot = self
            .shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(callback));
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn report(&self) -> Arc<TransferReport> {
        self.shared.report.clone()
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.shared.settings
    }

    pub fn destination(&self) -> &std::path::Path {
        self.shared.validator.root()
    }

    /// Reset the report and enqueue every file of `manifest` for validation
    ///
    /// Returns the number of records queued.
    pub fn build_queue(&self, manifest: &Manifest) -> usize {
        let report = &self.shared.report;
        report.reset();
        report.set_version(manifest.version.as_str());

        let mut queued = 0;
        for record in manifest.files() {
            self.shared.validate_queue.push(record);
            queued += 1;
        }

        debug!(version = %manifest.version, queued, "Validation queue built");
        queued
    }

    /// Queue a record for validation
    pub fn enqueue_validation(&self, record: FileRecord) {
        self.shared.validate_queue.push(record);
    }

    /// Queue a record for download without validating it
    pub fn enqueue_download(&self, record: FileRecord) {
        self.shared.queue_download(record);
    }

    pub fn pending_validations(&self) -> usize {
        self.shared.validate_queue.pending()
    }

    pub fn pending_downloads(&self) -> usize {
        self.shared.download_queue.pending()
    }

    /// Remove queued downloads without running them
    pub async fn take_downloads(&self) -> Vec<FileRecord> {
        self.shared.download_queue.drain().await
    }

    /// Start validation workers and return immediately
    pub fn start_validation(&self) -> PoolHandle {
        let workers = self.shared.settings.validate_workers.max(1);
        self.spawn_pool("validate", workers, &self.shared.validate_queue, validate_worker)
    }

    /// Start download workers and return immediately
    pub fn start_downloads(&self) -> PoolHandle {
        let workers = self.shared.settings.download_workers.max(1);
        self.spawn_pool("download", workers, &self.shared.download_queue, download_worker)
    }

    /// Run validation until its queue drains
    pub async fn validate_all(&self) -> Result<()> {
        self.start_validation().join().await
    }

    /// Run downloads until their queue drains
    pub async fn download_all(&self) -> Result<()> {
        self.start_downloads().join().await
    }

    fn spawn_pool<F, Fut>(
        &self,
        name: &'static str,
        workers: usize,
        queue: &WorkQueue<FileRecord>,
        worker: F,
    ) -> PoolHandle
    where
        F: Fn(Arc<Shared>, CancellationToken, usize) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.child_token();
        let handles = (0..workers)
            .map(|id| tokio::spawn(worker(self.shared.clone(), cancel.clone(), id)))
            .collect();

        debug!(pool = name, workers, "Pool started");

        PoolHandle {
            name,
            pending: queue.pending.clone(),
            cancel,
            workers: handles,
        }
    }
}

async fn next_item(queue: &WorkQueue<FileRecord>, cancel: &CancellationToken) -> Option<FileRecord> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        item = queue.pop() => item,
    }
}

async fn validate_worker(shared: Arc<Shared>, cancel: CancellationToken, id: usize) {
    while let Some(record) = next_item(&shared.validate_queue, &cancel).await {
        let (record, status) = shared.validator.check(record).await;
        shared.report.record_validated();

        if status.is_stale() {
            debug!(worker = id, path = %record.relative_path(), ?status, "Queued for download");
            shared.queue_download(record);
        }

        shared.notify_progress();
        shared.validate_queue.task_done();
    }
}

async fn download_worker(shared: Arc<Shared>, cancel: CancellationToken, id: usize) {
    let max_attempts = shared.settings.max_attempts.max(1);

    while let Some(mut record) = next_item(&shared.download_queue, &cancel).await {
        record.attempts += 1;
        let destination = record.destination(shared.validator.root());

        match shared
            .fetcher
            .download_to(&record.url, Some(&record.hash), &destination)
            .await
        {
            Ok(_) => {
                info!(worker = id, path = %record.relative_path(), attempt = record.attempts, "Downloaded");
                shared.report.record_completed(&record);
                shared.notify_progress();
            }
            Err(e) if record.attempts < max_attempts => {
                let delay = calculate_delay(
                    &shared.settings.retry_policy,
                    record.attempts,
                    shared.settings.jitter,
                );
                warn!(
                    worker = id,
                    path = %record.relative_path(),
                    attempt = record.attempts,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Download failed, retrying"
                );
                shared.download_queue.push_after(record, delay, cancel.clone());
            }
            Err(e) => {
                error!(
                    worker = id,
                    path = %record.relative_path(),
                    attempts = record.attempts,
                    error = %e,
                    "Download failed, giving up"
                );
                shared.report.record_failure(FailureRecord {
                    attempts: record.attempts,
                    last_error: e.to_string(),
                    record,
                });
                shared.notify_progress();
            }
        }

        shared.download_queue.task_done();
    }
}
