//! Two-pool crawler that expands a remote folder tree in parallel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use driveindex_core::{
    CrawlConfig, CrawlOutcome, CrawlSession, CrawlStats, CrawlWarning, DirectoryNode, IndexError,
    NodeId, NodeStatus,
};

use crate::arena::{FolderTracker, NodeArena, NodeIdAllocator};
use crate::lister::FolderLister;
use crate::monitor::OperatorMonitor;
use crate::progress::{CrawlProgress, QueueDepths, StatsTracker};
use crate::provider::ListingProvider;
use crate::queue::{FolderTask, SizeTask, WorkQueue};
use crate::rate_limit::{RateLimiter, sleep_or_cancel};
use crate::registry::{InFlight, ProgressRegistry};
use crate::session::SessionSink;

/// State shared by the crawler, its workers and every [`CrawlHandle`].
struct Shared {
    config: CrawlConfig,
    provider: Arc<dyn ListingProvider>,
    limiter: Arc<RateLimiter>,
    lister: FolderLister,
    arena: NodeArena,
    tracker: FolderTracker,
    registry: ProgressRegistry,
    stats: StatsTracker,
    folders: WorkQueue<FolderTask>,
    sizes: WorkQueue<SizeTask>,
    /// Items pushed to either queue and not yet finished.
    outstanding: AtomicUsize,
    warnings: Mutex<Vec<CrawlWarning>>,
    outcome: Mutex<CrawlOutcome>,
    /// Operator stop signal.
    cancel: CancellationToken,
    /// Fires on operator stop or when all work is done.
    halt: CancellationToken,
    root: NodeId,
    root_url: String,
    started_at: DateTime<Utc>,
    clock: Instant,
    progress_tx: broadcast::Sender<CrawlProgress>,
}

/// Crawls one remote folder tree.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use driveindex_crawl::{Crawler, CrawlConfig, MemoryProvider};
///
/// # async fn run() -> Result<(), driveindex_crawl::IndexError> {
/// let provider = Arc::new(MemoryProvider::new());
/// let crawler = Crawler::new(provider, CrawlConfig::new("root"))?;
/// let handle = crawler.handle();
/// let session = crawler.run().await?;
/// println!("{}", handle.statistics_report());
/// println!("{} files", session.stats.files);
/// # Ok(())
/// # }
/// ```
pub struct Crawler {
    shared: Arc<Shared>,
}

impl Crawler {
    /// Create a crawler for `config.root`.
    pub fn new(provider: Arc<dyn ListingProvider>, config: CrawlConfig) -> Result<Self, IndexError> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let ids = Arc::new(NodeIdAllocator::new());
        let lister = FolderLister::new(
            Arc::clone(&provider),
            Arc::clone(&limiter),
            Arc::clone(&ids),
            config.page_size,
            config.quota_backoff(),
            config.failure_policy,
        );

        let root = ids.allocate();
        let root_url = provider.folder_url(&config.root);
        let arena = NodeArena::new();
        arena.insert(DirectoryNode::new(
            root,
            config.root.as_str(),
            root_url.clone(),
            config.root.as_str(),
            None,
        ));
        let tracker = FolderTracker::new();
        tracker.track(&config.root);

        let cancel = CancellationToken::new();
        let halt = cancel.child_token();
        let (progress_tx, _) = broadcast::channel(100);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                provider,
                limiter,
                lister,
                arena,
                tracker,
                registry: ProgressRegistry::new(),
                stats: StatsTracker::new(),
                folders: WorkQueue::new(),
                sizes: WorkQueue::new(),
                outstanding: AtomicUsize::new(0),
                warnings: Mutex::new(Vec::new()),
                outcome: Mutex::new(CrawlOutcome::Running),
                cancel,
                halt,
                root,
                root_url,
                started_at: Utc::now(),
                clock: Instant::now(),
                progress_tx,
            }),
        })
    }

    /// Handle for monitoring and stopping the crawl.
    pub fn handle(&self) -> CrawlHandle {
        CrawlHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Subscribe to progress updates, sent after every folder.
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlProgress> {
        self.shared.progress_tx.subscribe()
    }

    /// Run until both queues drain or the crawl is stopped.
    ///
    /// A stopped crawl still returns its session, with outcome
    /// [`CrawlOutcome::Cancelled`] and unfinished folders left pending.
    pub async fn run(self) -> Result<CrawlSession, IndexError> {
        let shared = self.shared;
        let config = &shared.config;

        info!(
            provider = shared.provider.name(),
            root = %config.root,
            directory_workers = config.directory_workers,
            size_workers = config.size_workers,
            permits = shared.limiter.limit(),
            window_secs = shared.limiter.window().as_secs_f64(),
            "Starting crawl"
        );

        let root_name = shared.resolve_root_name().await;
        shared.arena.update(shared.root, |node| node.name = root_name.as_str().into());

        shared.outstanding.store(1, Ordering::SeqCst);
        shared.folders.push(FolderTask {
            node: shared.root,
            folder_id: config.root.clone(),
            url: shared.root_url.clone(),
            name: root_name,
            depth: 0,
        });

        let mut workers = JoinSet::new();
        for worker in 0..config.directory_workers {
            workers.spawn(directory_worker(Arc::clone(&shared), worker));
        }
        if config.resolve_unknown_sizes {
            for worker in 0..config.size_workers {
                workers.spawn(size_worker(Arc::clone(&shared), worker));
            }
        }

        while let Some(result) = workers.join_next().await {
            if let Err(err) = result {
                error!(error = %err, "Crawl worker failed");
            }
        }

        let outcome = if shared.outstanding.load(Ordering::SeqCst) == 0 {
            CrawlOutcome::Completed
        } else {
            CrawlOutcome::Cancelled
        };
        *shared.outcome.lock().unwrap_or_else(PoisonError::into_inner) = outcome;

        let session = shared.session();
        let _ = shared.progress_tx.send(shared.progress());

        info!(
            outcome = ?outcome,
            directories = session.stats.directories,
            files = session.stats.files,
            total_bytes = session.stats.total_bytes,
            warnings = session.warnings.len(),
            duration_ms = session.duration.as_millis() as u64,
            "Crawl finished"
        );

        Ok(session)
    }
}

/// Cloneable view of a running crawl for an operator.
#[derive(Clone)]
pub struct CrawlHandle {
    shared: Arc<Shared>,
}

impl CrawlHandle {
    /// In-flight folders with elapsed time and URL.
    pub fn thread_report(&self) -> String {
        let stats = self.shared.stats.snapshot();
        self.shared.monitor(&stats).format_thread_report()
    }

    /// Aggregate counters with queue depths and active workers.
    pub fn statistics_report(&self) -> String {
        let stats = self.shared.stats.snapshot();
        self.shared.monitor(&stats).format_statistics_report()
    }

    /// Depth and activity of both queues.
    pub fn queue_depths(&self) -> QueueDepths {
        self.shared.queue_depths()
    }

    /// Current counters.
    pub fn stats(&self) -> CrawlStats {
        self.shared.stats.snapshot()
    }

    /// Current progress.
    pub fn progress(&self) -> CrawlProgress {
        self.shared.progress()
    }

    /// Ask every worker to stop.
    pub fn request_graceful_stop(&self) {
        if !self.shared.cancel.is_cancelled() {
            info!("Graceful stop requested");
        }
        self.shared.cancel.cancel();
    }

    /// Check if a stop was requested.
    pub fn is_stopping(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// How the crawl stands, [`CrawlOutcome::Running`] until `run` returns.
    pub fn outcome(&self) -> CrawlOutcome {
        *self.shared.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the tree and counters as they stand.
    pub fn snapshot(&self) -> CrawlSession {
        self.shared.session()
    }

    /// Hand the current tree to `sink`.
    pub fn trigger_session_snapshot(&self, sink: &dyn SessionSink) -> Result<(), IndexError> {
        let session = self.snapshot();
        debug!(outcome = ?session.outcome, "Session snapshot requested");
        sink.save(&session)
    }
}

impl Shared {
    fn monitor<'a>(&'a self, stats: &'a CrawlStats) -> OperatorMonitor<'a> {
        OperatorMonitor::new(&self.registry, stats, self.queue_depths(), self.clock.elapsed())
    }

    fn queue_depths(&self) -> QueueDepths {
        QueueDepths {
            folders_queued: self.folders.len(),
            folder_workers_active: self.folders.active_workers(),
            sizes_queued: self.sizes.len(),
            size_workers_active: self.sizes.active_workers(),
        }
    }

    fn progress(&self) -> CrawlProgress {
        CrawlProgress {
            stats: self.stats.snapshot(),
            queues: self.queue_depths(),
            in_flight: self.registry.len(),
            elapsed: self.clock.elapsed(),
        }
    }

    fn session(&self) -> CrawlSession {
        let root = self.arena.materialize(self.root).unwrap_or_else(|| {
            DirectoryNode::new(
                self.root,
                self.config.root.as_str(),
                self.root_url.clone(),
                self.config.root.as_str(),
                None,
            )
        });

        CrawlSession {
            root,
            root_url: self.root_url.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            duration: self.clock.elapsed(),
            config: self.config.clone(),
            stats: self.stats.snapshot(),
            warnings: self
                .warnings
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            outcome: *self.outcome.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    fn add_warnings(&self, warnings: impl IntoIterator<Item = CrawlWarning>) {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(warnings);
    }

    /// Count `n` new items before they are pushed.
    fn begin_items(&self, n: usize) {
        if n > 0 {
            self.outstanding.fetch_add(n, Ordering::SeqCst);
        }
    }

    /// Finish one item; the last one stops every worker.
    fn finish_item(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!("All queues drained");
            self.halt.cancel();
        }
    }

    async fn resolve_root_name(&self) -> String {
        let root = &self.config.root;
        if self.limiter.acquire(&self.halt).await.is_err() {
            return root.clone();
        }
        self.stats.record_request();

        let result = tokio::select! {
            _ = self.halt.cancelled() => return root.clone(),
            result = self.provider.folder_name(root) => result,
        };

        match result {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => root.clone(),
            Err(err) => {
                warn!(root = %root, error = %err, "Could not resolve root folder name");
                root.clone()
            }
        }
    }

    /// List one folder, store it and queue its follow-up work.
    async fn process_folder(&self, worker: usize, task: &FolderTask) -> Result<(), IndexError> {
        let entry = InFlight {
            url: task.url.clone(),
            name: task.name.clone(),
            worker,
            started_at: Instant::now(),
        };
        let Some(_registration) = self.registry.track(task.folder_id.as_str(), entry) else {
            warn!(folder = %task.folder_id, "Folder is already being listed, skipping");
            return Ok(());
        };

        let listing = self.lister.list(task.node, &task.folder_id, &self.halt).await?;
        self.stats.record_listing(&listing.counters);
        self.stats.record_directory(listing.status.is_partial());

        let mut warnings = listing.warnings;
        let mut children = listing.children;
        let mut folder_tasks = Vec::new();
        for child in &mut children {
            if self.tracker.track(&child.provider_id) {
                folder_tasks.push(FolderTask {
                    node: child.id,
                    folder_id: child.provider_id.to_string(),
                    url: child.url.clone(),
                    name: child.name.to_string(),
                    depth: task.depth + 1,
                });
            } else {
                child.status = NodeStatus::Partial {
                    reason: "Already indexed under another parent".to_string(),
                };
                self.stats.record_directory(true);
                warnings.push(CrawlWarning::duplicate_folder(child.provider_id.as_str()));
            }
        }

        let mut size_tasks = Vec::new();
        for (index, file) in listing.files.iter().enumerate() {
            self.stats.record_file(&file.file_name, file.size);
            if file.size.is_none() && self.config.resolve_unknown_sizes {
                size_tasks.push(SizeTask {
                    node: task.node,
                    index,
                    file_id: file.provider_id.to_string(),
                    file_name: file.file_name.to_string(),
                });
            }
        }

        let (started_at, finished_at, status) =
            (listing.started_at, listing.finished_at, listing.status);
        self.arena.attach(task.node, children, listing.files, |node| {
            node.started_at = Some(started_at);
            node.finished_at = Some(finished_at);
            node.status = status;
        });

        if !warnings.is_empty() {
            self.add_warnings(warnings);
        }

        self.begin_items(folder_tasks.len() + size_tasks.len());
        for folder_task in folder_tasks {
            self.folders.push(folder_task);
        }
        for size_task in size_tasks {
            self.sizes.push(size_task);
        }

        let _ = self.progress_tx.send(self.progress());
        Ok(())
    }

    /// Look up one file's size, retrying quota rejections.
    async fn resolve_size(&self, task: &SizeTask) -> Result<(), IndexError> {
        loop {
            self.limiter.acquire(&self.halt).await?;
            self.stats.record_request();

            let result = tokio::select! {
                _ = self.halt.cancelled() => return Err(IndexError::Cancelled),
                result = self.provider.file_size(&task.file_id) => result,
            };

            match result {
                Ok(Some(size)) => {
                    if self.arena.set_file_size(task.node, task.index, &task.file_id, size) {
                        self.stats.record_resolved_size(&task.file_name, size);
                    }
                    return Ok(());
                }
                Ok(None) => {
                    debug!(file = %task.file_name, "Provider reports no size");
                    return Ok(());
                }
                Err(err) if err.is_quota_exceeded() => {
                    self.stats.record_quota_retry();
                    debug!(file = %task.file_name, "Provider quota exceeded, retrying size lookup");
                    sleep_or_cancel(self.config.quota_backoff(), &self.halt).await?;
                }
                Err(err) => {
                    self.stats.record_provider_error();
                    warn!(file = %task.file_name, error = %err, "Size lookup failed");
                    self.add_warnings([CrawlWarning::size_lookup_failed(task.file_id.as_str(), &err)]);
                    return Ok(());
                }
            }
        }
    }
}

async fn directory_worker(shared: Arc<Shared>, worker: usize) {
    while let Some((task, _guard)) = shared.folders.pop(&shared.halt).await {
        match shared.process_folder(worker, &task).await {
            Ok(()) => shared.finish_item(),
            Err(IndexError::Cancelled) => break,
            Err(err) => {
                error!(worker, folder = %task.folder_id, error = %err, "Folder processing failed");
                shared.finish_item();
            }
        }
    }
    debug!(worker, "Directory worker stopped");
}

async fn size_worker(shared: Arc<Shared>, worker: usize) {
    while let Some((task, _guard)) = shared.sizes.pop(&shared.halt).await {
        match shared.resolve_size(&task).await {
            Ok(()) => shared.finish_item(),
            Err(IndexError::Cancelled) => break,
            Err(err) => {
                error!(worker, file = %task.file_id, error = %err, "Size resolution failed");
                shared.finish_item();
            }
        }
    }
    debug!(worker, "Size worker stopped");
}
