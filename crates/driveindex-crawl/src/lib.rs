//! Concurrent, rate-limited crawl engine for driveindex.
//!
//! This crate expands a remote folder tree through a paginated listing API
//! while keeping every request under the provider's rate ceiling.
//!
//! # Overview
//!
//! - **[`RateLimiter`]**: rolling-window permit issuer shared by all workers
//! - **[`FolderLister`]**: pages through one folder, retrying quota errors
//! - **[`Crawler`]**: two worker pools (folders and file sizes) fed by
//!   unbounded queues, with cooperative cancellation
//! - **[`ProgressRegistry`]**: folders being listed, read by the
//!   [`OperatorMonitor`] while workers write
//!
//! Providers implement [`ListingProvider`]; [`MemoryProvider`] serves
//! fixtures for offline runs and tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use driveindex_crawl::{CrawlConfig, Crawler, MemoryProvider, RemoteEntry};
//!
//! # async fn run() -> Result<(), driveindex_crawl::IndexError> {
//! let provider = MemoryProvider::new().with_folder(
//!     "root",
//!     "Root",
//!     vec![RemoteEntry::file("f1", "notes.txt", Some(12))],
//! );
//! let crawler = Crawler::new(Arc::new(provider), CrawlConfig::new("root"))?;
//! let session = crawler.run().await?;
//! println!("Indexed {} files", session.stats.files);
//! # Ok(())
//! # }
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use driveindex_crawl::{CrawlConfig, Crawler, MemoryProvider};
//! # fn watch(crawler: &Crawler) {
//! let mut progress_rx = crawler.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Listed {} folders", progress.stats.directories);
//!     }
//! });
//! # }
//! ```

mod arena;
mod crawler;
mod lister;
mod memory;
mod monitor;
mod progress;
mod provider;
mod queue;
mod rate_limit;
mod registry;
mod session;

pub use arena::{FolderTracker, NodeArena, NodeIdAllocator};
pub use crawler::{CrawlHandle, Crawler};
pub use lister::{FolderLister, FolderListing, ListingCounters};
pub use memory::{MemoryFixture, MemoryFolder, MemoryProvider};
pub use monitor::{
    OperatorMonitor, REPORT_EXTENSIONS, format_statistics_report, format_thousands,
    format_thread_report,
};
pub use progress::{CrawlProgress, QueueDepths, StatsTracker};
pub use provider::{ListingPage, ListingProvider, RemoteEntry};
pub use queue::{FolderTask, SizeTask, WorkGuard, WorkQueue};
pub use rate_limit::RateLimiter;
pub use registry::{InFlight, ProgressRegistry, Registration};
pub use session::{JsonSessionSink, SessionSink};

// Re-export core types for convenience
pub use driveindex_core::{
    CrawlConfig, CrawlOutcome, CrawlSession, CrawlStats, CrawlWarning, DirectoryNode,
    ExtensionStats, FileEntry, IndexError, ListingFailurePolicy, NodeId, NodeStatus,
    ProviderError, RateLimitConfig, TreeSummary, WarningKind,
};
