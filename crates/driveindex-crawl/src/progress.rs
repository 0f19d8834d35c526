//! Crawl progress reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use compact_str::CompactString;
use dashmap::DashMap;

use driveindex_core::{CrawlStats, ExtensionStats, file_extension};

use crate::lister::ListingCounters;

/// Depths and activity of both work queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepths {
    /// Folders waiting to be listed.
    pub folders_queued: usize,
    /// Directory workers holding a folder.
    pub folder_workers_active: usize,
    /// Files waiting for a size lookup.
    pub sizes_queued: usize,
    /// Size workers holding a file.
    pub size_workers_active: usize,
}

impl QueueDepths {
    /// Check if no work is queued or running.
    pub fn is_idle(&self) -> bool {
        self.folders_queued == 0
            && self.folder_workers_active == 0
            && self.sizes_queued == 0
            && self.size_workers_active == 0
    }
}

/// Progress information during a crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlProgress {
    /// Counters so far.
    pub stats: CrawlStats,
    /// Queue state.
    pub queues: QueueDepths,
    /// Folders being listed.
    pub in_flight: usize,
    /// Time elapsed since the crawl started.
    pub elapsed: Duration,
}

impl CrawlProgress {
    /// Files discovered per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.stats.files as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Folders listed per second.
    pub fn directories_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.stats.directories as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Lock-free counters updated by every worker.
#[derive(Debug, Default)]
pub struct StatsTracker {
    directories: AtomicU64,
    files: AtomicU64,
    total_bytes: AtomicU64,
    unknown_sizes: AtomicU64,
    sizes_resolved: AtomicU64,
    partial_directories: AtomicU64,
    provider_errors: AtomicU64,
    quota_retries: AtomicU64,
    requests: AtomicU64,
    extensions: DashMap<CompactString, ExtensionStats>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a finished folder.
    pub fn record_directory(&self, partial: bool) {
        self.directories.fetch_add(1, Ordering::Relaxed);
        if partial {
            self.partial_directories.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a discovered file.
    pub fn record_file(&self, file_name: &str, size: Option<u64>) {
        self.files.fetch_add(1, Ordering::Relaxed);
        match size {
            Some(size) => {
                self.total_bytes.fetch_add(size, Ordering::Relaxed);
            }
            None => {
                self.unknown_sizes.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut entry = self.extensions.entry(extension_key(file_name)).or_default();
        entry.files += 1;
        entry.total_bytes += size.unwrap_or(0);
    }

    /// Move a file from unknown size to a known one.
    pub fn record_resolved_size(&self, file_name: &str, size: u64) {
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
        self.extensions
            .entry(extension_key(file_name))
            .or_default()
            .total_bytes += size;
        self.sizes_resolved.fetch_add(1, Ordering::Relaxed);
        // Saturate in case a resolution races a snapshot reader.
        let _ = self
            .unknown_sizes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Add a listing's request counters.
    pub fn record_listing(&self, counters: &ListingCounters) {
        self.requests.fetch_add(counters.requests, Ordering::Relaxed);
        self.quota_retries
            .fetch_add(counters.quota_retries, Ordering::Relaxed);
        self.provider_errors
            .fetch_add(counters.provider_errors, Ordering::Relaxed);
    }

    /// Count a single request outside of folder listing.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_retry(&self) {
        self.quota_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_error(&self) {
        self.provider_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters.
    pub fn snapshot(&self) -> CrawlStats {
        CrawlStats {
            directories: self.directories.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            unknown_sizes: self.unknown_sizes.load(Ordering::Relaxed),
            sizes_resolved: self.sizes_resolved.load(Ordering::Relaxed),
            partial_directories: self.partial_directories.load(Ordering::Relaxed),
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
            quota_retries: self.quota_retries.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            extensions: self
                .extensions
                .iter()
                .map(|entry| (entry.key().to_string(), *entry.value()))
                .collect(),
        }
    }
}

fn extension_key(file_name: &str) -> CompactString {
    CompactString::from(file_extension(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_tracker() {
        let stats = StatsTracker::new();
        stats.record_directory(false);
        stats.record_directory(true);
        stats.record_file("a.bin", Some(10));
        stats.record_file("b.BIN", None);
        stats.record_resolved_size("b.BIN", 5);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.directories, 2);
        assert_eq!(snapshot.partial_directories, 1);
        assert_eq!(snapshot.files, 2);
        assert_eq!(snapshot.total_bytes, 15);
        assert_eq!(snapshot.unknown_sizes, 0);
        assert_eq!(snapshot.sizes_resolved, 1);
        assert_eq!(
            snapshot.extensions["bin"],
            ExtensionStats {
                files: 2,
                total_bytes: 15
            }
        );
    }

    #[test]
    fn test_extensions_grouped_case_insensitively() {
        let stats = StatsTracker::new();
        stats.record_file("photo.JPG", Some(100));
        stats.record_file("photo2.jpg", Some(50));
        stats.record_file("Makefile", Some(7));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.extensions.len(), 2);
        assert_eq!(snapshot.extensions["jpg"].files, 2);
        assert_eq!(snapshot.extensions["jpg"].total_bytes, 150);
        assert_eq!(snapshot.extensions[""].total_bytes, 7);
    }

    #[test]
    fn test_progress_rates() {
        let progress = CrawlProgress {
            stats: CrawlStats {
                files: 100,
                directories: 10,
                ..CrawlStats::default()
            },
            elapsed: Duration::from_secs(10),
            ..CrawlProgress::default()
        };
        assert_eq!(progress.files_per_second(), 10.0);
        assert_eq!(progress.directories_per_second(), 1.0);
        assert_eq!(CrawlProgress::default().files_per_second(), 0.0);
    }

    #[test]
    fn test_queue_depths_idle() {
        assert!(QueueDepths::default().is_idle());
        let busy = QueueDepths {
            sizes_queued: 1,
            ..QueueDepths::default()
        };
        assert!(!busy.is_idle());
    }
}
