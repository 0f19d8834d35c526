//! Text reports for an operator console.

use std::fmt::Write as _;
use std::time::Duration;

use humansize::{BINARY, format_size};
use tokio::time::Instant;

use driveindex_core::CrawlStats;

use crate::progress::QueueDepths;
use crate::registry::{InFlight, ProgressRegistry};

/// Extensions listed in the statistics report.
pub const REPORT_EXTENSIONS: usize = 10;

/// Read-only view over a running crawl's registry, counters and queues.
#[derive(Debug, Clone, Copy)]
pub struct OperatorMonitor<'a> {
    registry: &'a ProgressRegistry,
    stats: &'a CrawlStats,
    queues: QueueDepths,
    elapsed: Duration,
}

impl<'a> OperatorMonitor<'a> {
    pub fn new(
        registry: &'a ProgressRegistry,
        stats: &'a CrawlStats,
        queues: QueueDepths,
        elapsed: Duration,
    ) -> Self {
        Self {
            registry,
            stats,
            queues,
            elapsed,
        }
    }

    /// One line per folder being listed, sorted by folder id.
    pub fn format_thread_report(&self) -> String {
        format_thread_report(&self.registry.snapshot(), Instant::now())
    }

    /// Aggregate counters followed by both queues' depth and activity.
    pub fn format_statistics_report(&self) -> String {
        format_statistics_report(self.stats, &self.queues, self.elapsed)
    }

    pub fn queue_depths(&self) -> QueueDepths {
        self.queues
    }
}

/// Render in-flight folders as `[key] 1,234ms | url` lines.
pub fn format_thread_report(entries: &[(String, InFlight)], now: Instant) -> String {
    let mut out = String::from("Running threads:\n");
    for (key, entry) in entries {
        let elapsed = now.saturating_duration_since(entry.started_at);
        let _ = writeln!(
            out,
            "[{key}] {}ms | {}",
            format_thousands(elapsed.as_millis() as u64),
            entry.url
        );
    }
    out
}

/// Render counters and queue state.
pub fn format_statistics_report(stats: &CrawlStats, queues: &QueueDepths, elapsed: Duration) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Elapsed: {:.1}s", elapsed.as_secs_f64());
    let _ = writeln!(out, "Directories: {}", format_thousands(stats.directories));
    let _ = writeln!(out, "Files: {}", format_thousands(stats.files));
    let _ = writeln!(
        out,
        "Total size: {} ({} bytes)",
        format_size(stats.total_bytes, BINARY),
        format_thousands(stats.total_bytes)
    );
    let _ = writeln!(
        out,
        "Unknown sizes: {} (resolved: {})",
        format_thousands(stats.unknown_sizes),
        format_thousands(stats.sizes_resolved)
    );
    let _ = writeln!(
        out,
        "Partial directories: {}, Provider errors: {}",
        format_thousands(stats.partial_directories),
        format_thousands(stats.provider_errors)
    );
    let _ = writeln!(
        out,
        "Requests: {}, Quota retries: {}",
        format_thousands(stats.requests),
        format_thousands(stats.quota_retries)
    );
    let extensions = stats.top_extensions(REPORT_EXTENSIONS);
    if !extensions.is_empty() {
        let _ = writeln!(out, "Extensions:");
        for (ext, ext_stats) in extensions {
            let label = if ext.is_empty() { "(none)" } else { ext };
            let _ = writeln!(
                out,
                "  {label}: {} files, {}",
                format_thousands(ext_stats.files),
                format_size(ext_stats.total_bytes, BINARY)
            );
        }
        if stats.extensions.len() > REPORT_EXTENSIONS {
            let _ = writeln!(out, "  ... {} more", stats.extensions.len() - REPORT_EXTENSIONS);
        }
    }
    let _ = writeln!(
        out,
        "Queue: {}, Threads: {}",
        format_thousands(queues.folders_queued as u64),
        queues.folder_workers_active
    );
    let _ = writeln!(
        out,
        "Queue (filesize): {}, Threads (filesize): {}",
        format_thousands(queues.sizes_queued as u64),
        queues.size_workers_active
    );
    out
}

/// Format an integer with `,` thousands separators.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use driveindex_core::ExtensionStats;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
    }

    #[tokio::test(start_paused = true)]
    async fn test_thread_report_sorted_with_elapsed() {
        let registry = ProgressRegistry::new();
        let start = Instant::now();
        for (key, url) in [("b", "u/b"), ("a", "u/a")] {
            registry.register(
                key,
                InFlight {
                    url: url.to_string(),
                    name: key.to_string(),
                    worker: 0,
                    started_at: start,
                },
            );
        }

        let report = format_thread_report(&registry.snapshot(), start + Duration::from_millis(1500));
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines[0], "Running threads:");
        assert_eq!(lines[1], "[a] 1,500ms | u/a");
        assert_eq!(lines[2], "[b] 1,500ms | u/b");
    }

    #[test]
    fn test_statistics_report_queue_lines() {
        let stats = CrawlStats {
            directories: 12,
            files: 3400,
            total_bytes: 2048,
            ..CrawlStats::default()
        };
        let queues = QueueDepths {
            folders_queued: 1500,
            folder_workers_active: 5,
            sizes_queued: 3,
            size_workers_active: 2,
        };

        let report = format_statistics_report(&stats, &queues, Duration::from_secs(2));
        assert!(report.contains("Files: 3,400"));
        assert!(report.contains("Total size: 2 KiB"));
        assert!(report.contains("Queue: 1,500, Threads: 5"));
        assert!(report.contains("Queue (filesize): 3, Threads (filesize): 2"));
        assert!(!report.contains("Extensions:"));
    }

    #[test]
    fn test_statistics_report_extensions_above_queues() {
        let mut stats = CrawlStats::default();
        stats.extensions.insert(
            "mkv".to_string(),
            ExtensionStats {
                files: 2,
                total_bytes: 3 * 1024 * 1024,
            },
        );
        stats.extensions.insert(
            String::new(),
            ExtensionStats {
                files: 1_200,
                total_bytes: 1024,
            },
        );
        for i in 0..REPORT_EXTENSIONS {
            stats.extensions.insert(
                format!("x{i}"),
                ExtensionStats {
                    files: 1,
                    total_bytes: 1,
                },
            );
        }

        let report = format_statistics_report(&stats, &QueueDepths::default(), Duration::ZERO);
        let lines: Vec<_> = report.lines().collect();
        let header = lines.iter().position(|l| *l == "Extensions:").unwrap();
        let queue = lines.iter().position(|l| l.starts_with("Queue: ")).unwrap();

        assert!(header < queue);
        assert_eq!(lines[header + 1], "  mkv: 2 files, 3 MiB");
        assert_eq!(lines[header + 2], "  (none): 1,200 files, 1 KiB");
        assert_eq!(lines[queue - 1], "  ... 2 more");
        assert_eq!(queue - header - 1, REPORT_EXTENSIONS + 1);
    }
}
