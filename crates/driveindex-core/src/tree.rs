//! Crawl session container and statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CrawlConfig;
use crate::error::CrawlWarning;
use crate::node::DirectoryNode;

/// Counters maintained while a crawl runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Folders whose listing finished.
    pub directories: u64,
    /// Files discovered.
    pub files: u64,
    /// Sum of known file sizes.
    pub total_bytes: u64,
    /// Files whose size is still unknown.
    pub unknown_sizes: u64,
    /// Sizes filled in by the size resolution pool.
    pub sizes_resolved: u64,
    /// Folders marked partial.
    pub partial_directories: u64,
    /// Non-quota provider errors seen.
    pub provider_errors: u64,
    /// Requests retried because of the provider's quota.
    pub quota_retries: u64,
    /// Requests sent to the provider.
    pub requests: u64,
    /// Files and known bytes per lowercased extension.
    #[serde(default)]
    pub extensions: BTreeMap<String, ExtensionStats>,
}

impl CrawlStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `limit` extensions holding the most bytes, ties broken by file
    /// count and then by name.
    pub fn top_extensions(&self, limit: usize) -> Vec<(&str, ExtensionStats)> {
        let mut ranked: Vec<_> = self
            .extensions
            .iter()
            .map(|(ext, stats)| (ext.as_str(), *stats))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.total_bytes
                .cmp(&a.1.total_bytes)
                .then(b.1.files.cmp(&a.1.files))
                .then(a.0.cmp(b.0))
        });
        ranked.truncate(limit);
        ranked
    }
}

/// File count and known bytes for one extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionStats {
    /// Files with this extension.
    pub files: u64,
    /// Sum of their known sizes.
    pub total_bytes: u64,
}

/// Lowercased extension of `file_name`, empty when it has none.
///
/// A leading dot (`.bashrc`) does not start an extension.
pub fn file_extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && !ext.contains(' ') => {
            ext.to_lowercase()
        }
        _ => String::new(),
    }
}

/// Totals computed from a materialized tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSummary {
    /// Folders in the tree, root included.
    pub directories: u64,
    /// Files in the tree.
    pub files: u64,
    /// Sum of known file sizes.
    pub total_bytes: u64,
    /// Files without a known size.
    pub unknown_sizes: u64,
    /// Folders not listed (or interrupted).
    pub pending_directories: u64,
    /// Folders marked partial.
    pub partial_directories: u64,
}

impl TreeSummary {
    /// Summarize a subtree.
    pub fn of(root: &DirectoryNode) -> Self {
        let mut summary = Self::default();
        for node in root.walk() {
            summary.directories += 1;
            if !node.status.is_finished() {
                summary.pending_directories += 1;
            }
            if node.status.is_partial() {
                summary.partial_directories += 1;
            }
            for file in &node.files {
                summary.files += 1;
                match file.size {
                    Some(size) => summary.total_bytes += size,
                    None => summary.unknown_sizes += 1,
                }
            }
        }
        summary
    }
}

/// How a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlOutcome {
    /// Still running; only seen in mid-crawl snapshots.
    Running,
    /// Both queues drained.
    Completed,
    /// Stopped by the operator before the queues drained.
    Cancelled,
}

/// A crawl's reconstructed tree with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSession {
    /// Root folder of the tree.
    pub root: DirectoryNode,

    /// URL of the root folder.
    pub root_url: String,

    /// When the crawl started.
    pub started_at: DateTime<Utc>,

    /// When the crawl ended (or the snapshot was taken).
    pub finished_at: DateTime<Utc>,

    /// Wall-clock duration.
    pub duration: Duration,

    /// Configuration used.
    pub config: CrawlConfig,

    /// Counters at the time the session was taken.
    pub stats: CrawlStats,

    /// Warnings recorded during the crawl.
    pub warnings: Vec<CrawlWarning>,

    /// How the crawl ended.
    pub outcome: CrawlOutcome,
}

impl CrawlSession {
    /// Totals computed from the tree.
    pub fn summary(&self) -> TreeSummary {
        TreeSummary::of(&self.root)
    }

    /// Check if the crawl drained both queues.
    pub fn is_complete(&self) -> bool {
        self.outcome == CrawlOutcome::Completed
    }

    /// Check if there were any warnings during the crawl.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FileEntry, NodeId, NodeStatus};

    #[test]
    fn test_crawl_stats_default() {
        let stats = CrawlStats::default();
        assert_eq!(stats.directories, 0);
        assert_eq!(stats.files, 0);
        assert_eq!(stats.total_bytes, 0);
        assert!(stats.extensions.is_empty());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("report.PDF"), "pdf");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("README"), "");
        assert_eq!(file_extension(".bashrc"), "");
        assert_eq!(file_extension("trailing."), "");
        assert_eq!(file_extension("Vol. 2 scans"), "");
    }

    #[test]
    fn test_top_extensions() {
        let mut stats = CrawlStats::default();
        for (ext, files, total_bytes) in [("mkv", 2, 9000), ("jpg", 40, 800), ("txt", 3, 800), ("", 1, 5)] {
            stats
                .extensions
                .insert(ext.to_string(), ExtensionStats { files, total_bytes });
        }

        let top = stats.top_extensions(3);
        let names: Vec<_> = top.iter().map(|(ext, _)| *ext).collect();
        assert_eq!(names, ["mkv", "jpg", "txt"]);
        assert_eq!(top[1].1.files, 40);
    }

    #[test]
    fn test_tree_summary() {
        let mut root = DirectoryNode::new(NodeId::new(0), "r", "u", "root", None);
        root.status = NodeStatus::Complete;
        root.files.push(FileEntry::new("f1", "u", "a.bin", Some(100)));
        root.files.push(FileEntry::new("f2", "u", "doc", None));

        let mut child = DirectoryNode::new(NodeId::new(1), "c", "u", "child", Some(NodeId::new(0)));
        child.status = NodeStatus::Partial {
            reason: "boom".to_string(),
        };
        child.files.push(FileEntry::new("f3", "u", "b.bin", Some(20)));
        root.children.push(child);
        root.children.push(DirectoryNode::new(NodeId::new(2), "p", "u", "pending", Some(NodeId::new(0))));

        let summary = TreeSummary::of(&root);
        assert_eq!(summary.directories, 3);
        assert_eq!(summary.files, 3);
        assert_eq!(summary.total_bytes, 120);
        assert_eq!(summary.unknown_sizes, 1);
        assert_eq!(summary.partial_directories, 1);
        assert_eq!(summary.pending_directories, 1);
    }
}
