//! Core types for driveindex.
//!
//! This crate provides the data structures shared by the crawl engine,
//! the provider implementations and the CLI: the reconstructed folder tree,
//! crawl sessions and statistics, error types and crawl configuration.

mod config;
mod error;
mod node;
mod tree;

pub use config::{
    CrawlConfig, CrawlConfigBuilder, ListingFailurePolicy, MAX_PAGE_SIZE, RateLimitConfig,
    permits_per_window,
};
pub use error::{CrawlWarning, IndexError, ProviderError, WarningKind};
pub use node::{DirectoryNode, FileEntry, NodeId, NodeStatus};
pub use tree::{
    CrawlOutcome, CrawlSession, CrawlStats, ExtensionStats, TreeSummary, file_extension,
};
