//! Error types for crawl operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a listing provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The caller exceeded the provider's request rate.
    #[error("Quota exceeded")]
    QuotaExceeded,

    /// The provider rejected the request.
    #[error("Provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The folder or file does not exist.
    #[error("Not found: {id}")]
    NotFound { id: String },

    /// Transport-level failure.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The response could not be decoded.
    #[error("Malformed provider response: {message}")]
    Malformed { message: String },
}

impl ProviderError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Check if this is the provider's rate limit signal.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded)
    }
}

/// Errors that abort a crawl or one of its control operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The operator asked the crawl to stop.
    #[error("Crawl cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A provider call failed outside of the listing retry loop.
    #[error("Provider error for {target}: {source}")]
    Provider {
        target: String,
        #[source]
        source: ProviderError,
    },

    /// Failed to write or read a session.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to encode or decode a session.
    #[error("Session serialization failed: {message}")]
    Serialization { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl IndexError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Check if this error is the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Kind of crawl warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Pagination stopped after a provider error; children kept so far.
    ListingTruncated,
    /// Page retries ran out; the folder was marked partial.
    ListingRetriesExhausted,
    /// A file size lookup failed; the size stays unknown.
    SizeLookupFailed,
    /// A folder reachable through several parents was expanded elsewhere.
    DuplicateFolder,
}

/// Non-fatal problem encountered during a crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlWarning {
    /// Provider id of the folder or file concerned.
    pub target: String,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl CrawlWarning {
    /// Create a new crawl warning.
    pub fn new(target: impl Into<String>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a listing cut short by a provider error.
    pub fn listing_truncated(folder: impl Into<String>, error: &ProviderError) -> Self {
        Self {
            target: folder.into(),
            message: format!("Listing truncated: {error}"),
            kind: WarningKind::ListingTruncated,
        }
    }

    /// Create a warning for a failed size lookup.
    pub fn size_lookup_failed(file: impl Into<String>, error: &ProviderError) -> Self {
        Self {
            target: file.into(),
            message: format!("Size lookup failed: {error}"),
            kind: WarningKind::SizeLookupFailed,
        }
    }

    /// Create a warning for a folder already expanded under another parent.
    pub fn duplicate_folder(folder: impl Into<String>) -> Self {
        Self {
            target: folder.into(),
            message: "Folder already indexed under another parent".to_string(),
            kind: WarningKind::DuplicateFolder,
        }
    }
}
