//! Crawl configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Largest page the listing API accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Request-rate ceiling imposed by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Window length in seconds, fractions allowed.
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Fraction of the capacity used before throttling.
    #[serde(default = "default_fill_factor")]
    pub fill_factor: f64,
}

fn default_capacity() -> u32 {
    900
}

fn default_window_secs() -> f64 {
    100.0
}

fn default_fill_factor() -> f64 {
    0.9
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            window_secs: default_window_secs(),
            fill_factor: default_fill_factor(),
        }
    }
}

impl RateLimitConfig {
    /// Create a rate limit configuration.
    pub fn new(capacity: u32, window: Duration, fill_factor: f64) -> Self {
        Self {
            capacity,
            window_secs: window.as_secs_f64(),
            fill_factor,
        }
    }

    /// Window length.
    ///
    /// Zero when `window_secs` is negative, not finite or out of range.
    pub fn window(&self) -> Duration {
        Duration::try_from_secs_f64(self.window_secs).unwrap_or_default()
    }

    /// Permits that may be issued within one window.
    pub fn permits_per_window(&self) -> usize {
        permits_per_window(self.capacity, self.fill_factor)
    }

    fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("Rate limit capacity must be positive".to_string());
        }
        if self.window().is_zero() {
            return Err("Rate limit window must be positive".to_string());
        }
        if !(self.fill_factor > 0.0 && self.fill_factor <= 1.0) {
            return Err(format!(
                "Fill factor must be in (0, 1], got {}",
                self.fill_factor
            ));
        }
        if self.permits_per_window() == 0 {
            return Err("Rate limit allows no requests per window".to_string());
        }
        Ok(())
    }
}

/// `floor(capacity * fill_factor)`, tolerant of products that land a hair
/// below an integer (`100 * 0.29` is `28.999999999999996`).
pub fn permits_per_window(capacity: u32, fill_factor: f64) -> usize {
    let raw = f64::from(capacity) * fill_factor;
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    let nearest = raw.round();
    if (raw - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        nearest as usize
    } else {
        raw.floor() as usize
    }
}

/// What a folder listing does when a page fails with a non-quota error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ListingFailurePolicy {
    /// Stop paginating, keep what was listed and mark the folder complete.
    #[default]
    Truncate,
    /// Stop paginating and mark the folder partial.
    MarkPartial,
    /// Retry the page with exponential backoff, then mark the folder partial.
    Retry {
        /// Attempts per page, including the first one.
        max_attempts: u32,
        /// Delay before the first retry, doubled after each failure.
        backoff_ms: u64,
    },
}

/// Configuration for a crawl.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct CrawlConfig {
    /// Provider id of the folder to start from.
    pub root: String,

    /// Concurrent folder listing workers.
    #[builder(default = "5")]
    #[serde(default = "default_directory_workers")]
    pub directory_workers: usize,

    /// Concurrent file size lookup workers.
    #[builder(default = "10")]
    #[serde(default = "default_size_workers")]
    pub size_workers: usize,

    /// Entries requested per listing page.
    #[builder(default = "MAX_PAGE_SIZE")]
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Request-rate ceiling shared by both worker pools.
    #[builder(default)]
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Delay before retrying a page rejected for quota.
    #[builder(default = "250")]
    #[serde(default = "default_quota_backoff_ms")]
    pub quota_backoff_ms: u64,

    /// Handling of non-quota listing failures.
    #[builder(default)]
    #[serde(default)]
    pub failure_policy: ListingFailurePolicy,

    /// Queue files without a reported size for a separate lookup.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub resolve_unknown_sizes: bool,
}

fn default_directory_workers() -> usize {
    5
}

fn default_size_workers() -> usize {
    10
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_quota_backoff_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

impl CrawlConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.trim().is_empty() => {
                return Err("Root folder id cannot be empty".to_string());
            }
            None => return Err("Root folder id is required".to_string()),
            _ => {}
        }
        if let Some(ref rate_limit) = self.rate_limit {
            rate_limit.validate()?;
        }
        if self.directory_workers == Some(0) {
            return Err("At least one directory worker is required".to_string());
        }
        if let Some(page_size) = self.page_size {
            validate_page_size(page_size)?;
        }
        Ok(())
    }
}

fn validate_page_size(page_size: u32) -> Result<(), String> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(format!(
            "Page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
        ));
    }
    Ok(())
}

impl CrawlConfig {
    /// Create a new crawl config builder.
    pub fn builder() -> CrawlConfigBuilder {
        CrawlConfigBuilder::default()
    }

    /// Create a config with defaults for crawling a folder.
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            directory_workers: default_directory_workers(),
            size_workers: default_size_workers(),
            page_size: default_page_size(),
            rate_limit: RateLimitConfig::default(),
            quota_backoff_ms: default_quota_backoff_ms(),
            failure_policy: ListingFailurePolicy::default(),
            resolve_unknown_sizes: true,
        }
    }

    /// Delay before retrying a quota-rejected request.
    pub fn quota_backoff(&self) -> Duration {
        Duration::from_millis(self.quota_backoff_ms)
    }

    /// Check a config that did not come through the builder.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.root.trim().is_empty() {
            return Err(IndexError::invalid_config("Root folder id cannot be empty"));
        }
        if self.directory_workers == 0 {
            return Err(IndexError::invalid_config(
                "At least one directory worker is required",
            ));
        }
        if self.resolve_unknown_sizes && self.size_workers == 0 {
            return Err(IndexError::invalid_config(
                "Size resolution needs at least one size worker",
            ));
        }
        validate_page_size(self.page_size).map_err(IndexError::invalid_config)?;
        self.rate_limit.validate().map_err(IndexError::invalid_config)?;
        if let ListingFailurePolicy::Retry { max_attempts: 0, .. } = self.failure_policy {
            return Err(IndexError::invalid_config(
                "Retry policy needs at least one attempt",
            ));
        }
        Ok(())
    }
}
