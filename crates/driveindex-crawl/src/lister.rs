//! Paginated listing of a single folder.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use driveindex_core::{
    CrawlWarning, DirectoryNode, FileEntry, IndexError, ListingFailurePolicy, NodeId, NodeStatus,
    ProviderError, WarningKind,
};

use crate::arena::NodeIdAllocator;
use crate::provider::{ListingPage, ListingProvider, RemoteEntry};
use crate::rate_limit::{RateLimiter, sleep_or_cancel};

/// Request counters for one folder listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingCounters {
    /// Requests sent, retries included.
    pub requests: u64,
    /// Pages received.
    pub pages: u64,
    /// Requests rejected for quota.
    pub quota_retries: u64,
    /// Non-quota failures.
    pub provider_errors: u64,
}

/// The children of one folder, in canonical order.
#[derive(Debug, Clone)]
pub struct FolderListing {
    /// Subfolders, sorted by name, not yet listed themselves.
    pub children: Vec<DirectoryNode>,
    /// Files, sorted by name.
    pub files: Vec<FileEntry>,
    /// When the first page was requested.
    pub started_at: DateTime<Utc>,
    /// When the last page arrived or pagination was abandoned.
    pub finished_at: DateTime<Utc>,
    /// Resulting status of the folder.
    pub status: NodeStatus,
    /// Problems worth reporting.
    pub warnings: Vec<CrawlWarning>,
    /// Request counters.
    pub counters: ListingCounters,
}

impl FolderListing {
    /// Number of direct entries.
    pub fn entry_count(&self) -> usize {
        self.children.len() + self.files.len()
    }
}

enum PageOutcome {
    Page(ListingPage),
    Abandoned(NodeStatus, CrawlWarning),
}

/// Pages through a folder's children under the shared rate limit.
pub struct FolderLister {
    provider: Arc<dyn ListingProvider>,
    limiter: Arc<RateLimiter>,
    ids: Arc<NodeIdAllocator>,
    page_size: u32,
    quota_backoff: Duration,
    policy: ListingFailurePolicy,
}

impl FolderLister {
    /// Create a lister.
    pub fn new(
        provider: Arc<dyn ListingProvider>,
        limiter: Arc<RateLimiter>,
        ids: Arc<NodeIdAllocator>,
        page_size: u32,
        quota_backoff: Duration,
        policy: ListingFailurePolicy,
    ) -> Self {
        Self {
            provider,
            limiter,
            ids,
            page_size,
            quota_backoff,
            policy,
        }
    }

    /// List every child of `folder_id`, which is node `parent` in the tree.
    ///
    /// Quota rejections are retried until they succeed; other provider
    /// errors end the listing according to the failure policy. Only
    /// cancellation is returned as an error.
    pub async fn list(
        &self,
        parent: NodeId,
        folder_id: &str,
        cancel: &CancellationToken,
    ) -> Result<FolderListing, IndexError> {
        let started_at = Utc::now();
        let mut counters = ListingCounters::default();
        let mut children: Vec<DirectoryNode> = Vec::new();
        let mut files: Vec<FileEntry> = Vec::new();
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        let mut page_token: Option<String> = None;
        let mut status = NodeStatus::Complete;

        debug!(folder = folder_id, "Started listing");

        loop {
            let page = match self
                .fetch_page(folder_id, page_token.as_deref(), &mut counters, cancel)
                .await?
            {
                PageOutcome::Page(page) => page,
                PageOutcome::Abandoned(final_status, warning) => {
                    status = final_status;
                    warnings.push(warning);
                    break;
                }
            };

            counters.pages += 1;
            let next = page.continuation().map(str::to_string);

            for entry in page.entries {
                if !seen.insert(entry.id.clone()) {
                    continue;
                }
                self.classify(parent, entry, &mut children, &mut files);
            }

            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        // Ordinal order, folders and files kept apart.
        children.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        files.sort_by(|a, b| a.file_name.as_str().cmp(b.file_name.as_str()));

        debug!(
            folder = folder_id,
            folders = children.len(),
            files = files.len(),
            pages = counters.pages,
            "Finished listing"
        );

        Ok(FolderListing {
            children,
            files,
            started_at,
            finished_at: Utc::now(),
            status,
            warnings,
            counters,
        })
    }

    /// Fetch one page, retrying according to policy.
    async fn fetch_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
        counters: &mut ListingCounters,
        cancel: &CancellationToken,
    ) -> Result<PageOutcome, IndexError> {
        let mut failures = 0u32;

        loop {
            self.limiter.acquire(cancel).await?;
            counters.requests += 1;
            debug!(folder = folder_id, page_token, "Requesting page");

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(IndexError::Cancelled),
                result = self.provider.list_children(folder_id, page_token, self.page_size) => result,
            };

            let err = match result {
                Ok(page) => return Ok(PageOutcome::Page(page)),
                Err(err) => err,
            };

            if err.is_quota_exceeded() {
                counters.quota_retries += 1;
                if counters.quota_retries % 10 == 0 {
                    warn!(
                        folder = folder_id,
                        retries = counters.quota_retries,
                        "Provider quota still exceeded, retrying page"
                    );
                } else {
                    debug!(folder = folder_id, "Provider quota exceeded, retrying page");
                }
                sleep_or_cancel(self.quota_backoff, cancel).await?;
                continue;
            }

            counters.provider_errors += 1;
            failures += 1;

            match self.policy {
                ListingFailurePolicy::Truncate => {
                    error!(folder = folder_id, error = %err, "Provider error, keeping partial listing");
                    return Ok(PageOutcome::Abandoned(
                        NodeStatus::Complete,
                        CrawlWarning::listing_truncated(folder_id, &err),
                    ));
                }
                ListingFailurePolicy::MarkPartial => {
                    error!(folder = folder_id, error = %err, "Provider error, marking folder partial");
                    return Ok(PageOutcome::Abandoned(
                        partial(&err),
                        CrawlWarning::listing_truncated(folder_id, &err),
                    ));
                }
                ListingFailurePolicy::Retry {
                    max_attempts,
                    backoff_ms,
                } => {
                    if failures >= max_attempts {
                        error!(
                            folder = folder_id,
                            attempts = failures,
                            error = %err,
                            "Provider error, retries exhausted"
                        );
                        return Ok(PageOutcome::Abandoned(
                            partial(&err),
                            CrawlWarning::new(
                                folder_id,
                                format!("Gave up after {failures} attempts: {err}"),
                                WarningKind::ListingRetriesExhausted,
                            ),
                        ));
                    }

                    let delay = Duration::from_millis(backoff_ms.saturating_mul(1 << (failures - 1).min(16)));
                    warn!(
                        folder = folder_id,
                        attempt = failures,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Provider error, retrying page"
                    );
                    sleep_or_cancel(delay, cancel).await?;
                }
            }
        }
    }

    fn classify(
        &self,
        parent: NodeId,
        entry: RemoteEntry,
        children: &mut Vec<DirectoryNode>,
        files: &mut Vec<FileEntry>,
    ) {
        if entry.is_folder {
            let url = self.provider.folder_url(&entry.id);
            children.push(DirectoryNode::new(
                self.ids.allocate(),
                entry.id,
                url,
                entry.name,
                Some(parent),
            ));
        } else {
            let url = self.provider.file_url(&entry.id);
            files.push(FileEntry::new(entry.id, url, entry.name, entry.size));
        }
    }
}

fn partial(err: &ProviderError) -> NodeStatus {
    NodeStatus::Partial {
        reason: err.to_string(),
    }
}
