//! In-memory listing provider for offline crawls and tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use driveindex_core::ProviderError;

use crate::provider::{ListingPage, ListingProvider, RemoteEntry};

/// A folder stored in a [`MemoryProvider`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryFolder {
    /// Display name.
    pub name: String,
    /// Children in listing order.
    #[serde(default)]
    pub entries: Vec<RemoteEntry>,
}

/// Serializable contents of a [`MemoryProvider`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryFixture {
    /// Folders keyed by id.
    #[serde(default)]
    pub folders: HashMap<String, MemoryFolder>,
    /// Sizes answered by `file_size` for files listed without one.
    #[serde(default)]
    pub sizes: HashMap<String, u64>,
}

/// A listing provider backed by a map of folders.
///
/// Pages are cut from each folder's entries by `page_size`; page tokens are
/// page indices. Failures can be scripted per page or per file lookup.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    fixture: MemoryFixture,
    page_failures: Mutex<HashMap<(String, usize), VecDeque<ProviderError>>>,
    size_failures: Mutex<HashMap<String, VecDeque<ProviderError>>>,
    latency: Option<Duration>,
    list_calls: AtomicU64,
    size_calls: AtomicU64,
}

impl MemoryProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider from a fixture.
    pub fn from_fixture(fixture: MemoryFixture) -> Self {
        Self {
            fixture,
            ..Self::default()
        }
    }

    /// Parse a JSON fixture.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json).map(Self::from_fixture)
    }

    /// Add a folder with its children.
    pub fn with_folder(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        entries: Vec<RemoteEntry>,
    ) -> Self {
        self.fixture.folders.insert(
            id.into(),
            MemoryFolder {
                name: name.into(),
                entries,
            },
        );
        self
    }

    /// Answer `file_size` for a file.
    pub fn with_size(mut self, file_id: impl Into<String>, size: u64) -> Self {
        self.fixture.sizes.insert(file_id.into(), size);
        self
    }

    /// Delay every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail page `page` (0-based) of `folder_id` with `error`, `times` times.
    pub fn fail_page(
        self,
        folder_id: impl Into<String>,
        page: usize,
        error: ProviderError,
        times: usize,
    ) -> Self {
        self.page_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((folder_id.into(), page))
            .or_default()
            .extend(std::iter::repeat_n(error, times));
        self
    }

    /// Fail the size lookup of `file_id` with `error`, `times` times.
    pub fn fail_size(self, file_id: impl Into<String>, error: ProviderError, times: usize) -> Self {
        self.size_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(file_id.into())
            .or_default()
            .extend(std::iter::repeat_n(error, times));
        self
    }

    /// Number of `list_children` calls served.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of `file_size` calls served.
    pub fn size_calls(&self) -> u64 {
        self.size_calls.load(Ordering::Relaxed)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ListingProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<ListingPage, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        let page = match page_token {
            Some(token) => token.parse::<usize>().map_err(|_| ProviderError::Malformed {
                message: format!("Unknown page token: {token}"),
            })?,
            None => 0,
        };

        let scripted = self
            .page_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&(folder_id.to_string(), page))
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        let folder = self
            .fixture
            .folders
            .get(folder_id)
            .ok_or_else(|| ProviderError::NotFound {
                id: folder_id.to_string(),
            })?;

        let page_size = page_size.max(1) as usize;
        let start = page * page_size;
        let end = (start + page_size).min(folder.entries.len());
        let entries = folder.entries.get(start..end).unwrap_or_default().to_vec();
        let next_page_token = (end < folder.entries.len()).then(|| (page + 1).to_string());

        Ok(ListingPage {
            entries,
            next_page_token,
        })
    }

    async fn file_size(&self, file_id: &str) -> Result<Option<u64>, ProviderError> {
        self.size_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;

        let scripted = self
            .size_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(file_id)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        Ok(self.fixture.sizes.get(file_id).copied())
    }

    async fn folder_name(&self, folder_id: &str) -> Result<String, ProviderError> {
        self.fixture
            .folders
            .get(folder_id)
            .map(|folder| folder.name.clone())
            .ok_or_else(|| ProviderError::NotFound {
                id: folder_id.to_string(),
            })
    }

    fn folder_url(&self, folder_id: &str) -> String {
        format!("memory://folders/{folder_id}")
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("memory://files/{file_id}")
    }
}
