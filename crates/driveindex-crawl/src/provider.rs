//! The listing API seam between the crawler and a storage provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use driveindex_core::ProviderError;

/// One child returned by a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Provider id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Folder or file.
    pub is_folder: bool,
    /// Reported size in bytes, absent for folders and some file types.
    #[serde(default)]
    pub size: Option<u64>,
}

impl RemoteEntry {
    /// Create a folder entry.
    pub fn folder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_folder: true,
            size: None,
        }
    }

    /// Create a file entry.
    pub fn file(id: impl Into<String>, name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_folder: false,
            size,
        }
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Children on this page.
    pub entries: Vec<RemoteEntry>,
    /// Cursor for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

impl ListingPage {
    /// Continuation token, treating blank tokens as the end of the listing.
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}

/// A paginated hierarchical file store.
///
/// Implementations report the provider's rate limit signal as
/// [`ProviderError::QuotaExceeded`] so callers can retry it separately from
/// every other failure.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// List one page of the children of `folder_id`.
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<ListingPage, ProviderError>;

    /// Look up the size of a single file.
    async fn file_size(&self, file_id: &str) -> Result<Option<u64>, ProviderError> {
        let _ = file_id;
        Ok(None)
    }

    /// Look up the display name of a folder.
    async fn folder_name(&self, folder_id: &str) -> Result<String, ProviderError> {
        Ok(folder_id.to_string())
    }

    /// Browse URL of a folder.
    fn folder_url(&self, folder_id: &str) -> String;

    /// Download URL of a file.
    fn file_url(&self, file_id: &str) -> String;
}
