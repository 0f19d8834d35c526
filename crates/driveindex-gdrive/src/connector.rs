//! Google Drive API connector implementation
//!
//! Implements the `ListingProvider` trait for Google Drive API v3.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use driveindex_core::{MAX_PAGE_SIZE, ProviderError};
use driveindex_crawl::{ListingPage, ListingProvider, RemoteEntry};

use crate::error::{GoogleDriveError, Result};
use crate::http::{HttpClient, HttpRequest, ReqwestClient};
use crate::types::{FileMetadata, FilesListResponse};

/// Google Drive API base URL
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields to request for each child
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size)";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Browse URL of a Drive folder.
pub fn drive_folder_url(folder_id: &str) -> String {
    format!("https://drive.google.com/drive/folders/{folder_id}")
}

/// Direct download URL of a Drive file.
pub fn drive_file_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=download&id={file_id}")
}

/// Extract a folder id from a bare id or a Drive folder URL.
///
/// Accepts `https://drive.google.com/drive/folders/<id>` (optionally
/// with `/u/N/` and a query string) and `...?id=<id>` forms.
pub fn parse_folder_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if !input.contains('/') {
        return Some(input.to_string());
    }

    let (path, query) = input.split_once('?').unwrap_or((input, ""));

    if let Some(id) = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("id="))
        .filter(|id| !id.is_empty())
    {
        return Some(id.to_string());
    }

    let mut segments = path.trim_end_matches('/').rsplit('/');
    let last = segments.next()?;
    let previous = segments.next()?;
    (previous == "folders" && !last.is_empty()).then(|| last.to_string())
}

/// Quote-escape a value for a Drive `q` string literal.
fn escape_query_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '\'') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Google Drive API connector
///
/// Lists folder children page by page with `files.list` and looks up
/// individual sizes with `files.get`. Quota rejections surface as
/// [`ProviderError::QuotaExceeded`]; retrying them is the caller's job.
///
/// # Example
///
/// ```ignore
/// use driveindex_gdrive::GoogleDriveConnector;
///
/// let connector = GoogleDriveConnector::new(access_token)?;
/// let page = connector.list_children("1AbCdEf", None, 1000).await?;
/// ```
pub struct GoogleDriveConnector {
    http: Arc<dyn HttpClient>,
    access_token: String,
    base_url: String,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    ///
    /// # Arguments
    ///
    /// * `access_token` - OAuth 2.0 access token with `drive.readonly` scope
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let http = ReqwestClient::new(REQUEST_TIMEOUT)?;
        Ok(Self::with_http_client(Arc::new(http), access_token))
    }

    /// Create a connector that sends requests through `http`.
    pub fn with_http_client(http: Arc<dyn HttpClient>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            base_url: DRIVE_API_BASE.to_string(),
        }
    }

    /// Send requests to another API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build a `files.list` URL for one page of `folder_id`'s children.
    pub fn list_url(&self, folder_id: &str, page_token: Option<&str>, page_size: u32) -> String {
        let query = format!("'{}' in parents", escape_query_literal(folder_id));
        let mut url = format!(
            "{}/files?q={}&pageSize={}&fields={}&supportsAllDrives=true&includeItemsFromAllDrives=true",
            self.base_url,
            urlencoding::encode(&query),
            page_size.clamp(1, MAX_PAGE_SIZE),
            urlencoding::encode(LIST_FIELDS),
        );
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    /// Build a `files.get` URL with a field mask.
    pub fn metadata_url(&self, file_id: &str, fields: &str) -> String {
        format!(
            "{}/files/{}?fields={}&supportsAllDrives=true",
            self.base_url,
            urlencoding::encode(file_id),
            urlencoding::encode(fields),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String, target: &str) -> Result<T> {
        trace!(url = %url, "Sending Drive request");
        let response = self
            .http
            .get(HttpRequest {
                url,
                bearer_token: self.access_token.clone(),
            })
            .await?;

        if !response.is_success() {
            let error = GoogleDriveError::from_response(response.status, &response.body, target);
            debug!(status = response.status, target, error = %error, "Drive request failed");
            return Err(error);
        }

        serde_json::from_str(&response.body).map_err(|e| GoogleDriveError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ListingProvider for GoogleDriveConnector {
    fn name(&self) -> &str {
        "google-drive"
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> std::result::Result<ListingPage, ProviderError> {
        let url = self.list_url(folder_id, page_token, page_size);
        let response: FilesListResponse = self.get_json(url, folder_id).await?;

        let entries = response
            .files
            .into_iter()
            .map(|file| {
                if file.is_folder() {
                    RemoteEntry::folder(file.id, file.name)
                } else {
                    let size = file.size_bytes();
                    RemoteEntry::file(file.id, file.name, size)
                }
            })
            .collect();

        Ok(ListingPage {
            entries,
            next_page_token: response.next_page_token,
        })
    }

    async fn file_size(&self, file_id: &str) -> std::result::Result<Option<u64>, ProviderError> {
        let url = self.metadata_url(file_id, "size");
        let metadata: FileMetadata = self.get_json(url, file_id).await?;
        Ok(metadata.size.and_then(|s| s.parse().ok()))
    }

    async fn folder_name(&self, folder_id: &str) -> std::result::Result<String, ProviderError> {
        let url = self.metadata_url(folder_id, "name");
        let metadata: FileMetadata = self.get_json(url, folder_id).await?;
        Ok(metadata.name.unwrap_or_else(|| folder_id.to_string()))
    }

    fn folder_url(&self, folder_id: &str) -> String {
        drive_folder_url(folder_id)
    }

    fn file_url(&self, file_id: &str) -> String {
        drive_file_url(file_id)
    }
}
