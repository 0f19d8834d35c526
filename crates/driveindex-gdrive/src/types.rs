//! Google Drive API response types
//!
//! Data structures for deserializing Google Drive API v3 responses.

use serde::{Deserialize, Serialize};

use crate::connector::FOLDER_MIME_TYPE;

/// Google Drive API file resource, limited to the fields the crawler asks for
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// File name
    pub name: String,

    /// MIME type
    pub mime_type: String,

    /// File size in bytes as a decimal string (omitted for folders and
    /// Google-native documents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl DriveFile {
    /// Check if this resource is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Size in bytes, `None` if absent or unparsable.
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    /// List of files
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Google Drive API files.get response with a partial field mask
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub size: Option<String>,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub message: String,
}

impl ApiErrorResponse {
    /// Reasons listed in the error details.
    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.error.errors.iter().map(|detail| detail.reason.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_list_response() {
        let json = r#"{
            "nextPageToken": "abc",
            "files": [
                {"id": "1", "name": "Music", "mimeType": "application/vnd.google-apps.folder"},
                {"id": "2", "name": "song.mp3", "mimeType": "audio/mpeg", "size": "5242880"},
                {"id": "3", "name": "Notes", "mimeType": "application/vnd.google-apps.document"}
            ]
        }"#;

        let response: FilesListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.next_page_token.as_deref(), Some("abc"));
        assert!(response.files[0].is_folder());
        assert_eq!(response.files[1].size_bytes(), Some(5_242_880));
        assert_eq!(response.files[2].size_bytes(), None);
    }

    #[test]
    fn test_deserialize_empty_folder() {
        let response: FilesListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.files.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_deserialize_error_response() {
        let json = r#"{
            "error": {
                "code": 403,
                "message": "User rate limit exceeded.",
                "errors": [
                    {"domain": "usageLimits", "reason": "userRateLimitExceeded", "message": "User rate limit exceeded."}
                ]
            }
        }"#;

        let response: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error.code, 403);
        assert_eq!(response.reasons().collect::<Vec<_>>(), vec!["userRateLimitExceeded"]);
    }
}
