//! Integration tests for driveindex-gdrive.

use driveindex_core::ProviderError;
use driveindex_crawl::ListingProvider;
use driveindex_gdrive::{GoogleDriveConnector, GoogleDriveError, parse_folder_id};

const USER_RATE_LIMIT: &str = r#"{
  "error": {
    "code": 403,
    "message": "User rate limit exceeded.",
    "errors": [
      {
        "domain": "usageLimits",
        "reason": "userRateLimitExceeded",
        "message": "User rate limit exceeded."
      }
    ]
  }
}"#;

const PROJECT_RATE_LIMIT: &str = r#"{
  "error": {
    "code": 403,
    "message": "Rate Limit Exceeded",
    "errors": [{ "domain": "usageLimits", "reason": "rateLimitExceeded", "message": "Rate Limit Exceeded" }]
  }
}"#;

const PERMISSION_DENIED: &str = r#"{
  "error": {
    "code": 403,
    "message": "The user does not have sufficient permissions for this file.",
    "errors": [{ "domain": "global", "reason": "insufficientFilePermissions", "message": "..." }]
  }
}"#;

#[test]
fn test_user_rate_limit_is_quota() {
    let error = GoogleDriveError::from_response(403, USER_RATE_LIMIT, "folder");
    assert!(error.is_rate_limited());
    assert_eq!(ProviderError::from(error), ProviderError::QuotaExceeded);
}

#[test]
fn test_project_rate_limit_is_quota() {
    let error = GoogleDriveError::from_response(403, PROJECT_RATE_LIMIT, "folder");
    assert!(error.is_rate_limited());
}

#[test]
fn test_too_many_requests_is_quota() {
    let error = GoogleDriveError::from_response(429, "Too Many Requests", "folder");
    assert!(error.is_rate_limited());
}

#[test]
fn test_permission_error_is_not_quota() {
    let error = GoogleDriveError::from_response(403, PERMISSION_DENIED, "folder");
    assert!(!error.is_rate_limited());

    let provider = ProviderError::from(error);
    assert!(!provider.is_quota_exceeded());
    assert!(matches!(provider, ProviderError::Api { status: 403, .. }));
}

#[test]
fn test_not_found_names_target() {
    let error = GoogleDriveError::from_response(404, "{}", "1AbC");
    assert_eq!(
        error,
        GoogleDriveError::FileNotFound {
            file_id: "1AbC".to_string()
        }
    );
}

#[test]
fn test_server_error_keeps_body_message() {
    let error = GoogleDriveError::from_response(503, "Service Unavailable\n", "x");
    assert_eq!(
        error,
        GoogleDriveError::ApiError {
            status_code: 503,
            message: "Service Unavailable".to_string()
        }
    );
}

#[test]
fn test_parse_folder_id() {
    assert_eq!(parse_folder_id("1AbCdEf").as_deref(), Some("1AbCdEf"));
    assert_eq!(
        parse_folder_id("https://drive.google.com/drive/folders/1AbCdEf").as_deref(),
        Some("1AbCdEf")
    );
    assert_eq!(
        parse_folder_id("https://drive.google.com/drive/u/0/folders/1AbCdEf?usp=sharing").as_deref(),
        Some("1AbCdEf")
    );
    assert_eq!(
        parse_folder_id("https://drive.google.com/open?id=1AbCdEf").as_deref(),
        Some("1AbCdEf")
    );
    assert_eq!(parse_folder_id("https://drive.google.com/drive/my-drive"), None);
    assert_eq!(parse_folder_id("  "), None);
}

#[test]
fn test_connector_urls() {
    let connector = GoogleDriveConnector::new("token").unwrap();
    assert_eq!(connector.name(), "google-drive");
    assert_eq!(
        connector.folder_url("abc"),
        "https://drive.google.com/drive/folders/abc"
    );
    assert_eq!(
        connector.file_url("def"),
        "https://drive.google.com/uc?export=download&id=def"
    );
    assert!(
        connector
            .metadata_url("def", "size")
            .ends_with("/files/def?fields=size&supportsAllDrives=true")
    );
}
