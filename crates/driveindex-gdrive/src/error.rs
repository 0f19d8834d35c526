//! Error types for the Google Drive provider

use thiserror::Error;

use driveindex_core::ProviderError;

use crate::types::ApiErrorResponse;

/// Reasons Google reports when a caller exceeds its request quota.
const QUOTA_REASONS: [&str; 2] = ["userRateLimitExceeded", "rateLimitExceeded"];

/// Message of the per-user quota error.
const USER_RATE_LIMIT_MESSAGE: &str = "User rate limit exceeded.";

/// Google Drive provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GoogleDriveError {
    /// Authentication failed or token is invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Request quota exceeded
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },

    /// File or folder not found
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl GoogleDriveError {
    /// Classify a non-2xx response for request `target`.
    pub fn from_response(status: u16, body: &str, target: &str) -> Self {
        let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
        let message = parsed
            .as_ref()
            .map(|response| response.error.message.clone())
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| body.trim().to_string());

        let quota_reason = parsed
            .as_ref()
            .is_some_and(|response| response.reasons().any(|reason| QUOTA_REASONS.contains(&reason)));

        match status {
            429 => Self::RateLimitExceeded { message },
            403 if quota_reason || message == USER_RATE_LIMIT_MESSAGE => {
                Self::RateLimitExceeded { message }
            }
            401 => Self::AuthenticationFailed(message),
            404 => Self::FileNotFound {
                file_id: target.to_string(),
            },
            _ => Self::ApiError {
                status_code: status,
                message,
            },
        }
    }

    /// Check if this is the quota signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExceeded { .. })
    }
}

impl From<GoogleDriveError> for ProviderError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::RateLimitExceeded { .. } => ProviderError::QuotaExceeded,
            GoogleDriveError::AuthenticationFailed(message) => ProviderError::Api {
                status: 401,
                message,
            },
            GoogleDriveError::ApiError {
                status_code,
                message,
            } => ProviderError::Api {
                status: status_code,
                message,
            },
            GoogleDriveError::FileNotFound { file_id } => ProviderError::NotFound { id: file_id },
            GoogleDriveError::ParseError(message) => ProviderError::Malformed { message },
            GoogleDriveError::NetworkError(message) => ProviderError::Network { message },
        }
    }
}

impl From<reqwest::Error> for GoogleDriveError {
    fn from(error: reqwest::Error) -> Self {
        GoogleDriveError::NetworkError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleDriveError::ApiError {
            status_code: 500,
            message: "Backend Error".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Google Drive API error (status 500): Backend Error"
        );
    }

    #[test]
    fn test_quota_maps_to_provider_quota() {
        let error = GoogleDriveError::RateLimitExceeded {
            message: USER_RATE_LIMIT_MESSAGE.to_string(),
        };
        let provider: ProviderError = error.into();
        assert!(provider.is_quota_exceeded());
    }

    #[test]
    fn test_not_found_conversion() {
        let provider: ProviderError = GoogleDriveError::FileNotFound {
            file_id: "abc".to_string(),
        }
        .into();
        assert_eq!(provider, ProviderError::NotFound { id: "abc".to_string() });
    }
}
