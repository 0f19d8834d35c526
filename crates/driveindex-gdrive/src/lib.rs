//! Google Drive provider for driveindex.
//!
//! Implements [`ListingProvider`](driveindex_crawl::ListingProvider) over the
//! Drive v3 REST API using a caller-supplied OAuth 2.0 access token.
//! Requests go through an [`HttpClient`]; [`ReqwestClient`] is the default.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use driveindex_crawl::{CrawlConfig, Crawler};
//! use driveindex_gdrive::GoogleDriveConnector;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = GoogleDriveConnector::new("ya29.token")?;
//! let crawler = Crawler::new(Arc::new(connector), CrawlConfig::new("1AbCdEf"))?;
//! let session = crawler.run().await?;
//! println!("{} files", session.stats.files);
//! # Ok(())
//! # }
//! ```

mod connector;
mod error;
mod http;
mod types;

pub use connector::{
    DRIVE_API_BASE, FOLDER_MIME_TYPE, GoogleDriveConnector, drive_file_url, drive_folder_url,
    parse_folder_id,
};
pub use error::{GoogleDriveError, Result};
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestClient};
pub use types::{ApiErrorResponse, DriveFile, FileMetadata, FilesListResponse};
