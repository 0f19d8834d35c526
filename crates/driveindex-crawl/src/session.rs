//! Persisting crawl sessions.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use driveindex_core::{CrawlSession, IndexError};

/// Destination for session snapshots.
pub trait SessionSink: Send + Sync {
    /// Store a session.
    fn save(&self, session: &CrawlSession) -> Result<(), IndexError>;
}

/// Writes sessions as JSON to a file.
///
/// The file is replaced atomically so a reader never sees a half-written
/// snapshot.
#[derive(Debug, Clone)]
pub struct JsonSessionSink {
    path: PathBuf,
    pretty: bool,
}

impl JsonSessionSink {
    /// Create a sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: true,
        }
    }

    /// Write compact JSON instead of pretty-printed.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a session written by this sink.
    pub fn load(path: impl AsRef<Path>) -> Result<CrawlSession, IndexError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        serde_json::from_str(&data).map_err(|e| IndexError::Serialization {
            message: format!("{}: {e}", path.display()),
        })
    }
}

impl SessionSink for JsonSessionSink {
    fn save(&self, session: &CrawlSession) -> Result<(), IndexError> {
        let json = if self.pretty {
            serde_json::to_vec_pretty(session)
        } else {
            serde_json::to_vec(session)
        }
        .map_err(|e| IndexError::Serialization {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &json).map_err(|e| IndexError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| IndexError::io(&self.path, e))?;

        info!(path = %self.path.display(), bytes = json.len(), "Saved session snapshot");
        Ok(())
    }
}
