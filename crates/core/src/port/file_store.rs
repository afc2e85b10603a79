// File Store Port
// Moves step inputs in from, and step outputs out to, an object-storage namespace

use crate::domain::FileRef;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported storage scheme '{scheme}' in {uri}")]
    UnsupportedScheme { scheme: String, uri: String },

    #[error("Invalid file reference: {0}")]
    InvalidReference(String),

    #[error("IO error on {path}: {reason}")]
    Io { path: String, reason: String },
}

/// File store trait
///
/// Implementations:
/// - LocalObjectStore: maps remote URIs onto a directory tree
/// - mocks::PassthroughStore: leaves local files in place, records uploads
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Make `file` available as a local file inside `dest_dir` and return its path.
    ///
    /// References that already have a local path may be returned unchanged.
    async fn stage_in(&self, file: &FileRef, dest_dir: &Path) -> Result<PathBuf, StagingError>;

    /// Upload a local file to the remote location `remote`
    async fn stage_out(&self, local: &Path, remote: &str) -> Result<(), StagingError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Store that treats every remote URI as already local under its file name
    #[derive(Clone, Default)]
    pub struct PassthroughStore {
        uploads: Arc<Mutex<Vec<(PathBuf, String)>>>,
    }

    impl PassthroughStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn uploads(&self) -> Vec<(PathBuf, String)> {
            self.uploads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FileStore for PassthroughStore {
        async fn stage_in(&self, file: &FileRef, dest_dir: &Path) -> Result<PathBuf, StagingError> {
            if let Some(path) = file.local_path() {
                return Ok(path.to_path_buf());
            }
            let name = file
                .file_name()
                .ok_or_else(|| StagingError::InvalidReference(file.to_string()))?;
            Ok(dest_dir.join(name))
        }

        async fn stage_out(&self, local: &Path, remote: &str) -> Result<(), StagingError> {
            self.uploads
                .lock()
                .unwrap()
                .push((local.to_path_buf(), remote.to_string()));
            Ok(())
        }
    }
}
