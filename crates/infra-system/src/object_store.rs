// Local object store
// Maps object-storage URIs onto a directory tree so remote inputs and
// uploaded outputs live on local disk
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use readflow_core::domain::{uri_scheme, FileRef};
use readflow_core::port::file_store::{FileStore, StagingError};

/// Schemes backed by a subdirectory of the store root
const STORE_SCHEMES: &[&str] = &["latch", "s3", "gs"];

/// File store rooted at a local directory
///
/// `latch:///a/b` lives at `<root>/latch/a/b`, `s3://bucket/key` at
/// `<root>/s3/bucket/key`. `file://` URIs and plain paths are used as-is.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local location backing `uri`
    pub fn resolve(&self, uri: &str) -> Result<PathBuf, StagingError> {
        let Some(scheme) = uri_scheme(uri) else {
            return Ok(PathBuf::from(uri));
        };
        let rest = &uri[scheme.len() + 3..];

        if scheme == "file" {
            return Ok(PathBuf::from(rest));
        }
        if !STORE_SCHEMES.contains(&scheme) {
            return Err(StagingError::UnsupportedScheme {
                scheme: scheme.to_string(),
                uri: uri.to_string(),
            });
        }

        let key = Path::new(rest.trim_start_matches('/'));
        if key.as_os_str().is_empty()
            || key.components().any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StagingError::InvalidReference(uri.to_string()));
        }

        Ok(self.root.join(scheme).join(key))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> StagingError {
    StagingError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

async fn ensure_exists(path: &Path, reference: &str) -> Result<(), StagingError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(StagingError::InvalidReference(format!(
            "{} is not a file",
            reference
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StagingError::NotFound(reference.to_string()))
        }
        Err(e) => Err(io_error(path, e)),
    }
}

/// Copy into a temporary sibling, then rename over `to`
///
/// Readers and concurrent writers of the same destination only ever see a
/// complete file: the last rename wins.
async fn copy_file(from: &Path, to: &Path) -> Result<(), StagingError> {
    let parent = to.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| io_error(parent, e))?;

    let name = to
        .file_name()
        .ok_or_else(|| StagingError::InvalidReference(to.display().to_string()))?;
    let tmp = parent.join(format!(
        ".{}.{}.tmp",
        name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));

    let result = match tokio::fs::copy(from, &tmp).await {
        Ok(_) => tokio::fs::rename(&tmp, to)
            .await
            .map_err(|e| io_error(to, e)),
        Err(e) => Err(io_error(&tmp, e)),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

#[async_trait]
impl FileStore for LocalObjectStore {
    async fn stage_in(&self, file: &FileRef, dest_dir: &Path) -> Result<PathBuf, StagingError> {
        if let Some(path) = file.local_path() {
            ensure_exists(path, &path.display().to_string()).await?;
            return Ok(path.to_path_buf());
        }

        let uri = file
            .remote
            .as_deref()
            .ok_or_else(|| StagingError::InvalidReference(file.to_string()))?;
        let name = file
            .file_name()
            .ok_or_else(|| StagingError::InvalidReference(uri.to_string()))?;

        let source = self.resolve(uri)?;
        ensure_exists(&source, uri).await?;

        let dest = dest_dir.join(name);
        copy_file(&source, &dest).await?;
        debug!(uri = %uri, local = %dest.display(), "Staged input");
        Ok(dest)
    }

    async fn stage_out(&self, local: &Path, remote: &str) -> Result<(), StagingError> {
        ensure_exists(local, &local.display().to_string()).await?;
        let dest = self.resolve(remote)?;
        copy_file(local, &dest).await?;
        info!(local = %local.display(), remote = %remote, "Uploaded output");
        Ok(())
    }
}
