// File reference: a local path plus an optional remote storage location

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Scheme used for local file URIs (`file:///abs/path`)
const FILE_SCHEME: &str = "file";

/// Reference to a file that moves between steps.
///
/// Inputs usually arrive remote-only (`s3://bucket/r1.fastq`) and gain a
/// `local_path` once staged. Step outputs always have a `local_path` and carry
/// the remote tag they should be uploaded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FileRefRepr")]
pub struct FileRef {
    #[serde(rename = "path", skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

/// Accepted JSON shapes: `"s3://b/k"`, `"/data/r1.fastq"` or `{ "path": .., "remote": .. }`
#[derive(Deserialize)]
#[serde(untagged)]
enum FileRefRepr {
    Bare(String),
    Full {
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        remote: Option<String>,
    },
}

impl TryFrom<FileRefRepr> for FileRef {
    type Error = DomainError;

    fn try_from(repr: FileRefRepr) -> Result<Self> {
        let file = match repr {
            FileRefRepr::Bare(s) => FileRef::parse(&s),
            FileRefRepr::Full { path, remote } => FileRef {
                local_path: path,
                remote,
            },
        };
        file.validate()?;
        Ok(file)
    }
}

impl FileRef {
    pub fn new(local_path: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            local_path: Some(local_path.into()),
            remote: Some(remote.into()),
        }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: Some(path.into()),
            remote: None,
        }
    }

    pub fn remote(uri: impl Into<String>) -> Self {
        Self {
            local_path: None,
            remote: Some(uri.into()),
        }
    }

    /// Parse a bare string: URIs become remote references, anything else a local path.
    pub fn parse(s: &str) -> Self {
        match uri_scheme(s) {
            Some(FILE_SCHEME) => Self::local(&s[FILE_SCHEME.len() + 3..]),
            Some(_) => Self::remote(s),
            None => Self::local(s),
        }
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn is_staged(&self) -> bool {
        self.local_path.is_some()
    }

    /// Last segment of the local path, falling back to the remote URI.
    pub fn file_name(&self) -> Option<String> {
        if let Some(name) = self
            .local_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
        {
            return Some(name);
        }
        self.remote
            .as_deref()
            .and_then(|uri| uri.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    pub fn validate(&self) -> Result<()> {
        if self.local_path.is_none() && self.remote.is_none() {
            return Err(DomainError::ValidationError(
                "file reference needs a path or a remote location".to_string(),
            ));
        }
        if self.file_name().is_none() {
            return Err(DomainError::ValidationError(format!(
                "file reference has no file name: {}",
                self
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.local_path, &self.remote) {
            (Some(path), Some(remote)) => write!(f, "{} -> {}", path.display(), remote),
            (Some(path), None) => write!(f, "{}", path.display()),
            (None, Some(remote)) => write!(f, "{}", remote),
            (None, None) => write!(f, "<empty>"),
        }
    }
}

/// Scheme of a URI (`s3` for `s3://bucket/key`), `None` for plain paths.
pub fn uri_scheme(s: &str) -> Option<&str> {
    let (scheme, _) = s.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
    valid.then_some(scheme)
}
