use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("no loader registered for .{extension} (resolved {path})")]
    NoLoader { extension: String, path: PathBuf },

    #[error("native module '{name}' is not compiled into this host")]
    NotRegistered { name: String },

    #[error("invalid module manifest at {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },
}

impl Error {
    #[must_use]
    pub fn invalid_manifest(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
