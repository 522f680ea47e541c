//! # CLI Errors
//!
//! Everything the binary can fail with. Facade errors are wrapped unchanged.

use std::path::PathBuf;
use thiserror::Error;
use trellis_core::TrellisError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Trellis(#[from] TrellisError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid graph document: {0}")]
    Document(#[from] serde_json::Error),

    #[error("Invalid config file {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A command-line argument that parses but makes no sense.
    #[error("Invalid argument: {0}")]
    Argument(String),
}

impl CliError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
