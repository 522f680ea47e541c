//! # Configuration
//!
//! Settings are layered, highest first:
//!
//! 1. command-line flags
//! 2. environment (`TRELLIS_LOG_FORMAT`)
//! 3. the config file (`--config`, or `trellis.toml` in the working directory)
//! 4. built-in defaults
//!
//! ```toml
//! graph = "clinic.json"
//! json_mode = true
//! audit = false
//! log_format = "json"
//! ```

use crate::cli::Cli;
use crate::error::CliError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "trellis.toml";

/// Graph document used when neither flag nor file names one.
pub const DEFAULT_GRAPH_FILE: &str = "trellis.json";

/// Environment variable selecting the log formatter.
pub const LOG_FORMAT_ENV: &str = "TRELLIS_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse an environment value. Unknown values fall back to text.
    #[must_use]
    pub fn from_env_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Contents of a `trellis.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub graph: Option<PathBuf>,
    pub json_mode: Option<bool>,
    pub audit: Option<bool>,
    pub log_format: Option<LogFormat>,
}

impl ConfigFile {
    pub fn parse(text: &str, path: &Path) -> Result<Self, CliError> {
        toml::from_str(text).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the config file named by `explicit`, or the default one if present.
    ///
    /// An explicit path must exist. A missing default file yields an empty
    /// config.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, CliError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !path.is_file() {
                    return Ok(Self::default());
                }
                path
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|e| CliError::io(&path, e))?;
        Self::parse(&text, &path)
    }
}

/// Effective settings after layering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub graph: PathBuf,
    pub json_mode: bool,
    pub audit: bool,
    pub log_format: LogFormat,
}

impl Settings {
    #[must_use]
    pub fn resolve(cli: &Cli, file: ConfigFile, env_log_format: Option<&str>) -> Self {
        Self {
            graph: cli
                .graph
                .clone()
                .or(file.graph)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GRAPH_FILE)),
            json_mode: cli.json_mode || file.json_mode.unwrap_or(false),
            audit: cli.audit || file.audit.unwrap_or(false),
            log_format: env_log_format
                .map(LogFormat::from_env_value)
                .or(file.log_format)
                .unwrap_or_default(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("trellis").chain(args.iter().copied()))
            .expect("parse")
    }

    #[test]
    fn defaults_without_file() {
        let settings = Settings::resolve(&cli(&["status"]), ConfigFile::default(), None);
        assert_eq!(settings.graph, PathBuf::from(DEFAULT_GRAPH_FILE));
        assert!(!settings.json_mode);
        assert!(!settings.audit);
        assert_eq!(settings.log_format, LogFormat::Text);
    }

    #[test]
    fn file_fills_unset_flags() {
        let file = ConfigFile::parse(
            "graph = \"ward.json\"\njson_mode = true\nlog_format = \"json\"\n",
            Path::new("trellis.toml"),
        )
        .expect("config");
        let settings = Settings::resolve(&cli(&["status"]), file, None);
        assert_eq!(settings.graph, PathBuf::from("ward.json"));
        assert!(settings.json_mode);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn flags_and_env_override_file() {
        let file = ConfigFile {
            graph: Some(PathBuf::from("ward.json")),
            log_format: Some(LogFormat::Json),
            ..ConfigFile::default()
        };
        let settings = Settings::resolve(
            &cli(&["--graph", "other.json", "--audit", "status"]),
            file,
            Some("text"),
        );
        assert_eq!(settings.graph, PathBuf::from("other.json"));
        assert!(settings.audit);
        assert_eq!(settings.log_format, LogFormat::Text);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result = ConfigFile::parse("port = 8080\n", Path::new("trellis.toml"));
        assert!(matches!(result, Err(CliError::Config { .. })));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = ConfigFile::discover(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(CliError::Io { .. })));
    }
}
