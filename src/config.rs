// ABOUTME: Configuration loading for the isadoc binary.
// ABOUTME: Reads ISADOC_* environment variables; command-line flags override them.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ISADOC_OVERWRITE must be one of true/false/1/0/yes/no, got '{0}'")]
    InvalidOverwrite(String),

    #[error("ISADOC_OUTPUT_DIR is set but empty")]
    EmptyOutputDir,
}

/// Settings read by the `batch` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsadocConfig {
    pub output_dir: PathBuf,
    pub overwrite: bool,
}

impl IsadocConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - ISADOC_OUTPUT_DIR: batch output directory (default: out)
    /// - ISADOC_OVERWRITE: replace existing batch outputs (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let output_dir = match std::env::var("ISADOC_OUTPUT_DIR") {
            Ok(dir) if dir.trim().is_empty() => return Err(ConfigError::EmptyOutputDir),
            Ok(dir) => PathBuf::from(dir),
            Err(_) => PathBuf::from("out"),
        };

        let overwrite = match std::env::var("ISADOC_OVERWRITE") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidOverwrite(raw))?,
            Err(_) => false,
        };

        Ok(Self {
            output_dir,
            overwrite,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}
