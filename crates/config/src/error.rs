//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or an unknown key.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// A value parsed but is out of range.
	#[error("invalid value for '{key}': {reason}")]
	Invalid {
		/// Dotted key, e.g. `scheduler.max_concurrent`.
		key: &'static str,
		reason: String,
	},
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Non-fatal warning about a configuration that loads but probably does
/// not do what was meant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
	/// A setting has no effect given another one.
	Ineffective {
		key: &'static str,
		because: String,
	},
}

impl std::fmt::Display for ConfigWarning {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ConfigWarning::Ineffective { key, because } => write!(f, "'{key}' has no effect: {because}"),
		}
	}
}
