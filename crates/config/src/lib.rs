//! Configuration for tripline.
//!
//! A single TOML file composes the three subsystem configurations:
//!
//! ```toml
//! [scheduler]
//! max_concurrent = 4
//! base_retry_delay_ms = 500
//!
//! [prefetch]
//! prefetch_radius = 2
//! prefetch_delay_ms = 750
//!
//! [viewport]
//! row_height = 64.0
//! overscan_rows = 8
//!
//! [viewport.reveal]
//! root_margin = 200.0
//! mode = "toggle"
//! ```
//!
//! Every table and key is optional; missing values take their defaults and
//! unknown keys are rejected.
//!
//! # Configuration Files
//!
//! [`TriplineConfig::discover`] looks in these locations (in order):
//!
//! 1. An explicit path, usually from `--config`
//! 2. `$XDG_CONFIG_HOME/tripline/config.toml` (or the platform equivalent)
//! 3. Built-in defaults

mod error;

use std::path::{Path, PathBuf};

pub use error::{ConfigError, ConfigWarning, Result};
use serde::{Deserialize, Serialize};
pub use tripline_prefetch::PrefetchConfig;
pub use tripline_scheduler::SchedulerConfig;
pub use tripline_viewport::ViewportConfig;

/// Largest accepted `prefetch.dwell_weight_floor` (a multiple of the
/// running average dwell).
pub const MAX_DWELL_WEIGHT_FLOOR: f64 = 100.0;

/// Complete tripline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TriplineConfig {
	pub scheduler: SchedulerConfig,
	pub prefetch: PrefetchConfig,
	pub viewport: ViewportConfig,
	/// Non-fatal warnings found by [`Self::validate`].
	#[serde(skip)]
	pub warnings: Vec<ConfigWarning>,
}

impl TriplineConfig {
	/// Parses and validates a TOML string.
	pub fn parse(input: &str) -> Result<Self> {
		let mut config: Self = toml::from_str(input)?;
		config.warnings = config.validate()?;
		Ok(config)
	}

	/// Loads configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
			path: path.to_path_buf(),
			error: e,
		})?;
		Self::parse(&content)
	}

	/// Location of the per-user configuration file.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("tripline").join("config.toml"))
	}

	/// Loads `explicit` if given, else the per-user file if it exists, else
	/// defaults. Returns the path that was read, if any.
	pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
		if let Some(path) = explicit {
			return Ok((Self::load(path)?, Some(path.to_path_buf())));
		}
		match Self::default_path().filter(|p| p.is_file()) {
			Some(path) => {
				tracing::debug!(path = %path.display(), "config.discovered");
				Ok((Self::load(&path)?, Some(path)))
			}
			None => Ok((Self::default(), None)),
		}
	}

	/// Rejects values no subsystem can run with and reports suspicious ones.
	pub fn validate(&self) -> Result<Vec<ConfigWarning>> {
		let invalid = |key, reason: &str| ConfigError::Invalid {
			key,
			reason: reason.to_string(),
		};

		if self.scheduler.max_concurrent == 0 {
			return Err(invalid("scheduler.max_concurrent", "must be at least 1"));
		}
		if !(self.viewport.row_height.is_finite() && self.viewport.row_height > 0.0) {
			return Err(invalid("viewport.row_height", "must be a positive number"));
		}
		if !(self.viewport.viewport_height.is_finite() && self.viewport.viewport_height >= 0.0) {
			return Err(invalid("viewport.viewport_height", "must be a non-negative number"));
		}
		if !(0.0..=1.0).contains(&self.viewport.reveal.threshold) {
			return Err(invalid("viewport.reveal.threshold", "must be between 0 and 1"));
		}
		if !self.viewport.reveal.root_margin.is_finite() {
			return Err(invalid("viewport.reveal.root_margin", "must be finite"));
		}
		if !(0.0..=MAX_DWELL_WEIGHT_FLOOR).contains(&self.prefetch.dwell_weight_floor) {
			return Err(invalid(
				"prefetch.dwell_weight_floor",
				&format!("must be between 0 and {MAX_DWELL_WEIGHT_FLOOR}"),
			));
		}

		let mut warnings = Vec::new();
		if self.prefetch.max_prefetch_items_per_pass == 0 {
			warnings.push(ConfigWarning::Ineffective {
				key: "prefetch",
				because: "max_prefetch_items_per_pass is 0, so passes never submit anything".to_string(),
			});
		} else if self.prefetch.high_value_cap > self.prefetch.max_prefetch_items_per_pass {
			warnings.push(ConfigWarning::Ineffective {
				key: "prefetch.high_value_cap",
				because: format!("a pass submits at most {} items", self.prefetch.max_prefetch_items_per_pass),
			});
		}
		if self.scheduler.default_max_retries > 0 && self.scheduler.base_retry_delay_ms == 0 {
			warnings.push(ConfigWarning::Ineffective {
				key: "scheduler.default_max_retries",
				because: "retries fire immediately with base_retry_delay_ms = 0".to_string(),
			});
		}
		Ok(warnings)
	}
}
