use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reveal::RevealConfig;
use crate::window::WindowSpec;

/// Viewport geometry and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewportConfig {
	pub row_height: f64,
	pub viewport_height: f64,
	pub overscan_rows: usize,
	/// Quiescence after which the list stops counting as scrolling.
	pub scroll_idle_ms: u64,
	pub reveal: RevealConfig,
}

impl Default for ViewportConfig {
	fn default() -> Self {
		Self {
			row_height: 50.0,
			viewport_height: 500.0,
			overscan_rows: 5,
			scroll_idle_ms: 150,
			reveal: RevealConfig::default(),
		}
	}
}

impl ViewportConfig {
	pub fn scroll_idle(&self) -> Duration {
		Duration::from_millis(self.scroll_idle_ms)
	}

	pub fn window_spec(&self, item_count: usize) -> WindowSpec {
		WindowSpec {
			item_count,
			row_height: self.row_height,
			viewport_height: self.viewport_height,
			overscan_rows: self.overscan_rows,
		}
	}
}
