use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Prefetch heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrefetchConfig {
	/// Days around the current one that are always considered.
	pub adjacent_day_radius: usize,
	/// Day distance within which any item counts as nearby.
	pub prefetch_radius: usize,
	/// Upper bound on items submitted per pass.
	pub max_prefetch_items_per_pass: usize,
	/// Debounce between the last position update and a pass.
	pub prefetch_delay_ms: u64,
	/// Fraction of the running average dwell an item must exceed to count
	/// as high value.
	pub dwell_weight_floor: f64,
	pub high_value_cap: usize,
}

impl Default for PrefetchConfig {
	fn default() -> Self {
		Self {
			adjacent_day_radius: 2,
			prefetch_radius: 3,
			max_prefetch_items_per_pass: 10,
			prefetch_delay_ms: 1000,
			dwell_weight_floor: 0.8,
			high_value_cap: 5,
		}
	}
}

impl PrefetchConfig {
	pub fn prefetch_delay(&self) -> Duration {
		Duration::from_millis(self.prefetch_delay_ms)
	}
}
