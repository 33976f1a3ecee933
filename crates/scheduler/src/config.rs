use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduler tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
	/// Upper bound on simultaneously outstanding load operations.
	pub max_concurrent: usize,
	/// Linear backoff unit; retry `n` waits `n` times this long.
	pub base_retry_delay_ms: u64,
	/// Retry budget for tasks that do not set their own.
	pub default_max_retries: u32,
	/// Per-attempt deadline for tasks that do not set their own.
	pub default_timeout_ms: u64,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			max_concurrent: 3,
			base_retry_delay_ms: 1000,
			default_max_retries: 3,
			default_timeout_ms: 10_000,
		}
	}
}

impl SchedulerConfig {
	pub fn base_retry_delay(&self) -> Duration {
		Duration::from_millis(self.base_retry_delay_ms)
	}

	pub fn default_timeout(&self) -> Duration {
		Duration::from_millis(self.default_timeout_ms)
	}

	/// Delay before re-admitting a task that has failed `retry_count` times.
	pub fn backoff_for(&self, retry_count: u32) -> Duration {
		self.base_retry_delay().saturating_mul(retry_count)
	}
}
