use std::time::Duration;

use tripline_scheduler::PriorityTier;
use tripline_viewport::ScrollDirection;

use crate::item::ContentType;

/// Score inputs for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
	pub priority: PriorityTier,
	pub content_type: ContentType,
	pub day_distance: usize,
	pub estimated_dwell: Duration,
	pub estimated_size_bytes: Option<u64>,
}

/// Heuristic value of prefetching a candidate, never negative.
///
/// Items without a size estimate take no size penalty; sizes under 1 KiB
/// are treated as 1 KiB.
pub fn prefetch_score(inputs: &ScoreInputs) -> f64 {
	let size_penalty = inputs
		.estimated_size_bytes
		.map_or(0.0, |bytes| 5.0 * (bytes as f64 / 1024.0).max(1.0).ln());
	let score = f64::from(inputs.priority.weight()) - 20.0 * inputs.day_distance as f64
		+ inputs.content_type.type_weight()
		+ 10.0 * inputs.estimated_dwell.as_secs_f64()
		- size_penalty;
	score.max(0.0)
}

/// Tier a prefetched item is submitted at. Never [`PriorityTier::Critical`].
pub fn tier_for_score(score: f64) -> PriorityTier {
	if score > 800.0 {
		PriorityTier::High
	} else if score > 400.0 {
		PriorityTier::Medium
	} else if score > 100.0 {
		PriorityTier::Low
	} else {
		PriorityTier::Background
	}
}

/// Day indices always worth considering from `current`.
///
/// Days ahead are included up to `radius`. Days behind are included only
/// one step back, or up to `radius` while scrolling up.
pub fn adjacent_day_indices(current: usize, total_days: usize, radius: usize, direction: ScrollDirection) -> Vec<usize> {
	let mut days = Vec::with_capacity(radius * 2);
	for offset in 1..=radius {
		if let Some(ahead) = current.checked_add(offset).filter(|d| *d < total_days) {
			days.push(ahead);
		}
		if (direction == ScrollDirection::Up || offset == 1)
			&& let Some(behind) = current.checked_sub(offset)
		{
			days.push(behind);
		}
	}
	days
}
