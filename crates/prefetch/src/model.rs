use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tripline_viewport::ScrollDirection;

/// Running picture of how the user moves through the itinerary.
#[derive(Debug, Clone, Default)]
pub struct UserInteractionModel {
	/// Latest dwell per item id.
	pub per_item_dwell: IndexMap<String, Duration>,
	pub scroll_direction: ScrollDirection,
	pub last_scroll: Option<Instant>,
	total_dwell: Duration,
	samples: u32,
}

impl UserInteractionModel {
	/// Records one visibility interval for `id`.
	pub fn record_dwell(&mut self, id: &str, dwell: Duration) {
		self.per_item_dwell.insert(id.to_owned(), dwell);
		self.total_dwell = self.total_dwell.saturating_add(dwell);
		self.samples = self.samples.saturating_add(1);
	}

	/// Mean of every dwell ever recorded, or zero before the first one.
	pub fn running_average(&self) -> Duration {
		match self.samples {
			0 => Duration::ZERO,
			n => self.total_dwell / n,
		}
	}

	pub fn samples(&self) -> u32 {
		self.samples
	}

	/// Best guess of how long the user will look at an item: its own last
	/// dwell, else its day's, else zero.
	pub fn estimated_dwell(&self, id: &str, day_id: &str) -> Duration {
		self.per_item_dwell
			.get(id)
			.or_else(|| self.per_item_dwell.get(day_id))
			.copied()
			.unwrap_or_default()
	}

	/// Updates direction from a move between day indices. Equal indices
	/// keep the previous direction.
	pub fn observe_move(&mut self, from: Option<usize>, to: usize, now: Instant) -> ScrollDirection {
		if let Some(direction) = from.and_then(|from| ScrollDirection::between(from, to)) {
			self.scroll_direction = direction;
		}
		self.last_scroll = Some(now);
		self.scroll_direction
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn average_covers_every_report() {
		let mut model = UserInteractionModel::default();
		assert_eq!(model.running_average(), Duration::ZERO);
		model.record_dwell("a", Duration::from_secs(2));
		model.record_dwell("a", Duration::from_secs(4));
		model.record_dwell("b", Duration::from_secs(6));
		assert_eq!(model.running_average(), Duration::from_secs(4));
		assert_eq!(model.per_item_dwell.get("a"), Some(&Duration::from_secs(4)));
	}

	#[test]
	fn estimate_falls_back_to_the_day() {
		let mut model = UserInteractionModel::default();
		model.record_dwell("day-2", Duration::from_secs(3));
		assert_eq!(model.estimated_dwell("hotel-9", "day-2"), Duration::from_secs(3));
		assert_eq!(model.estimated_dwell("hotel-9", "day-5"), Duration::ZERO);
	}

	#[test]
	fn direction_sticks_when_not_moving() {
		let now = Instant::now();
		let mut model = UserInteractionModel::default();
		assert_eq!(model.observe_move(Some(5), 3, now), ScrollDirection::Up);
		assert_eq!(model.observe_move(Some(3), 3, now), ScrollDirection::Up);
		assert_eq!(model.observe_move(None, 9, now), ScrollDirection::Up);
		assert_eq!(model.observe_move(Some(3), 4, now), ScrollDirection::Down);
	}
}
