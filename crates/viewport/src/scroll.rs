use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Direction of the most recent position change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
	Up,
	#[default]
	Down,
}

impl ScrollDirection {
	/// Direction implied by moving from `from` to `to`, or `None` when they
	/// are equal.
	pub fn between<T: PartialOrd>(from: T, to: T) -> Option<Self> {
		if to > from {
			Some(Self::Down)
		} else if to < from {
			Some(Self::Up)
		} else {
			None
		}
	}
}

/// Quiescence-debounced "is the user scrolling" flag.
///
/// Any position change sets the flag; it clears once `idle` has elapsed
/// without another change. Time is supplied by the caller.
#[derive(Debug, Clone)]
pub struct ScrollState {
	idle: Duration,
	last_change: Option<Instant>,
	direction: ScrollDirection,
}

impl ScrollState {
	pub fn new(idle: Duration) -> Self {
		Self {
			idle,
			last_change: None,
			direction: ScrollDirection::default(),
		}
	}

	/// Records a position change at `now`.
	pub fn touch(&mut self, direction: Option<ScrollDirection>, now: Instant) {
		self.last_change = Some(now);
		if let Some(direction) = direction {
			self.direction = direction;
		}
	}

	pub fn is_scrolling(&self, now: Instant) -> bool {
		self.last_change.is_some_and(|at| now.saturating_duration_since(at) < self.idle)
	}

	/// Instant at which the flag clears, if it is currently set.
	pub fn idle_deadline(&self) -> Option<Instant> {
		self.last_change.map(|at| at + self.idle)
	}

	pub fn direction(&self) -> ScrollDirection {
		self.direction
	}

	pub fn last_change(&self) -> Option<Instant> {
		self.last_change
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flag_clears_after_quiescence() {
		let t0 = Instant::now();
		let mut state = ScrollState::new(Duration::from_millis(150));
		assert!(!state.is_scrolling(t0));

		state.touch(Some(ScrollDirection::Down), t0);
		assert!(state.is_scrolling(t0 + Duration::from_millis(149)));
		assert!(!state.is_scrolling(t0 + Duration::from_millis(150)));
	}

	#[test]
	fn each_change_restarts_the_window() {
		let t0 = Instant::now();
		let mut state = ScrollState::new(Duration::from_millis(150));
		state.touch(None, t0);
		state.touch(None, t0 + Duration::from_millis(100));
		assert!(state.is_scrolling(t0 + Duration::from_millis(200)));
		assert_eq!(state.idle_deadline(), Some(t0 + Duration::from_millis(250)));
	}

	#[test]
	fn direction_follows_movement() {
		assert_eq!(ScrollDirection::between(3, 5), Some(ScrollDirection::Down));
		assert_eq!(ScrollDirection::between(5.0, 1.5), Some(ScrollDirection::Up));
		assert_eq!(ScrollDirection::between(2, 2), None);

		let mut state = ScrollState::new(Duration::from_millis(150));
		state.touch(ScrollDirection::between(10, 4), Instant::now());
		assert_eq!(state.direction(), ScrollDirection::Up);
		state.touch(None, Instant::now());
		assert_eq!(state.direction(), ScrollDirection::Up);
	}
}
