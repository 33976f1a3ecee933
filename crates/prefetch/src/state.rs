use std::sync::Arc;
use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use tokio_util::sync::CancellationToken;
use tripline_scheduler::{PriorityTier, Task, TaskId};
use tripline_viewport::ScrollDirection;

use crate::config::PrefetchConfig;
use crate::item::PrefetchableItem;
use crate::model::UserInteractionModel;
use crate::score::{ScoreInputs, adjacent_day_indices, prefetch_score, tier_for_score};

/// One candidate chosen by a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
	pub id: TaskId,
	pub day_index: Option<usize>,
	pub day_distance: usize,
	pub score: f64,
	pub tier: PriorityTier,
}

/// Outcome of one prefetch pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrefetchPass {
	pub current_day: Option<usize>,
	pub direction: ScrollDirection,
	/// Registered candidates before the pass.
	pub candidates: usize,
	/// Highest score first.
	pub selected: Vec<Selection>,
	/// Selected items the scheduler did not already know.
	pub admitted: usize,
}

/// Timer slot tagged with a sequence number so a timer that fires after
/// being replaced can tell.
pub(crate) struct Timer {
	pub seq: u64,
	pub token: CancellationToken,
}

#[derive(Default)]
pub(crate) struct EngineState {
	pub registry: IndexMap<TaskId, PrefetchableItem>,
	pub days: IndexSet<Arc<str>>,
	pub model: UserInteractionModel,
	pub current_day: Option<usize>,
	pub total_days: usize,
	pub debounce: Option<Timer>,
	pub item_timers: IndexMap<TaskId, Timer>,
	pub timer_seq: u64,
	pub passes: u64,
}

impl EngineState {
	pub fn next_timer(&mut self) -> Timer {
		self.timer_seq += 1;
		Timer {
			seq: self.timer_seq,
			token: CancellationToken::new(),
		}
	}

	pub fn day_index(&self, item: &PrefetchableItem) -> Option<usize> {
		self.days.get_index_of(&*item.day_id)
	}

	/// Scores `item` against the current position. Items with no known day
	/// or no current position sit just outside the nearby radius.
	pub fn evaluate(&self, item: &PrefetchableItem, config: &PrefetchConfig) -> Selection {
		let day_index = self.day_index(item);
		let day_distance = match (day_index, self.current_day) {
			(Some(day), Some(current)) => day.abs_diff(current),
			_ => config.prefetch_radius + 1,
		};
		let score = prefetch_score(&ScoreInputs {
			priority: item.priority,
			content_type: item.content_type,
			day_distance,
			estimated_dwell: self.model.estimated_dwell(item.id.as_str(), &item.day_id),
			estimated_size_bytes: item.estimated_size_bytes,
		});
		Selection {
			id: item.id.clone(),
			day_index,
			day_distance,
			score,
			tier: tier_for_score(score),
		}
	}

	/// Picks this pass's winners without mutating anything.
	///
	/// Candidates are the union of adjacent-day, nearby and high-value items,
	/// ranked by score and truncated to the per-pass limit.
	pub fn select(&self, config: &PrefetchConfig) -> Vec<Selection> {
		let mut chosen: IndexSet<&TaskId> = IndexSet::new();

		if let Some(current) = self.current_day {
			let adjacent = adjacent_day_indices(current, self.total_days, config.adjacent_day_radius, self.model.scroll_direction);
			for (id, item) in &self.registry {
				let Some(day) = self.day_index(item) else {
					continue;
				};
				if adjacent.contains(&day) || day.abs_diff(current) <= config.prefetch_radius {
					chosen.insert(id);
				}
			}
		}

		let average = self.model.running_average();
		if average > Duration::ZERO {
			// Float seconds; NaN or negative factors clamp to 0.
			let floor = config.dwell_weight_floor.max(0.0) * average.as_secs_f64();
			let mut valuable: Vec<(&TaskId, Duration)> = self
				.registry
				.iter()
				.map(|(id, item)| (id, self.model.estimated_dwell(id.as_str(), &item.day_id)))
				.filter(|(_, dwell)| dwell.as_secs_f64() > floor)
				.collect();
			valuable.sort_by(|a, b| b.1.cmp(&a.1));
			chosen.extend(valuable.into_iter().take(config.high_value_cap).map(|(id, _)| id));
		}

		let mut ranked: Vec<Selection> = chosen
			.into_iter()
			.filter_map(|id| self.registry.get(id))
			.map(|item| self.evaluate(item, config))
			.collect();
		ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
		ranked.truncate(config.max_prefetch_items_per_pass);
		ranked
	}

	/// Removes selected items from the registry and converts them to tasks.
	pub fn consume(&mut self, selected: &[Selection]) -> Vec<Task> {
		selected
			.iter()
			.filter_map(|sel| {
				if let Some(timer) = self.item_timers.shift_remove(&sel.id) {
					timer.token.cancel();
				}
				let item = self.registry.shift_remove(&sel.id)?;
				Some(item.into_task(sel.tier))
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use rstest::rstest;
	use tripline_scheduler::load_fn;

	use super::*;
	use crate::item::ContentType;

	fn item(id: &str, content_type: ContentType, day: &str) -> PrefetchableItem {
		PrefetchableItem::new(id, content_type, day, PriorityTier::Medium, load_fn(|_| async { Ok(()) }))
	}

	fn ten_days() -> EngineState {
		let mut state = EngineState {
			days: (0..10).map(|d| Arc::from(format!("day-{d}"))).collect(),
			total_days: 10,
			..EngineState::default()
		};
		for d in 0..10 {
			let day = format!("day-{d}");
			state.registry.insert(TaskId::new(&day), item(&day, ContentType::Day, &day));
		}
		state
	}

	fn selected_days(selection: &[Selection]) -> Vec<usize> {
		let mut days: Vec<usize> = selection.iter().filter_map(|s| s.day_index).collect();
		days.sort_unstable();
		days
	}

	#[test]
	fn moving_down_selects_ahead_and_one_behind() {
		let config = PrefetchConfig {
			prefetch_radius: 0,
			..PrefetchConfig::default()
		};
		let mut state = ten_days();
		let now = std::time::Instant::now();
		state.model.observe_move(None, 3, now);
		state.model.observe_move(Some(3), 5, now);
		state.current_day = Some(5);

		assert_eq!(selected_days(&state.select(&config)), vec![4, 5, 6, 7]);
	}

	#[test]
	fn nearby_radius_reaches_both_ways() {
		let mut state = ten_days();
		state.current_day = Some(5);
		assert_eq!(selected_days(&state.select(&PrefetchConfig::default())), vec![2, 3, 4, 5, 6, 7, 8]);
	}

	#[test]
	fn high_value_items_join_from_far_away() {
		let config = PrefetchConfig {
			prefetch_radius: 0,
			adjacent_day_radius: 0,
			..PrefetchConfig::default()
		};
		let mut state = ten_days();
		state.registry.insert(TaskId::new("hotel-far"), item("hotel-far", ContentType::Hotel, "day-9"));
		state.model.record_dwell("hotel-far", Duration::from_secs(25));
		state.model.record_dwell("elsewhere", Duration::from_secs(2));
		state.current_day = Some(0);

		let selection = state.select(&config);
		let ids: Vec<&str> = selection.iter().map(|s| s.id.as_str()).collect();
		assert_eq!(ids, vec!["hotel-far", "day-0"]);
	}

	#[rstest]
	#[case::negative(-1.0, vec!["img-1", "img-2"])]
	#[case::nan(f64::NAN, vec!["img-1", "img-2"])]
	#[case::huge(1e300, vec![])]
	#[case::infinite(f64::INFINITY, vec![])]
	fn out_of_range_dwell_floor_never_panics(#[case] floor: f64, #[case] expected: Vec<&str>) {
		let config = PrefetchConfig {
			dwell_weight_floor: floor,
			..PrefetchConfig::default()
		};
		let mut state = EngineState::default();
		for (n, secs) in [(1, 4), (2, 2)] {
			let id = format!("img-{n}");
			state.registry.insert(TaskId::new(&id), item(&id, ContentType::Image, "unknown"));
			state.model.record_dwell(&id, Duration::from_secs(secs));
		}
		state.registry.insert(TaskId::new("img-unseen"), item("img-unseen", ContentType::Image, "unknown"));

		let mut ids: Vec<String> = state.select(&config).iter().map(|s| s.id.to_string()).collect();
		ids.sort();
		assert_eq!(ids, expected);
	}

	#[test]
	fn default_radius_also_reaches_two_days_behind() {
		let mut state = ten_days();
		let now = std::time::Instant::now();
		state.model.observe_move(None, 3, now);
		state.model.observe_move(Some(3), 5, now);
		state.current_day = Some(5);

		let days = selected_days(&state.select(&PrefetchConfig::default()));
		assert_eq!(days, vec![2, 3, 4, 5, 6, 7, 8]);
		assert!(!days.contains(&1));
	}

	#[test]
	fn high_value_respects_the_cap() {
		let config = PrefetchConfig {
			high_value_cap: 2,
			..PrefetchConfig::default()
		};
		let mut state = EngineState::default();
		for (n, secs) in [(1, 20), (2, 30), (3, 25), (4, 1)] {
			let id = format!("img-{n}");
			state.registry.insert(TaskId::new(&id), item(&id, ContentType::Image, "unknown"));
			state.model.record_dwell(&id, Duration::from_secs(secs));
		}

		let mut ids: Vec<String> = state.select(&config).iter().map(|s| s.id.to_string()).collect();
		ids.sort();
		assert_eq!(ids, vec!["img-2", "img-3"]);
	}

	#[test]
	fn ranking_is_by_score_and_truncated() {
		let config = PrefetchConfig {
			max_prefetch_items_per_pass: 3,
			..PrefetchConfig::default()
		};
		let mut state = ten_days();
		state.current_day = Some(5);

		let selection = state.select(&config);
		assert_eq!(selection.len(), 3);
		assert_eq!(selection[0].day_index, Some(5));
		assert!(selection.windows(2).all(|w| w[0].score >= w[1].score));
		assert!(selection.iter().all(|s| s.tier != PriorityTier::Critical));
	}

	#[test]
	fn consume_removes_from_registry() {
		let mut state = ten_days();
		state.current_day = Some(0);
		let selection = state.select(&PrefetchConfig::default());
		let tasks = state.consume(&selection);
		assert_eq!(tasks.len(), selection.len());
		assert!(selection.iter().all(|s| !state.registry.contains_key(&s.id)));
		assert_eq!(tasks[0].priority, selection[0].tier);
	}
}
