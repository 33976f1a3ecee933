use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use rand::Rng;
use tripline_prefetch::{ContentType, PrefetchableItem};
use tripline_scheduler::{CancellationToken, LoadError, LoadOp, PriorityTier, Task, TaskId, load_fn};
use tripline_viewport::Fidelity;

/// Consecutive failures an item can be dealt before it starts succeeding.
const MAX_INJECTED_FAILURES: u32 = 5;

pub struct SimItem {
	pub id: TaskId,
	pub content_type: ContentType,
	pub size_bytes: u64,
	pub latency: Duration,
	load: Arc<dyn LoadOp>,
}

/// One itinerary day. `items[0]` is the day summary the rest depend on.
pub struct Day {
	pub id: String,
	pub items: Vec<SimItem>,
}

pub struct Itinerary {
	pub days: Vec<Day>,
}

impl Itinerary {
	/// Builds `days` days of `items_per_day` extra items each.
	///
	/// Every load attempt fails independently with `failure_rate` until its
	/// first success, with at most [`MAX_INJECTED_FAILURES`] failures.
	pub fn generate(rng: &mut impl Rng, days: usize, items_per_day: usize, failure_rate: f64) -> Self {
		let days = (0..days)
			.map(|d| {
				let id = format!("day-{d:03}");
				let mut items = Vec::with_capacity(items_per_day + 1);
				items.push(SimItem::generate(rng, format!("{id}/summary"), ContentType::Day, failure_rate));
				for n in 0..items_per_day {
					let content_type = ContentType::ALL[rng.random_range(1..ContentType::ALL.len())];
					items.push(SimItem::generate(rng, format!("{id}/{content_type}-{n}"), content_type, failure_rate));
				}
				Day { id, items }
			})
			.collect();
		Self { days }
	}

	pub fn day_ids(&self) -> impl Iterator<Item = &str> {
		self.days.iter().map(|d| d.id.as_str())
	}

	pub fn item_count(&self) -> usize {
		self.days.iter().map(|d| d.items.len()).sum()
	}

	/// Every item as a prefetch candidate.
	pub fn prefetchable(&self) -> Vec<PrefetchableItem> {
		self.days
			.iter()
			.flat_map(|day| {
				day.items.iter().map(move |item| {
					PrefetchableItem::new(item.id.clone(), item.content_type, &day.id, base_tier(item.content_type), Arc::clone(&item.load))
						.size_bytes(item.size_bytes)
						.depends_on(day.dependencies_of(item))
				})
			})
			.collect()
	}
}

impl Day {
	fn summary_id(&self) -> Option<&TaskId> {
		self.items.first().map(|item| &item.id)
	}

	fn dependencies_of(&self, item: &SimItem) -> Vec<TaskId> {
		self.summary_id().filter(|summary| **summary != item.id).cloned().into_iter().collect()
	}

	/// Tasks for a mounted row. Reduced-fidelity rows skip images.
	pub fn tasks(&self, fidelity: Fidelity, visible: bool) -> Vec<Task> {
		self.items
			.iter()
			.filter(|item| fidelity == Fidelity::Full || item.content_type != ContentType::Image)
			.map(|item| {
				Task::new(item.id.clone(), base_tier(item.content_type), Arc::clone(&item.load))
					.visible(visible)
					.depends_on(self.dependencies_of(item))
					.estimated_duration(item.latency)
			})
			.collect()
	}
}

impl SimItem {
	fn generate(rng: &mut impl Rng, id: String, content_type: ContentType, failure_rate: f64) -> Self {
		let mut failures = 0;
		while failures < MAX_INJECTED_FAILURES && rng.random_bool(failure_rate) {
			failures += 1;
		}
		let size_bytes = match content_type {
			ContentType::Image => rng.random_range(200_000..3_000_000),
			_ => rng.random_range(2_000..50_000),
		};
		let latency = Duration::from_millis(rng.random_range(20..200));
		Self {
			id: TaskId::from(id),
			content_type,
			size_bytes,
			latency,
			load: simulated_load(latency, failures),
		}
	}
}

/// Tier content is requested at when its row is on screen.
fn base_tier(content_type: ContentType) -> PriorityTier {
	match content_type {
		ContentType::Day => PriorityTier::Critical,
		ContentType::Hotel | ContentType::Flight => PriorityTier::High,
		ContentType::Activity => PriorityTier::Medium,
		ContentType::Image => PriorityTier::Low,
	}
}

/// Load that takes `latency` and fails its first `failures` attempts.
fn simulated_load(latency: Duration, failures: u32) -> Arc<dyn LoadOp> {
	let attempts = Arc::new(AtomicU32::new(0));
	load_fn(move |cancel: CancellationToken| {
		let attempt = attempts.fetch_add(1, Ordering::Relaxed);
		async move {
			tokio::select! {
				() = cancel.cancelled() => Err(LoadError::Cancelled),
				() = tokio::time::sleep(latency) => {
					if attempt < failures {
						Err(LoadError::failed(format!("simulated outage (attempt {})", attempt + 1)))
					} else {
						Ok(())
					}
				}
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	use super::*;

	#[test]
	fn generation_is_seeded() {
		let a = Itinerary::generate(&mut StdRng::seed_from_u64(7), 4, 3, 0.2);
		let b = Itinerary::generate(&mut StdRng::seed_from_u64(7), 4, 3, 0.2);
		let ids = |it: &Itinerary| it.days.iter().flat_map(|d| d.items.iter().map(|i| i.id.to_string())).collect::<Vec<_>>();
		assert_eq!(ids(&a), ids(&b));
		assert_eq!(a.item_count(), 16);
		assert_eq!(a.day_ids().collect::<Vec<_>>(), vec!["day-000", "day-001", "day-002", "day-003"]);
	}

	#[test]
	fn items_depend_on_their_day_summary() {
		let itinerary = Itinerary::generate(&mut StdRng::seed_from_u64(1), 1, 2, 0.0);
		let tasks = itinerary.days[0].tasks(Fidelity::Full, true);
		assert_eq!(tasks.len(), 3);
		assert!(tasks[0].dependencies.is_empty());
		assert_eq!(tasks[1].dependencies, vec![TaskId::new("day-000/summary")]);
		assert!(tasks.iter().all(|t| t.is_visible));
	}

	#[test]
	fn reduced_rows_skip_images() {
		let itinerary = Itinerary::generate(&mut StdRng::seed_from_u64(3), 1, 12, 0.0);
		let day = &itinerary.days[0];
		let images = day.items.iter().filter(|i| i.content_type == ContentType::Image).count();
		assert_eq!(day.tasks(Fidelity::Reduced, false).len(), day.items.len() - images);
	}

	#[tokio::test(start_paused = true)]
	async fn injected_failures_precede_success() {
		let load = simulated_load(Duration::from_millis(10), 2);
		let token = CancellationToken::new();
		assert!(load.load(token.clone()).await.is_err());
		assert!(load.load(token.clone()).await.is_err());
		assert_eq!(load.load(token).await, Ok(()));
	}
}
