use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tripline_scheduler::{Scheduler, TaskId};
use tripline_viewport::DwellSink;

use crate::config::PrefetchConfig;
use crate::item::PrefetchableItem;
use crate::model::UserInteractionModel;
use crate::state::{EngineState, PrefetchPass, Timer};

struct Inner {
	config: PrefetchConfig,
	scheduler: Scheduler,
	state: Mutex<EngineState>,
}

/// Turns position and dwell signals into speculative scheduler tasks.
///
/// Position updates are debounced; once the user settles, one pass picks
/// the best registered candidates and submits them to the scheduler.
/// Cloning yields another handle to the same engine. Timers run on the
/// scheduler's runtime.
#[derive(Clone)]
pub struct PrefetchEngine {
	inner: Arc<Inner>,
}

impl PrefetchEngine {
	pub fn new(config: PrefetchConfig, scheduler: Scheduler) -> Self {
		Self {
			inner: Arc::new(Inner {
				config,
				scheduler,
				state: Mutex::new(EngineState::default()),
			}),
		}
	}

	pub fn config(&self) -> &PrefetchConfig {
		&self.inner.config
	}

	pub fn scheduler(&self) -> &Scheduler {
		&self.inner.scheduler
	}

	/// Establishes the day order used to turn an item's day id into an index.
	pub fn set_days<I, T>(&self, days: I)
	where
		I: IntoIterator<Item = T>,
		T: AsRef<str>,
	{
		let mut state = self.inner.state.lock();
		state.days = days.into_iter().map(|d| Arc::from(d.as_ref())).collect();
		tracing::debug!(days = state.days.len(), "prefetch.set_days");
	}

	/// Records the day the user is looking at and restarts the debounce.
	pub fn update_current_position(&self, day_index: usize, total_days: usize) {
		let timer = {
			let mut state = self.inner.state.lock();
			let previous = state.current_day;
			let direction = state.model.observe_move(previous, day_index, now());
			state.current_day = Some(day_index);
			state.total_days = total_days;
			tracing::trace!(day_index, total_days, ?direction, "prefetch.position");

			let timer = state.next_timer();
			let (seq, token) = (timer.seq, timer.token.clone());
			if let Some(old) = state.debounce.replace(timer) {
				old.token.cancel();
			}
			(seq, token)
		};

		let engine = self.clone();
		let delay = self.inner.config.prefetch_delay();
		let (seq, token) = timer;
		self.inner.scheduler.spawn("prefetch.debounce", async move {
			tokio::select! {
				() = token.cancelled() => {}
				() = tokio::time::sleep(delay) => engine.fire_debounce(seq),
			}
		});
	}

	fn fire_debounce(&self, seq: u64) {
		{
			let mut state = self.inner.state.lock();
			if state.debounce.as_ref().map(|t| t.seq) != Some(seq) {
				return;
			}
			state.debounce = None;
		}
		self.run_pass("debounce");
	}

	/// Registers candidates, replacing any with the same id.
	pub fn add_candidates(&self, items: impl IntoIterator<Item = PrefetchableItem>) {
		let mut state = self.inner.state.lock();
		let before = state.registry.len();
		for item in items {
			state.registry.insert(item.id.clone(), item);
		}
		tracing::trace!(added = state.registry.len() - before, total = state.registry.len(), "prefetch.add_candidates");
	}

	/// Deregisters candidates and cancels their item timers.
	pub fn remove_candidates<I, T>(&self, ids: I)
	where
		I: IntoIterator<Item = T>,
		T: AsRef<str>,
	{
		let mut state = self.inner.state.lock();
		for id in ids {
			let id = id.as_ref();
			state.registry.shift_remove(id);
			if let Some(timer) = state.item_timers.shift_remove(id) {
				timer.token.cancel();
			}
		}
	}

	/// Records one visibility interval reported by the viewport.
	pub fn record_dwell_time(&self, id: &str, start: Instant, end: Instant) {
		let dwell = end.saturating_duration_since(start);
		let mut state = self.inner.state.lock();
		state.model.record_dwell(id, dwell);
		tracing::trace!(
			item_id = id,
			dwell_ms = dwell.as_millis() as u64,
			average_ms = state.model.running_average().as_millis() as u64,
			"prefetch.dwell"
		);
	}

	/// Submits one registered item after `delay`, independent of passes.
	///
	/// Re-arming replaces the item's previous timer. Returns false if `id`
	/// is not registered.
	pub fn prefetch_after(&self, id: &str, delay: Duration) -> bool {
		let (key, seq, token) = {
			let mut state = self.inner.state.lock();
			let Some(key) = state.registry.get_key_value(id).map(|(k, _)| k.clone()) else {
				return false;
			};
			let timer = state.next_timer();
			let (seq, token) = (timer.seq, timer.token.clone());
			if let Some(old) = state.item_timers.insert(key.clone(), timer) {
				old.token.cancel();
			}
			(key, seq, token)
		};

		let engine = self.clone();
		self.inner.scheduler.spawn("prefetch.item_timer", async move {
			tokio::select! {
				() = token.cancelled() => {}
				() = tokio::time::sleep(delay) => engine.fire_item(&key, seq),
			}
		});
		true
	}

	fn fire_item(&self, id: &TaskId, seq: u64) {
		let task = {
			let mut state = self.inner.state.lock();
			if state.item_timers.get(id).map(|t| t.seq) != Some(seq) {
				return;
			}
			state.item_timers.shift_remove(id);
			let Some(item) = state.registry.get(id) else {
				return;
			};
			let selection = state.evaluate(item, &self.inner.config);
			state.consume(std::slice::from_ref(&selection)).pop()
		};
		if let Some(task) = task {
			let priority = task.priority;
			let admitted = self.inner.scheduler.add_task(task);
			tracing::debug!(item_id = %id, %priority, admitted, "prefetch.item_timer");
		}
	}

	/// Cancels any pending debounce and runs a pass now.
	pub fn flush(&self) -> PrefetchPass {
		if let Some(timer) = self.inner.state.lock().debounce.take() {
			timer.token.cancel();
		}
		self.run_pass("flush")
	}

	fn run_pass(&self, trigger: &'static str) -> PrefetchPass {
		let (mut pass, tasks) = {
			let mut state = self.inner.state.lock();
			let selected = state.select(&self.inner.config);
			let pass = PrefetchPass {
				current_day: state.current_day,
				direction: state.model.scroll_direction,
				candidates: state.registry.len(),
				selected,
				admitted: 0,
			};
			let tasks = state.consume(&pass.selected);
			state.passes += 1;
			(pass, tasks)
		};

		pass.admitted = tasks
			.into_iter()
			.map(|task| self.inner.scheduler.add_task(task))
			.filter(|admitted| *admitted)
			.count();
		tracing::debug!(
			trigger,
			day_index = pass.current_day,
			candidates = pass.candidates,
			selected = pass.selected.len(),
			admitted = pass.admitted,
			"prefetch.pass"
		);
		pass
	}

	pub fn candidate_count(&self) -> usize {
		self.inner.state.lock().registry.len()
	}

	pub fn is_candidate(&self, id: &str) -> bool {
		self.inner.state.lock().registry.contains_key(id)
	}

	pub fn current_day(&self) -> Option<usize> {
		self.inner.state.lock().current_day
	}

	/// Number of passes run so far.
	pub fn passes(&self) -> u64 {
		self.inner.state.lock().passes
	}

	pub fn interaction_model(&self) -> UserInteractionModel {
		self.inner.state.lock().model.clone()
	}
}

impl DwellSink for PrefetchEngine {
	fn record_dwell(&self, id: &str, start: Instant, end: Instant) {
		self.record_dwell_time(id, start, end);
	}
}

impl std::fmt::Debug for PrefetchEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PrefetchEngine")
			.field("config", &self.inner.config)
			.field("candidates", &self.candidate_count())
			.finish_non_exhaustive()
	}
}

/// Wall time that follows tokio's clock, so paused tests see it advance.
fn now() -> Instant {
	tokio::time::Instant::now().into_std()
}
