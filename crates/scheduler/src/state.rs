use std::sync::Arc;
use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::TaskError;
use crate::snapshot::{FailedTask, QueueSnapshot, SchedulerStats, TaskStatus};
use crate::task::{LoadOp, Task, TaskId};
use crate::token::{AttemptClock, CancelScope};

/// Dispatched attempt awaiting settlement.
pub(crate) struct InFlight {
	pub(crate) task: Task,
	pub(crate) attempt: u64,
	pub(crate) token: CancellationToken,
}

/// Failed task waiting out its retry delay.
pub(crate) struct Backoff {
	pub(crate) task: Task,
	pub(crate) attempt: u64,
	pub(crate) token: CancellationToken,
}

/// Everything needed to run one attempt outside the state lock.
pub(crate) struct Launch {
	pub(crate) id: TaskId,
	pub(crate) attempt: u64,
	pub(crate) load: Arc<dyn LoadOp>,
	pub(crate) timeout: Duration,
	pub(crate) token: CancellationToken,
}

/// Retry timer to arm after the state lock is released.
pub(crate) struct RetryTimer {
	pub(crate) delay: Duration,
	pub(crate) attempt: u64,
	pub(crate) token: CancellationToken,
}

/// Outcome of applying an attempt result to the buckets.
pub(crate) enum Settlement {
	/// The attempt was removed, cleared, or superseded; result dropped.
	Stale,
	Completed,
	Retry { retry_count: u32, error: TaskError, timer: RetryTimer },
	Failed { error: TaskError },
}

/// The four task buckets plus backoff bookkeeping.
///
/// Invariant: a task id is present in at most one of `pending`,
/// `in_flight`, `backoff`, `completed`, `failed`.
#[derive(Default)]
pub(crate) struct QueueState {
	pub(crate) pending: IndexMap<TaskId, Task>,
	pub(crate) in_flight: IndexMap<TaskId, InFlight>,
	pub(crate) backoff: IndexMap<TaskId, Backoff>,
	pub(crate) completed: IndexSet<TaskId>,
	pub(crate) failed: IndexMap<TaskId, FailedTask>,
	pub(crate) revision: u64,
	clock: AttemptClock,
	scope: CancelScope,
	dispatched: u64,
	retried: u64,
}

impl QueueState {
	pub(crate) fn status(&self, id: &str) -> Option<TaskStatus> {
		if self.pending.contains_key(id) {
			Some(TaskStatus::Pending)
		} else if self.in_flight.contains_key(id) {
			Some(TaskStatus::InFlight)
		} else if self.backoff.contains_key(id) {
			Some(TaskStatus::BackingOff)
		} else if self.completed.contains(id) {
			Some(TaskStatus::Completed)
		} else if self.failed.contains_key(id) {
			Some(TaskStatus::Failed)
		} else {
			None
		}
	}

	pub(crate) fn contains(&self, id: &str) -> bool {
		self.status(id).is_some()
	}

	fn is_ready(&self, task: &Task) -> bool {
		task.dependencies.iter().all(|dep| self.completed.contains(dep))
	}

	/// Highest-scoring ready task. Ties go to the earliest admission.
	pub(crate) fn select_next(&self) -> Option<TaskId> {
		let mut best: Option<(&TaskId, u32)> = None;
		for (id, task) in &self.pending {
			if !self.is_ready(task) {
				continue;
			}
			let score = task.score();
			if best.is_none_or(|(_, top)| score > top) {
				best = Some((id, score));
			}
		}
		best.map(|(id, _)| id.clone())
	}

	/// Moves `id` from pending to in-flight under a fresh attempt token.
	pub(crate) fn begin(&mut self, id: &TaskId, cfg: &SchedulerConfig) -> Option<Launch> {
		let task = self.pending.shift_remove(id)?;
		let attempt = self.clock.next();
		let token = self.scope.child();
		let launch = Launch {
			id: id.clone(),
			attempt,
			load: Arc::clone(&task.load),
			timeout: task.timeout.unwrap_or_else(|| cfg.default_timeout()),
			token: token.clone(),
		};
		self.in_flight.insert(id.clone(), InFlight { task, attempt, token });
		self.dispatched = self.dispatched.wrapping_add(1);
		Some(launch)
	}

	pub(crate) fn settle(&mut self, id: &TaskId, attempt: u64, outcome: Result<(), TaskError>, cfg: &SchedulerConfig) -> Settlement {
		if self.in_flight.get(id).is_none_or(|entry| entry.attempt != attempt) {
			return Settlement::Stale;
		}
		let Some(entry) = self.in_flight.shift_remove(id) else {
			return Settlement::Stale;
		};

		let error = match outcome {
			Ok(()) => {
				self.completed.insert(id.clone());
				return Settlement::Completed;
			}
			Err(error) => error,
		};

		let mut task = entry.task;
		let max_retries = task.max_retries.unwrap_or(cfg.default_max_retries);
		if task.retry_count < max_retries {
			task.retry_count += 1;
			let retry_count = task.retry_count;
			let timer = RetryTimer {
				delay: cfg.backoff_for(retry_count),
				attempt: self.clock.next(),
				token: self.scope.child(),
			};
			self.backoff.insert(
				id.clone(),
				Backoff {
					task,
					attempt: timer.attempt,
					token: timer.token.clone(),
				},
			);
			self.retried = self.retried.wrapping_add(1);
			Settlement::Retry { retry_count, error, timer }
		} else {
			self.failed.insert(id.clone(), FailedTask { task, error: error.clone() });
			Settlement::Failed { error }
		}
	}

	/// Re-admits a task whose backoff elapsed. Returns false for stale timers.
	pub(crate) fn requeue(&mut self, id: &TaskId, attempt: u64) -> bool {
		if self.backoff.get(id).is_none_or(|entry| entry.attempt != attempt) {
			return false;
		}
		let Some(entry) = self.backoff.shift_remove(id) else {
			return false;
		};
		self.pending.insert(id.clone(), entry.task);
		true
	}

	/// Drops all bookkeeping for `id`, cancelling any live attempt or timer.
	pub(crate) fn remove(&mut self, id: &str) -> bool {
		let mut removed = self.pending.shift_remove(id).is_some();
		if let Some(entry) = self.in_flight.shift_remove(id) {
			entry.token.cancel();
			removed = true;
		}
		if let Some(entry) = self.backoff.shift_remove(id) {
			entry.token.cancel();
			removed = true;
		}
		removed |= self.completed.shift_remove(id);
		removed |= self.failed.shift_remove(id).is_some();
		removed
	}

	/// Applies `f` to the stored task wherever it lives. Completed tasks have
	/// no stored body and are left untouched.
	pub(crate) fn update_task(&mut self, id: &str, f: impl FnOnce(&mut Task)) -> bool {
		if let Some(task) = self.pending.get_mut(id) {
			f(task);
		} else if let Some(entry) = self.in_flight.get_mut(id) {
			f(&mut entry.task);
		} else if let Some(entry) = self.backoff.get_mut(id) {
			f(&mut entry.task);
		} else if let Some(entry) = self.failed.get_mut(id) {
			f(&mut entry.task);
		} else {
			return false;
		}
		true
	}

	/// Moves a terminal failure back to pending with a fresh retry budget.
	pub(crate) fn revive(&mut self, id: &str) -> Option<TaskId> {
		let (key, FailedTask { mut task, .. }) = self.failed.shift_remove_entry(id)?;
		task.retry_count = 0;
		self.pending.insert(key.clone(), task);
		Some(key)
	}

	/// Cancels every attempt and timer, then empties all buckets.
	pub(crate) fn reset(&mut self) {
		self.scope.reset();
		self.pending.clear();
		self.in_flight.clear();
		self.backoff.clear();
		self.completed.clear();
		self.failed.clear();
	}

	pub(crate) fn is_settled(&self) -> bool {
		self.in_flight.is_empty() && self.backoff.is_empty()
	}

	pub(crate) fn snapshot(&self) -> QueueSnapshot {
		QueueSnapshot {
			revision: self.revision,
			pending: self.pending.values().cloned().collect(),
			in_flight: self.in_flight.values().map(|e| e.task.clone()).collect(),
			backing_off: self.backoff.values().map(|e| e.task.clone()).collect(),
			completed: self.completed.iter().cloned().collect(),
			failed: self.failed.values().cloned().collect(),
		}
	}

	pub(crate) fn stats(&self) -> SchedulerStats {
		SchedulerStats {
			pending: self.pending.len(),
			in_flight: self.in_flight.len(),
			backing_off: self.backoff.len(),
			completed: self.completed.len(),
			failed: self.failed.len(),
			dispatched: self.dispatched,
			retried: self.retried,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::LoadError;
	use crate::priority::PriorityTier;
	use crate::task::load_fn;

	fn task(id: &str, tier: PriorityTier, visible: bool) -> Task {
		Task::new(id, tier, load_fn(|_| async { Ok(()) })).visible(visible)
	}

	fn admit(state: &mut QueueState, task: Task) {
		state.pending.insert(task.id.clone(), task);
	}

	#[test]
	fn high_invisible_beats_low_visible() {
		let mut state = QueueState::default();
		admit(&mut state, task("low-visible", PriorityTier::Low, true));
		admit(&mut state, task("high-hidden", PriorityTier::High, false));
		assert_eq!(state.select_next().as_ref().map(TaskId::as_str), Some("high-hidden"));
	}

	#[test]
	fn low_visible_beats_medium_invisible() {
		let mut state = QueueState::default();
		admit(&mut state, task("medium-hidden", PriorityTier::Medium, false));
		admit(&mut state, task("low-visible", PriorityTier::Low, true));
		assert_eq!(state.select_next().as_ref().map(TaskId::as_str), Some("low-visible"));
	}

	#[test]
	fn ties_go_to_earliest_admission() {
		let mut state = QueueState::default();
		admit(&mut state, task("first", PriorityTier::Medium, false));
		admit(&mut state, task("second", PriorityTier::Medium, false));
		admit(&mut state, task("third", PriorityTier::Medium, false));
		assert_eq!(state.select_next().as_ref().map(TaskId::as_str), Some("first"));

		let cfg = SchedulerConfig::default();
		let first = TaskId::new("first");
		assert!(state.begin(&first, &cfg).is_some());
		assert_eq!(state.select_next().as_ref().map(TaskId::as_str), Some("second"));
	}

	#[test]
	fn dependencies_gate_selection() {
		let mut state = QueueState::default();
		admit(&mut state, task("child", PriorityTier::Critical, true).depends_on(["a", "b"]));
		admit(&mut state, task("filler", PriorityTier::Background, false));
		assert_eq!(state.select_next().as_ref().map(TaskId::as_str), Some("filler"));

		state.completed.insert(TaskId::new("a"));
		assert_eq!(state.select_next().as_ref().map(TaskId::as_str), Some("filler"));

		state.completed.insert(TaskId::new("b"));
		assert_eq!(state.select_next().as_ref().map(TaskId::as_str), Some("child"));
	}

	#[test]
	fn failure_walks_retry_budget_then_fails() {
		let cfg = SchedulerConfig::default();
		let mut state = QueueState::default();
		let id = TaskId::new("flaky");
		admit(&mut state, task("flaky", PriorityTier::High, false).max_retries(2));

		for expected_retry in 1..=2 {
			let launch = state.begin(&id, &cfg).expect("task should be pending");
			let err = Err(TaskError::Load(LoadError::failed("nope")));
			let Settlement::Retry { retry_count, timer, .. } = state.settle(&id, launch.attempt, err, &cfg) else {
				panic!("expected retry");
			};
			assert_eq!(retry_count, expected_retry);
			assert_eq!(timer.delay, cfg.backoff_for(expected_retry));
			assert_eq!(state.status("flaky"), Some(TaskStatus::BackingOff));
			assert!(state.requeue(&id, timer.attempt));
		}

		let launch = state.begin(&id, &cfg).expect("task should be pending");
		let outcome = state.settle(&id, launch.attempt, Err(TaskError::Aborted), &cfg);
		assert!(matches!(outcome, Settlement::Failed { error: TaskError::Aborted }));
		assert_eq!(state.status("flaky"), Some(TaskStatus::Failed));
		assert_eq!(state.failed[0].task.retry_count, 2);
	}

	#[test]
	fn stale_attempts_are_ignored() {
		let cfg = SchedulerConfig::default();
		let mut state = QueueState::default();
		let id = TaskId::new("t");
		admit(&mut state, task("t", PriorityTier::Low, false));
		let launch = state.begin(&id, &cfg).expect("pending");

		assert!(state.remove("t"));
		assert!(launch.token.is_cancelled());
		assert!(matches!(state.settle(&id, launch.attempt, Ok(()), &cfg), Settlement::Stale));
		assert!(!state.contains("t"));
	}

	#[test]
	fn reset_cancels_live_attempts() {
		let cfg = SchedulerConfig::default();
		let mut state = QueueState::default();
		let id = TaskId::new("t");
		admit(&mut state, task("t", PriorityTier::Low, false));
		let launch = state.begin(&id, &cfg).expect("pending");
		state.reset();
		assert!(launch.token.is_cancelled());
		assert!(state.snapshot().is_empty());
	}
}
