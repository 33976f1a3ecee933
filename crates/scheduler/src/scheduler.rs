use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::TaskError;
use crate::listeners::{ListenerRegistry, Subscription};
use crate::priority::PriorityTier;
use crate::snapshot::{QueueSnapshot, SchedulerStats, TaskStatus};
use crate::spawn::{runtime_handle, spawn};
use crate::state::{Launch, QueueState, RetryTimer, Settlement};
use crate::task::{LoadOp, Task, TaskId};

struct Inner {
	config: SchedulerConfig,
	handle: Handle,
	state: Mutex<QueueState>,
	listeners: Arc<ListenerRegistry>,
	revisions: watch::Sender<u64>,
}

/// Concurrency-bounded, dependency-aware, retrying task scheduler.
///
/// Cloning yields another handle to the same queue. All bucket mutation is
/// serialized behind one lock; attempts and retry timers run as tasks on
/// the runtime captured at construction.
#[derive(Clone)]
pub struct Scheduler {
	inner: Arc<Inner>,
}

impl Scheduler {
	/// Creates a scheduler on the ambient tokio runtime (or a shared
	/// fallback runtime outside any tokio context).
	pub fn new(config: SchedulerConfig) -> Self {
		Self::with_handle(config, runtime_handle())
	}

	/// Creates a scheduler that spawns attempts on `handle`.
	///
	/// A `max_concurrent` of 0 would never dispatch and is raised to 1.
	pub fn with_handle(mut config: SchedulerConfig, handle: Handle) -> Self {
		if config.max_concurrent == 0 {
			tracing::warn!("scheduler.max_concurrent_zero_clamped");
			config.max_concurrent = 1;
		}
		let (revisions, _) = watch::channel(0);
		Self {
			inner: Arc::new(Inner {
				config,
				handle,
				state: Mutex::new(QueueState::default()),
				listeners: Arc::new(ListenerRegistry::default()),
				revisions,
			}),
		}
	}

	pub fn config(&self) -> &SchedulerConfig {
		&self.inner.config
	}

	/// Runtime that attempts and retry timers are spawned on.
	pub fn handle(&self) -> &Handle {
		&self.inner.handle
	}

	/// Spawns detached work on the scheduler's runtime with a tracing label.
	///
	/// Lets collaborators such as timers share the scheduler's runtime.
	pub fn spawn<F>(&self, label: &'static str, fut: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		spawn(&self.inner.handle, label, fut);
	}

	/// Admits `task` into pending and dispatches.
	///
	/// Returns false without touching the queue if the id is already known
	/// in any bucket or is waiting out a retry delay.
	pub fn add_task(&self, mut task: Task) -> bool {
		let snapshot = {
			let mut state = self.inner.state.lock();
			if state.contains(task.id.as_str()) {
				tracing::trace!(task_id = %task.id, "scheduler.add_task.duplicate");
				return false;
			}
			task.max_retries.get_or_insert(self.inner.config.default_max_retries);
			task.timeout.get_or_insert_with(|| self.inner.config.default_timeout());
			tracing::debug!(
				task_id = %task.id,
				priority = %task.priority,
				visible = task.is_visible,
				deps = task.dependencies.len(),
				"scheduler.add_task"
			);
			state.pending.insert(task.id.clone(), task);
			self.commit(&mut state)
		};
		self.deliver(snapshot);
		self.pump();
		true
	}

	/// Forgets `id` everywhere and cancels its live attempt or retry timer.
	///
	/// A load that ignores its cancellation token keeps running; its result
	/// is discarded.
	pub fn remove_task(&self, id: &str) -> bool {
		let snapshot = {
			let mut state = self.inner.state.lock();
			if !state.remove(id) {
				return false;
			}
			tracing::debug!(task_id = id, "scheduler.remove_task");
			self.commit(&mut state)
		};
		self.deliver(snapshot);
		self.pump();
		true
	}

	pub fn update_priority(&self, id: &str, priority: PriorityTier) -> bool {
		self.update(id, |task| task.priority = priority)
	}

	/// Records whether the task's row is on screen.
	///
	/// Visibility affects selection through [`PriorityTier::effective`]; the
	/// stored tier is left as admitted.
	pub fn update_visibility(&self, id: &str, visible: bool) -> bool {
		self.update(id, |task| task.is_visible = visible)
	}

	fn update(&self, id: &str, f: impl FnOnce(&mut Task)) -> bool {
		let snapshot = {
			let mut state = self.inner.state.lock();
			if !state.update_task(id, f) {
				return false;
			}
			self.commit(&mut state)
		};
		self.deliver(snapshot);
		self.pump();
		true
	}

	/// Cancels every in-flight attempt and retry timer, then empties all
	/// buckets. Tasks added afterwards run under a fresh cancellation scope.
	pub fn clear(&self) {
		let snapshot = {
			let mut state = self.inner.state.lock();
			tracing::debug!(in_flight = state.in_flight.len(), pending = state.pending.len(), "scheduler.clear");
			state.reset();
			self.commit(&mut state)
		};
		self.deliver(snapshot);
	}

	/// Re-admits a terminally failed task with a fresh retry budget.
	pub fn retry_failed(&self, id: &str) -> bool {
		let snapshot = {
			let mut state = self.inner.state.lock();
			let Some(id) = state.revive(id) else {
				return false;
			};
			tracing::debug!(task_id = %id, "scheduler.retry_failed");
			self.commit(&mut state)
		};
		self.deliver(snapshot);
		self.pump();
		true
	}

	/// Registers a listener that receives a full snapshot after every
	/// mutation. Dropping the returned [`Subscription`] unsubscribes.
	pub fn subscribe(&self, listener: impl Fn(&QueueSnapshot) + Send + Sync + 'static) -> Subscription {
		self.inner.listeners.insert(Arc::new(listener))
	}

	pub fn snapshot(&self) -> QueueSnapshot {
		self.inner.state.lock().snapshot()
	}

	pub fn status(&self, id: &str) -> Option<TaskStatus> {
		self.inner.state.lock().status(id)
	}

	pub fn contains(&self, id: &str) -> bool {
		self.inner.state.lock().contains(id)
	}

	pub fn stats(&self) -> SchedulerStats {
		self.inner.state.lock().stats()
	}

	/// Resolves once nothing is in flight or backing off.
	///
	/// Pending tasks whose dependencies can never complete do not hold this
	/// open.
	pub async fn settled(&self) {
		let mut revisions = self.inner.revisions.subscribe();
		loop {
			if self.inner.state.lock().is_settled() {
				return;
			}
			if revisions.changed().await.is_err() {
				return;
			}
		}
	}

	/// Bumps the revision and captures a snapshot if anyone is listening.
	fn commit(&self, state: &mut QueueState) -> Option<QueueSnapshot> {
		state.revision = state.revision.wrapping_add(1);
		self.inner.revisions.send_replace(state.revision);
		(!self.inner.listeners.is_empty()).then(|| state.snapshot())
	}

	fn deliver(&self, snapshot: Option<QueueSnapshot>) {
		if let Some(snapshot) = snapshot {
			self.inner.listeners.broadcast(&snapshot);
		}
	}

	/// Dispatches ready tasks until the concurrency budget or the ready set
	/// is exhausted.
	fn pump(&self) {
		let mut launches = Vec::new();
		let mut snapshots = Vec::new();
		{
			let mut state = self.inner.state.lock();
			while state.in_flight.len() < self.inner.config.max_concurrent {
				let Some(id) = state.select_next() else {
					break;
				};
				let Some(launch) = state.begin(&id, &self.inner.config) else {
					break;
				};
				tracing::trace!(task_id = %launch.id, attempt = launch.attempt, in_flight = state.in_flight.len(), "scheduler.dispatch");
				snapshots.extend(self.commit(&mut state));
				launches.push(launch);
			}
		}
		for snapshot in snapshots {
			self.inner.listeners.broadcast(&snapshot);
		}
		for launch in launches {
			self.launch(launch);
		}
	}

	fn launch(&self, launch: Launch) {
		let scheduler = self.clone();
		spawn(&self.inner.handle, "attempt", async move {
			let Launch {
				id,
				attempt,
				load,
				timeout,
				token,
			} = launch;
			let outcome = run_attempt(load.as_ref(), timeout, &token).await;
			scheduler.settle(id, attempt, outcome);
		});
	}

	fn settle(&self, id: TaskId, attempt: u64, outcome: Result<(), TaskError>) {
		let (snapshot, timer) = {
			let mut state = self.inner.state.lock();
			let timer = match state.settle(&id, attempt, outcome, &self.inner.config) {
				Settlement::Stale => {
					tracing::trace!(task_id = %id, attempt, "scheduler.settle.discarded");
					return;
				}
				Settlement::Completed => {
					tracing::debug!(task_id = %id, attempt, "scheduler.completed");
					None
				}
				Settlement::Retry { retry_count, error, timer } => {
					tracing::debug!(
						task_id = %id,
						retry_count,
						kind = error.kind().as_str(),
						%error,
						delay_ms = timer.delay.as_millis() as u64,
						"scheduler.retry_scheduled"
					);
					Some(timer)
				}
				Settlement::Failed { error } => {
					tracing::warn!(task_id = %id, kind = error.kind().as_str(), %error, "scheduler.failed");
					None
				}
			};
			(self.commit(&mut state), timer)
		};
		self.deliver(snapshot);
		if let Some(timer) = timer {
			self.arm_retry(id, timer);
		}
		self.pump();
	}

	fn arm_retry(&self, id: TaskId, timer: RetryTimer) {
		let scheduler = self.clone();
		spawn(&self.inner.handle, "retry", async move {
			tokio::select! {
				() = timer.token.cancelled() => {}
				() = tokio::time::sleep(timer.delay) => scheduler.requeue(&id, timer.attempt),
			}
		});
	}

	fn requeue(&self, id: &TaskId, attempt: u64) {
		let snapshot = {
			let mut state = self.inner.state.lock();
			if !state.requeue(id, attempt) {
				return;
			}
			tracing::trace!(task_id = %id, "scheduler.requeue");
			self.commit(&mut state)
		};
		self.deliver(snapshot);
		self.pump();
	}
}

impl std::fmt::Debug for Scheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scheduler")
			.field("config", &self.inner.config)
			.field("stats", &self.stats())
			.finish_non_exhaustive()
	}
}

/// Races one load against its deadline and its cancellation token.
///
/// The token is cancelled once the race resolves so a load that is still
/// running after a timeout can observe it.
async fn run_attempt(load: &dyn LoadOp, timeout: Duration, token: &CancellationToken) -> Result<(), TaskError> {
	let outcome = tokio::select! {
		biased;
		() = token.cancelled() => Err(TaskError::Aborted),
		res = tokio::time::timeout(timeout, load.load(token.clone())) => match res {
			Ok(Ok(())) => Ok(()),
			Ok(Err(err)) => Err(TaskError::Load(err)),
			Err(_) => Err(TaskError::Timeout(timeout)),
		},
	};
	token.cancel();
	outcome
}
