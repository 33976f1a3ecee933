use serde::Serialize;

use crate::error::TaskError;
use crate::task::{Task, TaskId};

/// Terminal failure record: the task as last dispatched plus its last error.
#[derive(Debug, Clone)]
pub struct FailedTask {
	pub task: Task,
	pub error: TaskError,
}

/// Where a task currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
	Pending,
	InFlight,
	/// Failed at least once and waiting out its retry delay.
	BackingOff,
	Completed,
	Failed,
}

/// Full copy of the scheduler buckets, delivered to listeners after every
/// mutation.
///
/// `revision` increases by one per mutation; listeners on a multi-threaded
/// runtime may observe deliveries out of order and should compare it.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
	pub revision: u64,
	/// In admission order.
	pub pending: Vec<Task>,
	/// In dispatch order.
	pub in_flight: Vec<Task>,
	/// Tasks waiting for their retry delay. Not one of the four buckets.
	pub backing_off: Vec<Task>,
	/// In completion order.
	pub completed: Vec<TaskId>,
	pub failed: Vec<FailedTask>,
}

impl QueueSnapshot {
	pub fn status(&self, id: &str) -> Option<TaskStatus> {
		if self.pending.iter().any(|t| t.id.as_str() == id) {
			Some(TaskStatus::Pending)
		} else if self.in_flight.iter().any(|t| t.id.as_str() == id) {
			Some(TaskStatus::InFlight)
		} else if self.backing_off.iter().any(|t| t.id.as_str() == id) {
			Some(TaskStatus::BackingOff)
		} else if self.completed.iter().any(|c| c.as_str() == id) {
			Some(TaskStatus::Completed)
		} else if self.failed.iter().any(|f| f.task.id.as_str() == id) {
			Some(TaskStatus::Failed)
		} else {
			None
		}
	}

	/// Number of buckets (including the backoff set) that mention `id`.
	pub fn occurrences(&self, id: &str) -> usize {
		self.pending.iter().filter(|t| t.id.as_str() == id).count()
			+ self.in_flight.iter().filter(|t| t.id.as_str() == id).count()
			+ self.backing_off.iter().filter(|t| t.id.as_str() == id).count()
			+ self.completed.iter().filter(|c| c.as_str() == id).count()
			+ self.failed.iter().filter(|f| f.task.id.as_str() == id).count()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty() && self.in_flight.is_empty() && self.backing_off.is_empty() && self.completed.is_empty() && self.failed.is_empty()
	}
}

/// Aggregate counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
	pub pending: usize,
	pub in_flight: usize,
	pub backing_off: usize,
	pub completed: usize,
	pub failed: usize,
	/// Attempts started since construction.
	pub dispatched: u64,
	/// Failures that were scheduled for another attempt.
	pub retried: u64,
}
