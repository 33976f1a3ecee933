use std::borrow::Borrow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::LoadError;
use crate::priority::{PriorityTier, dispatch_score};

/// Unique identifier of a scheduled task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Arc<str>);

impl TaskId {
	pub fn new(id: impl AsRef<str>) -> Self {
		Self(Arc::from(id.as_ref()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for TaskId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

impl Borrow<str> for TaskId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl From<&str> for TaskId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl From<String> for TaskId {
	fn from(id: String) -> Self {
		Self(Arc::from(id))
	}
}

/// Asynchronous load operation executed by the scheduler.
///
/// The token is cancelled when the attempt times out, when the task is
/// removed, or when the scheduler is cleared. Loads that ignore it keep
/// running, but their result is discarded.
#[async_trait]
pub trait LoadOp: Send + Sync + 'static {
	async fn load(&self, cancel: CancellationToken) -> Result<(), LoadError>;
}

#[async_trait]
impl<F, Fut> LoadOp for F
where
	F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<(), LoadError>> + Send + 'static,
{
	async fn load(&self, cancel: CancellationToken) -> Result<(), LoadError> {
		(self)(cancel).await
	}
}

/// Wraps a closure as a shared [`LoadOp`].
pub fn load_fn<F, Fut>(f: F) -> Arc<dyn LoadOp>
where
	F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = Result<(), LoadError>> + Send + 'static,
{
	Arc::new(f)
}

/// Unit of schedulable, retryable work.
///
/// `max_retries` and `timeout` left as `None` are filled from the scheduler
/// configuration on admission.
#[derive(Clone)]
pub struct Task {
	pub id: TaskId,
	pub priority: PriorityTier,
	pub load: Arc<dyn LoadOp>,
	pub is_visible: bool,
	pub retry_count: u32,
	pub max_retries: Option<u32>,
	pub timeout: Option<Duration>,
	pub dependencies: Vec<TaskId>,
	pub estimated_duration: Option<Duration>,
}

impl Task {
	pub fn new(id: impl Into<TaskId>, priority: PriorityTier, load: Arc<dyn LoadOp>) -> Self {
		Self {
			id: id.into(),
			priority,
			load,
			is_visible: false,
			retry_count: 0,
			max_retries: None,
			timeout: None,
			dependencies: Vec::new(),
			estimated_duration: None,
		}
	}

	#[must_use]
	pub fn visible(mut self, visible: bool) -> Self {
		self.is_visible = visible;
		self
	}

	#[must_use]
	pub fn max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = Some(max_retries);
		self
	}

	#[must_use]
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	#[must_use]
	pub fn depends_on<I, T>(mut self, deps: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<TaskId>,
	{
		self.dependencies.extend(deps.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub fn estimated_duration(mut self, estimate: Duration) -> Self {
		self.estimated_duration = Some(estimate);
		self
	}

	/// Dispatch ordering score for this task.
	pub fn score(&self) -> u32 {
		dispatch_score(self.priority, self.is_visible)
	}
}

impl std::fmt::Debug for Task {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Task")
			.field("id", &self.id)
			.field("priority", &self.priority)
			.field("is_visible", &self.is_visible)
			.field("retry_count", &self.retry_count)
			.field("max_retries", &self.max_retries)
			.field("timeout", &self.timeout)
			.field("dependencies", &self.dependencies)
			.field("estimated_duration", &self.estimated_duration)
			.finish_non_exhaustive()
	}
}
