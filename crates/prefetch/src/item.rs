use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tripline_scheduler::{LoadOp, PriorityTier, Task, TaskId};

/// Kind of itinerary content behind a prefetchable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
	Day,
	Hotel,
	Flight,
	Activity,
	Image,
}

impl ContentType {
	pub const ALL: [Self; 5] = [Self::Day, Self::Hotel, Self::Flight, Self::Activity, Self::Image];

	/// Score contribution of the content kind.
	pub const fn type_weight(self) -> f64 {
		match self {
			Self::Day => 120.0,
			Self::Hotel => 100.0,
			Self::Flight => 80.0,
			Self::Activity => 60.0,
			Self::Image => 40.0,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Day => "day",
			Self::Hotel => "hotel",
			Self::Flight => "flight",
			Self::Activity => "activity",
			Self::Image => "image",
		}
	}
}

impl std::fmt::Display for ContentType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Content that may be loaded speculatively.
#[derive(Clone)]
pub struct PrefetchableItem {
	pub id: TaskId,
	pub content_type: ContentType,
	pub day_id: Arc<str>,
	pub priority: PriorityTier,
	pub load: Arc<dyn LoadOp>,
	pub estimated_size_bytes: Option<u64>,
	pub dependencies: Vec<TaskId>,
}

impl PrefetchableItem {
	pub fn new(id: impl Into<TaskId>, content_type: ContentType, day_id: impl AsRef<str>, priority: PriorityTier, load: Arc<dyn LoadOp>) -> Self {
		Self {
			id: id.into(),
			content_type,
			day_id: Arc::from(day_id.as_ref()),
			priority,
			load,
			estimated_size_bytes: None,
			dependencies: Vec::new(),
		}
	}

	#[must_use]
	pub fn size_bytes(mut self, bytes: u64) -> Self {
		self.estimated_size_bytes = Some(bytes);
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

	/// Converts the item into a scheduler task at `tier`.
	pub(crate) fn into_task(self, tier: PriorityTier) -> Task {
		Task::new(self.id, tier, self.load).depends_on(self.dependencies)
	}
}

impl std::fmt::Debug for PrefetchableItem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PrefetchableItem")
			.field("id", &self.id)
			.field("content_type", &self.content_type)
			.field("day_id", &self.day_id)
			.field("priority", &self.priority)
			.field("estimated_size_bytes", &self.estimated_size_bytes)
			.field("dependencies", &self.dependencies)
			.finish_non_exhaustive()
	}
}
