use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

/// Receives completed dwell intervals.
pub trait DwellSink: Send + Sync {
	fn record_dwell(&self, id: &str, start: Instant, end: Instant);
}

impl<S: DwellSink + ?Sized> DwellSink for Arc<S> {
	fn record_dwell(&self, id: &str, start: Instant, end: Instant) {
		(**self).record_dwell(id, start, end);
	}
}

/// One finished visibility interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DwellReport {
	pub id: String,
	pub start: Instant,
	pub end: Instant,
}

impl DwellReport {
	pub fn elapsed(&self) -> Duration {
		self.end.saturating_duration_since(self.start)
	}
}

/// Tracks how long each item stays visible.
///
/// Starting an already tracked item keeps its original start time.
/// Stopping an item reports the interval to the sink.
pub struct DwellTracker<S> {
	sink: S,
	open: IndexMap<String, Instant>,
}

impl<S: DwellSink> DwellTracker<S> {
	pub fn new(sink: S) -> Self {
		Self { sink, open: IndexMap::new() }
	}

	pub fn sink(&self) -> &S {
		&self.sink
	}

	pub fn is_tracking(&self, id: &str) -> bool {
		self.open.contains_key(id)
	}

	pub fn tracked(&self) -> impl Iterator<Item = &str> {
		self.open.keys().map(String::as_str)
	}

	/// Marks `id` visible from `now`.
	pub fn start(&mut self, id: &str, now: Instant) {
		if !self.open.contains_key(id) {
			self.open.insert(id.to_owned(), now);
		}
	}

	/// Marks `id` hidden at `now` and reports the interval.
	pub fn stop(&mut self, id: &str, now: Instant) -> Option<DwellReport> {
		let start = self.open.shift_remove(id)?;
		self.sink.record_dwell(id, start, now);
		tracing::trace!(item_id = id, dwell_ms = now.saturating_duration_since(start).as_millis() as u64, "viewport.dwell");
		Some(DwellReport { id: id.to_owned(), start, end: now })
	}

	/// Brings the tracked set in line with `visible`: items that left are
	/// stopped, items that entered are started.
	pub fn sync_visible<'a>(&mut self, visible: impl IntoIterator<Item = &'a str>, now: Instant) -> Vec<DwellReport> {
		let visible: indexmap::IndexSet<&str> = visible.into_iter().collect();
		let gone: Vec<String> = self.open.keys().filter(|id| !visible.contains(id.as_str())).cloned().collect();
		let reports = gone.iter().filter_map(|id| self.stop(id, now)).collect();
		for id in visible {
			self.start(id, now);
		}
		reports
	}

	/// Stops every tracked item.
	pub fn flush(&mut self, now: Instant) -> Vec<DwellReport> {
		let ids: Vec<String> = self.open.keys().cloned().collect();
		ids.iter().filter_map(|id| self.stop(id, now)).collect()
	}
}

impl<S> std::fmt::Debug for DwellTracker<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DwellTracker").field("open", &self.open).finish_non_exhaustive()
	}
}
