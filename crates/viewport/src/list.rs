use std::time::{Duration, Instant};

use crate::config::ViewportConfig;
use crate::scroll::{ScrollDirection, ScrollState};
use crate::window::{VisibleRange, WindowSpec};

/// How much work a mounted row should do this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fidelity {
	Full,
	/// Overscan row rendered while the list is scrolling; may skip
	/// non-essential work such as images.
	Reduced,
}

/// Per-row context handed to the row renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowContext {
	pub fully_visible: bool,
	pub fidelity: Fidelity,
	/// Row top relative to the spacer.
	pub top: f64,
}

/// Rendered slice of the list plus the geometry needed to place it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedWindow<R> {
	/// Total spacer height (`item_count × row_height`).
	pub spacer_height: f64,
	/// Offset of the first mounted row (`start_index × row_height`).
	pub offset: f64,
	pub range: Option<VisibleRange>,
	/// `(index, rendered row)` in index order.
	pub rows: Vec<(usize, R)>,
}

/// Position change delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionChange {
	pub scroll_offset: f64,
	pub direction: Option<ScrollDirection>,
	pub range: Option<VisibleRange>,
}

type PositionObserver = Box<dyn FnMut(&PositionChange) + Send>;

/// Fixed-row-height virtualized list.
///
/// Only rows inside the overscanned band are rendered. Observers are told
/// about every scroll offset change so callers can keep derived state such
/// as the current day index in sync.
pub struct VirtualList {
	spec: WindowSpec,
	scroll_offset: f64,
	scroll: ScrollState,
	range: Option<VisibleRange>,
	observers: Vec<PositionObserver>,
}

impl VirtualList {
	pub fn new(spec: WindowSpec, scroll_idle: Duration) -> Self {
		Self {
			range: spec.visible_range(0.0),
			spec,
			scroll_offset: 0.0,
			scroll: ScrollState::new(scroll_idle),
			observers: Vec::new(),
		}
	}

	pub fn from_config(config: &ViewportConfig, item_count: usize) -> Self {
		Self::new(config.window_spec(item_count), config.scroll_idle())
	}

	pub fn on_position_change(&mut self, observer: impl FnMut(&PositionChange) + Send + 'static) {
		self.observers.push(Box::new(observer));
	}

	pub fn spec(&self) -> &WindowSpec {
		&self.spec
	}

	pub fn scroll_offset(&self) -> f64 {
		self.scroll_offset
	}

	pub fn range(&self) -> Option<VisibleRange> {
		self.range
	}

	pub fn is_scrolling(&self, now: Instant) -> bool {
		self.scroll.is_scrolling(now)
	}

	pub fn scroll_state(&self) -> &ScrollState {
		&self.scroll
	}

	/// Moves the list to `offset` and returns the new band.
	///
	/// Offsets are clamped to `[0, max_scroll_offset]`. A call that does not
	/// move the list is a no-op and does not notify observers.
	pub fn set_scroll_offset(&mut self, offset: f64, now: Instant) -> Option<VisibleRange> {
		let offset = offset.clamp(0.0, self.spec.max_scroll_offset());
		let Some(direction) = ScrollDirection::between(self.scroll_offset, offset) else {
			return self.range;
		};
		self.scroll_offset = offset;
		self.scroll.touch(Some(direction), now);
		self.refresh(Some(direction));
		self.range
	}

	/// Scrolls so that row `index` sits at the top of the viewport.
	pub fn scroll_to_index(&mut self, index: usize, now: Instant) -> Option<VisibleRange> {
		self.set_scroll_offset(self.spec.offset_for_index(index), now)
	}

	pub fn set_item_count(&mut self, item_count: usize) {
		if self.spec.item_count == item_count {
			return;
		}
		self.spec.item_count = item_count;
		self.scroll_offset = self.scroll_offset.min(self.spec.max_scroll_offset());
		self.refresh(None);
	}

	pub fn set_viewport_height(&mut self, viewport_height: f64) {
		if self.spec.viewport_height == viewport_height {
			return;
		}
		self.spec.viewport_height = viewport_height;
		self.scroll_offset = self.scroll_offset.min(self.spec.max_scroll_offset());
		self.refresh(None);
	}

	fn refresh(&mut self, direction: Option<ScrollDirection>) {
		self.range = self.spec.visible_range(self.scroll_offset);
		tracing::trace!(
			offset = self.scroll_offset,
			start = self.range.map(|r| r.start_index),
			end = self.range.map(|r| r.end_index),
			"viewport.position"
		);
		let change = PositionChange {
			scroll_offset: self.scroll_offset,
			direction,
			range: self.range,
		};
		for observer in &mut self.observers {
			observer(&change);
		}
	}

	/// Renders the mounted rows of `items`.
	///
	/// Overscan rows outside the strictly visible band get
	/// [`Fidelity::Reduced`] while the list is scrolling.
	pub fn render<T, R>(&self, items: &[T], now: Instant, mut render_item: impl FnMut(&T, usize, RowContext) -> R) -> RenderedWindow<R> {
		let scrolling = self.scroll.is_scrolling(now);
		let rows = match self.range {
			Some(range) => range
				.mounted()
				.filter_map(|index| {
					let item = items.get(index)?;
					let fidelity = if scrolling && !range.is_visible(index) { Fidelity::Reduced } else { Fidelity::Full };
					let ctx = RowContext {
						fully_visible: range.is_fully_visible(index),
						fidelity,
						top: self.spec.offset_for_index(index),
					};
					Some((index, render_item(item, index, ctx)))
				})
				.collect(),
			None => Vec::new(),
		};
		RenderedWindow {
			spacer_height: self.spec.spacer_height(),
			offset: self.range.map_or(0.0, |r| self.spec.offset_for_index(r.start_index)),
			range: self.range,
			rows,
		}
	}
}

impl std::fmt::Debug for VirtualList {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VirtualList")
			.field("spec", &self.spec)
			.field("scroll_offset", &self.scroll_offset)
			.field("range", &self.range)
			.field("observers", &self.observers.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{Arc, Mutex};

	use pretty_assertions::assert_eq;

	use super::*;

	fn list(n: usize) -> VirtualList {
		VirtualList::new(
			WindowSpec {
				item_count: n,
				row_height: 50.0,
				viewport_height: 500.0,
				overscan_rows: 5,
			},
			Duration::from_millis(150),
		)
	}

	#[test]
	fn renders_only_the_mounted_band() {
		let items: Vec<u32> = (0..10_000).collect();
		let mut list = list(items.len());
		let t0 = Instant::now();
		list.set_scroll_offset(10_000.0, t0);

		let window = list.render(&items, t0 + Duration::from_secs(1), |item, index, _| {
			assert_eq!(*item as usize, index);
			index
		});
		assert_eq!(window.rows.len(), 21);
		assert_eq!(window.rows.first().map(|r| r.0), Some(195));
		assert_eq!(window.rows.last().map(|r| r.0), Some(215));
		assert_eq!(window.offset, 9_750.0);
		assert_eq!(window.spacer_height, 500_000.0);
	}

	#[test]
	fn overscan_rows_are_reduced_only_while_scrolling() {
		let items: Vec<u32> = (0..1_000).collect();
		let mut list = list(items.len());
		let t0 = Instant::now();
		list.set_scroll_offset(10_000.0, t0);

		let fidelity_of = |window: &RenderedWindow<(Fidelity, bool)>, index: usize| window.rows.iter().find(|(i, _)| *i == index).map(|(_, r)| r.0);

		let during = list.render(&items, t0 + Duration::from_millis(10), |_, _, ctx| (ctx.fidelity, ctx.fully_visible));
		assert_eq!(fidelity_of(&during, 195), Some(Fidelity::Reduced));
		assert_eq!(fidelity_of(&during, 200), Some(Fidelity::Full));
		assert_eq!(fidelity_of(&during, 210), Some(Fidelity::Full));
		assert_eq!(fidelity_of(&during, 215), Some(Fidelity::Reduced));

		let after = list.render(&items, t0 + Duration::from_millis(200), |_, _, ctx| (ctx.fidelity, ctx.fully_visible));
		assert!(after.rows.iter().all(|(_, (fidelity, _))| *fidelity == Fidelity::Full));
	}

	#[test]
	fn observers_see_every_move_but_not_no_ops() {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		let mut list = list(100);
		list.on_position_change(move |change| {
			if let Ok(mut guard) = sink.lock() {
				guard.push((change.direction, change.range.map(|r| r.visible_start)));
			}
		});

		let t0 = Instant::now();
		list.set_scroll_offset(500.0, t0);
		list.set_scroll_offset(500.0, t0);
		list.set_scroll_offset(100.0, t0);
		list.scroll_to_index(20, t0);

		let seen = seen.lock().map(|g| g.clone()).unwrap_or_default();
		assert_eq!(
			seen,
			vec![
				(Some(ScrollDirection::Down), Some(10)),
				(Some(ScrollDirection::Up), Some(2)),
				(Some(ScrollDirection::Down), Some(20)),
			]
		);
	}

	#[test]
	fn offsets_clamp_to_content() {
		let mut list = list(20);
		let range = list.set_scroll_offset(1e6, Instant::now()).expect("non-empty list");
		assert_eq!(list.scroll_offset(), 500.0);
		assert_eq!(range.visible_end, 19);
	}

	#[test]
	fn shrinking_the_list_pulls_the_offset_back() {
		let mut list = list(1_000);
		list.set_scroll_offset(20_000.0, Instant::now());
		list.set_item_count(100);
		assert_eq!(list.scroll_offset(), 4_500.0);
		assert_eq!(list.range().map(|r| r.end_index), Some(99));
	}
}
