/// Fixed-row-height list geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSpec {
	pub item_count: usize,
	pub row_height: f64,
	pub viewport_height: f64,
	/// Rows mounted beyond each edge of the strictly visible band.
	pub overscan_rows: usize,
}

/// Index band derived from one scroll position.
///
/// `start_index..=end_index` is what gets mounted. `visible_start..=visible_end`
/// is the strictly visible band (partially visible rows included) and
/// `first_fully_visible..=last_fully_visible` the rows entirely on screen,
/// which is empty when `last_fully_visible < first_fully_visible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisibleRange {
	pub start_index: usize,
	pub end_index: usize,
	pub visible_start: usize,
	pub visible_end: usize,
	pub first_fully_visible: usize,
	pub last_fully_visible: usize,
}

impl VisibleRange {
	/// Number of mounted rows.
	pub fn mounted_len(&self) -> usize {
		self.end_index - self.start_index + 1
	}

	pub fn is_mounted(&self, index: usize) -> bool {
		(self.start_index..=self.end_index).contains(&index)
	}

	pub fn is_visible(&self, index: usize) -> bool {
		(self.visible_start..=self.visible_end).contains(&index)
	}

	pub fn is_fully_visible(&self, index: usize) -> bool {
		self.first_fully_visible <= index && index <= self.last_fully_visible
	}

	pub fn mounted(&self) -> std::ops::RangeInclusive<usize> {
		self.start_index..=self.end_index
	}
}

impl WindowSpec {
	/// Computes the mounted band for `scroll_offset`.
	///
	/// Returns `None` for an empty list or a non-positive row height.
	pub fn visible_range(&self, scroll_offset: f64) -> Option<VisibleRange> {
		if self.item_count == 0 || self.row_height.is_nan() || self.row_height <= 0.0 {
			return None;
		}
		let last = self.item_count - 1;
		let offset = scroll_offset.max(0.0);
		let viewport = self.viewport_height.max(0.0);

		let visible_start = ((offset / self.row_height).floor() as usize).min(last);
		let rows_in_view = (viewport / self.row_height).ceil() as usize;
		let visible_end = visible_start.saturating_add(rows_in_view).min(last);

		let first_fully_visible = ((offset / self.row_height).ceil() as usize).min(last);
		let last_fully_visible = (((offset + viewport) / self.row_height).floor() as usize).saturating_sub(1).min(last);

		Some(VisibleRange {
			start_index: visible_start.saturating_sub(self.overscan_rows),
			end_index: visible_end.saturating_add(self.overscan_rows).min(last),
			visible_start,
			visible_end,
			first_fully_visible,
			last_fully_visible,
		})
	}

	/// Height of the spacer that keeps scrollbar proportions correct.
	pub fn spacer_height(&self) -> f64 {
		self.item_count as f64 * self.row_height
	}

	/// Top edge of row `index` within the spacer.
	pub fn offset_for_index(&self, index: usize) -> f64 {
		index as f64 * self.row_height
	}

	/// Largest scroll offset that still fills the viewport.
	pub fn max_scroll_offset(&self) -> f64 {
		(self.spacer_height() - self.viewport_height).max(0.0)
	}
}
