use serde::{Deserialize, Serialize};

/// What a [`Reveal`] does once its target stops intersecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevealMode {
	/// Render on first intersection and keep rendering.
	#[default]
	Sticky,
	/// Render only while intersecting.
	Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevealConfig {
	/// Grows the root on both ends before testing intersection.
	pub root_margin: f64,
	/// Fraction of the target that must be inside the root, in `[0, 1]`.
	pub threshold: f64,
	pub mode: RevealMode,
}

impl Default for RevealConfig {
	fn default() -> Self {
		Self {
			root_margin: 0.0,
			threshold: 0.0,
			mode: RevealMode::Sticky,
		}
	}
}

/// One-dimensional extent along the scroll axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
	pub start: f64,
	pub len: f64,
}

impl Span {
	pub fn new(start: f64, len: f64) -> Self {
		Self { start, len: len.max(0.0) }
	}

	pub fn end(&self) -> f64 {
		self.start + self.len
	}
}

/// Fraction of `target` that lies inside `root` grown by `margin` on both
/// ends. A zero-length target counts as fully inside when it lies within
/// the grown root.
pub fn intersection_ratio(target: Span, root: Span, margin: f64) -> f64 {
	let lo = root.start - margin;
	let hi = root.end() + margin;
	if hi < lo {
		return 0.0;
	}
	if target.len == 0.0 {
		return if (lo..=hi).contains(&target.start) { 1.0 } else { 0.0 };
	}
	let overlap = target.end().min(hi) - target.start.max(lo);
	(overlap / target.len).clamp(0.0, 1.0)
}

/// Reveal-on-intersect state for one element.
///
/// The host measures geometry and feeds it in; `Reveal` only decides whether
/// the element's content should be rendered.
#[derive(Debug, Clone)]
pub struct Reveal {
	config: RevealConfig,
	intersecting: bool,
	revealed: bool,
}

impl Reveal {
	pub fn new(config: RevealConfig) -> Self {
		Self {
			config,
			intersecting: false,
			revealed: false,
		}
	}

	/// Feeds an observed intersection ratio. Returns whether
	/// [`Self::should_render`] changed.
	pub fn observe(&mut self, ratio: f64) -> bool {
		let before = self.should_render();
		self.intersecting = ratio > 0.0 && ratio >= self.config.threshold;
		self.revealed |= self.intersecting;
		before != self.should_render()
	}

	pub fn observe_geometry(&mut self, target: Span, root: Span) -> bool {
		self.observe(intersection_ratio(target, root, self.config.root_margin))
	}

	pub fn is_intersecting(&self) -> bool {
		self.intersecting
	}

	pub fn should_render(&self) -> bool {
		match self.config.mode {
			RevealMode::Sticky => self.revealed,
			RevealMode::Toggle => self.intersecting,
		}
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case::inside(Span::new(100.0, 50.0), 0.0, 1.0)]
	#[case::half_below(Span::new(475.0, 50.0), 0.0, 0.5)]
	#[case::outside(Span::new(600.0, 50.0), 0.0, 0.0)]
	#[case::margin_pulls_in(Span::new(600.0, 50.0), 200.0, 1.0)]
	#[case::point_inside(Span::new(250.0, 0.0), 0.0, 1.0)]
	#[case::above(Span::new(-80.0, 40.0), 0.0, 0.0)]
	fn ratio_against_root(#[case] target: Span, #[case] margin: f64, #[case] expected: f64) {
		let root = Span::new(0.0, 500.0);
		assert!((intersection_ratio(target, root, margin) - expected).abs() < 1e-9);
	}

	#[test]
	fn sticky_keeps_rendering_after_leaving() {
		let mut reveal = Reveal::new(RevealConfig::default());
		assert!(!reveal.should_render());
		assert!(reveal.observe(0.3));
		assert!(!reveal.observe(0.0));
		assert!(reveal.should_render());
		assert!(!reveal.is_intersecting());
	}

	#[test]
	fn toggle_follows_intersection() {
		let mut reveal = Reveal::new(RevealConfig {
			mode: RevealMode::Toggle,
			..RevealConfig::default()
		});
		let root = Span::new(0.0, 500.0);
		assert!(reveal.observe_geometry(Span::new(480.0, 40.0), root));
		assert!(reveal.should_render());
		assert!(reveal.observe_geometry(Span::new(900.0, 40.0), root));
		assert!(!reveal.should_render());
	}

	#[test]
	fn threshold_requires_enough_of_the_target() {
		let mut reveal = Reveal::new(RevealConfig {
			threshold: 0.5,
			..RevealConfig::default()
		});
		reveal.observe(0.25);
		assert!(!reveal.should_render());
		reveal.observe(0.5);
		assert!(reveal.should_render());
	}
}
