//! Viewport windowing for very long fixed-row lists.
//!
//! * [`WindowSpec`] / [`VisibleRange`] - which rows to mount for a scroll offset.
//! * [`VirtualList`] - renders only the mounted band and tells observers about moves.
//! * [`ScrollState`] - debounced "is scrolling" flag.
//! * [`Reveal`] - reveal-on-intersect over caller-measured geometry.
//! * [`DwellTracker`] - per-item visibility time, reported to a [`DwellSink`].
//!
//! Nothing here owns a clock; every time-dependent call takes an `Instant`.

mod config;
mod dwell;
mod list;
mod reveal;
mod scroll;
mod window;

pub use config::ViewportConfig;
pub use dwell::{DwellReport, DwellSink, DwellTracker};
pub use list::{Fidelity, PositionChange, RenderedWindow, RowContext, VirtualList};
pub use reveal::{Reveal, RevealConfig, RevealMode, Span, intersection_ratio};
pub use scroll::{ScrollDirection, ScrollState};
pub use window::{VisibleRange, WindowSpec};
