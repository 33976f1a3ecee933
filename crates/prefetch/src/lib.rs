//! Predictive prefetching for itinerary content.
//!
//! The engine keeps a registry of [`PrefetchableItem`]s and a
//! [`UserInteractionModel`] fed by position updates and dwell reports. A
//! debounced pass ranks candidates near the current day (plus items the user
//! tends to linger on) and submits the winners to a
//! [`tripline_scheduler::Scheduler`].

mod config;
mod engine;
mod item;
mod model;
mod score;
mod state;

pub use config::PrefetchConfig;
pub use engine::PrefetchEngine;
pub use item::{ContentType, PrefetchableItem};
pub use model::UserInteractionModel;
pub use score::{ScoreInputs, adjacent_day_indices, prefetch_score, tier_for_score};
pub use state::{PrefetchPass, Selection};
