//! Priority task scheduler for itinerary content loads.
//!
//! Tasks live in exactly one of four buckets (pending, in-flight, completed,
//! failed). Ready tasks (all dependencies completed) dispatch in order of
//! priority weight plus a visibility bonus, at most `max_concurrent` at a
//! time. Failed attempts are retried with linear backoff until the task's
//! retry budget is spent, after which it parks in `failed` until
//! [`Scheduler::retry_failed`] is called.
//!
//! ```ignore
//! let scheduler = Scheduler::new(SchedulerConfig::default());
//! let _sub = scheduler.subscribe(|snap| tracing::info!(revision = snap.revision, "queue changed"));
//! scheduler.add_task(Task::new("hotel-42", PriorityTier::High, load_fn(|cancel| fetch_hotel(42, cancel))));
//! scheduler.settled().await;
//! ```

mod config;
mod error;
mod listeners;
mod priority;
mod scheduler;
mod snapshot;
mod spawn;
mod state;
mod task;
mod token;

pub use config::SchedulerConfig;
pub use error::{LoadError, TaskError, TaskErrorKind};
pub use listeners::Subscription;
pub use priority::{PriorityTier, VISIBILITY_BONUS, dispatch_score};
pub use scheduler::Scheduler;
pub use snapshot::{FailedTask, QueueSnapshot, SchedulerStats, TaskStatus};
pub use task::{LoadOp, Task, TaskId, load_fn};
pub use tokio_util::sync::CancellationToken;
