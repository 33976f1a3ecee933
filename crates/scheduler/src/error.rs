//! Error types for load operations and scheduled tasks.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a caller-supplied load operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
	/// The load ran and failed.
	#[error("{0}")]
	Failed(String),

	/// The load observed its cancellation token and stopped early.
	#[error("load cancelled")]
	Cancelled,
}

impl LoadError {
	/// Creates a [`LoadError::Failed`] from any displayable message.
	pub fn failed(msg: impl Into<String>) -> Self {
		Self::Failed(msg.into())
	}
}

/// Failure of one dispatched attempt.
///
/// Every kind feeds the same retry state machine; the kind is kept for
/// diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
	/// The load operation returned an error.
	#[error("load failed: {0}")]
	Load(#[from] LoadError),

	/// The attempt did not settle before its deadline.
	#[error("timed out after {0:?}")]
	Timeout(Duration),

	/// The attempt was cancelled by `clear` or `remove_task`.
	#[error("aborted")]
	Aborted,
}

/// Discriminant of [`TaskError`] for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskErrorKind {
	Load,
	Timeout,
	Aborted,
}

impl TaskError {
	pub fn kind(&self) -> TaskErrorKind {
		match self {
			Self::Load(_) => TaskErrorKind::Load,
			Self::Timeout(_) => TaskErrorKind::Timeout,
			Self::Aborted => TaskErrorKind::Aborted,
		}
	}
}

impl TaskErrorKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Load => "load",
			Self::Timeout => "timeout",
			Self::Aborted => "aborted",
		}
	}
}
