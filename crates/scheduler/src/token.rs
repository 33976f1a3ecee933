use tokio_util::sync::CancellationToken;

/// Monotonic attempt clock.
///
/// Every dispatch and every backoff wait is stamped with a fresh attempt id
/// so results from a superseded attempt can be recognised and discarded.
#[derive(Debug, Default)]
pub(crate) struct AttemptClock {
	next: u64,
}

impl AttemptClock {
	/// Returns the next attempt id, starting at 1.
	pub fn next(&mut self) -> u64 {
		self.next = self.next.wrapping_add(1);
		self.next
	}
}

/// Re-creatable root cancellation scope shared by every attempt.
///
/// `reset` cancels the current root and installs a fresh one, so work
/// admitted after a clear is unaffected by it.
#[derive(Debug, Default)]
pub(crate) struct CancelScope {
	root: CancellationToken,
}

impl CancelScope {
	/// Creates a per-attempt token that fires on reset or on its own cancel.
	pub fn child(&self) -> CancellationToken {
		self.root.child_token()
	}

	/// Cancels everything issued so far and starts a new scope.
	pub fn reset(&mut self) {
		let old = std::mem::take(&mut self.root);
		old.cancel();
	}
}
