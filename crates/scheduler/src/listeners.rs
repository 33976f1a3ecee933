use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::snapshot::QueueSnapshot;

type Listener = Arc<dyn Fn(&QueueSnapshot) + Send + Sync>;

/// In-memory listener registry for snapshot broadcasts.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
	inner: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
	next_id: u64,
	listeners: Vec<(u64, Listener)>,
}

impl ListenerRegistry {
	pub fn insert(self: &Arc<Self>, listener: Listener) -> Subscription {
		let mut guard = self.inner.write();
		guard.next_id = guard.next_id.wrapping_add(1);
		let id = guard.next_id;
		guard.listeners.push((id, listener));
		Subscription {
			id,
			registry: Arc::downgrade(self),
		}
	}

	fn remove(&self, id: u64) {
		self.inner.write().listeners.retain(|(lid, _)| *lid != id);
	}

	pub fn is_empty(&self) -> bool {
		self.inner.read().listeners.is_empty()
	}

	/// Delivers `snapshot` to every listener.
	///
	/// The registry lock is released before any listener runs, so listeners
	/// may subscribe, unsubscribe, or call back into the scheduler. A
	/// panicking listener is logged and skipped.
	pub fn broadcast(&self, snapshot: &QueueSnapshot) {
		let listeners: Vec<(u64, Listener)> = self.inner.read().listeners.clone();
		for (id, listener) in listeners {
			if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
				tracing::error!(listener = id, revision = snapshot.revision, "scheduler.listener_panicked");
			}
		}
	}
}

/// Handle returned by [`crate::Scheduler::subscribe`].
///
/// Dropping the handle unsubscribes the listener.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
	id: u64,
	registry: Weak<ListenerRegistry>,
}

impl Subscription {
	pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.remove(self.id);
		}
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription").field("id", &self.id).finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[test]
	fn panicking_listener_does_not_block_others() {
		let registry = Arc::new(ListenerRegistry::default());
		let hits = Arc::new(AtomicUsize::new(0));

		let _bad = registry.insert(Arc::new(|_: &QueueSnapshot| panic!("listener boom")));
		let counter = Arc::clone(&hits);
		let _good = registry.insert(Arc::new(move |_: &QueueSnapshot| {
			counter.fetch_add(1, Ordering::SeqCst);
		}));

		registry.broadcast(&QueueSnapshot::default());
		registry.broadcast(&QueueSnapshot::default());
		assert_eq!(hits.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn dropping_subscription_removes_listener() {
		let registry = Arc::new(ListenerRegistry::default());
		let sub = registry.insert(Arc::new(|_: &QueueSnapshot| {}));
		assert!(!registry.is_empty());
		sub.unsubscribe();
		assert!(registry.is_empty());
	}
}
