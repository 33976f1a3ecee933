use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::Handle;

/// Returns the ambient runtime, or a small shared fallback runtime when
/// called from outside any tokio context.
pub(crate) fn runtime_handle() -> Handle {
	if let Ok(handle) = Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("tripline-scheduler")
			.build()
			.expect("failed to build tripline-scheduler fallback tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns scheduler-owned work with a tracing label.
pub(crate) fn spawn<F>(handle: &Handle, label: &'static str, fut: F)
where
	F: Future<Output = ()> + Send + 'static,
{
	tracing::trace!(label, "scheduler.spawn");
	drop(handle.spawn(fut));
}
