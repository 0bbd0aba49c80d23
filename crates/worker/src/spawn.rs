use std::future::Future;
use std::sync::OnceLock;

use tokio::task::JoinHandle;

use crate::TaskClass;

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	// One worker thread keeps the fallback scheduler cooperative.
	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(1)
			.thread_name("sylvan-worker")
			.build()
			.expect("failed to build sylvan-worker fallback tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task tagged with a task class.
///
/// Uses the ambient tokio runtime when there is one, so tasks spawned from a
/// current-thread runtime stay on that scheduler.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	runtime_handle().spawn(fut)
}

/// Explicit cooperative yield point.
///
/// Returns control to the scheduler once; anything queued behind the caller
/// (edits, notifications) runs before the caller resumes.
pub async fn yield_point() {
	tokio::task::yield_now().await;
}
