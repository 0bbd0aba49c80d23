use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};

use crate::{TaskClass, spawn};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO work queue executing at most one job at a time.
///
/// Jobs run in enqueue order on a single worker task; a job starts only after
/// the previous one has fully settled, including any yields inside it. A
/// panicking job is logged and skipped so later jobs still run.
#[derive(Debug, Clone)]
pub struct SerialQueue {
	name: Arc<str>,
	tx: mpsc::UnboundedSender<Job>,
	pending: Arc<AtomicUsize>,
}

impl SerialQueue {
	/// Creates a queue and spawns its worker task.
	pub fn new(name: impl Into<Arc<str>>, class: TaskClass) -> Self {
		let name = name.into();
		let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
		let pending = Arc::new(AtomicUsize::new(0));

		let worker_name = Arc::clone(&name);
		let worker_pending = Arc::clone(&pending);
		spawn(class, async move {
			while let Some(job) = rx.recv().await {
				if AssertUnwindSafe(job).catch_unwind().await.is_err() {
					tracing::error!(queue = %worker_name, "serial.job_panicked");
				}
				worker_pending.fetch_sub(1, Ordering::AcqRel);
			}
			tracing::trace!(queue = %worker_name, "serial.closed");
		});

		Self { name, tx, pending }
	}

	/// Appends a job; the returned receiver resolves with its output.
	///
	/// The receiver may be dropped without affecting the job. If the worker is
	/// gone the receiver resolves to an error immediately.
	pub fn enqueue<F, T>(&self, fut: F) -> oneshot::Receiver<T>
	where
		F: Future<Output = T> + Send + 'static,
		T: Send + 'static,
	{
		let (done_tx, done_rx) = oneshot::channel();
		let job: Job = Box::pin(async move {
			let _ = done_tx.send(fut.await);
		});

		self.pending.fetch_add(1, Ordering::AcqRel);
		if self.tx.send(job).is_err() {
			self.pending.fetch_sub(1, Ordering::AcqRel);
			tracing::debug!(queue = %self.name, "serial.enqueue_after_close");
		} else {
			tracing::trace!(queue = %self.name, pending = self.pending(), "serial.enqueue");
		}
		done_rx
	}

	/// Number of jobs enqueued but not yet finished (including the running one).
	pub fn pending(&self) -> usize {
		self.pending.load(Ordering::Acquire)
	}

	/// Resolves once every job enqueued before this call has finished.
	pub async fn flush(&self) {
		let _ = self.enqueue(async {}).await;
	}
}

#[cfg(test)]
mod tests;
