use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic generation clock for cancellation scopes.
#[derive(Debug, Default, Clone)]
pub struct ScopeClock {
	next: Arc<AtomicU64>,
}

impl ScopeClock {
	/// Creates a new clock whose first generation is 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation ID.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}

	/// Opens a fresh scope stamped with the next generation.
	pub fn scope(&self) -> CancelScope {
		CancelScope::new(self.next(), CancellationToken::new())
	}
}

/// Generation-stamped cancellation scope.
///
/// One scope covers one attempt (e.g. one language binding of a document).
/// Cancelling it abandons every wait registered through [`CancelScope::guard`].
#[derive(Debug, Clone)]
pub struct CancelScope {
	generation: u64,
	cancel: CancellationToken,
}

impl CancelScope {
	pub fn new(generation: u64, cancel: CancellationToken) -> Self {
		Self { generation, cancel }
	}

	/// Returns generation ID.
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	/// Returns true when cancellation is requested.
	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Requests cancellation.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Creates a child scope in the same generation.
	pub fn child(&self) -> Self {
		Self {
			generation: self.generation,
			cancel: self.cancel.child_token(),
		}
	}

	/// Races `fut` against cancellation of this scope.
	///
	/// Resolves exactly once: `Some` with the future's output, or `None` when the
	/// scope was cancelled first. A scope that is already cancelled never polls `fut`.
	pub async fn guard<F>(&self, fut: F) -> Option<F::Output>
	where
		F: Future,
	{
		tokio::select! {
			biased;

			_ = self.cancel.cancelled() => None,
			out = fut => Some(out),
		}
	}
}
