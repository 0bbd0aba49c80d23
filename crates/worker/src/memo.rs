//! Keyed memoization of asynchronous values.
//!
//! Each key maps to one shared future. Registering a key spawns a driver task
//! that polls the future to completion, so the settled value becomes visible to
//! synchronous accessors without anyone awaiting it.

use std::borrow::Borrow;
use std::fmt;
use std::future::Future;
use std::hash::Hash;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::{TaskClass, spawn};

/// Cloneable handle to a memoized value that may still be pending.
pub type MemoFuture<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// Cache of pending or settled asynchronous results keyed by `K`.
pub struct AsyncMemo<K, V, E> {
	entries: Mutex<FxHashMap<K, MemoFuture<V, E>>>,
	class: TaskClass,
}

impl<K, V, E> Default for AsyncMemo<K, V, E> {
	fn default() -> Self {
		Self::with_class(TaskClass::Memo)
	}
}

impl<K, V, E> AsyncMemo<K, V, E> {
	/// Creates a memo whose driver tasks are spawned under `class`.
	pub fn with_class(class: TaskClass) -> Self {
		Self {
			entries: Mutex::new(FxHashMap::default()),
			class,
		}
	}
}

impl<K, V, E> fmt::Debug for AsyncMemo<K, V, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AsyncMemo")
			.field("class", &self.class)
			.field("len", &self.entries.lock().len())
			.finish()
	}
}

impl<K, V, E> AsyncMemo<K, V, E>
where
	K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
	V: Clone + Send + Sync + 'static,
	E: Clone + Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `fut` as the value for `key`.
	///
	/// Never replaces an existing entry: if the key is already known the stored
	/// handle is returned and `fut` is dropped unpolled.
	pub fn set<F>(&self, key: K, fut: F) -> MemoFuture<V, E>
	where
		F: Future<Output = Result<V, E>> + Send + 'static,
	{
		self.get_or_insert_with(key, move || fut).0
	}

	/// Returns the entry for `key`, creating it from `make` when absent.
	///
	/// The boolean is true when this call inserted the entry. Check and insert
	/// happen under one lock, so concurrent callers never both insert.
	pub fn get_or_insert_with<F, M>(&self, key: K, make: M) -> (MemoFuture<V, E>, bool)
	where
		F: Future<Output = Result<V, E>> + Send + 'static,
		M: FnOnce() -> F,
	{
		let shared = {
			let mut entries = self.entries.lock();
			if let Some(existing) = entries.get(&key) {
				return (existing.clone(), false);
			}
			let shared = make().boxed().shared();
			entries.insert(key.clone(), shared.clone());
			shared
		};

		tracing::trace!(key = ?key, "memo.insert");
		let driver = shared.clone();
		spawn(self.class, async move {
			let _ = driver.await;
		});
		(shared, true)
	}

	/// Returns the pending or settled handle, or `None` for unknown keys.
	pub fn get<Q>(&self, key: &Q) -> Option<MemoFuture<V, E>>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.entries.lock().get(key).cloned()
	}

	/// Returns true when `key` has an entry, settled or not.
	pub fn contains<Q>(&self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.entries.lock().contains_key(key)
	}

	/// Returns true once the value for `key` has settled, successfully or not.
	pub fn is_resolved<Q>(&self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.entries.lock().get(key).is_some_and(|fut| fut.peek().is_some())
	}

	/// Returns the settled success value.
	///
	/// `None` covers unknown keys, pending values and failures alike; the error
	/// is only observable by awaiting [`AsyncMemo::get`].
	pub fn get_if_resolved<Q>(&self, key: &Q) -> Option<V>
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let entries = self.entries.lock();
		match entries.get(key)?.peek() {
			Some(Ok(value)) => Some(value.clone()),
			_ => None,
		}
	}

	/// Number of known keys.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

#[cfg(test)]
mod tests;
