//! Grammar catalog.
//!
//! Resolves language identifiers to loaded grammars. Each identifier is loaded
//! at most once per catalog; concurrent requests share the in-flight load
//! through [`AsyncMemo`]. Successful loads are announced on a broadcast channel
//! so callers that got "not yet" from the synchronous accessor can wait for the
//! grammar without polling.
//!
//! Failed loads (unmapped identifier, fetch or decode errors) settle to "no
//! grammar", are logged, and are never announced. Waiters for such a language
//! stay pending until their own cancellation fires.

use std::fmt;
use std::sync::Arc;

use sylvan_worker::{AsyncMemo, MemoFuture, TaskClass};
use tokio::sync::broadcast;

use crate::config::LanguageRegistry;
use crate::grammar::{Grammar, GrammarError};
use crate::storage::GrammarStorage;
use crate::token_grammar::TokenGrammar;

/// Capacity of the "language available" channel.
const AVAILABLE_CAPACITY: usize = 64;

/// Turns a fetched blob into a grammar.
pub type GrammarDecoder = Arc<dyn Fn(&[u8]) -> Result<Arc<dyn Grammar>, GrammarError> + Send + Sync>;

/// Broadcast once per language after its grammar finished loading.
#[derive(Debug, Clone)]
pub struct LanguageAvailable {
	pub language_id: Arc<str>,
	pub grammar: Arc<dyn Grammar>,
}

/// Cloneable handle to a shared grammar catalog.
#[derive(Clone)]
pub struct GrammarCatalog {
	inner: Arc<CatalogInner>,
}

struct CatalogInner {
	registry: LanguageRegistry,
	storage: Arc<dyn GrammarStorage>,
	decoder: GrammarDecoder,
	memo: AsyncMemo<String, Arc<dyn Grammar>, Arc<GrammarError>>,
	available: broadcast::Sender<LanguageAvailable>,
}

impl fmt::Debug for GrammarCatalog {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GrammarCatalog")
			.field("languages", &self.inner.registry.len())
			.field("requested", &self.inner.memo.len())
			.finish()
	}
}

impl GrammarCatalog {
	/// Catalog decoding blobs as token grammars.
	pub fn new(registry: LanguageRegistry, storage: Arc<dyn GrammarStorage>) -> Self {
		Self::with_decoder(registry, storage, Arc::new(TokenGrammar::decode))
	}

	pub fn with_decoder(registry: LanguageRegistry, storage: Arc<dyn GrammarStorage>, decoder: GrammarDecoder) -> Self {
		let (available, _) = broadcast::channel(AVAILABLE_CAPACITY);
		Self {
			inner: Arc::new(CatalogInner {
				registry,
				storage,
				decoder,
				memo: AsyncMemo::with_class(TaskClass::GrammarLoad),
				available,
			}),
		}
	}

	pub fn registry(&self) -> &LanguageRegistry {
		&self.inner.registry
	}

	/// Returns the grammar if loaded; otherwise starts loading it and returns `None`.
	///
	/// Repeated calls while the load is in flight do not start another load, and
	/// a failed load is never retried.
	pub fn get_or_trigger_load(&self, language_id: &str) -> Option<Arc<dyn Grammar>> {
		if let Some(grammar) = self.inner.memo.get_if_resolved(language_id) {
			return Some(grammar);
		}
		self.load(language_id);
		None
	}

	/// Returns the grammar only if it already finished loading.
	pub fn get_if_loaded(&self, language_id: &str) -> Option<Arc<dyn Grammar>> {
		self.inner.memo.get_if_resolved(language_id)
	}

	/// True once a load for `language_id` has settled, successfully or not.
	pub fn is_settled(&self, language_id: &str) -> bool {
		self.inner.memo.is_resolved(language_id)
	}

	/// Loads the grammar if needed and waits for the outcome.
	pub async fn get_async(&self, language_id: &str) -> Option<Arc<dyn Grammar>> {
		self.load_result(language_id).await.ok()
	}

	/// Like [`Self::get_async`], keeping the failure.
	pub async fn load_result(&self, language_id: &str) -> Result<Arc<dyn Grammar>, Arc<GrammarError>> {
		self.load(language_id).await
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LanguageAvailable> {
		self.inner.available.subscribe()
	}

	/// Resolves once `language_id` is available, triggering its load.
	///
	/// Never resolves for a language whose load failed; race it against a
	/// cancellation scope. Returns `None` only if the catalog is dropped.
	pub async fn wait_available(&self, language_id: &str) -> Option<Arc<dyn Grammar>> {
		let mut rx = self.subscribe();
		if let Some(grammar) = self.get_or_trigger_load(language_id) {
			return Some(grammar);
		}

		loop {
			match rx.recv().await {
				Ok(event) if &*event.language_id == language_id => return Some(event.grammar),
				Ok(_) => {}
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					tracing::debug!(language = language_id, skipped, "grammar.wait_lagged");
					// The event may be gone; the load itself still settles.
					if let Ok(grammar) = self.load(language_id).await {
						return Some(grammar);
					}
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	fn load(&self, language_id: &str) -> MemoFuture<Arc<dyn Grammar>, Arc<GrammarError>> {
		let (fut, inserted) = self.inner.memo.get_or_insert_with(language_id.to_owned(), || {
			let inner = Arc::clone(&self.inner);
			let language_id: Arc<str> = language_id.into();
			async move { inner.load(language_id).await.map_err(Arc::new) }
		});
		if inserted {
			tracing::debug!(language = language_id, "grammar.load_triggered");
		}
		fut
	}
}

impl CatalogInner {
	async fn load(&self, language_id: Arc<str>) -> Result<Arc<dyn Grammar>, GrammarError> {
		match self.fetch_and_decode(&language_id).await {
			Ok(grammar) => {
				tracing::debug!(language = %language_id, grammar = grammar.name(), "grammar.loaded");
				let _ = self.available.send(LanguageAvailable {
					language_id,
					grammar: Arc::clone(&grammar),
				});
				Ok(grammar)
			}
			Err(err) => {
				tracing::warn!(language = %language_id, error = %err, "grammar.unavailable");
				Err(err)
			}
		}
	}

	async fn fetch_and_decode(&self, language_id: &str) -> Result<Arc<dyn Grammar>, GrammarError> {
		let config = self
			.registry
			.get(language_id)
			.ok_or_else(|| GrammarError::NotFound(language_id.to_owned()))?;
		let file = config.grammar_file();
		let bytes = self
			.storage
			.fetch(&file)
			.await
			.map_err(|source| GrammarError::Fetch { file, source })?;
		(self.decoder)(&bytes)
	}
}
