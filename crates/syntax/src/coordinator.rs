//! Document session coordinator.
//!
//! Binds each tracked document to at most one [`ParseSession`] and republishes
//! the ranges every content change invalidates.
//!
//! Binding a language opens a fresh [`CancelScope`] and cancels the previous
//! one. If the grammar is not loaded yet, a wait task races the catalog's
//! "language available" broadcast against that scope; a session is installed
//! only if the scope is still the document's current one when the grammar
//! arrives. Losing the race is silent.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use sylvan_language::{Grammar, GrammarCatalog, Tree};
use sylvan_worker::{CancelScope, ScopeClock, TaskClass, spawn};
use tokio::sync::broadcast;

use crate::config::SyntaxConfig;
use crate::diff::ChangedRanges;
use crate::document::{ContentChange, Document, DocumentId};
use crate::error::SyntaxError;
use crate::session::{ParseSession, SessionOptions};
use crate::telemetry::{ParseTelemetry, TracingTelemetry};

/// Published once per applied content change, and once per new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeUpdate {
	pub doc_id: DocumentId,
	pub changes: ChangedRanges,
}

/// Cloneable handle to the per-document session registry.
#[derive(Clone)]
pub struct SyntaxCoordinator {
	inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
	catalog: GrammarCatalog,
	config: SyntaxConfig,
	telemetry: Arc<dyn ParseTelemetry>,
	clock: ScopeClock,
	docs: Mutex<FxHashMap<DocumentId, DocEntry>>,
	updates: broadcast::Sender<TreeUpdate>,
}

struct DocEntry {
	document: Arc<dyn Document>,
	language: Option<Arc<str>>,
	scope: CancelScope,
	session: Option<ParseSession>,
}

impl DocEntry {
	fn release(&mut self) {
		self.scope.cancel();
		if let Some(session) = self.session.take() {
			session.dispose();
		}
	}
}

impl fmt::Debug for SyntaxCoordinator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SyntaxCoordinator")
			.field("tracked", &self.tracked_count())
			.field("config", &self.inner.config)
			.finish_non_exhaustive()
	}
}

impl SyntaxCoordinator {
	pub fn new(catalog: GrammarCatalog, config: SyntaxConfig) -> Self {
		Self::with_telemetry(catalog, config, Arc::new(TracingTelemetry))
	}

	pub fn with_telemetry(catalog: GrammarCatalog, config: SyntaxConfig, telemetry: Arc<dyn ParseTelemetry>) -> Self {
		let (updates, _) = broadcast::channel(config.update_capacity.max(1));
		Self {
			inner: Arc::new(CoordinatorInner {
				catalog,
				config,
				telemetry,
				clock: ScopeClock::new(),
				docs: Mutex::new(FxHashMap::default()),
				updates,
			}),
		}
	}

	pub fn config(&self) -> &SyntaxConfig {
		&self.inner.config
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TreeUpdate> {
		self.inner.updates.subscribe()
	}

	/// Starts tracking `document`, replacing any previous registration of its id.
	pub fn track(&self, document: Arc<dyn Document>, language: Option<&str>) -> DocumentId {
		let doc_id = document.id();
		let previous = self.inner.docs.lock().insert(
			doc_id,
			DocEntry {
				document,
				language: None,
				scope: self.inner.clock.scope(),
				session: None,
			},
		);
		if let Some(mut previous) = previous {
			previous.release();
		}
		tracing::debug!(%doc_id, "syntax.track");
		self.set_language(doc_id, language);
		doc_id
	}

	/// Rebinds a document to `language`, discarding its current session.
	///
	/// Returns false for untracked documents.
	pub fn set_language(&self, doc_id: DocumentId, language: Option<&str>) -> bool {
		let scope = self.inner.clock.scope();
		let language: Option<Arc<str>> = language.map(Arc::from);
		{
			let mut docs = self.inner.docs.lock();
			let Some(entry) = docs.get_mut(&doc_id) else {
				return false;
			};
			entry.release();
			entry.scope = scope.clone();
			entry.language = language.clone();
		}

		let Some(language) = language else {
			return true;
		};
		if !self.inner.config.is_enabled(&language) {
			tracing::debug!(%doc_id, language = %language, "syntax.language_disabled");
			return true;
		}

		match self.inner.catalog.get_or_trigger_load(&language) {
			Some(grammar) => self.inner.install(doc_id, &scope, language, grammar),
			None => {
				tracing::debug!(%doc_id, language = %language, generation = scope.generation(), "syntax.grammar_wait");
				let inner = Arc::clone(&self.inner);
				spawn(TaskClass::Wait, async move {
					let outcome = scope.guard(inner.catalog.wait_available(&language)).await;
					match outcome {
						Some(Some(grammar)) => inner.install(doc_id, &scope, language, grammar),
						Some(None) => tracing::debug!(%doc_id, language = %language, "syntax.catalog_closed"),
						None => tracing::trace!(%doc_id, language = %language, "syntax.grammar_wait_cancelled"),
					}
				});
			}
		}
		true
	}

	/// Forwards a content-change batch to the document's session.
	///
	/// Returns the published ranges, or `None` when the document has no
	/// session yet (untracked, disabled, grammar pending) or the cycle failed.
	pub fn on_content_changed(&self, doc_id: DocumentId, changes: &[ContentChange]) -> Option<ChangedRanges> {
		let (document, session) = {
			let docs = self.inner.docs.lock();
			let entry = docs.get(&doc_id)?;
			(Arc::clone(&entry.document), entry.session.clone())
		};
		if document.is_disposed() {
			self.dispose(doc_id);
			return None;
		}

		match session?.report_change(changes) {
			Ok(changes) => {
				self.inner.publish(doc_id, changes.clone());
				Some(changes)
			}
			Err(SyntaxError::Disposed) => None,
			Err(err) => {
				tracing::debug!(%doc_id, error = %err, "syntax.change_dropped");
				None
			}
		}
	}

	/// Stops tracking a document and releases its session.
	pub fn dispose(&self, doc_id: DocumentId) -> bool {
		let Some(mut entry) = self.inner.docs.lock().remove(&doc_id) else {
			return false;
		};
		entry.release();
		tracing::debug!(%doc_id, "syntax.untrack");
		true
	}

	pub fn session(&self, doc_id: DocumentId) -> Option<ParseSession> {
		self.inner.docs.lock().get(&doc_id)?.session.clone()
	}

	pub fn current_tree(&self, doc_id: DocumentId) -> Option<Tree> {
		self.session(doc_id)?.current_tree()
	}

	pub fn language_of(&self, doc_id: DocumentId) -> Option<Arc<str>> {
		self.inner.docs.lock().get(&doc_id)?.language.clone()
	}

	pub fn is_tracked(&self, doc_id: DocumentId) -> bool {
		self.inner.docs.lock().contains_key(&doc_id)
	}

	pub fn tracked_count(&self) -> usize {
		self.inner.docs.lock().len()
	}

	/// Waits for the document's queued reparses to settle.
	pub async fn flush(&self, doc_id: DocumentId) {
		if let Some(session) = self.session(doc_id) {
			session.flush().await;
		}
	}
}

impl CoordinatorInner {
	fn install(&self, doc_id: DocumentId, scope: &CancelScope, language: Arc<str>, grammar: Arc<dyn Grammar>) {
		let changes = {
			let mut docs = self.docs.lock();
			let Some(entry) = docs.get_mut(&doc_id) else {
				return;
			};
			if scope.is_cancelled() || entry.scope.generation() != scope.generation() {
				tracing::trace!(%doc_id, language = %language, generation = scope.generation(), "syntax.install_stale");
				return;
			}

			let session = ParseSession::new(
				Arc::clone(&language),
				grammar,
				Arc::clone(&entry.document),
				SessionOptions {
					slice_budget: self.config.slice_budget(),
					telemetry: Arc::clone(&self.telemetry),
				},
			);
			let changes = session.parse_full();
			entry.session = Some(session);
			changes
		};

		tracing::debug!(%doc_id, language = %language, generation = scope.generation(), "syntax.session_installed");
		self.publish(doc_id, changes);
	}

	fn publish(&self, doc_id: DocumentId, changes: ChangedRanges) {
		// No receivers is fine.
		let _ = self.updates.send(TreeUpdate { doc_id, changes });
	}
}
