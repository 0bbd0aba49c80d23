//! Consumer-facing entry point.

use std::sync::Arc;

use sylvan_language::{FsGrammarStorage, Grammar, GrammarCatalog, LanguageRegistry, Parser, Tree};
use tokio::sync::broadcast;

use crate::config::SyntaxConfig;
use crate::coordinator::{SyntaxCoordinator, TreeUpdate};
use crate::diff::ChangedRanges;
use crate::document::{ContentChange, Document, DocumentId};
use crate::telemetry::{ParseMetrics, ParseTelemetry, TelemetryFanout, TracingTelemetry};

/// Grammar catalog plus document coordinator behind one handle.
#[derive(Debug, Clone)]
pub struct SyntaxService {
	catalog: GrammarCatalog,
	coordinator: SyntaxCoordinator,
	metrics: Arc<ParseMetrics>,
}

impl SyntaxService {
	pub fn new(catalog: GrammarCatalog, config: SyntaxConfig) -> Self {
		Self::with_telemetry(catalog, config, Arc::new(TracingTelemetry))
	}

	/// Service reading grammar files from `config.grammar_dirs`, then the default search paths.
	pub fn from_config(registry: LanguageRegistry, config: SyntaxConfig) -> Self {
		let storage = FsGrammarStorage::with_search_paths(config.grammar_dirs.iter().cloned());
		tracing::debug!(dirs = ?storage.dirs(), languages = registry.len(), "syntax.service_config");
		Self::new(GrammarCatalog::new(registry, Arc::new(storage)), config)
	}

	/// Sends parse events to `telemetry` as well as to [`SyntaxService::metrics`].
	pub fn with_telemetry(catalog: GrammarCatalog, config: SyntaxConfig, telemetry: Arc<dyn ParseTelemetry>) -> Self {
		let metrics = Arc::new(ParseMetrics::new());
		let fanout = TelemetryFanout::new().with(Arc::clone(&metrics) as Arc<dyn ParseTelemetry>).with(telemetry);
		Self {
			coordinator: SyntaxCoordinator::with_telemetry(catalog.clone(), config, Arc::new(fanout)),
			catalog,
			metrics,
		}
	}

	/// Parse cost averages of every session this service ran.
	pub fn metrics(&self) -> &ParseMetrics {
		&self.metrics
	}

	pub fn catalog(&self) -> &GrammarCatalog {
		&self.catalog
	}

	pub fn coordinator(&self) -> &SyntaxCoordinator {
		&self.coordinator
	}

	/// Parses `text` from scratch; for tests and debugging.
	pub async fn tree_for(&self, language_id: &str, text: &str) -> Option<Tree> {
		if !self.coordinator.config().is_enabled(language_id) {
			return None;
		}
		let grammar = self.catalog.get_async(language_id).await?;
		let mut parser = Parser::with_grammar(grammar);
		parser
			.parse(text, None)
			.inspect_err(|err| tracing::warn!(language = language_id, error = %err, "syntax.one_shot_failed"))
			.ok()
	}

	/// Synchronous grammar lookup; starts loading on a miss.
	pub fn get_or_init_language(&self, language_id: &str) -> Option<Arc<dyn Grammar>> {
		if !self.coordinator.config().is_enabled(language_id) {
			return None;
		}
		self.catalog.get_or_trigger_load(language_id)
	}

	pub fn track(&self, document: Arc<dyn Document>, language: Option<&str>) -> DocumentId {
		self.coordinator.track(document, language)
	}

	pub fn set_language(&self, doc_id: DocumentId, language: Option<&str>) -> bool {
		self.coordinator.set_language(doc_id, language)
	}

	pub fn on_content_changed(&self, doc_id: DocumentId, changes: &[ContentChange]) -> Option<ChangedRanges> {
		self.coordinator.on_content_changed(doc_id, changes)
	}

	pub fn dispose(&self, doc_id: DocumentId) -> bool {
		self.coordinator.dispose(doc_id)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<TreeUpdate> {
		self.coordinator.subscribe()
	}

	pub fn current_tree(&self, doc_id: DocumentId) -> Option<Tree> {
		self.coordinator.current_tree(doc_id)
	}
}
