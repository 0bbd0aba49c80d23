//! Per-document parse sessions.
//!
//! A [`ParseSession`] owns one parser and the current tree of one document.
//! Edits are folded into the tree synchronously as they arrive; reparses run on
//! the session's [`SerialQueue`], one at a time, in bounded time slices with a
//! [`yield_point`] after each slice.
//!
//! # Commit rule
//!
//! A reparse clears the pending-edits flag when it starts. After every slice
//! it yields, then checks the flag: if edits arrived in the meantime the slice
//! result is dropped and the parser restarts against the latest edited tree.
//! A tree is committed only when a slice finished it and no edits arrived.
//!
//! # Versions
//!
//! The session remembers which [`Document::version`] its tree reflects. A
//! slice only runs, and a tree only commits, while the document is still at
//! that version; text the host changed but has not reported yet defers the
//! reparse until the report arrives. Changes at or below the session's version
//! are already folded in and are skipped.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sylvan_language::{DEFAULT_SLICE_BUDGET, Grammar, Parser, TextInput, Tree};
use sylvan_worker::{SerialQueue, TaskClass, yield_point};

use crate::diff::{self, ChangedRanges};
use crate::document::{ContentChange, Document, DocumentId};
use crate::error::SyntaxError;
use crate::telemetry::{ParseEvent, ParseKind, ParseTelemetry, TracingTelemetry};

/// Construction options for [`ParseSession`].
#[derive(Clone)]
pub struct SessionOptions {
	/// Wall-clock budget of one parse slice.
	pub slice_budget: Duration,
	pub telemetry: Arc<dyn ParseTelemetry>,
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			slice_budget: DEFAULT_SLICE_BUDGET,
			telemetry: Arc::new(TracingTelemetry),
		}
	}
}

impl fmt::Debug for SessionOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionOptions").field("slice_budget", &self.slice_budget).finish_non_exhaustive()
	}
}

/// Cloneable handle to one document's parse state.
#[derive(Clone)]
pub struct ParseSession {
	inner: Arc<SessionInner>,
	queue: SerialQueue,
}

struct SessionInner {
	doc_id: DocumentId,
	language: Arc<str>,
	document: Arc<dyn Document>,
	state: Mutex<SessionState>,
	disposed: AtomicBool,
	telemetry: Arc<dyn ParseTelemetry>,
}

struct SessionState {
	parser: Parser,
	tree: Option<Tree>,
	/// Document version `tree` reflects, structural edits included.
	version: u64,
	pending_edits: bool,
}

impl fmt::Debug for ParseSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ParseSession")
			.field("doc_id", &self.inner.doc_id)
			.field("language", &self.inner.language)
			.field("disposed", &self.is_disposed())
			.field("queued", &self.queue.pending())
			.finish()
	}
}

impl ParseSession {
	pub fn new(language: impl Into<Arc<str>>, grammar: Arc<dyn Grammar>, document: Arc<dyn Document>, options: SessionOptions) -> Self {
		let doc_id = document.id();
		let version = document.version();
		let mut parser = Parser::with_grammar(grammar);
		parser.set_timeout(options.slice_budget);

		Self {
			queue: SerialQueue::new(format!("parse:{doc_id}"), TaskClass::Parse),
			inner: Arc::new(SessionInner {
				doc_id,
				language: language.into(),
				document,
				state: Mutex::new(SessionState {
					parser,
					tree: None,
					version,
					pending_edits: false,
				}),
				disposed: AtomicBool::new(false),
				telemetry: options.telemetry,
			}),
		}
	}

	pub fn doc_id(&self) -> DocumentId {
		self.inner.doc_id
	}

	pub fn language(&self) -> &Arc<str> {
		&self.inner.language
	}

	/// Current tree, including structural edits not yet reparsed.
	pub fn current_tree(&self) -> Option<Tree> {
		self.inner.state.lock().tree.clone()
	}

	/// Document version the current tree reflects.
	pub fn version(&self) -> u64 {
		self.inner.state.lock().version
	}

	pub fn has_pending_edits(&self) -> bool {
		self.inner.state.lock().pending_edits
	}

	/// Number of reparse jobs queued or running.
	pub fn queued(&self) -> usize {
		self.queue.pending()
	}

	pub fn is_disposed(&self) -> bool {
		self.inner.is_disposed()
	}

	/// Folds `changes` into the current tree and flags pending edits.
	///
	/// Changes the session has already seen are ignored.
	pub fn apply_edits(&self, changes: &[ContentChange]) {
		apply_edits(&mut self.inner.state.lock(), changes);
	}

	/// Queues a parse of the whole document.
	pub fn parse_full(&self) -> ChangedRanges {
		self.inner.state.lock().pending_edits = true;
		self.schedule_reparse();
		ChangedRanges::Full
	}

	/// Applies a content-change batch, queues a reparse and returns what changed.
	///
	/// The returned ranges come from diffing the tree before and after the
	/// structural edit, so they are available without waiting for the reparse.
	/// Without a previous tree the whole document is reported.
	pub fn report_change(&self, changes: &[ContentChange]) -> Result<ChangedRanges, SyntaxError> {
		if self.is_disposed() {
			return Err(SyntaxError::Disposed);
		}

		let diff = {
			let mut state = self.inner.state.lock();
			let old_tree = state.tree.clone();
			apply_edits(&mut state, changes);
			match (old_tree, state.tree.as_ref()) {
				(Some(old), Some(new)) => diff::changed_ranges(&old, new).map(ChangedRanges::Partial),
				_ => Ok(ChangedRanges::Full),
			}
		};

		match diff {
			Ok(ranges) => {
				self.schedule_reparse();
				Ok(ranges)
			}
			Err(err) => {
				tracing::error!(doc_id = %self.inner.doc_id, language = %self.inner.language, error = %err, "syntax.diff_desync");
				Err(err)
			}
		}
	}

	/// Resolves once every reparse queued before this call has settled.
	pub async fn flush(&self) {
		self.queue.flush().await;
	}

	/// Releases the tree and parser state; in-flight reparses stop without committing.
	pub fn dispose(&self) {
		if self.inner.disposed.swap(true, Ordering::AcqRel) {
			return;
		}
		let mut state = self.inner.state.lock();
		state.tree = None;
		state.parser.reset();
		state.pending_edits = false;
		tracing::debug!(doc_id = %self.inner.doc_id, language = %self.inner.language, "syntax.session_disposed");
	}

	fn schedule_reparse(&self) {
		let inner = Arc::clone(&self.inner);
		let _ = self.queue.enqueue(async move { inner.reparse().await });
	}
}

fn apply_edits(state: &mut SessionState, changes: &[ContentChange]) {
	for change in changes {
		if change.version <= state.version {
			tracing::trace!(change_version = change.version, version = state.version, "syntax.change_skipped");
			continue;
		}
		if let Some(tree) = state.tree.as_mut() {
			tree.edit(&change.to_input_edit());
		}
		state.version = change.version;
		state.pending_edits = true;
	}
}

/// Feeds document text to the parser; read failures end the input.
struct DocumentInput<'a> {
	document: &'a dyn Document,
}

impl TextInput for DocumentInput<'_> {
	fn chunk_at(&mut self, byte_offset: u32) -> Cow<'_, str> {
		match self.document.text_chunk(byte_offset) {
			Ok(chunk) => Cow::Owned(chunk),
			Err(err) => {
				tracing::debug!(doc_id = %self.document.id(), byte_offset, error = %err, "syntax.text_chunk_failed");
				Cow::Borrowed("")
			}
		}
	}
}

impl SessionInner {
	fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	async fn reparse(&self) {
		let started = Instant::now();
		let kind = {
			let mut state = self.state.lock();
			if !state.pending_edits && state.tree.is_some() {
				tracing::trace!(doc_id = %self.doc_id, "syntax.reparse_up_to_date");
				return;
			}
			state.pending_edits = false;
			if state.tree.is_some() { ParseKind::Incremental } else { ParseKind::Full }
		};

		let mut slices = 0u32;
		loop {
			if self.is_disposed() {
				return;
			}

			let result = {
				let mut guard = self.state.lock();
				let state = &mut *guard;
				if self.document.version() != state.version {
					self.defer(state, slices);
					return;
				}
				let mut input = DocumentInput { document: &*self.document };
				state.parser.parse_slice(&mut input, state.tree.as_ref())
			};
			slices += 1;

			yield_point().await;

			if self.is_disposed() {
				tracing::debug!(doc_id = %self.doc_id, slices, "syntax.reparse_abandoned");
				return;
			}

			let finished = match result {
				Ok(finished) => finished,
				Err(err) => {
					tracing::warn!(doc_id = %self.doc_id, language = %self.language, error = %err, "syntax.reparse_failed");
					return;
				}
			};

			let mut state = self.state.lock();
			if state.pending_edits {
				state.pending_edits = false;
				state.parser.reset();
				tracing::debug!(doc_id = %self.doc_id, slices, "syntax.reparse_superseded");
				continue;
			}
			if self.document.version() != state.version {
				self.defer(&mut state, slices);
				return;
			}

			if let Some(tree) = finished {
				state.tree = Some(tree);
				drop(state);
				self.telemetry.record(&ParseEvent {
					doc_id: self.doc_id,
					language: Arc::clone(&self.language),
					kind,
					elapsed: started.elapsed(),
					slices,
				});
				return;
			}
		}
	}

	/// Drops the run because the document moved past the tree; the pending
	/// report reschedules it.
	fn defer(&self, state: &mut SessionState, slices: u32) {
		state.parser.reset();
		state.pending_edits = true;
		tracing::debug!(
			doc_id = %self.doc_id,
			version = state.version,
			document_version = self.document.version(),
			slices,
			"syntax.reparse_deferred"
		);
	}
}
