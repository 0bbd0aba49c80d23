use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::grammar::{Grammar, ParseRun, TextInput};
use crate::tree::Tree;

/// Default wall-clock budget of one parse slice.
pub const DEFAULT_SLICE_BUDGET: Duration = Duration::from_millis(20);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
	#[error("parser has no grammar")]
	NoGrammar,
}

struct ActiveRun {
	base_revision: Option<u64>,
	run: Box<dyn ParseRun>,
}

/// Time-sliced parser handle.
///
/// Keeps the in-progress run between slices. A run is tied to the revision of
/// the tree it started from; handing a differently edited tree restarts it.
pub struct Parser {
	grammar: Option<Arc<dyn Grammar>>,
	timeout: Duration,
	run: Option<ActiveRun>,
}

impl Default for Parser {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Parser {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Parser")
			.field("grammar", &self.grammar.as_ref().map(|g| g.name().to_owned()))
			.field("timeout", &self.timeout)
			.field("in_progress", &self.run.is_some())
			.finish()
	}
}

impl Parser {
	pub fn new() -> Self {
		Self {
			grammar: None,
			timeout: DEFAULT_SLICE_BUDGET,
			run: None,
		}
	}

	pub fn with_grammar(grammar: Arc<dyn Grammar>) -> Self {
		let mut parser = Self::new();
		parser.set_grammar(grammar);
		parser
	}

	/// Sets the grammar, discarding any in-progress run.
	pub fn set_grammar(&mut self, grammar: Arc<dyn Grammar>) {
		self.grammar = Some(grammar);
		self.run = None;
	}

	pub fn grammar(&self) -> Option<&Arc<dyn Grammar>> {
		self.grammar.as_ref()
	}

	/// Sets the wall-clock budget of one slice.
	pub fn set_timeout(&mut self, timeout: Duration) {
		self.timeout = timeout;
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Returns true while a run is suspended mid-parse.
	pub fn is_parsing(&self) -> bool {
		self.run.is_some()
	}

	/// Drops any in-progress run.
	pub fn reset(&mut self) {
		self.run = None;
	}

	/// Runs one time slice.
	///
	/// Returns `Ok(None)` when the budget ran out before the tree was complete;
	/// calling again resumes where the slice stopped.
	pub fn parse_slice(&mut self, input: &mut dyn TextInput, old_tree: Option<&Tree>) -> Result<Option<Tree>, ParseError> {
		let grammar = self.grammar.as_ref().ok_or(ParseError::NoGrammar)?;
		let base_revision = old_tree.map(Tree::revision);

		if self.run.as_ref().is_some_and(|active| active.base_revision != base_revision) {
			tracing::trace!(grammar = grammar.name(), "parser.restart_on_new_base");
			self.run = None;
		}

		let active = self.run.get_or_insert_with(|| ActiveRun {
			base_revision,
			run: grammar.start(old_tree),
		});
		let tree = active.run.resume(input, Instant::now() + self.timeout);
		if tree.is_some() {
			self.run = None;
		}
		Ok(tree)
	}

	/// Parses to completion without yielding, regardless of the slice budget.
	pub fn parse(&mut self, mut text: &str, old_tree: Option<&Tree>) -> Result<Tree, ParseError> {
		loop {
			if let Some(tree) = self.parse_slice(&mut text, old_tree)? {
				return Ok(tree);
			}
		}
	}
}
