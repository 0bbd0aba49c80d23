//! Fixtures shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use sylvan_language::{
	Grammar, GrammarCatalog, GrammarDef, GrammarStorage, GroupRule, InputEdit, LanguageConfig, LanguageRegistry, ParseRun, Parser, Point,
	StorageError, TextInput, TokenRule, Tree,
};
use tokio::sync::Notify;

pub(crate) fn lisp_def() -> GrammarDef {
	GrammarDef {
		name: "lisp".into(),
		root: "program".into(),
		skip: Some(r"\s+".into()),
		tokens: vec![
			TokenRule {
				kind: "number".into(),
				pattern: "[0-9]+".into(),
			},
			TokenRule {
				kind: "symbol".into(),
				pattern: "[A-Za-z_+*-][A-Za-z0-9_+*-]*".into(),
			},
		],
		groups: vec![
			GroupRule {
				kind: "list".into(),
				open: "(".into(),
				close: ")".into(),
			},
			GroupRule {
				kind: "vector".into(),
				open: "[".into(),
				close: "]".into(),
			},
		],
	}
}

/// Whitespace-separated words, no groups.
pub(crate) fn words_def() -> GrammarDef {
	GrammarDef {
		name: "words".into(),
		root: "text".into(),
		skip: Some(r"\s+".into()),
		tokens: vec![TokenRule {
			kind: "word".into(),
			pattern: r"\S+".into(),
		}],
		groups: Vec::new(),
	}
}

pub(crate) fn lisp() -> Arc<dyn Grammar> {
	Arc::new(lisp_def().compile().unwrap())
}

pub(crate) fn parse(text: &str) -> Tree {
	Parser::with_grammar(lisp()).parse(text, None).unwrap()
}

/// Applies a replacement to both the text and the tree.
pub(crate) fn edit(text: &mut String, tree: &mut Tree, start: usize, old_len: usize, new_text: &str) {
	let start_point = Point::ZERO.advance(&text[..start]);
	let old_end_point = Point::ZERO.advance(&text[..start + old_len]);
	tree.edit(&InputEdit::replace(start as u32, start_point, old_len as u32, old_end_point, new_text));
	text.replace_range(start..start + old_len, new_text);
}

/// Wraps a grammar and counts how many slices its runs execute.
#[derive(Debug)]
pub(crate) struct CountingGrammar {
	inner: Arc<dyn Grammar>,
	pub(crate) resumes: Arc<AtomicUsize>,
}

impl CountingGrammar {
	pub(crate) fn new(inner: Arc<dyn Grammar>) -> Self {
		Self {
			inner,
			resumes: Arc::default(),
		}
	}

	pub(crate) fn resumes(&self) -> usize {
		self.resumes.load(Ordering::SeqCst)
	}
}

impl Grammar for CountingGrammar {
	fn name(&self) -> &str {
		self.inner.name()
	}

	fn node_kinds(&self) -> Arc<[Box<str>]> {
		self.inner.node_kinds()
	}

	fn start(&self, old_tree: Option<&Tree>) -> Box<dyn ParseRun> {
		Box::new(CountingRun {
			inner: self.inner.start(old_tree),
			resumes: Arc::clone(&self.resumes),
		})
	}
}

struct CountingRun {
	inner: Box<dyn ParseRun>,
	resumes: Arc<AtomicUsize>,
}

impl ParseRun for CountingRun {
	fn resume(&mut self, input: &mut dyn TextInput, deadline: Instant) -> Option<Tree> {
		self.resumes.fetch_add(1, Ordering::SeqCst);
		self.inner.resume(input, deadline)
	}
}

/// In-memory grammar storage; fetches of gated files wait for their gate.
#[derive(Default)]
pub(crate) struct MemoryStorage {
	files: FxHashMap<String, Vec<u8>>,
	gates: FxHashMap<String, Arc<Notify>>,
	pub(crate) fetches: AtomicUsize,
}

impl MemoryStorage {
	/// Storage holding `lisp.grammar` and `words.grammar`.
	pub(crate) fn standard() -> Self {
		let mut storage = Self::default();
		storage.files.insert("lisp.grammar".into(), lisp_def().to_bytes().unwrap());
		storage.files.insert("words.grammar".into(), words_def().to_bytes().unwrap());
		storage
	}

	pub(crate) fn gate(&mut self, file_name: &str) -> Arc<Notify> {
		Arc::clone(self.gates.entry(file_name.to_owned()).or_default())
	}
}

#[async_trait]
impl GrammarStorage for MemoryStorage {
	async fn fetch(&self, file_name: &str) -> Result<Vec<u8>, StorageError> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		if let Some(gate) = self.gates.get(file_name) {
			gate.notified().await;
		}
		self.files
			.get(file_name)
			.cloned()
			.ok_or_else(|| StorageError::NotFound(file_name.to_owned()))
	}
}

/// Registry of `lisp`, `words` and `foo` (whose file is missing).
pub(crate) fn registry() -> LanguageRegistry {
	["lisp", "words", "foo"].into_iter().map(LanguageConfig::new).collect()
}

pub(crate) fn catalog(storage: Arc<MemoryStorage>) -> GrammarCatalog {
	GrammarCatalog::new(registry(), storage)
}
