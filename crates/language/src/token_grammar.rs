//! Declarative token grammars.
//!
//! A [`GrammarDef`] lists token rules (regular expressions), bracket groups and
//! an optional skip pattern. It travels as a postcard blob and compiles into a
//! [`TokenGrammar`], whose parse runs:
//!
//! * read the whole input through [`TextInput`] chunk by chunk,
//! * lex with delimiter precedence (skip, closing the innermost group, opening
//!   a group, stray closers, longest token match, single-char error),
//! * graft clean subtrees of the edited old tree when the lexer would
//!   reproduce them at the same position.

use std::sync::Arc;
use std::time::Instant;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::grammar::{Grammar, GrammarError, ParseRun, TextInput};
use crate::tree::{KindId, Node, Point, Subtree, Tree, TreeBuilder};

/// Kind name of error leaves.
pub const ERROR_KIND: &str = "ERROR";

/// Units of work (chunks read or lexemes applied) between deadline checks.
const SLICE_BATCH: u32 = 64;

/// Serializable grammar definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarDef {
	pub name: String,
	/// Kind of the root node.
	pub root: String,
	/// Text skipped between tokens (usually whitespace).
	#[serde(default)]
	pub skip: Option<String>,
	pub tokens: Vec<TokenRule>,
	#[serde(default)]
	pub groups: Vec<GroupRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRule {
	pub kind: String,
	pub pattern: String,
}

/// Bracketed group with literal delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRule {
	pub kind: String,
	pub open: String,
	pub close: String,
}

impl GrammarDef {
	pub fn to_bytes(&self) -> Result<Vec<u8>, GrammarError> {
		Ok(postcard::to_allocvec(self)?)
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Self, GrammarError> {
		Ok(postcard::from_bytes(bytes)?)
	}

	pub fn compile(&self) -> Result<TokenGrammar, GrammarError> {
		Compiled::new(self).map(|inner| TokenGrammar { inner: Arc::new(inner) })
	}
}

/// Compiled token grammar.
#[derive(Debug, Clone)]
pub struct TokenGrammar {
	inner: Arc<Compiled>,
}

impl TokenGrammar {
	/// Decodes and compiles a postcard-encoded [`GrammarDef`].
	pub fn decode(bytes: &[u8]) -> Result<Arc<dyn Grammar>, GrammarError> {
		let grammar = GrammarDef::from_bytes(bytes)?.compile()?;
		Ok(Arc::new(grammar))
	}
}

impl Grammar for TokenGrammar {
	fn name(&self) -> &str {
		&self.inner.name
	}

	fn node_kinds(&self) -> Arc<[Box<str>]> {
		Arc::clone(&self.inner.kinds)
	}

	fn start(&self, old_tree: Option<&Tree>) -> Box<dyn ParseRun> {
		Box::new(TokenRun::new(Arc::clone(&self.inner), old_tree))
	}
}

#[derive(Debug)]
struct TokenMatcher {
	kind: KindId,
	regex: Regex,
}

#[derive(Debug)]
struct GroupMatcher {
	kind: KindId,
	open: String,
	open_kind: KindId,
	close: String,
	close_kind: KindId,
}

#[derive(Debug)]
struct Compiled {
	name: String,
	kinds: Arc<[Box<str>]>,
	root: KindId,
	error: KindId,
	skip: Option<Regex>,
	tokens: Vec<TokenMatcher>,
	groups: Vec<GroupMatcher>,
	group_by_kind: FxHashMap<KindId, usize>,
}

#[derive(Default)]
struct KindTable {
	names: Vec<Box<str>>,
	ids: FxHashMap<String, KindId>,
}

impl KindTable {
	fn intern(&mut self, name: &str) -> Result<KindId, GrammarError> {
		if let Some(id) = self.ids.get(name) {
			return Ok(*id);
		}
		let id = u16::try_from(self.names.len())
			.map(KindId)
			.map_err(|_| GrammarError::Invalid("too many node kinds".into()))?;
		self.names.push(name.into());
		self.ids.insert(name.to_owned(), id);
		Ok(id)
	}
}

fn anchored(kind: &str, pattern: &str) -> Result<Regex, GrammarError> {
	Regex::new(&format!("^(?:{pattern})")).map_err(|source| GrammarError::InvalidPattern {
		kind: kind.to_owned(),
		source,
	})
}

impl Compiled {
	fn new(def: &GrammarDef) -> Result<Self, GrammarError> {
		if def.tokens.is_empty() && def.groups.is_empty() {
			return Err(GrammarError::Invalid(format!("grammar `{}` defines no tokens or groups", def.name)));
		}

		let mut kinds = KindTable::default();
		let root = kinds.intern(&def.root)?;
		let error = kinds.intern(ERROR_KIND)?;

		let mut tokens = Vec::with_capacity(def.tokens.len());
		for rule in &def.tokens {
			if rule.pattern.is_empty() {
				return Err(GrammarError::Invalid(format!("token `{}` has an empty pattern", rule.kind)));
			}
			tokens.push(TokenMatcher {
				kind: kinds.intern(&rule.kind)?,
				regex: anchored(&rule.kind, &rule.pattern)?,
			});
		}

		let mut groups = Vec::with_capacity(def.groups.len());
		let mut group_by_kind = FxHashMap::default();
		for rule in &def.groups {
			if rule.open.is_empty() || rule.close.is_empty() {
				return Err(GrammarError::Invalid(format!("group `{}` has an empty delimiter", rule.kind)));
			}
			let kind = kinds.intern(&rule.kind)?;
			group_by_kind.entry(kind).or_insert(groups.len());
			groups.push(GroupMatcher {
				kind,
				open_kind: kinds.intern(&rule.open)?,
				open: rule.open.clone(),
				close_kind: kinds.intern(&rule.close)?,
				close: rule.close.clone(),
			});
		}

		let skip = match def.skip.as_deref() {
			Some(pattern) if !pattern.is_empty() => Some(anchored("skip", pattern)?),
			_ => None,
		};

		Ok(Self {
			name: def.name.clone(),
			kinds: kinds.names.into(),
			root,
			error,
			skip,
			tokens,
			groups,
			group_by_kind,
		})
	}

	fn is_token_kind(&self, kind: KindId) -> bool {
		self.tokens.iter().any(|t| t.kind == kind)
	}

	/// True for a group node that ends with its own closing delimiter.
	fn is_closed_group(&self, node: Node<'_>) -> bool {
		self.group_by_kind
			.get(&node.kind_id())
			.is_some_and(|&g| node.last_child().is_some_and(|last| last.kind_id() == self.groups[g].close_kind && node.child_count() > 1))
	}

	fn next_lexeme(&self, rest: &str, top: Option<usize>) -> Lexeme {
		if let Some(skip) = &self.skip
			&& let Some(m) = skip.find(rest)
			&& m.end() > 0
		{
			return Lexeme::Skip(m.end());
		}

		if let Some(g) = top
			&& rest.starts_with(&self.groups[g].close)
		{
			return Lexeme::Close(g, self.groups[g].close.len());
		}

		if let Some(g) = self.groups.iter().position(|group| rest.starts_with(&group.open)) {
			return Lexeme::Open(g, self.groups[g].open.len());
		}

		if let Some(group) = self.groups.iter().find(|group| rest.starts_with(&group.close)) {
			return Lexeme::Error(group.close.len());
		}

		let mut best: Option<(KindId, usize)> = None;
		for token in &self.tokens {
			if let Some(m) = token.regex.find(rest)
				&& m.end() > best.map_or(0, |(_, len)| len)
			{
				best = Some((token.kind, m.end()));
			}
		}
		if let Some((kind, len)) = best {
			return Lexeme::Token(kind, len);
		}

		Lexeme::Error(rest.chars().next().map_or(1, char::len_utf8))
	}

	/// Maps start byte to the outermost clean, reusable node starting there.
	fn reusable_nodes(&self, tree: &Tree) -> FxHashMap<u32, Subtree> {
		let mut reusable = FxHashMap::default();
		for child in tree.root_node().children() {
			self.collect_reusable(child, &mut reusable);
		}
		reusable
	}

	/// Returns whether `node`'s subtree is free of changes and errors.
	fn collect_reusable(&self, node: Node<'_>, out: &mut FxHashMap<u32, Subtree>) -> bool {
		let mut clean = !node.has_changes() && !node.is_error();
		for child in node.children() {
			clean &= self.collect_reusable(child, out);
		}
		// Ancestors are visited after their descendants and win the slot.
		if clean && node.byte_len() > 0 && (self.is_token_kind(node.kind_id()) || self.is_closed_group(node)) {
			out.insert(node.start_byte(), node.to_subtree());
		}
		clean
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme {
	Skip(usize),
	Close(usize, usize),
	Open(usize, usize),
	Token(KindId, usize),
	Error(usize),
}

struct TokenRun {
	grammar: Arc<Compiled>,
	buf: String,
	eof: bool,
	pos: usize,
	point: Point,
	builder: TreeBuilder,
	open_groups: Vec<usize>,
	reusable: FxHashMap<u32, Subtree>,
	reused: u32,
}

impl TokenRun {
	fn new(grammar: Arc<Compiled>, old_tree: Option<&Tree>) -> Self {
		let reusable = old_tree.map(|tree| grammar.reusable_nodes(tree)).unwrap_or_default();
		Self {
			builder: TreeBuilder::new(Arc::clone(&grammar.kinds), grammar.root),
			grammar,
			buf: String::new(),
			eof: false,
			pos: 0,
			point: Point::ZERO,
			open_groups: Vec::new(),
			reusable,
			reused: 0,
		}
	}

	fn read_chunk(&mut self, input: &mut dyn TextInput) {
		let chunk = input.chunk_at(self.buf.len() as u32);
		if chunk.is_empty() {
			self.eof = true;
		} else {
			self.buf.push_str(&chunk);
		}
	}

	fn lex_step(&mut self) -> Option<Tree> {
		if self.pos >= self.buf.len() {
			return Some(self.finish());
		}

		let lexeme = self.grammar.next_lexeme(&self.buf[self.pos..], self.open_groups.last().copied());
		if let Some(subtree) = self.reusable_here(lexeme) {
			self.reuse(&subtree);
			return None;
		}

		match lexeme {
			Lexeme::Skip(len) => self.advance(len),
			Lexeme::Close(g, len) => {
				self.emit(self.grammar.groups[g].close_kind, false, len);
				self.builder.close(self.pos as u32, self.point);
				self.open_groups.pop();
			}
			Lexeme::Open(g, len) => {
				self.builder.open(self.grammar.groups[g].kind, self.pos as u32, self.point);
				self.emit(self.grammar.groups[g].open_kind, false, len);
				self.open_groups.push(g);
			}
			Lexeme::Token(kind, len) => self.emit(kind, false, len),
			Lexeme::Error(len) => self.emit(self.grammar.error, true, len),
		}
		None
	}

	/// Returns an old node to graft when lexing here would rebuild it anyway.
	fn reusable_here(&self, lexeme: Lexeme) -> Option<Subtree> {
		let node = self.reusable.get(&(self.pos as u32))?;
		if node.end_byte() as usize > self.buf.len() || node.start_position() != self.point {
			return None;
		}
		let same_start = match lexeme {
			Lexeme::Token(kind, len) => kind == node.kind_id() && len == node.byte_len() as usize,
			Lexeme::Open(g, _) => self.grammar.groups[g].kind == node.kind_id(),
			_ => false,
		};
		same_start.then(|| node.clone())
	}

	fn reuse(&mut self, subtree: &Subtree) {
		self.builder.graft(subtree);
		self.pos = subtree.end_byte() as usize;
		self.point = subtree.end_position();
		self.reused += 1;
	}

	fn emit(&mut self, kind: KindId, is_error: bool, len: usize) {
		let (start, start_point) = (self.pos as u32, self.point);
		self.advance(len);
		self.builder.leaf(kind, is_error, (start, self.pos as u32), (start_point, self.point));
	}

	fn advance(&mut self, len: usize) {
		let end = (self.pos + len).min(self.buf.len());
		self.point = self.point.advance(&self.buf[self.pos..end]);
		self.pos = end;
	}

	fn finish(&mut self) -> Tree {
		let builder = std::mem::replace(&mut self.builder, TreeBuilder::new(Arc::clone(&self.grammar.kinds), self.grammar.root));
		let tree = builder.finish(self.pos as u32, self.point);
		tracing::trace!(
			grammar = %self.grammar.name,
			nodes = tree.node_count(),
			reused = self.reused,
			bytes = self.pos,
			"token_grammar.finish"
		);
		tree
	}
}

impl ParseRun for TokenRun {
	fn resume(&mut self, input: &mut dyn TextInput, deadline: Instant) -> Option<Tree> {
		let mut units = 0u32;
		loop {
			if !self.eof {
				self.read_chunk(input);
			} else if let Some(tree) = self.lex_step() {
				return Some(tree);
			}
			units += 1;
			if units % SLICE_BATCH == 0 && Instant::now() >= deadline {
				return None;
			}
		}
	}
}

#[cfg(test)]
pub(crate) mod tests;
