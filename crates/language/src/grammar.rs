//! Opaque compiled grammars.
//!
//! A [`Grammar`] is an immutable, shareable unit that knows how to start a
//! resumable parse. The [`crate::Parser`] drives the resulting [`ParseRun`] in
//! bounded time slices, pulling document text through [`TextInput`].

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::storage::StorageError;
use crate::tree::Tree;

/// Errors that can occur when resolving or compiling a grammar.
#[derive(Error, Debug)]
pub enum GrammarError {
	#[error("no grammar mapped for language: {0}")]
	NotFound(String),

	#[error("failed to fetch grammar file {file}: {source}")]
	Fetch {
		file: String,
		#[source]
		source: StorageError,
	},

	#[error("failed to decode grammar blob: {0}")]
	Decode(#[from] postcard::Error),

	#[error("invalid pattern for `{kind}`: {source}")]
	InvalidPattern {
		kind: String,
		#[source]
		source: regex::Error,
	},

	#[error("invalid grammar definition: {0}")]
	Invalid(String),
}

/// Pull-based text access for the parser, indexed by byte offset.
pub trait TextInput {
	/// Returns text starting at `byte_offset`. An empty chunk means end of input.
	fn chunk_at(&mut self, byte_offset: u32) -> Cow<'_, str>;
}

impl TextInput for &str {
	fn chunk_at(&mut self, byte_offset: u32) -> Cow<'_, str> {
		Cow::Borrowed(self.get(byte_offset as usize..).unwrap_or_default())
	}
}

/// A compiled, language-specific parsing definition.
pub trait Grammar: Send + Sync + fmt::Debug {
	fn name(&self) -> &str;

	/// Node-kind table shared by every tree this grammar produces.
	fn node_kinds(&self) -> Arc<[Box<str>]>;

	/// Begins a parse, optionally reusing clean subtrees of an edited `old_tree`.
	fn start(&self, old_tree: Option<&Tree>) -> Box<dyn ParseRun>;
}

/// In-progress parse that can be suspended between time slices.
pub trait ParseRun: Send {
	/// Advances until the tree is complete or `deadline` has passed.
	///
	/// Each call performs a bounded minimum amount of work before consulting
	/// the deadline, so repeated calls always finish.
	fn resume(&mut self, input: &mut dyn TextInput, deadline: Instant) -> Option<Tree>;
}
