// Library code reports through tracing, never stderr.
#![deny(clippy::print_stderr)]

//! Grammars, syntax trees and the grammar catalog.
//!
//! # Architecture
//!
//! * [`tree`]: persistent syntax trees with structural edits, change marks and cursors
//! * [`grammar`]: the opaque [`Grammar`] trait and resumable [`ParseRun`]s
//! * [`parser`]: [`Parser`], which drives a run in bounded time slices
//! * [`token_grammar`]: declarative grammars shipped as postcard blobs
//! * [`storage`]: where grammar blobs come from
//! * [`config`]: language id to grammar file mapping
//! * [`catalog`]: [`GrammarCatalog`], loading each language's grammar at most once

pub mod catalog;
pub mod config;
pub mod grammar;
pub mod parser;
pub mod storage;
pub mod token_grammar;
pub mod tree;

pub use catalog::{GrammarCatalog, GrammarDecoder, LanguageAvailable};
pub use config::{ConfigError, LanguageConfig, LanguageRegistry};
pub use grammar::{Grammar, GrammarError, ParseRun, TextInput};
pub use parser::{DEFAULT_SLICE_BUDGET, ParseError, Parser};
pub use storage::{FsGrammarStorage, GrammarStorage, StorageError, grammar_search_paths};
pub use token_grammar::{GrammarDef, GroupRule, TokenGrammar, TokenRule};
pub use tree::{InputEdit, KindId, Node, Point, Subtree, Tree, TreeBuilder, TreeCursor};
