use sylvan_language::ParseError;
use thiserror::Error;

use crate::diff::TraversalStep;

/// Errors surfaced by parse sessions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
	/// Old and new trees disagreed on a lockstep traversal step.
	///
	/// The trees were expected to have identical shape; the current reparse
	/// cycle is abandoned but the session stays usable.
	#[error("old and new trees diverged on {step} after {visited} nodes")]
	Desync { step: TraversalStep, visited: usize },

	#[error("parse session is disposed")]
	Disposed,

	#[error(transparent)]
	Parse(#[from] ParseError),
}
