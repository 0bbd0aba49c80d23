//! Changed-node diff between a tree and its structurally edited copy.
//!
//! Both trees are walked in lockstep: every traversal step is issued to both
//! cursors and must succeed or fail on both. The first non-root node of the
//! edited tree that carries a change mark is reported together with its
//! counterpart in the old tree; its descendants are not visited.

use std::fmt;
use std::ops::Range;

use sylvan_language::{Node, Tree, TreeCursor};

use crate::error::SyntaxError;
use crate::position::{Position, PositionRange};

/// Cursor movement issued to both trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalStep {
	FirstChild,
	NextSibling,
	Parent,
}

impl fmt::Display for TraversalStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::FirstChild => "first-child",
			Self::NextSibling => "next-sibling",
			Self::Parent => "parent",
		})
	}
}

/// A changed node of the edited tree and the node it corresponds to before the edit.
#[derive(Debug, Clone, Copy)]
pub struct ChangedNode<'tree> {
	pub new: Node<'tree>,
	pub old: Node<'tree>,
}

/// An invalidated region: where it is now, and how long it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeChange {
	/// Extent in the new text, in host coordinates.
	pub range: PositionRange,
	/// Byte span in the new text.
	pub bytes: Range<u32>,
	/// Byte length of the region in the old text.
	pub old_byte_len: u32,
}

/// Everything that changed since the previous report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangedRanges {
	/// The whole document (first parse, language switch).
	Full,
	Partial(Vec<RangeChange>),
}

impl ChangedRanges {
	pub fn is_full(&self) -> bool {
		matches!(self, Self::Full)
	}

	/// The partial ranges, empty for [`ChangedRanges::Full`].
	pub fn ranges(&self) -> &[RangeChange] {
		match self {
			Self::Full => &[],
			Self::Partial(ranges) => ranges,
		}
	}
}

struct Lockstep<'a> {
	old: TreeCursor<'a>,
	new: TreeCursor<'a>,
	visited: usize,
}

impl Lockstep<'_> {
	fn step(&mut self, step: TraversalStep) -> Result<bool, SyntaxError> {
		let (old, new) = match step {
			TraversalStep::FirstChild => (self.old.goto_first_child(), self.new.goto_first_child()),
			TraversalStep::NextSibling => (self.old.goto_next_sibling(), self.new.goto_next_sibling()),
			TraversalStep::Parent => (self.old.goto_parent(), self.new.goto_parent()),
		};
		if old != new {
			return Err(SyntaxError::Desync {
				step,
				visited: self.visited,
			});
		}
		Ok(new)
	}
}

/// Collects changed nodes in document order.
pub fn changed_nodes<'tree>(old: &'tree Tree, new: &'tree Tree) -> Result<Vec<ChangedNode<'tree>>, SyntaxError> {
	let mut walk = Lockstep {
		old: old.walk(),
		new: new.walk(),
		visited: 0,
	};
	let mut changed = Vec::new();

	loop {
		walk.visited += 1;
		let node = walk.new.node();
		if node.has_changes() && !node.is_root() {
			changed.push(ChangedNode {
				new: node,
				old: walk.old.node(),
			});
		} else if walk.step(TraversalStep::FirstChild)? {
			continue;
		}

		loop {
			if walk.step(TraversalStep::NextSibling)? {
				break;
			}
			if !walk.step(TraversalStep::Parent)? {
				return Ok(changed);
			}
		}
	}
}

/// Diffs `old` against its edited copy `new` and translates the result into host ranges.
pub fn changed_ranges(old: &Tree, new: &Tree) -> Result<Vec<RangeChange>, SyntaxError> {
	let changed = changed_nodes(old, new)?;
	Ok(changed
		.into_iter()
		.map(|ChangedNode { new, old }| RangeChange {
			range: PositionRange::new(Position::from_point(new.start_position()), Position::from_point(new.end_position())),
			bytes: new.start_byte()..new.end_byte(),
			old_byte_len: old.byte_len(),
		})
		.collect())
}

#[cfg(test)]
mod tests;
