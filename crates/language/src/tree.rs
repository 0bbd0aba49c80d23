//! Persistent syntax trees.
//!
//! A tree is a graph of immutable, reference-counted nodes. A node stores its
//! own length and each child slot stores the child's offset from the parent's
//! start, so absolute positions are accumulated on the way down and a subtree
//! can sit at different positions in different trees.
//!
//! [`Tree::edit`] applies a structural edit without reparsing. Only the nodes
//! overlapping the edit are rebuilt, together with the child lists that hold
//! them; every other subtree stays shared with the pre-edit tree. The deepest
//! rebuilt nodes are flagged with [`Node::has_changes`] so the next parse knows
//! what it cannot reuse.

use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Zero-based row/column position; columns count bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
	pub row: u32,
	pub column: u32,
}

impl Point {
	pub const ZERO: Point = Point { row: 0, column: 0 };

	pub const fn new(row: u32, column: u32) -> Self {
		Self { row, column }
	}

	/// Returns the position reached after walking over `text` from `self`.
	pub fn advance(self, text: &str) -> Self {
		match text.rfind('\n') {
			Some(last_nl) => Self {
				row: self.row + text.matches('\n').count() as u32,
				column: (text.len() - last_nl - 1) as u32,
			},
			None => Self {
				row: self.row,
				column: self.column + text.len() as u32,
			},
		}
	}

	/// `self` followed by the relative `extent`.
	fn extend(self, extent: Point) -> Point {
		if extent.row == 0 {
			Point::new(self.row, self.column + extent.column)
		} else {
			Point::new(self.row + extent.row, extent.column)
		}
	}

	/// Relative extent from `origin` to `self`.
	fn extent_from(self, origin: Point) -> Point {
		if self.row == origin.row {
			Point::new(0, self.column.saturating_sub(origin.column))
		} else {
			Point::new(self.row.saturating_sub(origin.row), self.column)
		}
	}
}

impl fmt::Display for Point {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.row, self.column)
	}
}

/// Byte count with its row/column extent. Measured from the start of the
/// text it doubles as an absolute position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Length {
	bytes: u32,
	extent: Point,
}

impl Length {
	const ZERO: Length = Length {
		bytes: 0,
		extent: Point::ZERO,
	};

	const fn new(bytes: u32, extent: Point) -> Self {
		Self { bytes, extent }
	}

	fn add(self, other: Length) -> Length {
		Length::new(self.bytes + other.bytes, self.extent.extend(other.extent))
	}

	fn sub(self, origin: Length) -> Length {
		Length::new(self.bytes.saturating_sub(origin.bytes), self.extent.extent_from(origin.extent))
	}
}

/// A byte-range replacement expressed in both byte and row/column coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdit {
	pub start_byte: u32,
	pub old_end_byte: u32,
	pub new_end_byte: u32,
	pub start_point: Point,
	pub old_end_point: Point,
	pub new_end_point: Point,
}

impl InputEdit {
	/// Builds the edit replacing `old_len` bytes at `start` with `new_text`.
	pub fn replace(start_byte: u32, start_point: Point, old_len: u32, old_end_point: Point, new_text: &str) -> Self {
		Self {
			start_byte,
			old_end_byte: start_byte + old_len,
			new_end_byte: start_byte + new_text.len() as u32,
			start_point,
			old_end_point,
			new_end_point: start_point.advance(new_text),
		}
	}

	pub fn is_insertion(&self) -> bool {
		self.old_end_byte == self.start_byte
	}

	/// True when the edit changes the text of a node spanning `start..end` (pre-edit).
	///
	/// The replaced range must overlap the node, or text must be inserted right
	/// at its end. An edit ending where the node starts only moves the node.
	fn affects(&self, start: u32, end: u32) -> bool {
		if self.old_end_byte <= start {
			false
		} else if self.start_byte < start {
			true
		} else {
			self.start_byte < end || (self.start_byte == end && self.is_insertion())
		}
	}

	/// Maps a pre-edit position into post-edit coordinates.
	///
	/// Positions at or after the replaced range move with it, positions inside
	/// it collapse onto the end of the new text. An insertion point counts as
	/// "after", so a node starting there moves while one ending there grows.
	fn shift(&self, pos: Length) -> Length {
		if pos.bytes >= self.old_end_byte {
			Length::new(pos.bytes - self.old_end_byte + self.new_end_byte, self.shift_point(pos.extent))
		} else if pos.bytes > self.start_byte {
			Length::new(self.new_end_byte, self.new_end_point)
		} else {
			pos
		}
	}

	fn shift_point(&self, point: Point) -> Point {
		if point.row == self.old_end_point.row {
			Point::new(self.new_end_point.row, self.new_end_point.column + point.column - self.old_end_point.column)
		} else {
			Point::new(point.row + self.new_end_point.row - self.old_end_point.row, point.column)
		}
	}
}

/// Index into a grammar's node-kind table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KindId(pub u16);

#[derive(Debug)]
struct GreenNode {
	kind: KindId,
	is_error: bool,
	has_changes: bool,
	/// This node or one of its descendants has changes.
	dirty: bool,
	len: Length,
	/// Nodes in this subtree, itself included.
	count: u32,
	children: Vec<GreenChild>,
}

#[derive(Debug, Clone)]
struct GreenChild {
	/// Start relative to the parent's start.
	offset: Length,
	node: Arc<GreenNode>,
}

impl GreenNode {
	fn new(kind: KindId, is_error: bool, len: Length, children: Vec<GreenChild>) -> Self {
		Self {
			kind,
			is_error,
			has_changes: false,
			dirty: children.iter().any(|c| c.node.dirty),
			len,
			count: 1 + children.iter().map(|c| c.node.count).sum::<u32>(),
			children,
		}
	}

	/// Copy without change marks; clean subtrees stay shared.
	fn cleared(self: &Arc<Self>) -> Arc<Self> {
		if !self.dirty {
			return Arc::clone(self);
		}
		let children = self
			.children
			.iter()
			.map(|child| GreenChild {
				offset: child.offset,
				node: child.node.cleared(),
			})
			.collect();
		Arc::new(GreenNode::new(self.kind, self.is_error, self.len, children))
	}

	/// Rebuilds a node the edit affects. It starts at `start` before the edit
	/// and at `new_start` after it.
	fn edit(&self, start: Length, new_start: Length, edit: &InputEdit) -> Arc<GreenNode> {
		let mut descended = false;
		let mut children = Vec::with_capacity(self.children.len());
		for child in &self.children {
			let child_start = start.add(child.offset);
			let child_new_start = edit.shift(child_start);
			let node = if edit.affects(child_start.bytes, child_start.bytes + child.node.len.bytes) {
				descended = true;
				child.node.edit(child_start, child_new_start, edit)
			} else {
				Arc::clone(&child.node)
			};
			children.push(GreenChild {
				offset: child_new_start.sub(new_start),
				node,
			});
		}

		let new_end = edit.shift(start.add(self.len));
		let mut node = GreenNode::new(self.kind, self.is_error, new_end.sub(new_start), children);
		node.has_changes = self.has_changes || !descended;
		node.dirty |= node.has_changes;
		Arc::new(node)
	}
}

fn next_revision() -> u64 {
	static REVISION: AtomicU64 = AtomicU64::new(1);
	REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Syntax tree snapshot produced by a grammar.
///
/// Cloning is O(1); clones share every node until one of them is edited.
#[derive(Clone)]
pub struct Tree {
	root: Arc<GreenNode>,
	kinds: Arc<[Box<str>]>,
	revision: u64,
}

impl fmt::Debug for Tree {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Tree")
			.field("nodes", &self.root.count)
			.field("revision", &self.revision)
			.finish()
	}
}

impl Tree {
	pub fn root_node(&self) -> Node<'_> {
		Node {
			tree: self,
			green: &self.root,
			start: Length::ZERO,
		}
	}

	/// Cursor positioned on the root node.
	pub fn walk(&self) -> TreeCursor<'_> {
		TreeCursor {
			node: self.root_node(),
			index: 0,
			ancestors: Vec::new(),
		}
	}

	/// All nodes in preorder.
	pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> + '_ {
		let mut stack = vec![self.root_node()];
		std::iter::from_fn(move || {
			let node = stack.pop()?;
			stack.extend(node.children().rev());
			Some(node)
		})
	}

	pub fn node_count(&self) -> usize {
		self.root.count as usize
	}

	/// Identity of this tree's current shape.
	///
	/// Fresh trees and every [`Tree::edit`] get a new revision; clones share it
	/// until one of them is edited.
	pub fn revision(&self) -> u64 {
		self.revision
	}

	pub fn kind_name(&self, kind: KindId) -> &str {
		self.kinds.get(kind.0 as usize).map_or("?", |k| k)
	}

	/// Applies a structural edit in place.
	///
	/// Nodes whose text the edit changes are rebuilt in post-edit coordinates,
	/// and the deepest of them are marked changed. The root always spans the
	/// whole text. Subtrees the edit does not reach are shared, not copied.
	pub fn edit(&mut self, edit: &InputEdit) {
		self.root = self.root.edit(Length::ZERO, Length::ZERO, edit);
		self.revision = next_revision();
	}

	/// Renders the tree as an s-expression with byte spans, e.g. `(doc@0..3 (word@0..3))`.
	pub fn to_sexp(&self) -> String {
		let mut out = String::new();
		write_sexp(self.root_node(), &mut out);
		out
	}
}

fn write_sexp(node: Node<'_>, out: &mut String) {
	let _ = write!(out, "({}@{}..{}", node.kind(), node.start_byte(), node.end_byte());
	for child in node.children() {
		out.push(' ');
		write_sexp(child, out);
	}
	out.push(')');
}

/// Borrowed handle to one node of a [`Tree`], positioned in that tree.
#[derive(Clone, Copy)]
pub struct Node<'tree> {
	tree: &'tree Tree,
	green: &'tree Arc<GreenNode>,
	start: Length,
}

impl fmt::Debug for Node<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}..{}", self.kind(), self.start_byte(), self.end_byte())
	}
}

impl<'tree> Node<'tree> {
	pub fn tree(&self) -> &'tree Tree {
		self.tree
	}

	pub fn kind_id(&self) -> KindId {
		self.green.kind
	}

	pub fn kind(&self) -> &'tree str {
		self.tree.kind_name(self.green.kind)
	}

	pub fn is_error(&self) -> bool {
		self.green.is_error
	}

	pub fn is_root(&self) -> bool {
		Arc::ptr_eq(self.green, &self.tree.root)
	}

	pub fn start_byte(&self) -> u32 {
		self.start.bytes
	}

	pub fn end_byte(&self) -> u32 {
		self.start.bytes + self.green.len.bytes
	}

	pub fn byte_len(&self) -> u32 {
		self.green.len.bytes
	}

	pub fn start_position(&self) -> Point {
		self.start.extent
	}

	pub fn end_position(&self) -> Point {
		self.start.add(self.green.len).extent
	}

	pub fn child_count(&self) -> u32 {
		self.green.children.len() as u32
	}

	/// True when the last structural edit touched this node's own text.
	pub fn has_changes(&self) -> bool {
		self.green.has_changes
	}

	pub fn children(&self) -> impl DoubleEndedIterator<Item = Node<'tree>> + ExactSizeIterator + use<'tree> {
		let (tree, start) = (self.tree, self.start);
		let green: &'tree Arc<GreenNode> = self.green;
		green.children.iter().map(move |child| Node {
			tree,
			green: &child.node,
			start: start.add(child.offset),
		})
	}

	pub fn child(&self, index: u32) -> Option<Node<'tree>> {
		self.child_at(index as usize)
	}

	pub fn last_child(&self) -> Option<Node<'tree>> {
		self.children().next_back()
	}

	/// Detaches this node, keeping its subtree alive without the tree.
	pub fn to_subtree(&self) -> Subtree {
		Subtree {
			green: Arc::clone(self.green),
			start: self.start,
		}
	}

	fn child_at(&self, index: usize) -> Option<Node<'tree>> {
		let green: &'tree Arc<GreenNode> = self.green;
		green.children.get(index).map(|child| Node {
			tree: self.tree,
			green: &child.node,
			start: self.start.add(child.offset),
		})
	}
}

/// A node lifted out of its tree, for grafting into a new one.
#[derive(Clone)]
pub struct Subtree {
	green: Arc<GreenNode>,
	start: Length,
}

impl fmt::Debug for Subtree {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Subtree({:?}@{}..{})", self.green.kind, self.start_byte(), self.end_byte())
	}
}

impl Subtree {
	pub fn kind_id(&self) -> KindId {
		self.green.kind
	}

	pub fn start_byte(&self) -> u32 {
		self.start.bytes
	}

	pub fn end_byte(&self) -> u32 {
		self.start.bytes + self.green.len.bytes
	}

	pub fn byte_len(&self) -> u32 {
		self.green.len.bytes
	}

	pub fn start_position(&self) -> Point {
		self.start.extent
	}

	pub fn end_position(&self) -> Point {
		self.start.add(self.green.len).extent
	}
}

/// Stateful traversal over a tree, starting at the root.
///
/// Every step reports whether it moved; a failed step leaves the cursor in place.
#[derive(Clone)]
pub struct TreeCursor<'tree> {
	node: Node<'tree>,
	/// Index of `node` among its siblings.
	index: usize,
	ancestors: Vec<(Node<'tree>, usize)>,
}

impl<'tree> TreeCursor<'tree> {
	pub fn node(&self) -> Node<'tree> {
		self.node
	}

	pub fn goto_first_child(&mut self) -> bool {
		let Some(child) = self.node.child_at(0) else {
			return false;
		};
		self.ancestors.push((self.node, self.index));
		self.node = child;
		self.index = 0;
		true
	}

	pub fn goto_next_sibling(&mut self) -> bool {
		let Some(sibling) = self.ancestors.last().and_then(|(parent, _)| parent.child_at(self.index + 1)) else {
			return false;
		};
		self.node = sibling;
		self.index += 1;
		true
	}

	pub fn goto_parent(&mut self) -> bool {
		let Some((parent, index)) = self.ancestors.pop() else {
			return false;
		};
		self.node = parent;
		self.index = index;
		true
	}
}

struct OpenNode {
	kind: KindId,
	start: Length,
	children: Vec<GreenChild>,
}

impl OpenNode {
	fn new(kind: KindId, start: Length) -> Self {
		Self {
			kind,
			start,
			children: Vec::new(),
		}
	}

	fn build(self, end: Length) -> Arc<GreenNode> {
		Arc::new(GreenNode::new(self.kind, false, end.sub(self.start), self.children))
	}
}

/// Incremental preorder construction of a [`Tree`].
///
/// The root is opened on creation; [`TreeBuilder::finish`] closes whatever is
/// still open at the end of input.
pub struct TreeBuilder {
	kinds: Arc<[Box<str>]>,
	root: OpenNode,
	open: Vec<OpenNode>,
}

impl TreeBuilder {
	pub fn new(kinds: Arc<[Box<str>]>, root_kind: KindId) -> Self {
		Self {
			kinds,
			root: OpenNode::new(root_kind, Length::ZERO),
			open: Vec::new(),
		}
	}

	/// Opens an inner node as the next child of the innermost open node.
	pub fn open(&mut self, kind: KindId, start_byte: u32, start_point: Point) {
		self.open.push(OpenNode::new(kind, Length::new(start_byte, start_point)));
	}

	/// Closes the innermost open node. The root is only closed by [`TreeBuilder::finish`].
	pub fn close(&mut self, end_byte: u32, end_point: Point) {
		if let Some(node) = self.open.pop() {
			let start = node.start;
			let green = node.build(Length::new(end_byte, end_point));
			self.attach(start, green);
		}
	}

	/// Appends a leaf to the innermost open node.
	pub fn leaf(&mut self, kind: KindId, is_error: bool, span: (u32, u32), points: (Point, Point)) {
		let start = Length::new(span.0, points.0);
		let end = Length::new(span.1, points.1);
		self.attach(start, Arc::new(GreenNode::new(kind, is_error, end.sub(start), Vec::new())));
	}

	/// Appends `subtree` at its own position, clearing change marks.
	///
	/// Clean subtrees are shared with the tree they came from.
	pub fn graft(&mut self, subtree: &Subtree) {
		self.attach(subtree.start, subtree.green.cleared());
	}

	/// Closes all open nodes at `end` and returns the tree.
	pub fn finish(mut self, end_byte: u32, end_point: Point) -> Tree {
		while !self.open.is_empty() {
			self.close(end_byte, end_point);
		}
		Tree {
			root: self.root.build(Length::new(end_byte, end_point)),
			kinds: self.kinds,
			revision: next_revision(),
		}
	}

	fn attach(&mut self, start: Length, node: Arc<GreenNode>) {
		let parent = self.open.last_mut().unwrap_or(&mut self.root);
		parent.children.push(GreenChild {
			offset: start.sub(parent.start),
			node,
		});
	}
}
