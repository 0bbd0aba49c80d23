//! Host documents.
//!
//! The engine reads document text through [`Document`] and learns about edits
//! through batches of [`ContentChange`]s. [`RopeDocument`] is a rope-backed
//! implementation that produces those batches as it is edited.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use ropey::Rope;
use sylvan_language::{InputEdit, Point};
use thiserror::Error;

use crate::position::Position;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub u64);

impl DocumentId {
	/// Generates a new unique document ID.
	pub fn next() -> Self {
		Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for DocumentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "doc#{}", self.0)
	}
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
	#[error("document is disposed")]
	Disposed,

	#[error("byte offset {offset} is past the end of the document ({len} bytes)")]
	OutOfBounds { offset: u32, len: u32 },

	#[error("byte offset {0} is not on a character boundary")]
	NotCharBoundary(u32),
}

/// Read-only view of a live document.
pub trait Document: Send + Sync {
	fn id(&self) -> DocumentId;

	/// Returns text starting at `byte_offset`; empty at the end of the document.
	fn text_chunk(&self, byte_offset: u32) -> Result<String, DocumentError>;

	fn len_bytes(&self) -> u32;

	/// Edit counter of the text. It changes together with the text and never decreases.
	fn version(&self) -> u64;

	/// Converts a byte offset to a host position, clamping past the end.
	fn position_at(&self, byte_offset: u32) -> Position;

	fn is_disposed(&self) -> bool;
}

/// One edit of a content-change batch.
///
/// Offsets and positions refer to the text as it was before this edit, but
/// after the preceding edits of the same batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
	pub start_byte: u32,
	pub old_len: u32,
	pub new_text: String,
	pub start: Position,
	pub old_end: Position,
	/// [`Document::version`] once this edit is applied.
	pub version: u64,
}

impl ContentChange {
	pub fn to_input_edit(&self) -> InputEdit {
		InputEdit::replace(self.start_byte, self.start.to_point(), self.old_len, self.old_end.to_point(), &self.new_text)
	}
}

/// Rope-backed [`Document`].
pub struct RopeDocument {
	id: DocumentId,
	text: RwLock<Rope>,
	/// Written only under the `text` write lock.
	version: AtomicU64,
	disposed: AtomicBool,
}

impl fmt::Debug for RopeDocument {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RopeDocument")
			.field("id", &self.id)
			.field("len_bytes", &self.len_bytes())
			.field("version", &self.version())
			.field("disposed", &self.is_disposed())
			.finish()
	}
}

impl RopeDocument {
	pub fn new(text: &str) -> Self {
		Self::with_id(DocumentId::next(), text)
	}

	pub fn with_id(id: DocumentId, text: &str) -> Self {
		Self {
			id,
			text: RwLock::new(Rope::from_str(text)),
			version: AtomicU64::new(0),
			disposed: AtomicBool::new(false),
		}
	}

	pub fn text(&self) -> String {
		self.text.read().to_string()
	}

	/// Replaces `old_len` bytes at `start_byte`, returning the change record.
	pub fn replace(&self, start_byte: u32, old_len: u32, new_text: &str) -> Result<ContentChange, DocumentError> {
		if self.is_disposed() {
			return Err(DocumentError::Disposed);
		}

		let mut rope = self.text.write();
		let len = rope.len_bytes() as u32;
		let old_end_byte = start_byte.checked_add(old_len).filter(|end| *end <= len).ok_or(DocumentError::OutOfBounds {
			offset: start_byte.saturating_add(old_len),
			len,
		})?;

		let start_char = char_index(&rope, start_byte)?;
		let end_char = char_index(&rope, old_end_byte)?;
		let start = Position::from_point(point_at(&rope, start_char));
		let old_end = Position::from_point(point_at(&rope, end_char));

		rope.remove(start_char..end_char);
		rope.insert(start_char, new_text);
		let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
		Ok(ContentChange {
			start_byte,
			old_len,
			new_text: new_text.to_owned(),
			start,
			old_end,
			version,
		})
	}

	/// Applies `(start_byte, old_len, new_text)` edits in order as one batch.
	///
	/// Each edit is addressed against the text produced by the edits before it.
	pub fn apply(&self, edits: &[(u32, u32, &str)]) -> Result<Vec<ContentChange>, DocumentError> {
		edits.iter().map(|&(start, old_len, new_text)| self.replace(start, old_len, new_text)).collect()
	}

	pub fn dispose(&self) {
		self.disposed.store(true, Ordering::Release);
	}
}

fn char_index(rope: &Rope, byte_offset: u32) -> Result<usize, DocumentError> {
	let char_idx = rope.byte_to_char(byte_offset as usize);
	if rope.char_to_byte(char_idx) != byte_offset as usize {
		return Err(DocumentError::NotCharBoundary(byte_offset));
	}
	Ok(char_idx)
}

/// Zero-based point of a char index; only `\n` starts a new row.
fn point_at(rope: &Rope, char_idx: usize) -> Point {
	rope.slice(..char_idx).chunks().fold(Point::ZERO, |point, chunk| point.advance(chunk))
}

impl Document for RopeDocument {
	fn id(&self) -> DocumentId {
		self.id
	}

	fn text_chunk(&self, byte_offset: u32) -> Result<String, DocumentError> {
		if self.is_disposed() {
			return Err(DocumentError::Disposed);
		}

		let rope = self.text.read();
		let offset = byte_offset as usize;
		let len = rope.len_bytes();
		if offset == len {
			return Ok(String::new());
		}
		if offset > len {
			return Err(DocumentError::OutOfBounds {
				offset: byte_offset,
				len: len as u32,
			});
		}

		let (chunk, chunk_start, _, _) = rope.chunk_at_byte(offset);
		chunk
			.get(offset - chunk_start..)
			.map(str::to_owned)
			.ok_or(DocumentError::NotCharBoundary(byte_offset))
	}

	fn len_bytes(&self) -> u32 {
		self.text.read().len_bytes() as u32
	}

	fn version(&self) -> u64 {
		self.version.load(Ordering::Acquire)
	}

	fn position_at(&self, byte_offset: u32) -> Position {
		let rope = self.text.read();
		let offset = (byte_offset as usize).min(rope.len_bytes());
		Position::from_point(point_at(&rope, rope.byte_to_char(offset)))
	}

	fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}
}
