//! Host coordinates.
//!
//! Trees count rows and columns from zero; the host counts lines and columns
//! from one. Columns are byte offsets within the line on both sides.

use std::fmt;

use sylvan_language::Point;

/// One-based line/column position in host coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
	pub line: u32,
	pub column: u32,
}

impl Position {
	pub const fn new(line: u32, column: u32) -> Self {
		Self { line, column }
	}

	pub const fn from_point(point: Point) -> Self {
		Self {
			line: point.row + 1,
			column: point.column + 1,
		}
	}

	pub const fn to_point(self) -> Point {
		Point::new(self.line.saturating_sub(1), self.column.saturating_sub(1))
	}
}

impl Default for Position {
	fn default() -> Self {
		Self::new(1, 1)
	}
}

impl From<Point> for Position {
	fn from(point: Point) -> Self {
		Self::from_point(point)
	}
}

impl fmt::Display for Position {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// Half-open range of host positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionRange {
	pub start: Position,
	pub end: Position,
}

impl PositionRange {
	pub const fn new(start: Position, end: Position) -> Self {
		Self { start, end }
	}

	pub fn contains(&self, position: Position) -> bool {
		self.start <= position && position < self.end
	}
}
