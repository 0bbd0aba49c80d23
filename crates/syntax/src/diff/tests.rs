use pretty_assertions::assert_eq;

use super::*;
use crate::testing::{edit, parse};

const TEXT: &str = "(add 12 [3   4])";

#[test]
fn leaf_edit_reports_single_range() {
	let old = parse(TEXT);
	let mut new = old.clone();
	let mut text = TEXT.to_owned();
	edit(&mut text, &mut new, 2, 0, "x");

	assert_eq!(
		changed_ranges(&old, &new).unwrap(),
		vec![RangeChange {
			range: PositionRange::new(Position::new(1, 2), Position::new(1, 6)),
			bytes: 1..5,
			old_byte_len: 3,
		}]
	);
}

#[test]
fn changed_group_subsumes_children() {
	let old = parse(TEXT);
	let mut new = old.clone();
	let mut text = TEXT.to_owned();
	edit(&mut text, &mut new, 11, 0, "  ");

	let changes = changed_ranges(&old, &new).unwrap();
	assert_eq!(changes.len(), 1);
	assert_eq!(changes[0].bytes, 8..17);
	assert_eq!(changes[0].old_byte_len, 7);
	assert_eq!(changed_nodes(&old, &new).unwrap()[0].new.kind(), "vector");
}

#[test]
fn edit_across_tokens_reports_overlapped_leaves() {
	let old = parse(TEXT);
	let mut new = old.clone();
	let mut text = TEXT.to_owned();
	// "3   4" -> "5 6"; the bordering delimiters only move
	edit(&mut text, &mut new, 9, 5, "5 6");

	let changes = changed_ranges(&old, &new).unwrap();
	assert_eq!(changes.iter().map(|c| c.bytes.clone()).collect::<Vec<_>>(), vec![9..12, 12..12]);
	assert!(changes.iter().all(|c| c.old_byte_len == 1));
	assert_eq!(new.to_sexp(), "(program@0..14 (list@0..14 ((@0..1) (symbol@1..4) (number@5..7) (vector@8..13 ([@8..9) (number@9..12) (number@12..12) (]@12..13)) ()@13..14)))");
}

#[test]
fn insert_at_token_edge_reports_one_range() {
	let old = parse("(ab)");
	let mut new = old.clone();
	let mut text = "(ab)".to_owned();
	edit(&mut text, &mut new, 3, 0, "x");

	assert_eq!(
		changed_ranges(&old, &new).unwrap(),
		vec![RangeChange {
			range: PositionRange::new(Position::new(1, 2), Position::new(1, 5)),
			bytes: 1..4,
			old_byte_len: 2,
		}]
	);

	// Between the opener and the token: the opener grows, the token moves.
	let mut new = old.clone();
	let mut text = "(ab)".to_owned();
	edit(&mut text, &mut new, 1, 0, "x");
	let changes = changed_ranges(&old, &new).unwrap();
	assert_eq!(changes.iter().map(|c| (c.bytes.clone(), c.old_byte_len)).collect::<Vec<_>>(), vec![(0..2, 1)]);
}

#[test]
fn top_level_gap_edit_reports_nothing() {
	let text = "a    b";
	let old = parse(text);
	let mut new = old.clone();
	edit(&mut text.to_owned(), &mut new, 3, 0, "\n");

	assert!(new.root_node().has_changes());
	assert_eq!(changed_ranges(&old, &new).unwrap(), Vec::new());
}

#[test]
fn unedited_copy_has_no_changes() {
	let old = parse(TEXT);
	assert!(changed_nodes(&old, &old.clone()).unwrap().is_empty());
}

#[test]
fn positions_are_one_based_across_lines() {
	let initial = "(a\n  (bb cc))";
	let old = parse(initial);
	let mut new = old.clone();
	let mut text = initial.to_owned();
	edit(&mut text, &mut new, 7, 1, "BBB");

	let changes = changed_ranges(&old, &new).unwrap();
	assert_eq!(changes.len(), 1);
	assert_eq!(changes[0].range, PositionRange::new(Position::new(2, 4), Position::new(2, 8)));
	assert_eq!(changes[0].old_byte_len, 2);
}

#[test]
fn shape_mismatch_is_desync() {
	let old = parse("a (b)");
	let new = parse("a b");
	assert_eq!(
		changed_nodes(&old, &new).unwrap_err(),
		SyntaxError::Desync {
			step: TraversalStep::FirstChild,
			visited: 3,
		}
	);
}

#[test]
fn full_has_no_partial_ranges() {
	assert!(ChangedRanges::Full.is_full());
	assert!(ChangedRanges::Full.ranges().is_empty());
	assert_eq!(ChangedRanges::Partial(Vec::new()).ranges().len(), 0);
}
