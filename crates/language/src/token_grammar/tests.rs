use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;
use crate::parser::{ParseError, Parser};
use crate::tree::InputEdit;

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

fn lisp() -> Arc<dyn Grammar> {
	Arc::new(lisp_def().compile().unwrap())
}

fn parse(text: &str) -> Tree {
	Parser::with_grammar(lisp()).parse(text, None).unwrap()
}

/// Every node's kind, byte span and row/column span in preorder.
fn spans(tree: &Tree) -> Vec<(String, u32, u32, Point, Point)> {
	tree.nodes()
		.map(|n| (n.kind().to_owned(), n.start_byte(), n.end_byte(), n.start_position(), n.end_position()))
		.collect()
}

fn apply_edit(text: &mut String, tree: &mut Tree, start: usize, old_len: usize, new_text: &str) {
	let start_point = Point::ZERO.advance(&text[..start]);
	let old_end_point = Point::ZERO.advance(&text[..start + old_len]);
	tree.edit(&InputEdit::replace(start as u32, start_point, old_len as u32, old_end_point, new_text));
	text.replace_range(start..start + old_len, new_text);
}

#[test]
fn nests_groups_and_tokens() {
	let tree = parse("(add 1 [2 3])");
	assert_eq!(
		tree.to_sexp(),
		"(program@0..13 (list@0..13 ((@0..1) (symbol@1..4) (number@5..6) (vector@7..12 ([@7..8) (number@8..9) (number@10..11) (]@11..12)) ()@12..13)))"
	);
}

#[test]
fn stray_closers_and_unknown_chars_become_errors() {
	let tree = parse("a ) b #");
	assert_eq!(tree.to_sexp(), "(program@0..7 (symbol@0..1) (ERROR@2..3) (symbol@4..5) (ERROR@6..7))");
	assert!(tree.root_node().child(1).unwrap().is_error());
}

#[test]
fn mismatched_closer_inside_group_is_error() {
	let tree = parse("(a]");
	assert_eq!(tree.to_sexp(), "(program@0..3 (list@0..3 ((@0..1) (symbol@1..2) (ERROR@2..3))))");
}

#[test]
fn unclosed_groups_end_at_eof() {
	let tree = parse("(a [b");
	assert_eq!(tree.to_sexp(), "(program@0..5 (list@0..5 ((@0..1) (symbol@1..2) (vector@3..5 ([@3..4) (symbol@4..5)))))");
}

#[test]
fn empty_input_yields_bare_root() {
	let tree = parse("");
	assert_eq!(tree.to_sexp(), "(program@0..0)");
}

#[test]
fn tracks_rows_and_columns() {
	let tree = parse("(a\n  bb)");
	let list = tree.root_node().child(0).unwrap();
	let bb = list.child(2).unwrap();
	assert_eq!(bb.start_position(), Point::new(1, 2));
	assert_eq!(bb.end_position(), Point::new(1, 4));
	assert_eq!(list.end_position(), Point::new(1, 5));
}

#[test]
fn decodes_postcard_blob() {
	let bytes = lisp_def().to_bytes().unwrap();
	let grammar = TokenGrammar::decode(&bytes).unwrap();
	assert_eq!(grammar.name(), "lisp");
	assert!(grammar.node_kinds().iter().any(|k| &**k == "vector"));
}

#[test]
fn rejects_invalid_definitions() {
	let mut def = lisp_def();
	def.tokens[0].pattern = "(".into();
	assert!(matches!(def.compile(), Err(GrammarError::InvalidPattern { kind, .. }) if kind == "number"));

	let empty = GrammarDef {
		tokens: Vec::new(),
		groups: Vec::new(),
		..lisp_def()
	};
	assert!(matches!(empty.compile(), Err(GrammarError::Invalid(_))));

	assert!(matches!(TokenGrammar::decode(&[0xff, 0xff]), Err(GrammarError::Decode(_))));
}

#[test]
fn incremental_reparse_matches_fresh_parse() {
	let grammar = lisp();
	let mut parser = Parser::with_grammar(Arc::clone(&grammar));
	let mut text = String::from("(define x 10)\n(print [x 2 3])\n(foo (bar baz) qux)");
	let mut tree = parser.parse(&text, None).unwrap();

	let edits: &[(usize, usize, &str)] = &[
		// extend a number token
		(11, 0, "0"),
		// open a new list around the rest of the document
		(0, 0, "("),
		// delete a closing paren
		(14, 1, ""),
		// newline inside a vector
		(25, 0, "\n  "),
		// replace across a group boundary
		(36, 6, "z] [w"),
		// truncate after the first line
		(15, usize::MAX, ""),
	];

	for &(start, old_len, new_text) in edits {
		let old_len = old_len.min(text.len() - start);
		apply_edit(&mut text, &mut tree, start, old_len, new_text);
		let incremental = parser.parse(&text, Some(&tree)).unwrap();
		let fresh = Parser::with_grammar(Arc::clone(&grammar)).parse(&text, None).unwrap();
		assert_eq!(spans(&incremental), spans(&fresh), "after edit at {start} in {text:?}");
		tree = incremental;
	}
}

#[test]
fn zero_budget_parse_spans_many_slices() {
	let text = "(a 1) ".repeat(500);
	let mut parser = Parser::with_grammar(lisp());
	parser.set_timeout(Duration::ZERO);

	let mut input = text.as_str();
	let mut slices = 0;
	let tree = loop {
		slices += 1;
		if let Some(tree) = parser.parse_slice(&mut input, None).unwrap() {
			break tree;
		}
		assert!(parser.is_parsing());
	};

	assert!(slices > 1, "expected several slices, got {slices}");
	assert!(!parser.is_parsing());
	assert_eq!(tree.to_sexp(), parse(&text).to_sexp());
}

#[test]
fn new_base_tree_restarts_run() {
	let grammar = lisp();
	let mut text = "(a 1) ".repeat(300);
	let mut tree = parse(&text);

	let mut parser = Parser::with_grammar(Arc::clone(&grammar));
	parser.set_timeout(Duration::ZERO);
	let mut input = text.as_str();
	assert!(parser.parse_slice(&mut input, Some(&tree)).unwrap().is_none());

	apply_edit(&mut text, &mut tree, 1, 1, "bbb");
	let mut input = text.as_str();
	let reparsed = loop {
		if let Some(t) = parser.parse_slice(&mut input, Some(&tree)).unwrap() {
			break t;
		}
	};

	assert_eq!(spans(&reparsed), spans(&parse(&text)));
	assert_eq!(reparsed.root_node().child(0).unwrap().child(1).unwrap().byte_len(), 3);
}

#[test]
fn parser_without_grammar_errors() {
	let mut parser = Parser::new();
	let mut input = "x";
	assert_eq!(parser.parse_slice(&mut input, None).unwrap_err(), ParseError::NoGrammar);
}
