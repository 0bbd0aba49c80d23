//! End-to-end engine tests through the public API.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use sylvan_language::{GrammarDef, GroupRule, LanguageRegistry, Parser, Point, TokenRule};
use sylvan_syntax::{ChangedRanges, Document, ParseKind, Position, RopeDocument, SyntaxConfig, SyntaxService};
use tempfile::TempDir;

fn lisp_def() -> GrammarDef {
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
		groups: vec![GroupRule {
			kind: "list".into(),
			open: "(".into(),
			close: ")".into(),
		}],
	}
}

/// Runtime dir with `grammars/lisp.grammar`, plus a service configured to read it.
fn service() -> (TempDir, SyntaxService) {
	let runtime = tempfile::tempdir().unwrap();
	let grammars = runtime.path().join("grammars");
	std::fs::create_dir_all(&grammars).unwrap();
	std::fs::write(grammars.join("lisp.grammar"), lisp_def().to_bytes().unwrap()).unwrap();

	let registry = LanguageRegistry::from_toml(
		r#"
		[[language]]
		language-id = "lisp"

		[[language]]
		language-id = "missing"
		"#,
	)
	.unwrap();
	let config = SyntaxConfig::from_toml(&format!(
		"enabled-languages = [\"lisp\", \"missing\"]\nslice-budget-ms = 1\ngrammar-dirs = [{:?}]",
		grammars.display().to_string()
	))
	.unwrap();
	assert_eq!(config.grammar_dirs, vec![grammars]);
	(runtime, SyntaxService::from_config(registry, config))
}

fn fresh_sexp(text: &str) -> String {
	let grammar = lisp_def().compile().unwrap();
	Parser::with_grammar(Arc::new(grammar)).parse(text, None).unwrap().to_sexp()
}

#[tokio::test]
async fn one_shot_tree_for_text() {
	let (_runtime, service) = service();
	let tree = service.tree_for("lisp", "(+ 1 2)").await.unwrap();
	assert_eq!(tree.to_sexp(), "(program@0..7 (list@0..7 ((@0..1) (symbol@1..2) (number@3..4) (number@5..6) ()@6..7)))");
	assert!(service.tree_for("rust", "fn main() {}").await.is_none());
}

#[tokio::test]
async fn sync_language_lookup_fills_after_load() {
	let (_runtime, service) = service();
	let mut available = service.catalog().subscribe();

	assert!(service.get_or_init_language("lisp").is_none());
	assert_eq!(&*available.recv().await.unwrap().language_id, "lisp");
	assert_eq!(service.get_or_init_language("lisp").unwrap().name(), "lisp");
}

#[tokio::test]
async fn missing_grammar_file_never_resolves() {
	let (_runtime, service) = service();
	assert!(service.get_or_init_language("missing").is_none());
	assert!(service.catalog().get_async("missing").await.is_none());
	assert!(service.get_or_init_language("missing").is_none());
}

#[tokio::test]
async fn edit_sequence_converges_to_fresh_parse() {
	let (_runtime, service) = service();
	let metrics = service.metrics();
	let mut updates = service.subscribe();

	let source: String = (0..200).map(|i| format!("(define v{i} (+ {i} {}))\n", i * 7)).collect();
	let doc = Arc::new(RopeDocument::new(&source));
	let doc_id = service.track(doc.clone(), Some("lisp"));
	assert_eq!(updates.recv().await.unwrap().changes, ChangedRanges::Full);
	service.coordinator().flush(doc_id).await;

	let edits: &[(u32, u32, &str)] = &[
		(8, 2, "value"),
		(0, 0, "(begin\n"),
		(40, 0, ")"),
		(100, 30, ""),
		(500, 0, "\n\n(nested (deep (deeper 1)))"),
		(3, 1, "E"),
	];
	for &(start, old_len, new_text) in edits {
		let changes = doc.apply(&[(start, old_len, new_text)]).unwrap();
		service.on_content_changed(doc_id, &changes);
		tokio::task::yield_now().await;
	}
	service.coordinator().flush(doc_id).await;

	let tree = service.current_tree(doc_id).unwrap();
	assert_eq!(tree.to_sexp(), fresh_sexp(&doc.text()));
	assert_eq!(metrics.count("lisp", ParseKind::Full), 1);
	assert!(metrics.count("lisp", ParseKind::Incremental) >= 1);
	assert!(metrics.avg_slices("lisp", ParseKind::Full).unwrap() >= 1.0);
}

#[tokio::test]
async fn reported_ranges_use_host_coordinates() {
	let (_runtime, service) = service();
	let mut updates = service.subscribe();
	let doc = Arc::new(RopeDocument::new("(a)\n(b)\n(ccc dd)"));
	let doc_id = service.track(doc.clone(), Some("lisp"));
	updates.recv().await.unwrap();
	service.coordinator().flush(doc_id).await;

	// "dd" sits at zero-based (2, 5)
	let changes = doc.apply(&[(14, 0, "e")]).unwrap();
	let ranges = service.on_content_changed(doc_id, &changes).unwrap();
	let change = &ranges.ranges()[0];
	assert_eq!(ranges.ranges().len(), 1);
	assert_eq!(Position::from_point(Point::new(2, 5)), Position::new(3, 6));
	assert_eq!(change.range.start, Position::new(3, 6));
	assert_eq!(change.range.end, Position::new(3, 9));
	assert_eq!(change.old_byte_len, 2);
	assert_eq!(doc.position_at(change.bytes.start), change.range.start);
}

#[tokio::test]
async fn edit_during_initial_parse_is_not_lost() {
	let (_runtime, service) = service();
	let mut updates = service.subscribe();
	let doc = Arc::new(RopeDocument::new(&"(x 1)\n".repeat(2000)));
	let doc_id = service.track(doc.clone(), Some("lisp"));
	updates.recv().await.unwrap();

	let changes = doc.apply(&[(1, 1, "y")]).unwrap();
	service.on_content_changed(doc_id, &changes).unwrap();
	service.coordinator().flush(doc_id).await;

	assert_eq!(service.current_tree(doc_id).unwrap().to_sexp(), fresh_sexp(&doc.text()));
	assert!(service.dispose(doc_id));
	assert!(service.current_tree(doc_id).is_none());
}
