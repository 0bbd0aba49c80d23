use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::oneshot;

use super::*;
use crate::yield_point;

type Memo = AsyncMemo<&'static str, u32, String>;

#[tokio::test]
async fn pending_value_is_not_resolved() {
	let memo = Memo::new();
	let (tx, rx) = oneshot::channel::<u32>();
	memo.set("a", async move { rx.await.map_err(|e| e.to_string()) });

	yield_point().await;
	assert!(memo.contains(&"a"));
	assert!(!memo.is_resolved(&"a"));
	assert_eq!(memo.get_if_resolved(&"a"), None);

	let _ = tx.send(5);
	let value = memo.get(&"a").unwrap().await;
	assert_eq!(value, Ok(5));
	assert!(memo.is_resolved(&"a"));
	assert_eq!(memo.get_if_resolved(&"a"), Some(5));
}

#[tokio::test]
async fn settles_without_any_awaiter() {
	let memo = Memo::new();
	memo.set("a", async { Ok(1) });

	yield_point().await;
	yield_point().await;
	assert!(memo.is_resolved(&"a"));
	assert_eq!(memo.get_if_resolved(&"a"), Some(1));
}

#[tokio::test]
async fn failure_is_resolved_but_has_no_value() {
	let memo = Memo::new();
	memo.set("bad", async { Err("missing".to_string()) });

	let outcome = memo.get(&"bad").unwrap().await;
	assert_eq!(outcome, Err("missing".to_string()));
	assert!(memo.is_resolved(&"bad"));
	assert_eq!(memo.get_if_resolved(&"bad"), None);
}

#[tokio::test]
async fn unknown_key_has_nothing() {
	let memo = Memo::new();
	assert!(memo.get(&"nope").is_none());
	assert!(!memo.is_resolved(&"nope"));
	assert_eq!(memo.get_if_resolved(&"nope"), None);
	assert!(memo.is_empty());
}

#[tokio::test]
async fn set_never_replaces_existing_entry() {
	let memo = Memo::new();
	let runs = Arc::new(AtomicUsize::new(0));

	for value in [1, 2, 3] {
		let runs = Arc::clone(&runs);
		memo.set("k", async move {
			runs.fetch_add(1, Ordering::SeqCst);
			Ok(value)
		});
	}

	assert_eq!(memo.get(&"k").unwrap().await, Ok(1));
	assert_eq!(runs.load(Ordering::SeqCst), 1);
	assert_eq!(memo.len(), 1);
}

#[tokio::test]
async fn get_or_insert_reports_first_insert_only() {
	let memo = Memo::new();
	let (_, first) = memo.get_or_insert_with("k", || async { Ok(9) });
	let (handle, second) = memo.get_or_insert_with("k", || async { Ok(10) });

	assert!(first);
	assert!(!second);
	assert_eq!(handle.await, Ok(9));
}
