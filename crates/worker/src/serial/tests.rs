use std::sync::atomic::AtomicBool;

use parking_lot::Mutex;

use super::*;
use crate::yield_point;

#[tokio::test]
async fn jobs_run_in_enqueue_order() {
	let queue = SerialQueue::new("order", TaskClass::Parse);
	let log = Arc::new(Mutex::new(Vec::new()));

	for i in 0..5 {
		let log = Arc::clone(&log);
		queue.enqueue(async move {
			yield_point().await;
			log.lock().push(i);
		});
	}
	queue.flush().await;

	assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
	assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn at_most_one_job_in_flight() {
	let queue = SerialQueue::new("exclusive", TaskClass::Parse);
	let busy = Arc::new(AtomicBool::new(false));
	let overlaps = Arc::new(AtomicUsize::new(0));

	for _ in 0..4 {
		let busy = Arc::clone(&busy);
		let overlaps = Arc::clone(&overlaps);
		queue.enqueue(async move {
			if busy.swap(true, Ordering::SeqCst) {
				overlaps.fetch_add(1, Ordering::SeqCst);
			}
			for _ in 0..3 {
				yield_point().await;
			}
			busy.store(false, Ordering::SeqCst);
		});
	}
	queue.flush().await;

	assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn enqueue_returns_job_output() {
	let queue = SerialQueue::new("output", TaskClass::Parse);
	let rx = queue.enqueue(async { 41 + 1 });
	assert_eq!(rx.await.ok(), Some(42));
}

#[tokio::test]
async fn panicking_job_does_not_stall_queue() {
	let queue = SerialQueue::new("panic", TaskClass::Parse);
	let failed = queue.enqueue::<_, ()>(async { panic!("job failure") });
	let after = queue.enqueue(async { "still running" });

	assert!(failed.await.is_err());
	assert_eq!(after.await.ok(), Some("still running"));
}
