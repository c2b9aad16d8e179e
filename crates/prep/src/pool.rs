//! Bounded worker pool for per-grammar tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

/// Callback type for progress reporting: grammar name and a short status.
pub type ProgressCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Runs `task` over `items` on at most `jobs` threads.
///
/// Workers claim the next unprocessed item from a shared cursor, so a slow
/// task only ever occupies its own worker. `on_result` runs on the calling
/// thread as each result arrives. Results are returned in completion order.
pub fn run_bounded<T, R, F, P>(items: Vec<T>, jobs: usize, task: F, mut on_result: P) -> Vec<(T, R)>
where
	T: Sync,
	R: Send,
	F: Fn(&T) -> R + Sync,
	P: FnMut(&T, &R),
{
	if items.is_empty() {
		return Vec::new();
	}

	let workers = jobs.clamp(1, items.len());
	let cursor = AtomicUsize::new(0);
	let mut completed = Vec::with_capacity(items.len());

	thread::scope(|scope| {
		let (tx, rx) = mpsc::channel();

		for _ in 0..workers {
			let tx = tx.clone();
			let (items, cursor, task) = (&items, &cursor, &task);

			scope.spawn(move || {
				loop {
					let index = cursor.fetch_add(1, Ordering::Relaxed);
					let Some(item) = items.get(index) else {
						break;
					};
					if tx.send((index, task(item))).is_err() {
						break;
					}
				}
			});
		}

		drop(tx);

		for (index, result) in rx {
			on_result(&items[index], &result);
			completed.push((index, result));
		}
	});

	let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
	completed
		.into_iter()
		.filter_map(|(index, result)| slots[index].take().map(|item| (item, result)))
		.collect()
}
