use std::{
	sync::{Arc, Barrier},
	thread,
};

use tracing::trace;

use super::{ChildSet, ExecutionPolicy, TaskCollection};
use crate::error::RunError;

/// One dedicated thread per child, all gated on a shared start barrier so
/// every child begins its real work at the same instant, regardless of how
/// long each child's own dispatcher would have queued it.
///
/// Children are moved to `Waiting` before their threads launch and then run
/// directly, bypassing their dispatchers; the collecting loop only ever joins
/// them. Zero children short-circuit to an empty run rather than constructing
/// a zero-party barrier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Barriered;

impl ExecutionPolicy for Barriered {
	fn execute<R, E>(&self, children: &ChildSet<R, E>) -> Vec<Option<R>>
	where
		R: Clone + Send + 'static,
		E: RunError,
	{
		let tasks = children.snapshot();
		if tasks.is_empty() {
			return Vec::new();
		}

		// Only still-runnable children take part in the rendezvous; the rest
		// are merely collected below.
		let launched = tasks
			.iter()
			.filter(|task| task.mark_submitted())
			.cloned()
			.collect::<Vec<_>>();

		if !launched.is_empty() {
			trace!(count = launched.len(), "launching barrier group");
			let barrier = Arc::new(Barrier::new(launched.len()));

			for task in launched {
				let barrier = Arc::clone(&barrier);
				thread::spawn(move || {
					barrier.wait();
					task.run();
				});
			}
		}

		tasks
			.into_iter()
			.map(|task| {
				let result = task.sync();
				if children.is_clean() {
					children.evict(task.id());
				}
				result
			})
			.collect()
	}
}

/// A collection of tasks that all start at the exact same time.
pub type TaskGroup<R, E> = TaskCollection<R, E, Barriered>;
