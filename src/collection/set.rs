use super::{ChildSet, ExecutionPolicy, TaskCollection};
use crate::error::RunError;

/// Every child is dispatched up front, then collected in order. Children with
/// a worker-pool dispatcher all progress concurrently while the collection
/// blocks once per child to collect; completion order does not matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unordered;

impl ExecutionPolicy for Unordered {
	fn execute<R, E>(&self, children: &ChildSet<R, E>) -> Vec<Option<R>>
	where
		R: Clone + Send + 'static,
		E: RunError,
	{
		let tasks = children.snapshot();

		for task in &tasks {
			task.dispatch();
		}

		tasks
			.into_iter()
			.map(|task| {
				// sync rather than join: a child whose dispatcher rejected it
				// rolled back to runnable and would never finish on its own
				let result = task.sync();
				if children.is_clean() {
					children.evict(task.id());
				}
				result
			})
			.collect()
	}
}

/// A collection of tasks with no particular execution order.
pub type TaskSet<R, E> = TaskCollection<R, E, Unordered>;
