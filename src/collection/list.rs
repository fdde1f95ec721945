use super::{ChildSet, ExecutionPolicy, TaskCollection};
use crate::error::RunError;

/// Children run one at a time, in order, each collected before the next
/// starts. A slow child stalls all subsequent ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl ExecutionPolicy for Sequential {
	fn execute<R, E>(&self, children: &ChildSet<R, E>) -> Vec<Option<R>>
	where
		R: Clone + Send + 'static,
		E: RunError,
	{
		children
			.snapshot()
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

/// A collection of tasks executed in order, one after another.
pub type TaskList<R, E> = TaskCollection<R, E, Sequential>;
