use tracing::trace;

/// A type-erased unit of work whose `run` entry point must be invoked exactly
/// once per submission, on any thread, at any later time.
///
/// Every [`Task`](crate::Task) is a `Runnable`; dispatchers only ever see this
/// surface.
pub trait Runnable: Send {
	fn run(self: Box<Self>);
}

/// The capability a [`Task`](crate::Task) needs from its executor: accept a
/// runnable unit of work for later execution and report whether it was
/// accepted.
///
/// A dispatcher that accepts a task commits to invoking its `run` entry point
/// exactly once, unless the task reaches a timed-out or canceled state first,
/// in which case `run` aborts on its own.
pub trait Dispatch: Send + Sync {
	fn dispatch(&self, task: Box<dyn Runnable>) -> bool;
}

/// The trivial dispatcher: runs the task immediately on the calling thread.
///
/// This is what every task uses until it is pointed at a worker pool, which
/// makes `dispatch` on a bare task effectively synchronous.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatch for InlineDispatcher {
	fn dispatch(&self, task: Box<dyn Runnable>) -> bool {
		trace!("running task inline on the calling thread");
		task.run();
		true
	}
}
