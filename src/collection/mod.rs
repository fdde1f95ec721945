use std::{
	marker::PhantomData,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

use parking_lot::Mutex;

use super::{
	dispatch::Dispatch,
	error::RunError,
	task::{Task, TaskId, TaskListener},
};

mod group;
mod list;
mod set;

pub use group::{Barriered, TaskGroup};
pub use list::{Sequential, TaskList};
pub use set::{TaskSet, Unordered};

/// The ordered children of a collection, shared between the collection handle
/// and the composite task's execution closure.
///
/// Structural mutation is rejected while a run is in flight, so the execution
/// policy can iterate the sequence without racing the outside world. Eviction
/// by the policy itself ([`evict`](Self::evict)) is the one sanctioned
/// mid-run mutation, used by clean mode.
pub struct ChildSet<R, E> {
	tasks: Mutex<Vec<Task<R, E>>>,
	clean: AtomicBool,
	running: AtomicBool,
}

impl<R, E> ChildSet<R, E>
where
	R: Clone + Send + 'static,
	E: RunError,
{
	fn new() -> Self {
		Self {
			tasks: Mutex::new(Vec::new()),
			clean: AtomicBool::new(true),
			running: AtomicBool::new(false),
		}
	}

	/// Clones of every child handle, in order.
	#[must_use]
	pub fn snapshot(&self) -> Vec<Task<R, E>> {
		self.tasks.lock().clone()
	}

	/// Whether finished children should be evicted as their results are
	/// collected.
	#[must_use]
	pub fn is_clean(&self) -> bool {
		self.clean.load(Ordering::Acquire)
	}

	/// Removes the child with the given id, returning whether it was present.
	/// Unlike the structural operations, this is allowed mid-run.
	pub fn evict(&self, id: TaskId) -> bool {
		let mut tasks = self.tasks.lock();
		let before = tasks.len();
		tasks.retain(|task| task.id() != id);
		tasks.len() < before
	}

	pub(crate) fn set_clean(&self, clean: bool) {
		self.clean.store(clean, Ordering::Release);
	}

	fn is_running(&self) -> bool {
		self.running.load(Ordering::Acquire)
	}

	pub(crate) fn push(&self, task: Task<R, E>) -> bool {
		if self.is_running() {
			return false;
		}
		self.tasks.lock().push(task);
		true
	}

	pub(crate) fn remove(&self, id: TaskId) -> bool {
		!self.is_running() && self.evict(id)
	}

	pub(crate) fn remove_at(&self, index: usize) -> Option<Task<R, E>> {
		if self.is_running() {
			return None;
		}
		let mut tasks = self.tasks.lock();
		(index < tasks.len()).then(|| tasks.remove(index))
	}

	pub(crate) fn get(&self, index: usize) -> Option<Task<R, E>> {
		if self.is_running() {
			return None;
		}
		self.tasks.lock().get(index).cloned()
	}

	pub(crate) fn len(&self) -> Option<usize> {
		(!self.is_running()).then(|| self.tasks.lock().len())
	}

	pub(crate) fn begin_run(&self) -> RunGuard<'_, R, E> {
		self.running.store(true, Ordering::Release);
		RunGuard { children: self }
	}
}

/// Clears the `running` flag when the execution closure unwinds or returns.
pub(crate) struct RunGuard<'a, R, E> {
	children: &'a ChildSet<R, E>,
}

impl<R, E> Drop for RunGuard<'_, R, E> {
	fn drop(&mut self) {
		self.children.running.store(false, Ordering::Release);
	}
}

/// How a collection drives its children to completion.
///
/// Implementations receive the shared [`ChildSet`] and must return one result
/// slot per child, ordered to match the child sequence at the start of the
/// run. A child that did not succeed contributes `None` at its position.
/// Policies honoring clean mode call [`ChildSet::evict`] as each child's
/// result is collected.
pub trait ExecutionPolicy {
	fn execute<R, E>(&self, children: &ChildSet<R, E>) -> Vec<Option<R>>
	where
		R: Clone + Send + 'static,
		E: RunError;
}

/// An ordered, mutable sequence of sub-tasks that is itself a task whose
/// result is the sequence of sub-results.
///
/// The policy parameter decides the execution semantics: [`Sequential`] runs
/// children one at a time, [`Unordered`] lets them all progress concurrently
/// through their own dispatchers, and [`Barriered`] starts every child at the
/// same instant behind a rendezvous barrier. Use the [`TaskList`], [`TaskSet`],
/// and [`TaskGroup`] aliases.
///
/// The composite exposes the full task surface: it can be `sync`ed,
/// dispatched with a listener, joined, canceled while waiting, given a
/// timeout, and reset for another run.
pub struct TaskCollection<R, E, P> {
	task: Task<Vec<Option<R>>, E>,
	children: Arc<ChildSet<R, E>>,
	policy: PhantomData<P>,
}

impl<R, E, P> TaskCollection<R, E, P>
where
	R: Clone + Send + 'static,
	E: RunError,
	P: ExecutionPolicy + Default + Send + Sync + 'static,
{
	#[must_use]
	pub fn new() -> Self {
		let children = Arc::new(ChildSet::new());

		let task = Task::new({
			let children = Arc::clone(&children);
			let policy = P::default();

			move || {
				let _running = children.begin_run();
				Ok(policy.execute(&children))
			}
		});

		Self {
			task,
			children,
			policy: PhantomData,
		}
	}

	/// The composite task itself, for anything not delegated here.
	#[must_use]
	pub fn task(&self) -> &Task<Vec<Option<R>>, E> {
		&self.task
	}

	#[must_use]
	pub fn id(&self) -> TaskId {
		self.task.id()
	}

	/// Appends a child. Rejected while the collection is running.
	pub fn push(&self, task: Task<R, E>) -> bool {
		self.children.push(task)
	}

	/// Removes the child with the given id. Rejected while running.
	pub fn remove(&self, id: TaskId) -> bool {
		self.children.remove(id)
	}

	/// Removes and returns the child at `index`. `None` while running or out
	/// of bounds.
	pub fn remove_at(&self, index: usize) -> Option<Task<R, E>> {
		self.children.remove_at(index)
	}

	/// The child at `index`. `None` while running or out of bounds.
	#[must_use]
	pub fn get(&self, index: usize) -> Option<Task<R, E>> {
		self.children.get(index)
	}

	/// The number of children. `None` while running.
	#[must_use]
	pub fn len(&self) -> Option<usize> {
		self.children.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> Option<bool> {
		self.children.len().map(|len| len == 0)
	}

	/// Toggles clean mode: when on, each child is evicted from the sequence
	/// immediately after its result is collected during a run. On by default.
	pub fn set_clean(&self, clean: bool) {
		self.children.set_clean(clean);
	}

	#[must_use]
	pub fn is_clean(&self) -> bool {
		self.children.is_clean()
	}

	/// Runs the children under this collection's policy and blocks for the
	/// combined result. See [`Task::sync`].
	pub fn sync(&self) -> Option<Vec<Option<R>>> {
		self.task.sync()
	}

	/// Submits the composite for asynchronous execution. See [`Task::dispatch`].
	pub fn dispatch(&self) -> bool {
		self.task.dispatch()
	}

	/// Submits the composite, notifying `listener` on terminal events.
	pub fn dispatch_with(&self, listener: Arc<dyn TaskListener<Vec<Option<R>>, E>>) -> bool {
		self.task.dispatch_with(listener)
	}

	pub fn join(&self) {
		self.task.join();
	}

	pub fn join_for(&self, timeout: Duration) -> bool {
		self.task.join_for(timeout)
	}

	pub fn cancel(&self) -> bool {
		self.task.cancel()
	}

	pub fn reset(&self) -> bool {
		self.task.reset()
	}

	pub fn set_timeout(&self, timeout: Option<Duration>) {
		self.task.set_timeout(timeout);
	}

	pub fn set_dispatcher(&self, dispatcher: Arc<dyn Dispatch>) {
		self.task.set_dispatcher(dispatcher);
	}

	#[must_use]
	pub fn result(&self) -> Option<Vec<Option<R>>> {
		self.task.result()
	}

	#[must_use]
	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	#[must_use]
	pub fn is_success(&self) -> bool {
		self.task.is_success()
	}
}

impl<R, E, P> Default for TaskCollection<R, E, P>
where
	R: Clone + Send + 'static,
	E: RunError,
	P: ExecutionPolicy + Default + Send + Sync + 'static,
{
	fn default() -> Self {
		Self::new()
	}
}
