use std::{
	fmt,
	panic::{catch_unwind, AssertUnwindSafe},
	sync::Arc,
	time::Duration,
};

use parking_lot::Mutex;
use tracing::{error, trace, warn};
use uuid::Uuid;

use super::{
	dispatch::{Dispatch, InlineDispatcher, Runnable},
	error::RunError,
	state::StateCell,
};

/// A unique identifier for a task using the [`uuid`](https://docs.rs/uuid) crate.
pub type TaskId = Uuid;

/// The terminal sub-state recorded once a task finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// The computation returned a value.
	Success,
	/// A `sync` caller's deadline elapsed before the task finished.
	TimedOut,
	/// The computation returned an error.
	Error,
	/// The task was withdrawn before execution began.
	Canceled,
}

/// The coarse lifecycle stage of a task.
///
/// The outcome only exists inside `Finished`, so an illegal combination like
/// "running and succeeded" is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	/// Constructed (or reset) and not yet submitted.
	Initialized,
	/// Submitted to a dispatcher, execution not yet begun.
	Waiting,
	/// The computation is executing right now.
	Running,
	/// Terminal, with exactly one outcome.
	Finished(Outcome),
}

impl Lifecycle {
	#[must_use]
	pub const fn is_finished(self) -> bool {
		matches!(self, Self::Finished(_))
	}

	#[must_use]
	pub const fn outcome(self) -> Option<Outcome> {
		match self {
			Self::Finished(outcome) => Some(outcome),
			_ => None,
		}
	}
}

/// The callback surface a task notifies on terminal events.
///
/// Per run, at most one of the outcome callbacks fires, always followed by
/// exactly one `on_finish`. All methods default to no-ops so implementors only
/// override what they care about. Callbacks are invoked outside the task's
/// state lock, on whichever thread drove the terminal transition.
pub trait TaskListener<R, E>: Send + Sync {
	fn on_success(&self, _source: &Task<R, E>, _result: &R) {}

	fn on_error(&self, _source: &Task<R, E>, _error: &E) {}

	fn on_cancel(&self, _source: &Task<R, E>) {}

	fn on_timeout(&self, _source: &Task<R, E>) {}

	fn on_finish(&self, _source: &Task<R, E>) {}
}

/// What happened when a task was offered to its dispatcher.
enum Submission {
	Submitted,
	/// The task was not `Initialized`; no re-entrant execution.
	NotRunnable,
	/// The dispatcher refused the task; the submission was rolled back.
	Rejected,
}

struct Slots<R, E> {
	result: Option<R>,
	error: Option<Arc<E>>,
	/// Recorded at submission, cleared on reset. `None` means no-op.
	listener: Option<Arc<dyn TaskListener<R, E>>>,
}

struct Shared<R, E> {
	id: TaskId,
	state: StateCell<Lifecycle>,
	slots: Mutex<Slots<R, E>>,
	work: Arc<dyn Fn() -> Result<R, E> + Send + Sync>,
	dispatcher: Mutex<Arc<dyn Dispatch>>,
	timeout: Mutex<Option<Duration>>,
}

/// A unit of work with a result, executable synchronously or asynchronously.
///
/// A task moves through `Initialized -> Waiting -> Running -> Finished` and
/// records exactly one [`Outcome`] when it finishes. `Task` is a cheap handle
/// over shared state: clones observe and drive the same underlying run, which
/// is what lets a canceller, a timing-out `sync` caller, and the executing
/// thread race over one task without corrupting it.
///
/// The result stays stored until [`reset`](Self::reset), so it can be read any
/// number of times after the run; accessors hand out clones.
pub struct Task<R, E> {
	shared: Arc<Shared<R, E>>,
}

impl<R, E> Clone for Task<R, E> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<R, E> fmt::Debug for Task<R, E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Task")
			.field("id", &self.shared.id)
			.field("lifecycle", &self.shared.state.get())
			.finish_non_exhaustive()
	}
}

impl<R, E> Task<R, E>
where
	R: Clone + Send + 'static,
	E: RunError,
{
	/// Creates a task that executes inline on whichever thread submits it.
	pub fn new(work: impl Fn() -> Result<R, E> + Send + Sync + 'static) -> Self {
		Self::with_dispatcher(work, Arc::new(InlineDispatcher))
	}

	/// Creates a task that is handed to `dispatcher` on submission.
	pub fn with_dispatcher(
		work: impl Fn() -> Result<R, E> + Send + Sync + 'static,
		dispatcher: Arc<dyn Dispatch>,
	) -> Self {
		Self {
			shared: Arc::new(Shared {
				id: TaskId::new_v4(),
				state: StateCell::new(Lifecycle::Initialized),
				slots: Mutex::new(Slots {
					result: None,
					error: None,
					listener: None,
				}),
				work: Arc::new(work),
				dispatcher: Mutex::new(dispatcher),
				timeout: Mutex::new(None),
			}),
		}
	}

	#[must_use]
	pub fn id(&self) -> TaskId {
		self.shared.id
	}

	#[must_use]
	pub fn lifecycle(&self) -> Lifecycle {
		self.shared.state.get()
	}

	pub fn set_dispatcher(&self, dispatcher: Arc<dyn Dispatch>) {
		*self.shared.dispatcher.lock() = dispatcher;
	}

	#[must_use]
	pub fn dispatcher(&self) -> Arc<dyn Dispatch> {
		Arc::clone(&self.shared.dispatcher.lock())
	}

	/// Sets the maximum time a `sync` call will wait for the task to finish
	/// before forcing a timed-out outcome. `None` waits forever, the default.
	pub fn set_timeout(&self, timeout: Option<Duration>) {
		*self.shared.timeout.lock() = timeout;
	}

	#[must_use]
	pub fn timeout(&self) -> Option<Duration> {
		*self.shared.timeout.lock()
	}

	/// Executes this task, waits for it to finish, and returns its result.
	///
	/// Submits the task first if it has not been submitted yet; if it is
	/// already waiting or running, this joins the in-flight run instead. With
	/// a finite [`timeout`](Self::set_timeout) configured, a wait that
	/// outlives the deadline forces the task into `Finished(TimedOut)`,
	/// notifies the recorded listener, and returns `None`; the abandoned
	/// computation keeps running in the background but its late result is
	/// discarded.
	///
	/// Computation errors are never raised here: an errored run also returns
	/// `None`, and callers distinguish outcomes via [`is_error`](Self::is_error)
	/// and friends.
	pub fn sync(&self) -> Option<R> {
		if matches!(self.submit(None), Submission::Rejected) {
			return None;
		}

		if let Some(timeout) = self.timeout() {
			if !self
				.shared
				.state
				.wait_until_for(|lifecycle| lifecycle.is_finished(), timeout)
				&& self.claim(Outcome::TimedOut)
			{
				trace!(task_id = %self.shared.id, ?timeout, "sync wait elapsed, task timed out");

				let listener = {
					let mut slots = self.shared.slots.lock();
					slots.result = None;
					slots.listener.clone()
				};

				if let Some(listener) = listener {
					listener.on_timeout(self);
					listener.on_finish(self);
				}

				return None;
			}
		} else {
			self.shared
				.state
				.wait_until(|lifecycle| lifecycle.is_finished());
		}

		self.result()
	}

	/// Submits this task for asynchronous execution, notifying itself (no-op)
	/// on completion.
	///
	/// Returns `true` iff the task was `Initialized` and the dispatcher
	/// accepted it. Calling this on a task that is already waiting, running,
	/// or finished is a no-op returning `false`.
	pub fn dispatch(&self) -> bool {
		matches!(self.submit(None), Submission::Submitted)
	}

	/// Submits this task for asynchronous execution, notifying `listener` on
	/// every terminal event of the run.
	pub fn dispatch_with(&self, listener: Arc<dyn TaskListener<R, E>>) -> bool {
		matches!(self.submit(Some(listener)), Submission::Submitted)
	}

	fn submit(&self, listener: Option<Arc<dyn TaskListener<R, E>>>) -> Submission {
		if !self
			.shared
			.state
			.compare_and_set(Lifecycle::Initialized, Lifecycle::Waiting)
		{
			return Submission::NotRunnable;
		}

		self.shared.slots.lock().listener = listener;

		trace!(task_id = %self.shared.id, "submitting task to dispatcher");

		let dispatcher = Arc::clone(&self.shared.dispatcher.lock());
		if dispatcher.dispatch(Box::new(self.clone())) {
			Submission::Submitted
		} else {
			warn!(task_id = %self.shared.id, "dispatcher rejected task, rolling back submission");
			self.shared
				.state
				.compare_and_set(Lifecycle::Waiting, Lifecycle::Initialized);
			Submission::Rejected
		}
	}

	/// The execution entry point, invoked by the dispatcher exactly once per
	/// submission.
	///
	/// If the task already timed out or was canceled, the run aborts with no
	/// further effect. Otherwise the computation executes outside any lock,
	/// and whichever of the runner and a timing-out waiter claims the
	/// terminal state first wins: the loser's result is discarded and only
	/// the winner notifies the listener.
	///
	/// A panicking computation is caught here and mapped to the `Error`
	/// outcome with an empty error slot, so blocked `sync`/`join` callers
	/// always wake even on abnormal completion.
	pub fn run(&self) {
		if !self.shared.state.set_if(
			|lifecycle| {
				!matches!(
					lifecycle,
					Lifecycle::Finished(Outcome::TimedOut | Outcome::Canceled)
				)
			},
			Lifecycle::Running,
		) {
			trace!(task_id = %self.shared.id, "task timed out or was canceled before it could run");
			return;
		}

		trace!(task_id = %self.shared.id, "task running");

		match catch_unwind(AssertUnwindSafe(|| (self.shared.work)())) {
			Ok(Ok(value)) => {
				{
					let mut slots = self.shared.slots.lock();
					slots.result = Some(value.clone());
					slots.error = None;
				}

				if self.claim(Outcome::Success) {
					if let Some(listener) = self.listener() {
						listener.on_success(self, &value);
						listener.on_finish(self);
					}
				} else {
					// A timeout won the race; drop the late result unseen.
					self.shared.slots.lock().result = None;
					trace!(task_id = %self.shared.id, "discarding result of timed out task");
				}
			}
			Ok(Err(error)) => {
				let error = Arc::new(error);

				{
					let mut slots = self.shared.slots.lock();
					slots.result = None;
					slots.error = Some(Arc::clone(&error));
				}

				if self.claim(Outcome::Error) {
					trace!(task_id = %self.shared.id, "task errored");
					if let Some(listener) = self.listener() {
						listener.on_error(self, &error);
						listener.on_finish(self);
					}
				} else {
					self.shared.slots.lock().error = None;
					trace!(task_id = %self.shared.id, "discarding error of timed out task");
				}
			}
			Err(_) => {
				// The panic payload has no place in the typed error slot; the
				// task still must reach a terminal state so waiters wake.
				error!(task_id = %self.shared.id, "task computation panicked");

				if self.claim(Outcome::Error) {
					if let Some(listener) = self.listener() {
						listener.on_finish(self);
					}
				}
			}
		}
	}

	/// Withdraws this task if, and only if, it is still exactly `Waiting`.
	///
	/// On success the task reaches `Finished(Canceled)` and the recorded
	/// listener is notified. Cancellation after execution has begun never
	/// succeeds; a running computation can only be abandoned by a `sync`
	/// timeout.
	pub fn cancel(&self) -> bool {
		let canceled = self
			.shared
			.state
			.compare_and_set(Lifecycle::Waiting, Lifecycle::Finished(Outcome::Canceled));

		if canceled {
			trace!(task_id = %self.shared.id, "task canceled");
			if let Some(listener) = self.listener() {
				listener.on_cancel(self);
				listener.on_finish(self);
			}
		}

		canceled
	}

	/// Returns this task to `Initialized` so it can be executed again,
	/// clearing the stored result, error, and listener. Only allowed from
	/// `Finished` (any outcome); returns whether the reset happened.
	pub fn reset(&self) -> bool {
		let reset = self
			.shared
			.state
			.set_if(|lifecycle| lifecycle.is_finished(), Lifecycle::Initialized);

		if reset {
			let mut slots = self.shared.slots.lock();
			slots.result = None;
			slots.error = None;
			slots.listener = None;
		}

		reset
	}

	/// Blocks until this task is finished, without mutating any state.
	pub fn join(&self) {
		self.shared
			.state
			.wait_until(|lifecycle| lifecycle.is_finished());
	}

	/// Blocks until this task is finished or `timeout` elapses, returning
	/// whether it finished. Unlike a `sync` timeout, an elapsed join changes
	/// nothing.
	pub fn join_for(&self, timeout: Duration) -> bool {
		self.shared
			.state
			.wait_until_for(|lifecycle| lifecycle.is_finished(), timeout)
	}

	/// Forks this task: a new task with its own independent lifecycle, result,
	/// and error, invoking the same computation body and inheriting this
	/// task's dispatcher and timeout.
	///
	/// Because the body is shared, any captured state it mutates is genuinely
	/// shared between parent and fork; forking duplicates the schedule, not
	/// the data.
	#[must_use]
	pub fn fork(&self) -> Self {
		Self {
			shared: Arc::new(Shared {
				id: TaskId::new_v4(),
				state: StateCell::new(Lifecycle::Initialized),
				slots: Mutex::new(Slots {
					result: None,
					error: None,
					listener: None,
				}),
				work: Arc::clone(&self.shared.work),
				dispatcher: Mutex::new(Arc::clone(&self.shared.dispatcher.lock())),
				timeout: Mutex::new(*self.shared.timeout.lock()),
			}),
		}
	}

	/// The stored result of the last run, if it succeeded.
	#[must_use]
	pub fn result(&self) -> Option<R> {
		self.shared.slots.lock().result.clone()
	}

	/// The stored error of the last run, if it errored.
	#[must_use]
	pub fn error(&self) -> Option<Arc<E>> {
		self.shared.slots.lock().error.clone()
	}

	#[must_use]
	pub fn is_waiting(&self) -> bool {
		self.shared.state.is(Lifecycle::Waiting)
	}

	#[must_use]
	pub fn is_running(&self) -> bool {
		self.shared.state.is(Lifecycle::Running)
	}

	#[must_use]
	pub fn is_finished(&self) -> bool {
		self.shared.state.check(|lifecycle| lifecycle.is_finished())
	}

	#[must_use]
	pub fn is_success(&self) -> bool {
		self.has_outcome(Outcome::Success)
	}

	#[must_use]
	pub fn is_timed_out(&self) -> bool {
		self.has_outcome(Outcome::TimedOut)
	}

	#[must_use]
	pub fn is_error(&self) -> bool {
		self.has_outcome(Outcome::Error)
	}

	#[must_use]
	pub fn is_canceled(&self) -> bool {
		self.has_outcome(Outcome::Canceled)
	}

	fn has_outcome(&self, outcome: Outcome) -> bool {
		self.shared.state.is(Lifecycle::Finished(outcome))
	}

	/// Moves a still-`Initialized` task straight to `Waiting` without offering
	/// it to a dispatcher. Used by the barrier group, which runs children on
	/// dedicated threads and must keep the collecting loop from re-submitting
	/// them.
	pub(crate) fn mark_submitted(&self) -> bool {
		if self
			.shared
			.state
			.compare_and_set(Lifecycle::Initialized, Lifecycle::Waiting)
		{
			self.shared.slots.lock().listener = None;
			true
		} else {
			false
		}
	}

	fn claim(&self, outcome: Outcome) -> bool {
		self.shared.state.set_if(
			|lifecycle| !lifecycle.is_finished(),
			Lifecycle::Finished(outcome),
		)
	}

	fn listener(&self) -> Option<Arc<dyn TaskListener<R, E>>> {
		self.shared.slots.lock().listener.clone()
	}
}

impl<R, E> Runnable for Task<R, E>
where
	R: Clone + Send + 'static,
	E: RunError,
{
	fn run(self: Box<Self>) {
		Task::run(&self);
	}
}
