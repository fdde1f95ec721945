use std::{mem, num::NonZeroUsize, sync::Arc, thread::JoinHandle};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{error, trace, warn};

use super::{
	dispatch::{Dispatch, Runnable},
	error::SystemError,
	message::WorkerMessage,
	worker,
};

/// A pool of worker threads draining a shared queue of submitted tasks.
///
/// The simplest real [`Dispatch`] implementation beyond inline execution:
/// tasks handed to its [`Dispatcher`] are enqueued and picked up by whichever
/// worker frees up first. Already-queued tasks are drained before the workers
/// exit on [`shutdown`](Self::shutdown); a submission racing the shutdown is
/// either rejected or enqueued ahead of the shutdown sentinels and still runs
/// (the gate mutex linearizes the two, so an accepted task is never stranded).
pub struct TaskSystem {
	msgs_tx: Sender<WorkerMessage>,
	workers: Mutex<Vec<JoinHandle<()>>>,
	shutdown: Arc<Mutex<bool>>,
	dispatcher: Dispatcher,
}

impl TaskSystem {
	/// Spawns one worker per available CPU core.
	pub fn new() -> Result<Self, SystemError> {
		let workers_count = std::thread::available_parallelism().map_or_else(
			|e| {
				error!("failed to get available parallelism in the task system: {e:#?}");
				1
			},
			NonZeroUsize::get,
		);

		Self::with_workers(workers_count)
	}

	/// Spawns exactly `workers_count` workers (at least one).
	pub fn with_workers(workers_count: usize) -> Result<Self, SystemError> {
		let workers_count = workers_count.max(1);

		let (msgs_tx, msgs_rx) = crossbeam_channel::unbounded();

		let workers = (0..workers_count)
			.map(|id| worker::spawn(id, msgs_rx.clone()))
			.collect::<Result<Vec<_>, _>>()?;

		trace!(workers_count, "task system started");

		let shutdown = Arc::new(Mutex::new(false));

		Ok(Self {
			dispatcher: Dispatcher {
				msgs_tx: msgs_tx.clone(),
				shutdown: Arc::clone(&shutdown),
			},
			msgs_tx,
			workers: Mutex::new(workers),
			shutdown,
		})
	}

	/// A clonable handle tasks can be pointed at via
	/// [`Task::set_dispatcher`](crate::Task::set_dispatcher).
	#[must_use]
	pub fn dispatcher(&self) -> Dispatcher {
		self.dispatcher.clone()
	}

	#[must_use]
	pub fn worker_count(&self) -> usize {
		self.workers.lock().len()
	}

	/// Stops accepting tasks, drains the queue, and joins every worker.
	/// Errors on a second call, or if a worker died to a panic that escaped
	/// its unwind guard.
	pub fn shutdown(&self) -> Result<(), SystemError> {
		{
			// Taking the gate waits out any in-flight dispatch, so every task
			// accepted before this point is already in the queue ahead of the
			// shutdown sentinels below.
			let mut shutdown = self.shutdown.lock();
			if mem::replace(&mut *shutdown, true) {
				return Err(SystemError::AlreadyShutdown);
			}
		}

		let workers = mem::take(&mut *self.workers.lock());

		trace!(workers_count = workers.len(), "shutting down task system");

		for _ in 0..workers.len() {
			if self.msgs_tx.send(WorkerMessage::Shutdown).is_err() {
				break;
			}
		}

		let mut res = Ok(());
		for (id, handle) in workers.into_iter().enumerate() {
			if handle.join().is_err() {
				error!(worker_id = id, "worker thread panicked");
				if res.is_ok() {
					res = Err(SystemError::WorkerPanicked(id));
				}
			}
		}

		res
	}
}

impl Drop for TaskSystem {
	fn drop(&mut self) {
		let was_shutdown = *self.shutdown.lock();
		if !was_shutdown {
			trace!("task system dropped without explicit shutdown, draining workers");
			let _ = self.shutdown();
		}
	}
}

/// The submission side of a [`TaskSystem`]: accepts tasks for later execution
/// on the pool. Cheap to clone; every clone feeds the same queue.
#[derive(Clone)]
pub struct Dispatcher {
	msgs_tx: Sender<WorkerMessage>,
	shutdown: Arc<Mutex<bool>>,
}

impl Dispatch for Dispatcher {
	fn dispatch(&self, task: Box<dyn Runnable>) -> bool {
		// The gate stays held across the send: a concurrent shutdown either
		// rejects this task here or waits until it is in the queue, ahead of
		// the shutdown sentinels.
		let shutdown = self.shutdown.lock();
		if *shutdown {
			warn!("dispatch after task system shutdown, rejecting task");
			return false;
		}

		self.msgs_tx.send(WorkerMessage::Execute(task)).is_ok()
	}
}
