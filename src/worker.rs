use std::{
	panic::{catch_unwind, AssertUnwindSafe},
	thread::{self, JoinHandle},
};

use crossbeam_channel::Receiver;
use tracing::{error, info_span, trace};

use super::{error::SystemError, message::WorkerMessage};

pub type WorkerId = usize;

pub(crate) fn spawn(
	id: WorkerId,
	msgs_rx: Receiver<WorkerMessage>,
) -> Result<JoinHandle<()>, SystemError> {
	thread::Builder::new()
		.name(format!("taskwell-worker-{id}"))
		.spawn(move || run(id, msgs_rx))
		.map_err(|e| SystemError::SpawnWorker(id, e))
}

fn run(id: WorkerId, msgs_rx: Receiver<WorkerMessage>) {
	let _span = info_span!("taskwell_worker", worker_id = id).entered();

	trace!("worker starting");

	while let Ok(msg) = msgs_rx.recv() {
		match msg {
			WorkerMessage::Execute(task) => {
				// Computation panics are already caught inside the task's run;
				// this guards whatever else unwinds, like a listener callback.
				if catch_unwind(AssertUnwindSafe(move || task.run())).is_err() {
					error!("task panicked, worker continues");
				}
			}
			WorkerMessage::Shutdown => break,
		}
	}

	trace!("worker exiting");
}
