use std::{error::Error, io};

use thiserror::Error as ThisError;

use super::worker::WorkerId;

/// Unified bound for the error type a task computation can produce.
///
/// All tasks wired into the same composition must share a single error type, so
/// collections and listeners can handle failures uniformly. Anything that is a
/// proper error and can cross threads qualifies.
pub trait RunError: Error + Send + Sync + 'static {}

impl<T: Error + Send + Sync + 'static> RunError for T {}

/// Faults of the worker pool itself, not of any individual task.
#[derive(Debug, ThisError)]
pub enum SystemError {
	#[error("task system already shut down")]
	AlreadyShutdown,
	#[error("failed to spawn worker thread <id='{0}'>")]
	SpawnWorker(WorkerId, #[source] io::Error),
	#[error("worker thread panicked <id='{0}'>")]
	WorkerPanicked(WorkerId),
}
