use std::{
	sync::atomic::{AtomicUsize, Ordering},
	thread,
	time::Duration,
};

use taskwell::{Task, TaskListener};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SampleError {
	#[error("sample task failed")]
	Sample,
}

pub fn power_task(base: u64, exponent: u32) -> Task<u64, SampleError> {
	Task::new(move || Ok(base.pow(exponent)))
}

pub fn sleep_task(millis: u64) -> Task<bool, SampleError> {
	Task::new(move || {
		thread::sleep(Duration::from_millis(millis));
		Ok(true)
	})
}

pub fn failing_task() -> Task<bool, SampleError> {
	Task::new(|| Err(SampleError::Sample))
}

/// Counts every callback it receives, so tests can assert the
/// one-outcome-then-one-finish contract.
#[derive(Debug, Default)]
pub struct CountingListener {
	pub success: AtomicUsize,
	pub error: AtomicUsize,
	pub cancel: AtomicUsize,
	pub timeout: AtomicUsize,
	pub finish: AtomicUsize,
}

impl CountingListener {
	pub fn successes(&self) -> usize {
		self.success.load(Ordering::SeqCst)
	}

	pub fn errors(&self) -> usize {
		self.error.load(Ordering::SeqCst)
	}

	pub fn cancels(&self) -> usize {
		self.cancel.load(Ordering::SeqCst)
	}

	pub fn timeouts(&self) -> usize {
		self.timeout.load(Ordering::SeqCst)
	}

	pub fn finishes(&self) -> usize {
		self.finish.load(Ordering::SeqCst)
	}
}

impl<R, E> TaskListener<R, E> for CountingListener {
	fn on_success(&self, _source: &Task<R, E>, _result: &R) {
		self.success.fetch_add(1, Ordering::SeqCst);
	}

	fn on_error(&self, _source: &Task<R, E>, _error: &E) {
		self.error.fetch_add(1, Ordering::SeqCst);
	}

	fn on_cancel(&self, _source: &Task<R, E>) {
		self.cancel.fetch_add(1, Ordering::SeqCst);
	}

	fn on_timeout(&self, _source: &Task<R, E>) {
		self.timeout.fetch_add(1, Ordering::SeqCst);
	}

	fn on_finish(&self, _source: &Task<R, E>) {
		self.finish.fetch_add(1, Ordering::SeqCst);
	}
}
