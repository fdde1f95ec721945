use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A value guarded by a mutex/condvar pair, supporting guarded replacement and
/// blocking waits on arbitrary predicates.
///
/// Every [`Task`](crate::Task) owns exactly one cell driving its lifecycle, but the
/// cell itself knows nothing about tasks: it is a plain synchronization primitive
/// over any `Copy + Eq` value. All reads, writes, and waits go through the same
/// mutex, and every write that changes the value wakes all waiters.
pub struct StateCell<T> {
	value: Mutex<T>,
	changed: Condvar,
}

impl<T: Copy + Eq> StateCell<T> {
	pub fn new(initial: T) -> Self {
		Self {
			value: Mutex::new(initial),
			changed: Condvar::new(),
		}
	}

	/// A snapshot of the current value. By the time the caller looks at it, the
	/// cell may already hold something else; use the guarded operations for
	/// anything that must not race.
	pub fn get(&self) -> T {
		*self.value.lock()
	}

	/// Unconditionally replaces the value and wakes all waiters.
	pub fn set(&self, next: T) {
		let mut value = self.value.lock();
		*value = next;
		self.changed.notify_all();
	}

	/// Replaces the value with `next` only if it currently equals `expected`,
	/// returning whether the replacement happened. This is the linearization
	/// point for transitions that must have a single winner.
	pub fn compare_and_set(&self, expected: T, next: T) -> bool {
		let mut value = self.value.lock();
		if *value == expected {
			*value = next;
			self.changed.notify_all();
			true
		} else {
			false
		}
	}

	/// Replaces the value with `next` only while `pred` holds for the current
	/// value, returning whether the replacement happened. The predicate runs
	/// under the cell's lock, so the check and the write are one atomic step.
	pub fn set_if(&self, pred: impl FnOnce(T) -> bool, next: T) -> bool {
		let mut value = self.value.lock();
		if pred(*value) {
			*value = next;
			self.changed.notify_all();
			true
		} else {
			false
		}
	}

	/// Whether the current value is exactly `expected`.
	pub fn is(&self, expected: T) -> bool {
		*self.value.lock() == expected
	}

	/// Whether `pred` holds for the current value.
	pub fn check(&self, pred: impl FnOnce(T) -> bool) -> bool {
		pred(*self.value.lock())
	}

	/// Blocks the calling thread until `pred` holds, returning the value that
	/// satisfied it. The predicate is re-checked on every wake-up, so spurious
	/// wake-ups are harmless.
	pub fn wait_until(&self, mut pred: impl FnMut(T) -> bool) -> T {
		let mut value = self.value.lock();
		while !pred(*value) {
			self.changed.wait(&mut value);
		}
		*value
	}

	/// Blocks until `pred` holds or `timeout` elapses, returning whether the
	/// predicate held before the deadline.
	pub fn wait_until_for(&self, mut pred: impl FnMut(T) -> bool, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut value = self.value.lock();
		while !pred(*value) {
			if self.changed.wait_until(&mut value, deadline).timed_out() {
				return pred(*value);
			}
		}
		true
	}
}
