use std::{
	sync::{
		atomic::{AtomicU32, AtomicU64, Ordering},
		Arc,
	},
	thread,
	time::{Duration, Instant},
};

use taskwell::{InlineDispatcher, Lifecycle, SystemError, Task, TaskSystem};

use tracing_test::traced_test;

mod common;

use common::tasks::{failing_task, power_task, sleep_task, CountingListener, SampleError};

#[test]
#[traced_test]
fn accessors() {
	let system = TaskSystem::with_workers(2).unwrap();

	let task = power_task(5, 2);
	task.set_dispatcher(Arc::new(system.dispatcher()));

	assert_eq!(task.lifecycle(), Lifecycle::Initialized);
	assert!(!task.is_waiting());
	assert!(!task.is_running());
	assert!(!task.is_finished());

	assert!(task.dispatch());

	task.join();

	assert!(task.is_finished());
	assert!(task.is_success());
	assert_eq!(task.result(), Some(25));

	system.shutdown().unwrap();
}

#[test]
#[traced_test]
fn sync_returns_result() {
	let task = power_task(5, 5);

	assert_eq!(task.lifecycle(), Lifecycle::Initialized);
	assert_eq!(task.sync(), Some(3125));
	assert!(task.is_success());

	// the result stays stored until reset
	assert_eq!(task.result(), Some(3125));
}

#[test]
#[traced_test]
fn timeout_while_running() {
	let system = TaskSystem::with_workers(1).unwrap();

	let task = sleep_task(500);
	task.set_dispatcher(Arc::new(system.dispatcher()));
	task.set_timeout(Some(Duration::from_millis(200)));

	let started = Instant::now();
	assert_eq!(task.sync(), None);
	let elapsed = started.elapsed();

	assert!(task.is_timed_out());
	assert!(elapsed >= Duration::from_millis(200));
	assert!(elapsed < Duration::from_millis(450), "sync waited {elapsed:?}");

	// The abandoned computation completes in the background and is ignored.
	thread::sleep(Duration::from_millis(400));
	assert!(task.is_timed_out());
	assert_eq!(task.result(), None);

	system.shutdown().unwrap();
}

#[test]
#[traced_test]
fn no_success_after_timeout() {
	let system = TaskSystem::with_workers(1).unwrap();

	let task = sleep_task(500);
	task.set_dispatcher(Arc::new(system.dispatcher()));

	let listener = Arc::new(CountingListener::default());
	assert!(task.dispatch_with(listener.clone()));

	// join the in-flight run with a deadline shorter than the computation
	task.set_timeout(Some(Duration::from_millis(200)));
	assert_eq!(task.sync(), None);
	assert!(task.is_timed_out());

	thread::sleep(Duration::from_millis(500));

	assert_eq!(listener.successes(), 0);
	assert_eq!(listener.timeouts(), 1);
	assert_eq!(listener.finishes(), 1);

	system.shutdown().unwrap();
}

#[test]
#[traced_test]
fn cancel_while_waiting() {
	let system = TaskSystem::with_workers(1).unwrap();
	let dispatcher = Arc::new(system.dispatcher());

	let blocker = sleep_task(300);
	blocker.set_dispatcher(dispatcher.clone());
	assert!(blocker.dispatch());

	let task = sleep_task(100);
	task.set_dispatcher(dispatcher);
	let listener = Arc::new(CountingListener::default());
	assert!(task.dispatch_with(listener.clone()));

	thread::sleep(Duration::from_millis(50));

	assert!(task.is_waiting());
	assert!(task.cancel());
	assert!(task.is_canceled());
	assert_eq!(listener.cancels(), 1);
	assert_eq!(listener.finishes(), 1);

	blocker.join();
	assert!(blocker.is_success());

	// the worker eventually dequeues the canceled task and skips it
	thread::sleep(Duration::from_millis(150));
	assert!(task.is_canceled());
	assert_eq!(task.result(), None);
	assert_eq!(listener.successes(), 0);
	assert_eq!(listener.finishes(), 1);

	system.shutdown().unwrap();
}

#[test]
#[traced_test]
fn cancel_fails_once_running() {
	let system = TaskSystem::with_workers(1).unwrap();

	let task = sleep_task(300);
	task.set_dispatcher(Arc::new(system.dispatcher()));
	assert!(task.dispatch());

	thread::sleep(Duration::from_millis(100));

	assert!(task.is_running());
	assert!(!task.cancel());

	task.join();
	assert!(task.is_success());

	system.shutdown().unwrap();
}

#[test]
fn cancel_fails_outside_waiting() {
	let task = power_task(2, 3);

	// not yet submitted
	assert!(!task.cancel());
	assert_eq!(task.lifecycle(), Lifecycle::Initialized);

	assert_eq!(task.sync(), Some(8));

	// already finished
	assert!(!task.cancel());
	assert!(task.is_success());
}

#[test]
#[traced_test]
fn errors_are_stored_not_raised() {
	let task = failing_task();
	let listener = Arc::new(CountingListener::default());

	assert!(task.dispatch_with(listener.clone()));

	assert!(task.is_error());
	assert_eq!(task.result(), None);
	assert!(matches!(*task.error().unwrap(), SampleError::Sample));

	assert_eq!(listener.errors(), 1);
	assert_eq!(listener.finishes(), 1);
	assert_eq!(listener.successes(), 0);

	// sync on the errored task returns the cleared result without raising
	assert_eq!(task.sync(), None);
}

#[test]
#[traced_test]
fn panicking_computation_reaches_error() {
	let system = TaskSystem::with_workers(1).unwrap();

	let task = Task::<bool, SampleError>::new(|| panic!("boom"));
	task.set_dispatcher(Arc::new(system.dispatcher()));

	let listener = Arc::new(CountingListener::default());
	assert!(task.dispatch_with(listener.clone()));

	// abnormal completion still reaches a terminal state, so waiters wake
	assert!(task.join_for(Duration::from_secs(2)));
	assert!(task.is_error());
	assert_eq!(task.result(), None);
	assert!(task.error().is_none());

	assert_eq!(listener.finishes(), 1);
	assert_eq!(listener.errors(), 0);
	assert_eq!(listener.successes(), 0);

	// the worker survives and keeps serving tasks
	let next = power_task(2, 6);
	next.set_dispatcher(Arc::new(system.dispatcher()));
	assert_eq!(next.sync(), Some(64));

	system.shutdown().unwrap();
}

#[test]
fn accepted_dispatch_survives_shutdown_race() {
	for _ in 0..50 {
		let system = TaskSystem::with_workers(1).unwrap();

		let task = power_task(2, 10);
		task.set_dispatcher(Arc::new(system.dispatcher()));

		let submitter = {
			let task = task.clone();
			thread::spawn(move || task.dispatch())
		};

		system.shutdown().unwrap();

		// an accepted task always runs; a rejected one rolls back to runnable
		if submitter.join().unwrap() {
			assert!(task.join_for(Duration::from_secs(2)), "accepted task never ran");
			assert!(task.is_success());
		} else {
			assert_eq!(task.lifecycle(), Lifecycle::Initialized);
		}
	}
}

#[test]
#[traced_test]
fn dispatch_is_idempotent() {
	let system = TaskSystem::with_workers(2).unwrap();

	let task = sleep_task(200);
	task.set_dispatcher(Arc::new(system.dispatcher()));

	assert!(task.dispatch());
	assert!(!task.dispatch());

	let second = Arc::new(CountingListener::default());
	assert!(!task.dispatch_with(second.clone()));

	task.join();
	assert!(task.is_success());

	// the losing listener was never recorded, so it heard nothing
	assert_eq!(second.finishes(), 0);

	system.shutdown().unwrap();
}

#[test]
fn reset_round_trip() {
	let exponent = Arc::new(AtomicU32::new(20));

	let task = Task::<u64, SampleError>::new({
		let exponent = Arc::clone(&exponent);
		move || Ok(2u64.pow(exponent.load(Ordering::SeqCst)))
	});

	assert!(!task.reset());

	assert_eq!(task.sync(), Some(1_048_576));
	assert!(task.is_success());

	assert!(task.reset());
	assert_eq!(task.lifecycle(), Lifecycle::Initialized);
	assert_eq!(task.result(), None);

	exponent.store(3, Ordering::SeqCst);
	assert_eq!(task.sync(), Some(8));
	assert!(task.is_success());
}

#[test]
fn fork_shares_computation_body() {
	let calls = Arc::new(AtomicU64::new(0));

	let task = Task::<u64, SampleError>::new({
		let calls = Arc::clone(&calls);
		move || Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
	});
	task.set_timeout(Some(Duration::from_secs(5)));

	let fork = task.fork();

	assert_ne!(fork.id(), task.id());
	assert_eq!(fork.timeout(), task.timeout());
	assert_eq!(fork.lifecycle(), Lifecycle::Initialized);

	assert_eq!(task.sync(), Some(1));
	assert_eq!(fork.sync(), Some(2));

	// shared body, independent result slots
	assert_eq!(calls.load(Ordering::SeqCst), 2);
	assert_eq!(task.result(), Some(1));
	assert_eq!(fork.result(), Some(2));
}

#[test]
#[traced_test]
fn rejected_dispatch_rolls_back() {
	let system = TaskSystem::with_workers(1).unwrap();
	let dispatcher = Arc::new(system.dispatcher());
	system.shutdown().unwrap();

	let task = power_task(2, 5);
	task.set_dispatcher(dispatcher);

	assert!(!task.dispatch());
	assert_eq!(task.lifecycle(), Lifecycle::Initialized);

	// still runnable elsewhere after the rollback
	task.set_dispatcher(Arc::new(InlineDispatcher));
	assert_eq!(task.sync(), Some(32));
}

#[test]
fn shutdown_twice_errors() {
	let system = TaskSystem::with_workers(1).unwrap();

	system.shutdown().unwrap();
	assert!(matches!(system.shutdown(), Err(SystemError::AlreadyShutdown)));
}

#[test]
#[traced_test]
fn elapsed_join_changes_nothing() {
	let system = TaskSystem::with_workers(1).unwrap();

	let task = sleep_task(300);
	task.set_dispatcher(Arc::new(system.dispatcher()));
	assert!(task.dispatch());

	assert!(!task.join_for(Duration::from_millis(50)));
	assert!(!task.is_finished());

	assert!(task.join_for(Duration::from_secs(2)));
	assert!(task.is_success());

	system.shutdown().unwrap();
}
