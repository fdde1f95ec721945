//!
//! # Taskwell
//!
//! A blocking task lifecycle and composition library: a [`Task`] is a unit of
//! work with a result, executable synchronously or asynchronously, driven by a
//! condition-variable-backed state machine through
//! `Initialized -> Waiting -> Running -> Finished` with exactly one terminal
//! [`Outcome`] per run.
//!
//! On top of a single task's primitives (`sync`, `dispatch`, `join`, `cancel`,
//! `reset`, `fork`) sit three composition policies: [`TaskList`] runs children
//! one at a time, [`TaskSet`] lets them all progress concurrently, and
//! [`TaskGroup`] starts every child at the same instant behind a rendezvous
//! barrier. Execution itself is pluggable through the [`Dispatch`] capability;
//! tasks run inline on the submitting thread by default, or on a [`TaskSystem`]
//! worker pool.
//!
//! ## Basic example
//!
//! ```
//! use std::{convert::Infallible, sync::Arc};
//! use taskwell::{Task, TaskSystem};
//!
//! let system = TaskSystem::new().unwrap();
//!
//! let task: Task<u64, Infallible> =
//!     Task::with_dispatcher(|| Ok(2u64.pow(20)), Arc::new(system.dispatcher()));
//!
//! assert_eq!(task.sync(), Some(1_048_576));
//! assert!(task.is_success());
//!
//! system.shutdown().unwrap();
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod collection;
mod dispatch;
mod error;
mod message;
mod state;
mod system;
mod task;
mod worker;

pub use collection::{
	Barriered, ChildSet, ExecutionPolicy, Sequential, TaskCollection, TaskGroup, TaskList,
	TaskSet, Unordered,
};
pub use dispatch::{Dispatch, InlineDispatcher, Runnable};
pub use error::{RunError, SystemError};
pub use state::StateCell;
pub use system::{Dispatcher, TaskSystem};
pub use task::{Lifecycle, Outcome, Task, TaskId, TaskListener};
pub use worker::WorkerId;
