//! Pulse scheduler for Plexus.
//!
//! This crate provides:
//! - [`Task`], a self re-arming unit of work with bounded or unbounded
//!   retry (`attempts`) and repeat (`repeat`) counts
//! - [`Pulse`], the task table keyed by task id
//!
//! A task never overlaps itself: the next run is armed only after the
//! current callback settles. Stopping or unregistering a task cancels the
//! pending timer but never aborts a callback that is already running.

pub mod scheduler;
pub mod task;

pub use scheduler::Pulse;
pub use task::{Task, TaskOptions, TaskSnapshot, TaskStatus};
