// SPDX-License-Identifier: Apache-2.0

//! The host event loop used as a deferred-dispatch sink (§6's "event-loop
//! contract"). This crate only consumes the loop at its interface; scheduling
//! policy, thread, and coalescing of *which* job is pending belong to
//! [`crate::callback`]. The trait exists so a host can plug in whatever
//! executor it already runs (tokio, a custom reactor, a test stub) without
//! this crate depending on any of them.

use std::fmt;

/// A single deferred-callback dispatch, ready to run on the loop's thread.
pub type DeferredJob = Box<dyn FnOnce() + Send>;

/// A sink that can run a [`DeferredJob`] at some later point, off the thread
/// that scheduled it.
pub trait EventLoop: Send + Sync {
	/// Schedules `job` to run exactly once. Implementations are free to run
	/// it inline if that is what "the loop's thread" means for them (e.g. a
	/// synchronous test stub); the coalescing guarantee of §4.5 depends only
	/// on the caller never scheduling more than one outstanding job per
	/// callback entry, which `callback.rs` already guarantees.
	fn schedule(&self, job: DeferredJob);
}

impl fmt::Debug for dyn EventLoop {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("dyn EventLoop")
	}
}

/// A trivial event loop that runs every job immediately, inline, on the
/// scheduling thread. Useful for tests and for hosts that have no real loop
/// but still want deferred semantics (coalescing across a batch of
/// mutations performed before the next `schedule` call observes them).
#[derive(Debug, Default)]
pub struct Inline;

impl EventLoop for Inline {
	fn schedule(&self, job: DeferredJob) { job(); }
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;

	#[test]
	fn inline_loop_runs_job_synchronously() {
		let ran = Arc::new(AtomicBool::new(false));
		let ran2 = ran.clone();
		Inline.schedule(Box::new(move || ran2.store(true, Ordering::SeqCst)));
		assert!(ran.load(Ordering::SeqCst));
	}
}
