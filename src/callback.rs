// SPDX-License-Identifier: Apache-2.0

//! Change-notification callbacks (§4.5). A [`CallbackList`] is owned by a
//! [`Buffer`](crate::Buffer) and fed one delta per successful mutation; it
//! fans that delta out to every enabled, non-suspended entry, either inline
//! or, once an [`EventLoop`] is bound, coalesced into a single deferred
//! dispatch per entry. Grounded on the enabled/suspended entry shape from
//! spec §3's "Callback entry", with the deferred path modeled after the
//! accumulate-then-schedule pattern in
//! `other_examples/b23998cc_jbush001-RustNetworkStack__src-stack-buf.rs.rs`'s
//! ring-buffer wakeup bookkeeping.

use std::sync::{Arc, Mutex};
use log::trace;
use crate::error::{Error, Result};
use crate::event_loop::EventLoop;

/// The `{orig_size, n_added, n_deleted}` triple passed to a callback (§4.5).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallbackInfo {
	pub orig_size: usize,
	pub n_added: usize,
	pub n_deleted: usize,
}

/// Opaque handle returned by [`CallbackList::add`], used to remove, suspend,
/// or unsuspend an entry later.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallbackHandle(u64);

type UserCallback = Arc<Mutex<dyn FnMut(CallbackInfo) + Send>>;

#[derive(Default, Clone, Copy)]
struct Delta {
	orig_size: usize,
	n_added: usize,
	n_deleted: usize,
}

impl Delta {
	fn accumulate(&mut self, started_empty: bool, orig_size: usize, n_added: usize, n_deleted: usize) {
		if started_empty {
			self.orig_size = orig_size;
		}
		self.n_added += n_added;
		self.n_deleted += n_deleted;
	}

	fn info(self) -> CallbackInfo {
		CallbackInfo { orig_size: self.orig_size, n_added: self.n_added, n_deleted: self.n_deleted }
	}
}

/// Shared accumulator a deferred dispatch job reads from when the event loop
/// finally runs it; `scheduled` prevents more than one outstanding job per
/// entry (the coalescing §4.5 requires).
#[derive(Default)]
struct DeferredState {
	delta: Option<Delta>,
	scheduled: bool,
}

struct CallbackEntry {
	handle: CallbackHandle,
	callback: UserCallback,
	enabled: bool,
	suspended: bool,
	suspended_delta: Option<Delta>,
	deferred: Option<Arc<Mutex<DeferredState>>>,
}

/// The full set of callback entries registered on a buffer, plus the
/// recursion guard and optional event-loop binding (§4.5, §6).
#[derive(Default)]
pub(crate) struct CallbackList {
	entries: Vec<CallbackEntry>,
	next_id: u64,
	event_loop: Option<Arc<dyn EventLoop>>,
	notifying: bool,
	backlog: Vec<(usize, usize, usize)>,
}

impl CallbackList {
	pub(crate) fn new() -> Self { Self::default() }

	pub(crate) fn add(&mut self, callback: impl FnMut(CallbackInfo) + Send + 'static) -> CallbackHandle {
		let handle = CallbackHandle(self.next_id);
		self.next_id += 1;
		self.entries.push(CallbackEntry {
			handle,
			callback: Arc::new(Mutex::new(callback)),
			enabled: true,
			suspended: false,
			suspended_delta: None,
			deferred: self.event_loop.as_ref().map(|_| Arc::new(Mutex::new(DeferredState::default()))),
		});
		trace!("callback {:?} registered", handle);
		handle
	}

	pub(crate) fn remove(&mut self, handle: CallbackHandle) -> Result<()> {
		let before = self.entries.len();
		self.entries.retain(|e| e.handle != handle);
		if self.entries.len() == before {
			Err(Error::not_found())
		} else {
			Ok(())
		}
	}

	fn entry_mut(&mut self, handle: CallbackHandle) -> Result<&mut CallbackEntry> {
		self.entries
			.iter_mut()
			.find(|e| e.handle == handle)
			.ok_or_else(Error::not_found)
	}

	pub(crate) fn set_enabled(&mut self, handle: CallbackHandle, enabled: bool) -> Result<()> {
		self.entry_mut(handle)?.enabled = enabled;
		Ok(())
	}

	pub(crate) fn suspend(&mut self, handle: CallbackHandle) -> Result<()> {
		self.entry_mut(handle)?.suspended = true;
		Ok(())
	}

	/// Unsuspends `handle`; if a delta accumulated while suspended, dispatches
	/// (or schedules, in deferred mode) it once immediately.
	pub(crate) fn unsuspend(&mut self, handle: CallbackHandle) -> Result<()> {
		let entry = self.entry_mut(handle)?;
		entry.suspended = false;
		let Some(delta) = entry.suspended_delta.take() else { return Ok(()) };
		Self::dispatch_one(entry, delta, &self.event_loop);
		Ok(())
	}

	/// Binds an event loop, switching every future notification into deferred
	/// mode. Existing entries lazily gain a [`DeferredState`] the first time
	/// they accumulate under the new loop.
	pub(crate) fn bind_event_loop(&mut self, event_loop: Arc<dyn EventLoop>) {
		self.event_loop = Some(event_loop);
	}

	/// Feeds a mutation's delta to every enabled entry. Re-entrant: a
	/// callback that mutates the buffer again causes a nested `notify`, which
	/// queues behind the one already in progress instead of recursing, so
	/// each entry still observes exactly one notification per mutation
	/// (§4.5, §9).
	pub(crate) fn notify(&mut self, orig_size: usize, n_added: usize, n_deleted: usize) {
		if n_added == 0 && n_deleted == 0 {
			return;
		}
		if self.notifying {
			self.backlog.push((orig_size, n_added, n_deleted));
			return;
		}
		self.notifying = true;
		self.dispatch_all(orig_size, n_added, n_deleted);
		while !self.backlog.is_empty() {
			let batch = std::mem::take(&mut self.backlog);
			for (o, a, d) in batch {
				self.dispatch_all(o, a, d);
			}
		}
		self.notifying = false;
	}

	fn dispatch_all(&mut self, orig_size: usize, n_added: usize, n_deleted: usize) {
		for entry in &mut self.entries {
			if !entry.enabled {
				continue;
			}
			if entry.suspended {
				let started_empty = entry.suspended_delta.is_none();
				entry.suspended_delta.get_or_insert_with(Delta::default)
					.accumulate(started_empty, orig_size, n_added, n_deleted);
				continue;
			}
			Self::dispatch_one_with_event_loop(entry, orig_size, n_added, n_deleted, &self.event_loop);
		}
	}

	fn dispatch_one_with_event_loop(
		entry: &mut CallbackEntry,
		orig_size: usize,
		n_added: usize,
		n_deleted: usize,
		event_loop: &Option<Arc<dyn EventLoop>>,
	) {
		match event_loop {
			None => {
				let info = CallbackInfo { orig_size, n_added, n_deleted };
				(entry.callback.lock().unwrap())(info);
			}
			Some(loop_) => {
				let state = entry.deferred
					.get_or_insert_with(|| Arc::new(Mutex::new(DeferredState::default())))
					.clone();
				let mut guard = state.lock().unwrap();
				let started_empty = guard.delta.is_none();
				guard.delta.get_or_insert_with(Delta::default)
					.accumulate(started_empty, orig_size, n_added, n_deleted);
				if !guard.scheduled {
					guard.scheduled = true;
					drop(guard);
					let callback = entry.callback.clone();
					let state_for_job = state.clone();
					loop_.schedule(Box::new(move || {
						let delta = {
							let mut guard = state_for_job.lock().unwrap();
							guard.scheduled = false;
							guard.delta.take()
						};
						if let Some(delta) = delta {
							(callback.lock().unwrap())(delta.info());
						}
					}));
				}
			}
		}
	}

	fn dispatch_one(entry: &mut CallbackEntry, delta: Delta, event_loop: &Option<Arc<dyn EventLoop>>) {
		Self::dispatch_one_with_event_loop(entry, delta.orig_size, delta.n_added, delta.n_deleted, event_loop);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn immediate_callback_fires_inline() {
		let mut list = CallbackList::new();
		let seen = Arc::new(Mutex::new(None));
		let seen2 = seen.clone();
		list.add(move |info| *seen2.lock().unwrap() = Some(info));
		list.notify(0, 5, 0);
		assert_eq!(*seen.lock().unwrap(), Some(CallbackInfo { orig_size: 0, n_added: 5, n_deleted: 0 }));
	}

	#[test]
	fn suspended_callback_accumulates_then_fires_once_on_unsuspend() {
		let mut list = CallbackList::new();
		let count = Arc::new(AtomicUsize::new(0));
		let last = Arc::new(Mutex::new(None));
		let (c2, l2) = (count.clone(), last.clone());
		let handle = list.add(move |info| {
			c2.fetch_add(1, Ordering::SeqCst);
			*l2.lock().unwrap() = Some(info);
		});
		list.suspend(handle).unwrap();
		list.notify(0, 1, 0);
		list.notify(1, 2, 0);
		assert_eq!(count.load(Ordering::SeqCst), 0);
		list.unsuspend(handle).unwrap();
		assert_eq!(count.load(Ordering::SeqCst), 1);
		assert_eq!(*last.lock().unwrap(), Some(CallbackInfo { orig_size: 0, n_added: 3, n_deleted: 0 }));
	}

	/// A loop stub that holds scheduled jobs until [`ManualLoop::run_once`] is
	/// called, so coalescing can be observed directly.
	#[derive(Default)]
	struct ManualLoop {
		jobs: Mutex<Vec<crate::event_loop::DeferredJob>>,
	}

	impl EventLoop for ManualLoop {
		fn schedule(&self, job: crate::event_loop::DeferredJob) {
			self.jobs.lock().unwrap().push(job);
		}
	}

	impl ManualLoop {
		fn run_once(&self) {
			for job in self.jobs.lock().unwrap().drain(..) {
				job();
			}
		}
	}

	#[test]
	fn deferred_callback_coalesces_across_mutations_until_the_loop_runs() {
		let mut list = CallbackList::new();
		let loop_ = Arc::new(ManualLoop::default());
		list.bind_event_loop(loop_.clone());
		let count = Arc::new(AtomicUsize::new(0));
		let last = Arc::new(Mutex::new(None));
		let (c2, l2) = (count.clone(), last.clone());
		list.add(move |info| {
			c2.fetch_add(1, Ordering::SeqCst);
			*l2.lock().unwrap() = Some(info);
		});
		list.notify(0, 1, 0);
		list.notify(1, 2, 0);
		list.notify(3, 3, 0);
		assert_eq!(count.load(Ordering::SeqCst), 0, "nothing runs until the loop does");
		loop_.run_once();
		assert_eq!(count.load(Ordering::SeqCst), 1, "one dispatch coalesces all three");
		assert_eq!(*last.lock().unwrap(), Some(CallbackInfo { orig_size: 0, n_added: 6, n_deleted: 0 }));
	}
}
