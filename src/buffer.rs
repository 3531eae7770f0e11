// SPDX-License-Identifier: Apache-2.0

//! The public chained byte buffer (§3 "Buffer", §4.2-§4.6). Ties the
//! allocation-frugal [`Chain`] to freeze gates, change-notification
//! callbacks, and an optional lock, the way `orio::Buffer` ties its
//! `Segments` ring to a `Pool` — but generalized from a fixed-size-segment,
//! COW-sharing design to the variable-size, zero-copy-transfer, pinned/file
//! segment model this spec calls for.
//!
//! Destruction is implicit: dropping a `Buffer` drops its `Chain`, which
//! drops each `Segment`'s `Storage`, which runs any pending cleanup hook or
//! closes any owned file descriptor exactly once (§5). The teacher's
//! `Buffer` has an explicit `close`/`Drop` pair because its `Pool` needs a
//! chance to reclaim segments on an explicit path as well as an implicit
//! one; this buffer's pool only lives as long as the buffer itself, so plain
//! `Drop` is enough — there is no second, explicit destruction path to keep
//! in sync with it.

mod options;
mod mutation;
mod reserve;
#[cfg(unix)]
mod io;

pub use options::BufferOptions;

use std::fmt;
use std::sync::Arc;
use crate::callback::{CallbackHandle, CallbackInfo, CallbackList};
use crate::cursor::{self, Ptr, PtrHow};
use crate::error::{Error, Result};
use crate::event_loop::EventLoop;
use crate::lock::{Lock, LockGuard};
use crate::segment::Chain;

/// A dynamically-sized, segmented byte queue for zero-copy staging of data
/// moving between application code and OS I/O (§1).
pub struct Buffer {
	chain: Chain,
	front_frozen: bool,
	back_frozen: bool,
	callbacks: CallbackList,
	lock: Option<Arc<Lock>>,
}

impl Default for Buffer {
	fn default() -> Self { Self::new() }
}

impl Buffer {
	pub fn new() -> Self { Self::new_with_options(BufferOptions::default()) }

	pub fn new_with_options(options: BufferOptions) -> Self {
		Self {
			chain: Chain::with_min_segment_size(options.min_segment_size()),
			front_frozen: false,
			back_frozen: false,
			callbacks: CallbackList::new(),
			lock: options.lock_by_default().then(Lock::new),
		}
	}

	/// Total live byte count (§3's `total_len`); never counts an outstanding
	/// `reserve_space` region.
	pub fn len(&self) -> usize { self.chain.len() }
	pub fn is_empty(&self) -> bool { self.chain.is_empty() }

	/// The number of segments currently in the chain, mostly useful for
	/// tests asserting a mutation did or didn't allocate.
	pub fn segment_count(&self) -> usize { self.chain.segment_count() }

	// -- Freeze gates (§4.5) -------------------------------------------

	/// Sets the front (`front = true`) or back (`front = false`) freeze
	/// gate, rejecting drains/prepends or appends/reserves respectively.
	pub fn freeze(&mut self, front: bool) {
		if front {
			self.front_frozen = true;
		} else {
			self.back_frozen = true;
		}
	}

	pub fn unfreeze(&mut self, front: bool) {
		if front {
			self.front_frozen = false;
		} else {
			self.back_frozen = false;
		}
	}

	pub(crate) fn check_front_unfrozen(&self) -> Result<()> {
		if self.front_frozen { Err(Error::frozen()) } else { Ok(()) }
	}

	pub(crate) fn check_back_unfrozen(&self) -> Result<()> {
		if self.back_frozen { Err(Error::frozen()) } else { Ok(()) }
	}

	// -- Locking shim (§4.6) --------------------------------------------

	/// Associates `lock` with this buffer, allocating a fresh one if `None`.
	pub fn enable_locking(&mut self, lock: Option<Arc<Lock>>) {
		self.lock = Some(lock.unwrap_or_else(Lock::new));
	}

	/// Acquires the buffer's lock for the duration of the returned guard, so
	/// several operations can be composed into one critical section. `None`
	/// if no lock is configured.
	pub fn lock(&self) -> Option<LockGuard> {
		self.lock.as_ref().map(Lock::acquire)
	}

	pub(crate) fn acquire_internal_lock(&self) -> Option<LockGuard> {
		self.lock.as_ref().map(Lock::acquire)
	}

	// -- Callbacks (§4.5) -------------------------------------------------

	pub fn add_callback(&mut self, callback: impl FnMut(CallbackInfo) + Send + 'static) -> CallbackHandle {
		self.callbacks.add(callback)
	}

	pub fn remove_callback(&mut self, handle: CallbackHandle) -> Result<()> {
		self.callbacks.remove(handle)
	}

	pub fn set_callback_enabled(&mut self, handle: CallbackHandle, enabled: bool) -> Result<()> {
		self.callbacks.set_enabled(handle, enabled)
	}

	pub fn suspend_callback(&mut self, handle: CallbackHandle) -> Result<()> {
		self.callbacks.suspend(handle)
	}

	pub fn unsuspend_callback(&mut self, handle: CallbackHandle) -> Result<()> {
		self.callbacks.unsuspend(handle)
	}

	/// Binds `event_loop`, switching every future notification on this
	/// buffer into deferred mode (§4.5, §6).
	pub fn defer_callbacks(&mut self, event_loop: Arc<dyn EventLoop>) {
		self.callbacks.bind_event_loop(event_loop);
	}

	pub(crate) fn notify(&mut self, orig_size: usize, n_added: usize, n_deleted: usize) {
		self.callbacks.notify(orig_size, n_added, n_deleted);
	}

	// -- Cursor & search (§4.3) -------------------------------------------

	fn segment_lens(&self) -> Vec<usize> {
		self.chain.iter_segments().map(|s| s.off()).collect()
	}

	/// Repositions `ptr` absolutely (`SET`) or relatively (`ADD`). Returns an
	/// invalidated cursor (`pos() == None`) if the target runs past the end.
	pub fn ptr_set(&self, ptr: &Ptr, how: PtrHow, position: usize) -> Ptr {
		cursor::resolve(ptr, how, position, &self.segment_lens())
	}

	/// Forward substring search starting at `start`'s position (or `0` if
	/// `None`). Returns a cursor at the first match, or an invalidated one
	/// (§4.3, §8 property 7).
	pub fn search(&self, needle: &[u8], start: Option<&Ptr>) -> Ptr {
		let start_pos = start.and_then(Ptr::pos).unwrap_or(0);
		match crate::pattern::search(&self.chain, needle, start_pos) {
			Some(pos) => cursor::resolve(&Ptr::new(), PtrHow::Set, pos, &self.segment_lens()),
			None => Ptr::new(),
		}
	}
}

impl fmt::Display for Buffer {
	/// Renders the buffer's live bytes lossily; never panics on partial or
	/// invalid UTF-8 (§12).
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for chunk in self.chain.iter_live_slices() {
			f.write_str(&String::from_utf8_lossy(chunk))?;
		}
		Ok(())
	}
}

impl fmt::Debug for Buffer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Buffer")
			.field("len", &self.len())
			.field("segments", &self.segment_count())
			.field("front_frozen", &self.front_frozen)
			.field("back_frozen", &self.back_frozen)
			.field("locked", &self.lock.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_buffer_is_empty() {
		let buf = Buffer::new();
		assert_eq!(buf.len(), 0);
		assert!(buf.is_empty());
	}

	#[test]
	fn freeze_front_blocks_unfreeze_allows() {
		let mut buf = Buffer::new();
		buf.freeze(true);
		assert!(buf.check_front_unfrozen().is_err());
		buf.unfreeze(true);
		assert!(buf.check_front_unfrozen().is_ok());
	}

	#[test]
	fn debug_never_panics_on_non_utf8() {
		let mut buf = Buffer::new();
		buf.chain.add(&[0xff, 0xfe, b'a']);
		let rendered = format!("{buf:?} {buf}");
		assert!(rendered.contains("Buffer"));
	}
}
