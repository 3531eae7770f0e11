// SPDX-License-Identifier: Apache-2.0

//! The optional mutex a [`Buffer`](crate::Buffer) can be bound to (§4.6). The
//! buffer treats the lock as an opaque, same-thread-reentrant mutual
//! exclusion handle: every public operation acquires it for the duration of
//! the call, including while callbacks run, and an explicit `lock`/`unlock`
//! pair on `Buffer` must be able to wrap several such calls on the same
//! thread without deadlocking. Grounded on the `ThreadId`-keyed ownership
//! tracking in `other_examples/69466307_kylerchin-Corundum__src-alloc-pool.rs.rs`,
//! generalized from a per-thread journal table to a single reentrant
//! exclusion count, and on the `Arc<Mutex<...>>` sharing pattern in
//! `orio::pool::SharedPool` so a guard can outlive the borrow that created it.
//!
//! This is a documented hazard, not a safety net: a lock held across a
//! callback that the application also uses to fence unrelated state can still
//! deadlock that state. It only serializes access to a single buffer's own
//! operations.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

#[derive(Default)]
struct State {
	owner: Option<ThreadId>,
	depth: usize,
}

/// A same-thread-reentrant mutex. Cross-thread acquisition blocks; same-thread
/// re-entry nests instead of deadlocking.
#[derive(Default)]
pub struct Lock {
	state: Mutex<State>,
	free: Condvar,
}

impl Lock {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { state: Mutex::new(State::default()), free: Condvar::new() })
	}

	/// Acquires the lock, blocking if another thread holds it. Reentrant on
	/// the same thread: nested acquisitions simply increment a depth counter.
	/// The returned guard owns a clone of `self`'s `Arc`, so it can outlive
	/// the borrow used to acquire it.
	pub(crate) fn acquire(self: &Arc<Self>) -> LockGuard {
		let me = thread::current().id();
		let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
		loop {
			match state.owner {
				Some(owner) if owner == me => break,
				None => {
					state.owner = Some(me);
					break;
				}
				Some(_) => {
					state = self.free.wait(state).unwrap_or_else(|e| e.into_inner());
				}
			}
		}
		state.depth += 1;
		drop(state);
		LockGuard { lock: self.clone() }
	}
}

/// An acquired, same-thread-reentrant hold on a [`Lock`]; releases on drop.
pub struct LockGuard {
	lock: Arc<Lock>,
}

impl Drop for LockGuard {
	fn drop(&mut self) {
		let mut state = self.lock.state.lock().unwrap_or_else(|e| e.into_inner());
		state.depth -= 1;
		if state.depth == 0 {
			state.owner = None;
			self.lock.free.notify_one();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reentrant_acquire_on_same_thread_does_not_deadlock() {
		let lock = Lock::new();
		let outer = lock.acquire();
		let inner = lock.acquire();
		drop(inner);
		drop(outer);
	}

	#[test]
	fn other_thread_blocks_until_released() {
		let lock = Lock::new();
		let guard = lock.acquire();
		let lock2 = lock.clone();
		let handle = thread::spawn(move || {
			let _g = lock2.acquire();
		});
		drop(guard);
		handle.join().unwrap();
	}
}
