// SPDX-License-Identifier: Apache-2.0

//! Reservation/commit (§4.2 `reserve_space`/`commit_space`): the two-step
//! protocol a caller uses to write directly into the tail without an
//! intermediate copy, mirroring `orio::Buffer::reserve`/`fill`'s split
//! between "get me a scratch region" and "this much of it is now live".

use crate::error::Result;
use super::Buffer;

impl Buffer {
	/// Reserves at least `n` contiguous writable bytes at the tail and
	/// returns them. The region is not live until [`Buffer::commit_space`]
	/// is called; a second call to `reserve_space` before committing simply
	/// re-reserves, discarding the previous region's uncommitted status.
	pub fn reserve_space(&mut self, n: usize) -> Result<&mut [u8]> {
		let _guard = self.acquire_internal_lock();
		self.check_back_unfrozen()?;
		Ok(self.chain.reserve(n))
	}

	/// Marks the first `k` bytes of the last reserved region live, growing
	/// `len()` by exactly `k` and firing callbacks with that delta. `k` must
	/// not exceed the most recent `reserve_space` call's `n`.
	pub fn commit_space(&mut self, k: usize) -> Result<()> {
		let _guard = self.acquire_internal_lock();
		self.check_back_unfrozen()?;
		let orig_size = self.len();
		self.chain.commit(k)?;
		self.notify(orig_size, k, 0);
		Ok(())
	}
}
