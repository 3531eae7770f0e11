// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A free list of owned-segment backing allocations, recycled by size class
//! (power of two) rather than returned to the global allocator. Grounded on
//! `orio::pool::LocalPool` (a `Vec<Segment>` free list behind `RefCell`) and
//! the `FragmentPool` free-list pattern in
//! `other_examples/b23998cc_jbush001-RustNetworkStack__src-stack-buf.rs.rs`,
//! scoped per-[`Chain`](crate::segment::Chain) instead of shared globally:
//! cross-buffer sharing would need synchronization the spec's non-goals
//! explicitly decline ("thread-safety across buffers that do not share
//! state").

use std::collections::HashMap;

/// Recycled heap allocations, bucketed by capacity (always a power of two).
#[derive(Default)]
pub(crate) struct SegmentPool {
	free: HashMap<usize, Vec<Box<[u8]>>>,
}

impl SegmentPool {
	pub(crate) fn new() -> Self { Self::default() }

	/// Claims a zeroed allocation of exactly `capacity` bytes, reusing a
	/// recycled one if available.
	pub(crate) fn claim(&mut self, capacity: usize) -> Box<[u8]> {
		if let Some(bucket) = self.free.get_mut(&capacity) {
			if let Some(mut buf) = bucket.pop() {
				buf.iter_mut().for_each(|b| *b = 0);
				return buf;
			}
		}
		vec![0u8; capacity].into_boxed_slice()
	}

	/// Returns a freed allocation to the pool for later reuse.
	pub(crate) fn recycle(&mut self, buf: Box<[u8]>) {
		self.free.entry(buf.len()).or_default().push(buf);
	}

	pub(crate) fn cached_bytes(&self) -> usize {
		self.free
			.iter()
			.map(|(cap, bucket)| cap * bucket.len())
			.sum()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recycled_allocation_is_reused_and_cleared() {
		let mut pool = SegmentPool::new();
		let mut buf = pool.claim(64);
		buf[0] = 0xFF;
		pool.recycle(buf);
		assert_eq!(pool.cached_bytes(), 64);
		let reused = pool.claim(64);
		assert_eq!(reused.len(), 64);
		assert!(reused.iter().all(|&b| b == 0));
		assert_eq!(pool.cached_bytes(), 0);
	}

	#[test]
	fn distinct_size_classes_do_not_cross_pollinate() {
		let mut pool = SegmentPool::new();
		pool.recycle(vec![0u8; 32].into_boxed_slice());
		let claimed = pool.claim(64);
		assert_eq!(claimed.len(), 64);
		assert_eq!(pool.cached_bytes(), 32);
	}
}
