// SPDX-License-Identifier: Apache-2.0

//! The chain of segments backing a [`Buffer`](crate::Buffer) (§4.1). Grounded
//! on `orio::segment::Segments` (a `VecDeque<Segment<N>>` with a laden/empty
//! split) and on the linked-list `ChainBuffer` pattern from
//! `other_examples/d483abd8_avilainc-vizzio__avila-avila-buffer-src-chain.rs.rs`,
//! generalized to variable segment sizes, pinned references, and file
//! extents.

use std::collections::VecDeque;
use crate::error::{Error, Result};
use crate::pool::SegmentPool;
use crate::segment::{Cleanup, Segment, MIN_SEGMENT_SIZE};

/// A FIFO sequence of [`Segment`]s plus the running byte count (§3's
/// `total_len`) and any outstanding (uncommitted) reservation at the tail.
pub(crate) struct Chain {
	segments: VecDeque<Segment>,
	total_len: usize,
	reserved: usize,
	pool: SegmentPool,
	min_segment: usize,
}

impl Default for Chain {
	fn default() -> Self { Self::with_min_segment_size(MIN_SEGMENT_SIZE) }
}

impl Chain {
	pub(crate) fn new() -> Self { Self::default() }

	/// A chain whose new segments are never smaller than `min_segment_size`
	/// bytes (§12's `BufferOptions::min_segment_size`), still rounded up to
	/// the next power of two.
	pub(crate) fn with_min_segment_size(min_segment_size: usize) -> Self {
		Self {
			segments: VecDeque::new(),
			total_len: 0,
			reserved: 0,
			pool: SegmentPool::new(),
			min_segment: min_segment_size.max(1),
		}
	}

	pub(crate) fn len(&self) -> usize { self.total_len }
	pub(crate) fn is_empty(&self) -> bool { self.total_len == 0 }
	pub(crate) fn segment_count(&self) -> usize { self.segments.len() }
	pub(crate) fn reserved(&self) -> usize { self.reserved }

	fn next_capacity(&self, min: usize) -> usize {
		min.max(self.min_segment).next_power_of_two()
	}

	/// Drops a segment that is no longer reachable from the chain, returning
	/// its owned backing allocation (if any) to the pool instead of letting
	/// the allocator reclaim it outright.
	fn discard(&mut self, seg: Segment) {
		if let Some(buf) = seg.into_owned_storage() {
			self.pool.recycle(buf);
		}
	}

	/// §4.1 `expand(n)`: ensures the tail segment has at least `n` free
	/// bytes, growing in place when the tail is empty and unpinned, else
	/// appending a fresh segment.
	fn expand(&mut self, n: usize) {
		if let Some(tail) = self.segments.back() {
			if tail.tail_space() >= n {
				return;
			}
			if tail.is_empty() && !tail.is_pinned() && !tail.is_file() {
				let old = self.segments.pop_back().expect("checked above");
				self.discard(old);
				let cap = self.next_capacity(n);
				self.segments.push_back(Segment::owned_from_pool(&mut self.pool, cap));
				return;
			}
		}
		let cap = self.next_capacity(n);
		self.segments.push_back(Segment::owned_from_pool(&mut self.pool, cap));
	}

	/// §4.2 `add`: copies `data` into the tail, growing as needed.
	pub(crate) fn add(&mut self, data: &[u8]) {
		let mut remaining = data;
		while !remaining.is_empty() {
			self.expand(remaining.len());
			let tail = self.segments.back_mut().expect("expand always leaves a tail segment");
			let n = tail.append(remaining);
			debug_assert!(n > 0);
			remaining = &remaining[n..];
		}
		self.total_len += data.len();
	}

	/// §4.2 `add_reference`: appends a pinned segment over caller memory.
	///
	/// # Safety
	/// See [`Segment::reference`].
	pub(crate) unsafe fn add_reference(&mut self, ptr: *const u8, len: usize, cleanup: Option<Cleanup>) {
		self.segments.push_back(Segment::reference(ptr, len, cleanup));
		self.total_len += len;
	}

	/// §4.2 `add_file`: appends a file-backed segment.
	pub(crate) fn add_file(&mut self, fd: std::os::fd::RawFd, offset: u64, len: usize) {
		self.segments.push_back(Segment::file(fd, offset, len));
		self.total_len += len;
	}

	/// §4.2 `prepend`: fits into head slack or allocates a new head segment.
	pub(crate) fn prepend(&mut self, data: &[u8]) {
		// Try the existing head's leading slack first; the tail-most bytes of
		// `data` land closest to the live range, so apply whole `data` and
		// let `Segment::prepend` clamp to available slack.
		let absorbed = self.segments
			.front_mut()
			.map_or(0, |head| head.prepend(data));

		if absorbed < data.len() {
			let remaining = &data[..data.len() - absorbed];
			let cap = self.next_capacity(remaining.len());
			self.segments.push_front(Segment::owned_trailing(remaining, cap));
		}
		self.total_len += data.len();
	}

	/// §4.2 `add_buffer`: relinks every segment of `other` onto this chain's
	/// tail without copying bytes.
	pub(crate) fn append_chain(&mut self, other: &mut Chain) {
		self.segments.extend(other.segments.drain(..));
		self.total_len += other.total_len;
		other.total_len = 0;
		other.reserved = 0;
	}

	/// §4.2 `prepend_buffer`: relinks every segment of `other` onto this
	/// chain's head, preserving `other`'s order.
	pub(crate) fn prepend_chain(&mut self, other: &mut Chain) {
		for seg in other.segments.drain(..).rev() {
			self.segments.push_front(seg);
		}
		self.total_len += other.total_len;
		other.total_len = 0;
		other.reserved = 0;
	}

	/// §4.1 `drain(n)`: removes up to `n` bytes from the front. Draining past
	/// `total_len` drains everything and still succeeds (§4.2).
	pub(crate) fn drain(&mut self, n: usize) -> usize {
		let n = n.min(self.total_len);
		let mut remaining = n;
		while remaining > 0 {
			let Some(front) = self.segments.front_mut() else { break };
			let taken = front.drain_front(remaining);
			remaining -= taken;
			if front.is_empty() {
				if self.segments.len() == 1 && !front.is_pinned() && !front.is_file() {
					front.reset();
					break;
				}
				let seg = self.segments.pop_front().expect("front just observed present");
				self.discard(seg);
			}
		}
		self.total_len -= n;
		n
	}

	/// §4.1 `pullup(n)`: guarantees the first `n` bytes (or all, if
	/// `n.is_none()`) are contiguous, returning a slice into the head
	/// segment. Fails with `UnsupportedSegmentKind` if any segment in range
	/// is file-backed.
	pub(crate) fn pullup(&mut self, n: Option<usize>) -> Result<&[u8]> {
		let n = n.unwrap_or(self.total_len).min(self.total_len);
		if n == 0 {
			return Ok(&[]);
		}

		// Fast path: head already covers it.
		if self.segments.front().map_or(false, |s| !s.is_file() && s.off() >= n) {
			return Ok(&self.segments.front().unwrap().data().unwrap()[..n]);
		}

		let mut counted = 0;
		for seg in self.segments.iter() {
			if counted >= n {
				break;
			}
			if seg.is_file() {
				return Err(Error::unsupported_segment_kind());
			}
			counted += seg.off();
		}

		let mut merged_bytes = Vec::with_capacity(n);
		while merged_bytes.len() < n {
			let mut seg = self.segments
				.pop_front()
				.expect("the range check above guarantees enough non-file bytes exist");
			let need = n - merged_bytes.len();
			let data = seg.data().unwrap();
			if data.len() <= need {
				merged_bytes.extend_from_slice(data);
				self.discard(seg);
			} else {
				merged_bytes.extend_from_slice(&data[..need]);
				seg.drain_front(need);
				self.segments.push_front(seg);
			}
		}

		let mut merged = Segment::owned_from_pool(&mut self.pool, merged_bytes.len());
		merged.append(&merged_bytes);
		self.segments.push_front(merged);
		Ok(&self.segments.front().unwrap().data().unwrap()[..n])
	}

	/// §4.2 `reserve_space`: ensures `n` contiguous writable tail bytes,
	/// returning them. Repeated calls without a commit return the same
	/// region (the tail segment's uncommitted capacity never shrinks between
	/// calls unless a new call asks for more).
	pub(crate) fn reserve(&mut self, n: usize) -> &mut [u8] {
		self.expand(n);
		self.reserved = n;
		let tail = self.segments.back_mut().expect("expand always leaves a tail segment");
		let space = tail.tail_mut().expect("reserve target is never pinned/file");
		&mut space[..n]
	}

	/// §4.2 `commit_space`: marks the first `k` reserved bytes live.
	pub(crate) fn commit(&mut self, k: usize) -> Result<()> {
		if k > self.reserved {
			return Err(Error::bad_argument());
		}
		if let Some(tail) = self.segments.back_mut() {
			tail.commit(k);
		}
		self.total_len += k;
		self.reserved = 0;
		Ok(())
	}

	/// §4.2 `remove`: copies up to `n` bytes from the head into `dst`,
	/// draining them, returning the number copied.
	pub(crate) fn remove(&mut self, dst: &mut [u8]) -> Result<usize> {
		let n = dst.len().min(self.total_len);
		let mut copied = 0;
		while copied < n {
			let Some(front) = self.segments.front() else { break };
			if front.is_file() {
				return Err(Error::unsupported_segment_kind());
			}
			let data = front.data().unwrap();
			let take = data.len().min(n - copied);
			dst[copied..copied + take].copy_from_slice(&data[..take]);
			copied += take;
			self.drain_exact_front(take);
		}
		Ok(copied)
	}

	/// §4.2 `remove_buffer`: transfers up to `n` bytes from this chain to
	/// `dst`, relinking whole segments and copying only the boundary
	/// segment's partial tail.
	pub(crate) fn remove_into(&mut self, dst: &mut Chain, n: usize) -> usize {
		let n = n.min(self.total_len);
		let mut moved = 0;
		while moved < n {
			let Some(front) = self.segments.front() else { break };
			let remaining = n - moved;
			if front.off() <= remaining {
				let seg = self.segments.pop_front().unwrap();
				moved += seg.off();
				dst.segments.push_back(seg);
			} else {
				// Partial: copy the boundary bytes out (file segments cannot
				// be split this way, but a partial take on a file segment
				// still works via its own byte range with no copy needed
				// since file data isn't materialized here).
				if front.is_file() {
					let (fd, offset, _) = front.file_extent().unwrap();
					dst.segments.push_back(Segment::file(fd_dup(fd), offset, remaining));
					self.segments.front_mut().unwrap().drain_front(remaining);
				} else {
					let data = front.data().unwrap()[..remaining].to_vec();
					dst.add(&data);
					self.segments.front_mut().unwrap().drain_front(remaining);
				}
				moved += remaining;
			}
		}
		self.total_len -= moved;
		dst.total_len += moved;
		moved
	}

	fn drain_exact_front(&mut self, n: usize) {
		let drained = self.drain(n);
		debug_assert_eq!(drained, n);
	}

	pub(crate) fn iter_segments(&self) -> impl Iterator<Item = &Segment> {
		self.segments.iter()
	}

	pub(crate) fn iter_live_slices(&self) -> impl Iterator<Item = &[u8]> {
		self.segments.iter().filter_map(Segment::data)
	}

	/// Returns live, in-memory chunks covering up to `max` bytes from the
	/// head (or everything, if `None`), without copying. Used by the I/O
	/// bridge to build `iovec`s and exposed `pub(crate)` for tests, mirroring
	/// `evbuffer_peek`.
	pub(crate) fn peek_chunks(&self, max: Option<usize>) -> Vec<&[u8]> {
		let mut remaining = max.unwrap_or(self.total_len);
		let mut chunks = Vec::new();
		for data in self.iter_live_slices() {
			if remaining == 0 {
				break;
			}
			let take = data.len().min(remaining);
			chunks.push(&data[..take]);
			remaining -= take;
		}
		chunks
	}

	pub(crate) fn front_data(&self) -> Option<&[u8]> {
		self.segments.front().and_then(Segment::data)
	}

	pub(crate) fn pop_front_empty_ok(&mut self) {
		while let Some(front) = self.segments.front() {
			if front.is_empty() && self.segments.len() > 1 {
				self.segments.pop_front();
			} else {
				break;
			}
		}
	}
}

/// Duplicates a file descriptor so a split file segment can own its own
/// close. Used only by `remove_into`'s boundary case.
fn fd_dup(fd: std::os::fd::RawFd) -> std::os::fd::RawFd {
	unsafe { libc::dup(fd) }
}

#[cfg(test)]
mod tests {
	use all_asserts::{assert_ge, assert_le};
	use super::*;

	#[test]
	fn add_then_remove_roundtrip() {
		let mut chain = Chain::new();
		chain.add(b"hello");
		let mut out = [0u8; 10];
		let n = chain.remove(&mut out).unwrap();
		assert_eq!(n, 5);
		assert_eq!(&out[..5], b"hello");
		assert_eq!(chain.len(), 0);
	}

	#[test]
	fn cross_segment_add_and_pullup() {
		let mut chain = Chain::new();
		// Force two segments by using a tiny allocation floor via repeated
		// adds larger than MIN_SEGMENT_SIZE growth step boundaries.
		chain.add(&vec![1u8; MIN_SEGMENT_SIZE]);
		chain.add(&vec![2u8; MIN_SEGMENT_SIZE]);
		assert_ge!(chain.segment_count(), 1);
		let all = chain.pullup(None).unwrap().to_vec();
		assert_le!(chain.segment_count(), 1);
		assert_eq!(all.len(), MIN_SEGMENT_SIZE * 2);
		assert!(all[..MIN_SEGMENT_SIZE].iter().all(|&b| b == 1));
		assert!(all[MIN_SEGMENT_SIZE..].iter().all(|&b| b == 2));
	}

	#[test]
	fn pullup_on_a_lone_file_segment_errs_instead_of_panicking() {
		use std::io::Write;
		use std::os::fd::IntoRawFd;

		let mut file = tempfile::tempfile().unwrap();
		file.write_all(&vec![7u8; 100]).unwrap();

		let mut chain = Chain::new();
		chain.add_file(file.into_raw_fd(), 0, 100);
		let err = chain.pullup(Some(50)).unwrap_err();
		assert!(matches!(err.kind(), crate::error::ErrorKind::UnsupportedSegmentKind));
	}

	#[test]
	fn append_chain_transfers_zero_copy_and_empties_source() {
		let mut src = Chain::new();
		let mut dst = Chain::new();
		src.add(b"abc");
		src.add(b"def");
		dst.append_chain(&mut src);
		assert_eq!(src.len(), 0);
		assert_eq!(dst.len(), 6);
		assert_eq!(dst.pullup(None).unwrap(), b"abcdef");
	}

	#[test]
	fn drain_past_total_len_drains_everything() {
		let mut chain = Chain::new();
		chain.add(b"hi");
		assert_eq!(chain.drain(1000), 2);
		assert_eq!(chain.len(), 0);
	}

	#[test]
	fn reserve_then_commit_increases_len_by_exactly_k() {
		let mut chain = Chain::new();
		{
			let space = chain.reserve(16);
			space[..4].copy_from_slice(b"data");
		}
		assert_eq!(chain.len(), 0);
		chain.commit(4).unwrap();
		assert_eq!(chain.len(), 4);
		let mut out = [0u8; 4];
		chain.remove(&mut out).unwrap();
		assert_eq!(&out, b"data");
	}

	#[test]
	fn commit_more_than_reserved_is_bad_argument() {
		let mut chain = Chain::new();
		chain.reserve(4);
		assert!(chain.commit(5).is_err());
	}

	#[test]
	fn peek_chunks_is_bounded_and_copy_free() {
		let mut chain = Chain::new();
		chain.add(b"abc");
		chain.add(b"def");
		let chunks = chain.peek_chunks(Some(4));
		let total: usize = chunks.iter().map(|c| c.len()).sum();
		assert_eq!(total, 4);
		let all = chain.peek_chunks(None);
		let total_all: usize = all.iter().map(|c| c.len()).sum();
		assert_eq!(total_all, 6);
	}
}
