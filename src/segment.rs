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

mod storage;
pub(crate) mod chain;

pub(crate) use storage::{Cleanup, Storage};
pub(crate) use chain::Chain;

use std::fmt;
use crate::pool::SegmentPool;

/// Minimum segment capacity new allocations are rounded up to (§4.1).
pub(crate) const MIN_SEGMENT_SIZE: usize = 256;

/// A contiguous byte extent held in a buffer's [`Chain`] (§3). Live bytes
/// occupy `[misalign, misalign+off)`; bytes before `misalign` have already
/// been drained, and capacity from `misalign+off` to `buffer_len` is free for
/// appends (unless the segment is pinned or file-backed). `Chain` realizes
/// the spec's singly-linked "next" succession as contiguous storage in a
/// `VecDeque`, the same representation the teacher's `Segments` ring uses;
/// the observable ordering and invariants are identical.
pub(crate) struct Segment {
	storage: Storage,
	misalign: usize,
	off: usize,
	immutable: bool,
}

impl Segment {
	pub(crate) fn owned(capacity: usize) -> Self {
		Self {
			storage: Storage::Owned(vec![0u8; capacity].into_boxed_slice()),
			misalign: 0,
			off: 0,
			immutable: false,
		}
	}

	/// An owned segment of `capacity` bytes whose live range sits at the
	/// tail end (`misalign = capacity - data.len()`), leaving leading slack
	/// free for further `prepend`s. Used when a `prepend` can't fit in the
	/// existing head's slack and needs a fresh segment.
	pub(crate) fn owned_trailing(data: &[u8], capacity: usize) -> Self {
		let mut buf = vec![0u8; capacity];
		let misalign = capacity - data.len();
		buf[misalign..].copy_from_slice(data);
		Self {
			storage: Storage::Owned(buf.into_boxed_slice()),
			misalign,
			off: data.len(),
			immutable: false,
		}
	}

	/// Claims a zeroed, `capacity`-byte owned segment from `pool` rather than
	/// allocating fresh (§1's "allocation-frugal").
	pub(crate) fn owned_from_pool(pool: &mut SegmentPool, capacity: usize) -> Self {
		Self {
			storage: Storage::Owned(pool.claim(capacity)),
			misalign: 0,
			off: 0,
			immutable: false,
		}
	}

	/// Builds a pinned segment wrapping externally-owned memory (§4.2
	/// `add_reference`). `cleanup` runs exactly once, at drop.
	///
	/// # Safety
	/// `ptr` must stay valid and immutable for `len` bytes until `cleanup`
	/// runs.
	pub(crate) unsafe fn reference(ptr: *const u8, len: usize, cleanup: Option<Cleanup>) -> Self {
		Self {
			storage: Storage::Reference { ptr, len, cleanup },
			misalign: 0,
			off: len,
			immutable: true,
		}
	}

	pub(crate) fn file(fd: std::os::fd::RawFd, offset: u64, len: usize) -> Self {
		Self {
			storage: Storage::File { fd, offset, len },
			misalign: 0,
			off: len,
			immutable: true,
		}
	}

	pub(crate) fn buffer_len(&self) -> usize { self.storage.capacity() }
	pub(crate) fn misalign(&self) -> usize { self.misalign }
	pub(crate) fn off(&self) -> usize { self.off }
	pub(crate) fn is_empty(&self) -> bool { self.off == 0 }
	pub(crate) fn is_pinned(&self) -> bool { self.storage.is_pinned() }
	pub(crate) fn is_file(&self) -> bool { self.storage.is_file() }

	/// Free capacity past the live range, 0 for pinned/file/immutable
	/// segments (§4.1).
	pub(crate) fn tail_space(&self) -> usize {
		if self.immutable {
			0
		} else {
			self.buffer_len() - (self.misalign + self.off)
		}
	}

	/// The live byte range as a slice, for storage kinds that support direct
	/// access (everything but file segments).
	pub(crate) fn data(&self) -> Option<&[u8]> {
		self.storage
			.data()
			.map(|buf| &buf[self.misalign..self.misalign + self.off])
	}

	pub(crate) fn file_extent(&self) -> Option<(std::os::fd::RawFd, u64, usize)> {
		match self.storage {
			Storage::File { fd, offset, .. } => Some((fd, offset + self.misalign as u64, self.off)),
			_ => None,
		}
	}

	/// Writable tail slice `[misalign+off, buffer_len)`. `None` for pinned or
	/// file segments, which cannot be appended to in place.
	pub(crate) fn tail_mut(&mut self) -> Option<&mut [u8]> {
		let start = self.misalign + self.off;
		self.storage.data_mut().map(|buf| &mut buf[start..])
	}

	/// Appends `data`, returning the number of bytes written (bounded by
	/// remaining tail space).
	pub(crate) fn append(&mut self, data: &[u8]) -> usize {
		let Some(tail) = self.tail_mut() else { return 0 };
		let n = data.len().min(tail.len());
		tail[..n].copy_from_slice(&data[..n]);
		self.off += n;
		n
	}

	/// Marks `n` previously-reserved tail bytes live (§4.2 `commit_space`).
	pub(crate) fn commit(&mut self, n: usize) {
		debug_assert!(self.misalign + self.off + n <= self.buffer_len());
		self.off += n;
	}

	/// Drains up to `n` bytes from the front, returning the number actually
	/// drained.
	pub(crate) fn drain_front(&mut self, n: usize) -> usize {
		let n = n.min(self.off);
		self.misalign += n;
		self.off -= n;
		n
	}

	/// Grows leading slack by shrinking `misalign`, for `prepend` (§4.1).
	/// Returns the number of bytes written.
	pub(crate) fn prepend(&mut self, data: &[u8]) -> usize {
		if self.immutable {
			return 0;
		}
		let n = data.len().min(self.misalign);
		let Some(buf) = self.storage.data_mut() else { return 0 };
		let start = self.misalign - n;
		buf[start..self.misalign].copy_from_slice(&data[data.len() - n..]);
		self.misalign = start;
		self.off += n;
		n
	}

	/// Resets an owned segment for reuse once fully drained.
	pub(crate) fn reset(&mut self) {
		self.misalign = 0;
		self.off = 0;
	}

	/// Reclaims the backing allocation for an owned segment being discarded,
	/// so the chain's pool can recycle it. `None` for pinned/file segments,
	/// whose storage isn't a free-standing heap box.
	pub(crate) fn into_owned_storage(self) -> Option<Box<[u8]>> {
		match self.storage {
			Storage::Owned(buf) => Some(buf),
			_ => None,
		}
	}
}

impl fmt::Debug for Segment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Segment")
			.field("storage", &self.storage)
			.field("misalign", &self.misalign)
			.field("off", &self.off)
			.field("immutable", &self.immutable)
			.finish()
	}
}
