// SPDX-License-Identifier: Apache-2.0

//! The stable cross-segment position (§4.3's "evbuffer_ptr"). A [`Ptr`] caches
//! `(segment_index, offset_in_segment)` alongside the logical `pos` so
//! re-advancing from a known point is O(1) rather than re-walking the whole
//! chain; any structural mutation invalidates it (§3, §9). Grounded on the
//! segment+offset cursor pattern in `orio::pattern::internal` (a `Cursor`
//! type tracking `(Segment index, byte offset)` for its own matcher).

/// How a new position is interpreted by [`Ptr::set`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PtrHow {
	/// `position` is absolute, measured from the start of the buffer.
	Set,
	/// `position` is added to the cursor's current `pos`.
	Add,
}

/// A logical byte offset into a buffer, plus a cached segment/offset pair for
/// O(1) forward advancement. `pos == -1` (represented as `None`) means "not
/// found" or "invalidated" (§3).
#[derive(Copy, Clone, Debug, Default)]
pub struct Ptr {
	pos: Option<usize>,
	segment: usize,
	offset_in_segment: usize,
}

impl Ptr {
	pub fn new() -> Self { Self::default() }

	/// The logical offset, or `None` if not found / invalidated.
	pub fn pos(&self) -> Option<usize> { self.pos }

	pub(crate) fn invalidate(&mut self) {
		self.pos = None;
		self.segment = 0;
		self.offset_in_segment = 0;
	}

	pub(crate) fn cached(pos: usize, segment: usize, offset_in_segment: usize) -> Self {
		Self { pos: Some(pos), segment, offset_in_segment }
	}

	pub(crate) fn segment_hint(&self) -> (usize, usize) { (self.segment, self.offset_in_segment) }
}

/// Walks `lens` (the live length of each segment, in chain order) to resolve
/// `how`/`position` against `ptr`, starting from `ptr`'s cached segment for
/// [`PtrHow::Add`] and from the head for [`PtrHow::Set`]. Returns the new
/// cursor, or an invalidated one if `position` runs past the buffer's total
/// length.
pub(crate) fn resolve(ptr: &Ptr, how: PtrHow, position: usize, lens: &[usize]) -> Ptr {
	let target = match how {
		PtrHow::Set => position,
		PtrHow::Add => match ptr.pos {
			Some(pos) => pos + position,
			None => return Ptr::default(),
		},
	};
	let total: usize = lens.iter().sum();
	if target > total {
		return Ptr { pos: None, segment: 0, offset_in_segment: 0 };
	}

	let start_segment = match how {
		PtrHow::Set => 0,
		PtrHow::Add => ptr.segment,
	};
	let mut consumed: usize = lens[..start_segment.min(lens.len())].iter().sum();
	let mut seg = start_segment.min(lens.len());
	while seg < lens.len() && consumed + lens[seg] <= target {
		consumed += lens[seg];
		seg += 1;
	}
	Ptr::cached(target, seg, target - consumed)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_walks_from_head() {
		let lens = [4, 4, 4];
		let ptr = resolve(&Ptr::new(), PtrHow::Set, 6, &lens);
		assert_eq!(ptr.pos(), Some(6));
		assert_eq!(ptr.segment_hint(), (1, 2));
	}

	#[test]
	fn add_continues_from_cached_segment() {
		let lens = [4, 4, 4];
		let first = resolve(&Ptr::new(), PtrHow::Set, 4, &lens);
		let second = resolve(&first, PtrHow::Add, 2, &lens);
		assert_eq!(second.pos(), Some(6));
	}

	#[test]
	fn set_past_end_invalidates() {
		let lens = [4];
		let ptr = resolve(&Ptr::new(), PtrHow::Set, 10, &lens);
		assert_eq!(ptr.pos(), None);
	}
}
