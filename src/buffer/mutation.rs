// SPDX-License-Identifier: Apache-2.0

//! The Mutation API (§4.2): the bulk of `Buffer`'s public surface. Every
//! method here acquires the buffer's lock (if any) for its full duration,
//! checks the relevant freeze gate, performs the chain operation, then
//! notifies callbacks with the resulting delta — mirroring the
//! check-then-mutate-then-notify shape of `orio::Buffer`'s own mutating
//! methods, generalized from COW segment sharing to the zero-copy chain
//! relinking this spec calls for.

use std::fmt;
use std::os::fd::{IntoRawFd, RawFd};
use log::trace;
use crate::error::Result;
use crate::line::{find_line, EolStyle};
use super::Buffer;

struct TailWriter<'a> {
	buf: &'a mut [u8],
	written: usize,
}

impl fmt::Write for TailWriter<'_> {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		let bytes = s.as_bytes();
		if self.written + bytes.len() > self.buf.len() {
			return Err(fmt::Error);
		}
		self.buf[self.written..self.written + bytes.len()].copy_from_slice(bytes);
		self.written += bytes.len();
		Ok(())
	}
}

impl Buffer {
	/// Appends `data` to the tail by copying (§4.2 `add`).
	pub fn add(&mut self, data: &[u8]) -> Result<()> {
		let _guard = self.acquire_internal_lock();
		self.check_back_unfrozen()?;
		let orig_size = self.len();
		self.chain.add(data);
		self.notify(orig_size, data.len(), 0);
		Ok(())
	}

	/// Fits `data` into the head segment's leading slack or allocates a new
	/// head segment (§4.1, §4.2 `prepend`).
	pub fn prepend(&mut self, data: &[u8]) -> Result<()> {
		let _guard = self.acquire_internal_lock();
		self.check_front_unfrozen()?;
		let orig_size = self.len();
		self.chain.prepend(data);
		self.notify(orig_size, data.len(), 0);
		Ok(())
	}

	/// Relinks every segment of `src` onto this buffer's tail with zero byte
	/// copies, emptying `src` (§4.2 `add_buffer`, §8 property 3).
	pub fn add_buffer(&mut self, src: &mut Buffer) -> Result<()> {
		let _guard = self.acquire_internal_lock();
		self.check_back_unfrozen()?;
		src.check_front_unfrozen()?;
		let orig_size = self.len();
		let moved = src.len();
		self.chain.append_chain(&mut src.chain);
		self.notify(orig_size, moved, 0);
		src.notify(moved, 0, moved);
		Ok(())
	}

	/// Symmetric to [`Buffer::add_buffer`] on the head side (§4.2
	/// `prepend_buffer`).
	pub fn prepend_buffer(&mut self, src: &mut Buffer) -> Result<()> {
		let _guard = self.acquire_internal_lock();
		self.check_front_unfrozen()?;
		src.check_front_unfrozen()?;
		let orig_size = self.len();
		let moved = src.len();
		self.chain.prepend_chain(&mut src.chain);
		self.notify(orig_size, moved, 0);
		src.notify(moved, 0, moved);
		Ok(())
	}

	/// Appends a pinned segment wrapping caller-owned memory; `cleanup` runs
	/// exactly once when the segment is destroyed or fully drained (§4.2
	/// `add_reference`, §5, §8 property 6).
	///
	/// # Safety
	/// `data` must remain valid and unmodified for its full lifetime, until
	/// `cleanup` runs.
	pub unsafe fn add_reference(&mut self, data: &[u8], cleanup: impl FnOnce() + Send + 'static) -> Result<()> {
		let _guard = self.acquire_internal_lock();
		self.check_back_unfrozen()?;
		let orig_size = self.len();
		let len = data.len();
		self.chain.add_reference(data.as_ptr(), len, Some(Box::new(cleanup)));
		self.notify(orig_size, len, 0);
		Ok(())
	}

	/// Appends a file-backed segment; ownership of `file` transfers to the
	/// buffer, which closes it when the segment is destroyed (§4.2
	/// `add_file`, §5). Opaque to `pullup`/`remove` afterward.
	pub fn add_file(&mut self, file: impl IntoRawFd, offset: u64, length: usize) -> Result<()> {
		let _guard = self.acquire_internal_lock();
		self.check_back_unfrozen()?;
		let orig_size = self.len();
		let fd: RawFd = file.into_raw_fd();
		self.chain.add_file(fd, offset, length);
		self.notify(orig_size, length, 0);
		Ok(())
	}

	/// Formats `args` into the tail, growing the scratch region as needed;
	/// returns the number of bytes appended (§4.2 `add_printf`/`add_vprintf`,
	/// exposed idiomatically over [`std::format_args!`]).
	pub fn add_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<usize> {
		let _guard = self.acquire_internal_lock();
		self.check_back_unfrozen()?;
		let orig_size = self.len();
		let mut cap = 64usize;
		loop {
			let buf = self.chain.reserve(cap);
			let mut writer = TailWriter { buf, written: 0 };
			match fmt::Write::write_fmt(&mut writer, args) {
				Ok(()) => {
					let n = writer.written;
					self.chain.commit(n)?;
					self.notify(orig_size, n, 0);
					return Ok(n);
				}
				Err(_) => cap *= 2,
			}
		}
	}

	/// Copies up to `dst.len()` bytes from the head into `dst`, draining
	/// them; returns the number copied (§4.2 `remove`).
	pub fn remove(&mut self, dst: &mut [u8]) -> Result<usize> {
		let _guard = self.acquire_internal_lock();
		self.check_front_unfrozen()?;
		let orig_size = self.len();
		let n = self.chain.remove(dst)?;
		self.notify(orig_size, 0, n);
		Ok(n)
	}

	/// Transfers up to `n` bytes from this buffer's head to `dst`'s tail,
	/// relinking whole segments and copying only the boundary segment's
	/// partial tail (§4.2 `remove_buffer`).
	pub fn remove_buffer(&mut self, dst: &mut Buffer, n: usize) -> Result<usize> {
		let _guard = self.acquire_internal_lock();
		self.check_front_unfrozen()?;
		dst.check_back_unfrozen()?;
		let orig_size = self.len();
		let dst_orig_size = dst.len();
		let moved = self.chain.remove_into(&mut dst.chain, n);
		self.notify(orig_size, 0, moved);
		dst.notify(dst_orig_size, moved, 0);
		Ok(moved)
	}

	/// Drains up to `n` bytes from the front; draining past [`Buffer::len`]
	/// drains everything and still succeeds (§4.1, §4.2 `drain`).
	pub fn drain(&mut self, n: usize) -> Result<usize> {
		let _guard = self.acquire_internal_lock();
		self.check_front_unfrozen()?;
		let orig_size = self.len();
		let n = self.chain.drain(n);
		self.notify(orig_size, 0, n);
		Ok(n)
	}

	/// Guarantees the first `n` bytes (or all, if `None`) are contiguous,
	/// returning a slice into the head segment (§4.1 `pullup`, §8 property 4).
	/// Fails with `UnsupportedSegmentKind` if any segment in range is
	/// file-backed.
	pub fn pullup(&mut self, n: Option<usize>) -> Result<&[u8]> {
		let _guard = self.acquire_internal_lock();
		self.chain.pullup(n)
	}

	/// Scans for a line terminator matching `style` and, if a complete line
	/// is present, drains it (including the terminator) and returns it
	/// without the terminator. `Ok(None)` means no complete line yet — not
	/// an error (§4.3 `readln`, §7).
	pub fn readln(&mut self, style: EolStyle) -> Result<Option<Vec<u8>>> {
		let _guard = self.acquire_internal_lock();
		self.check_front_unfrozen()?;
		let Some(m) = find_line(&self.chain, style) else { return Ok(None) };
		let orig_size = self.len();
		let mut line = vec![0u8; m.line_len];
		self.chain.remove(&mut line)?;
		self.chain.drain(m.terminator_len);
		self.notify(orig_size, 0, m.line_len + m.terminator_len);
		trace!("readln consumed {} bytes ({} line + {} terminator)", m.line_len + m.terminator_len, m.line_len, m.terminator_len);
		Ok(Some(line))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn add_then_remove_roundtrip() {
		let mut buf = Buffer::new();
		buf.add(b"hello").unwrap();
		let mut out = [0u8; 10];
		let n = buf.remove(&mut out).unwrap();
		assert_eq!(n, 5);
		assert_eq!(&out[..5], b"hello");
		assert_eq!(buf.len(), 0);
	}

	#[test]
	fn add_buffer_is_zero_copy_and_empties_source() {
		let mut src = Buffer::new();
		let mut dst = Buffer::new();
		src.add(b"abc").unwrap();
		src.add(b"def").unwrap();
		dst.add_buffer(&mut src).unwrap();
		assert_eq!(src.len(), 0);
		assert_eq!(dst.len(), 6);
		assert_eq!(dst.pullup(None).unwrap(), b"abcdef");
	}

	#[test]
	fn add_buffer_notifies_src_with_srcs_own_orig_size() {
		let mut src = Buffer::new();
		src.add(b"abc").unwrap();
		let mut dst = Buffer::new();
		// A non-empty destination is what exposes a notification that wrongly
		// reports the destination's pre-mutation size instead of the
		// source's.
		dst.add(b"xx").unwrap();

		let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
		let seen2 = seen.clone();
		src.add_callback(move |info| *seen2.lock().unwrap() = Some(info));

		dst.add_buffer(&mut src).unwrap();

		let info = seen.lock().unwrap().unwrap();
		assert_eq!(info.orig_size, 3);
		assert_eq!(info.n_added, 0);
		assert_eq!(info.n_deleted, 3);
	}

	#[test]
	fn back_frozen_rejects_add() {
		let mut buf = Buffer::new();
		buf.freeze(false);
		assert!(buf.add(b"x").is_err());
		assert_eq!(buf.len(), 0);
	}

	#[test]
	fn front_frozen_rejects_drain() {
		let mut buf = Buffer::new();
		buf.add(b"x").unwrap();
		buf.freeze(true);
		assert!(buf.drain(1).is_err());
		assert_eq!(buf.len(), 1);
		buf.unfreeze(true);
		assert_eq!(buf.drain(1).unwrap(), 1);
	}

	#[test]
	fn add_fmt_appends_formatted_text() {
		let mut buf = Buffer::new();
		let n = buf.add_fmt(format_args!("{}-{}", "a", 2)).unwrap();
		assert_eq!(n, 3);
		assert_eq!(buf.pullup(None).unwrap(), b"a-2");
	}

	#[test]
	fn readln_crlf_then_none_when_incomplete() {
		let mut buf = Buffer::new();
		buf.add(b"GET /\r\nHost: x\n\r\n").unwrap();
		assert_eq!(buf.readln(EolStyle::Crlf).unwrap().as_deref(), Some(&b"GET /"[..]));
		assert_eq!(buf.readln(EolStyle::Crlf).unwrap().as_deref(), Some(&b"Host: x"[..]));
		assert_eq!(buf.readln(EolStyle::Crlf).unwrap().as_deref(), Some(&b""[..]));
		assert_eq!(buf.readln(EolStyle::Crlf).unwrap(), None);
	}

	#[test]
	fn add_reference_runs_cleanup_exactly_once() {
		use std::sync::atomic::{AtomicUsize, Ordering};
		use std::sync::Arc;

		let count = Arc::new(AtomicUsize::new(0));
		let data = b"pinned".to_vec();
		let count2 = count.clone();
		let mut buf = Buffer::new();
		unsafe {
			buf.add_reference(&data, move || { count2.fetch_add(1, Ordering::SeqCst); }).unwrap();
		}
		assert_eq!(buf.len(), 6);
		buf.drain(6).unwrap();
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}
}
