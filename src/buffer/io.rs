// SPDX-License-Identifier: Apache-2.0

//! The I/O bridge on `Buffer` (§4.4): thin, freeze-gated, notifying wrappers
//! over [`crate::io::fd`]'s raw `readv`/`writev`/`sendfile` calls.

use std::os::fd::RawFd;
use crate::error::Result;
use crate::io::fd;
use super::Buffer;

impl Buffer {
	/// Reads up to `howmuch` bytes from `fd` into the tail via scatter read.
	/// Returns the number of bytes read; `0` means EOF (§4.4 `read`).
	pub fn read(&mut self, fd: RawFd, howmuch: usize) -> Result<usize> {
		let _guard = self.acquire_internal_lock();
		self.check_back_unfrozen()?;
		let orig_size = self.len();
		let n = fd::read_into(&mut self.chain, fd, howmuch)?;
		self.notify(orig_size, n, 0);
		Ok(n)
	}

	/// Writes the entire buffer to `fd` via gather write, draining what was
	/// transferred (§4.4 `write`).
	pub fn write(&mut self, fd: RawFd) -> Result<usize> {
		self.write_atmost(fd, self.len(), false)
	}

	/// Writes up to `n` bytes to `fd`; when `dst_is_socket` and a file
	/// segment is encountered, emits it with `sendfile` instead of copying
	/// (§4.4 `write`/`sendfile`, §8 property 5).
	pub fn write_atmost(&mut self, fd: RawFd, n: usize, dst_is_socket: bool) -> Result<usize> {
		let _guard = self.acquire_internal_lock();
		self.check_front_unfrozen()?;
		let orig_size = self.len();
		let written = fd::write_atmost(&mut self.chain, fd, Some(n), dst_is_socket)?;
		self.notify(orig_size, 0, written);
		Ok(written)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Read, Seek, SeekFrom, Write};
	use std::os::fd::AsRawFd;

	#[test]
	fn read_then_write_roundtrips_through_fds() {
		let mut src = tempfile::tempfile().unwrap();
		src.write_all(b"hello world").unwrap();
		src.seek(SeekFrom::Start(0)).unwrap();

		let mut buf = Buffer::new();
		let n = buf.read(src.as_raw_fd(), 64).unwrap();
		assert_eq!(n, 11);
		assert_eq!(buf.len(), 11);

		let mut dst = tempfile::tempfile().unwrap();
		let written = buf.write(dst.as_raw_fd()).unwrap();
		assert_eq!(written, 11);
		assert_eq!(buf.len(), 0);

		dst.seek(SeekFrom::Start(0)).unwrap();
		let mut seen = String::new();
		dst.read_to_string(&mut seen).unwrap();
		assert_eq!(seen, "hello world");
	}

	#[test]
	fn write_atmost_respects_front_freeze() {
		let mut buf = Buffer::new();
		buf.add(b"abc").unwrap();
		buf.freeze(true);
		let dst = tempfile::tempfile().unwrap();
		assert!(buf.write_atmost(dst.as_raw_fd(), 3, false).is_err());
	}
}
