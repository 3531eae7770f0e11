// SPDX-License-Identifier: Apache-2.0

//! The unix-specific half of the I/O bridge: `readv`/`writev` for scatter
//! read and gather write, and `sendfile` for zero-copy file-segment
//! emission, falling back to a `pread` + `write` copy when the destination
//! isn't a socket or the platform has no `sendfile`. Grounded on the raw
//! `libc`-FFI fd ownership style of `examples/arthurlm-mmap-vec/src/segment.rs`.

use std::io;
use std::os::fd::RawFd;
use log::{debug, trace};
use crate::error::{Error, Result};
use crate::segment::Chain;

/// Reads up to `howmuch` bytes from `fd` into `chain`'s tail via a single
/// `readv` call. Because segment capacities are always rounded up to cover
/// the full requested size (§4.1's allocation policy), one extent already
/// covers what a boundary-crossing read would otherwise need two for.
/// Returns the number of bytes read; `0` means EOF.
pub(crate) fn read_into(chain: &mut Chain, fd: RawFd, howmuch: usize) -> Result<usize> {
	if howmuch == 0 {
		return Ok(0);
	}
	let buf = chain.reserve(howmuch);
	let iov = libc::iovec { iov_base: buf.as_mut_ptr() as *mut _, iov_len: buf.len() };
	let n = unsafe { libc::readv(fd, &iov, 1) };
	if n < 0 {
		let err = io::Error::last_os_error();
		debug!("readv(fd={fd}) failed: {err}");
		return Err(Error::io(err));
	}
	chain.commit(n as usize)?;
	trace!("read {n} bytes from fd={fd}");
	Ok(n as usize)
}

/// Writes up to `target` bytes (or all of `chain`, if `target` is `None`)
/// starting at the head, using `writev` across runs of in-memory segments
/// and `sendfile`/`pread`+`write` for file segments encountered along the
/// way. Drains exactly what was transferred; a short write is not an error
/// (§4.4).
pub(crate) fn write_atmost(chain: &mut Chain, fd: RawFd, target: Option<usize>, dst_is_socket: bool) -> Result<usize> {
	let mut remaining = target.unwrap_or_else(|| chain.len()).min(chain.len());
	let mut total_written = 0usize;

	while remaining > 0 {
		let Some(front) = chain.iter_segments().next() else { break };
		if front.is_file() {
			let (src_fd, offset, len) = front.file_extent().expect("is_file implies file_extent");
			let take = len.min(remaining);
			let sent = emit_file_extent(fd, src_fd, offset, take, dst_is_socket)?;
			chain.drain(sent);
			total_written += sent;
			remaining -= sent;
			if sent < take {
				break;
			}
			continue;
		}

		let mut iovecs = Vec::new();
		let mut run_len = 0usize;
		for seg in chain.iter_segments() {
			if run_len >= remaining || seg.is_file() {
				break;
			}
			let data = seg.data().expect("non-file segment always has data");
			let take = data.len().min(remaining - run_len);
			iovecs.push(libc::iovec { iov_base: data.as_ptr() as *mut _, iov_len: take });
			run_len += take;
		}
		if iovecs.is_empty() {
			break;
		}

		let written = unsafe { libc::writev(fd, iovecs.as_ptr(), iovecs.len() as i32) };
		if written < 0 {
			let err = io::Error::last_os_error();
			debug!("writev(fd={fd}) failed after {total_written} bytes: {err}");
			return Err(Error::io(err));
		}
		let written = written as usize;
		chain.drain(written);
		total_written += written;
		remaining -= written;
		if written < run_len {
			break;
		}
	}

	Ok(total_written)
}

cfg_if::cfg_if! {
	if #[cfg(target_os = "linux")] {
		fn emit_file_extent(dst_fd: RawFd, src_fd: RawFd, offset: u64, len: usize, dst_is_socket: bool) -> Result<usize> {
			if dst_is_socket {
				let mut off = offset as libc::off_t;
				let sent = unsafe { libc::sendfile(dst_fd, src_fd, &mut off, len) };
				if sent < 0 {
					return Err(Error::io(io::Error::last_os_error()));
				}
				return Ok(sent as usize);
			}
			emit_file_extent_fallback(dst_fd, src_fd, offset, len)
		}
	} else {
		fn emit_file_extent(dst_fd: RawFd, src_fd: RawFd, offset: u64, len: usize, _dst_is_socket: bool) -> Result<usize> {
			emit_file_extent_fallback(dst_fd, src_fd, offset, len)
		}
	}
}

/// `pread` the file extent into a scratch buffer, then `write` it out; used
/// when the destination isn't a socket or the platform has no `sendfile`.
fn emit_file_extent_fallback(dst_fd: RawFd, src_fd: RawFd, offset: u64, len: usize) -> Result<usize> {
	let mut buf = vec![0u8; len];
	let read = unsafe { libc::pread(src_fd, buf.as_mut_ptr() as *mut _, len, offset as libc::off_t) };
	if read < 0 {
		return Err(Error::io(io::Error::last_os_error()));
	}
	let written = unsafe { libc::write(dst_fd, buf.as_ptr() as *const _, read as usize) };
	if written < 0 {
		return Err(Error::io(io::Error::last_os_error()));
	}
	Ok(written as usize)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::{Read, Seek, SeekFrom, Write};
	use std::os::fd::AsRawFd;

	#[test]
	fn read_into_fills_chain_from_a_pipe() {
		let mut file = tempfile::tempfile().unwrap();
		file.write_all(b"hello world").unwrap();
		file.seek(SeekFrom::Start(0)).unwrap();

		let mut chain = Chain::new();
		let n = read_into(&mut chain, file.as_raw_fd(), 64).unwrap();
		assert_eq!(n, 11);
		assert_eq!(chain.len(), 11);
	}

	#[test]
	fn write_atmost_drains_what_was_written() {
		let mut out = tempfile::tempfile().unwrap();
		let mut chain = Chain::new();
		chain.add(b"abcdef");

		let n = write_atmost(&mut chain, out.as_raw_fd(), Some(4), false).unwrap();
		assert_eq!(n, 4);
		assert_eq!(chain.len(), 2);

		out.seek(SeekFrom::Start(0)).unwrap();
		let mut seen = String::new();
		out.read_to_string(&mut seen).unwrap();
		assert_eq!(seen, "abcd");
	}
}
