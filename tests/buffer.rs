// SPDX-License-Identifier: Apache-2.0

//! Black-box coverage of `Buffer`'s public surface beyond the S1-S7
//! scenarios: prepend, remove_buffer, pullup and add_fmt composed together.

use evbuf::{Buffer, PtrHow};

#[test]
fn prepend_then_pullup_merges_head_and_body() {
	let mut buf = Buffer::new();
	buf.add(b"world").unwrap();
	buf.prepend(b"hello ").unwrap();
	assert_eq!(buf.pullup(None).unwrap(), b"hello world");
}

#[test]
fn remove_buffer_splits_only_the_boundary_segment() {
	let mut src = Buffer::new();
	src.add(b"abcd").unwrap();
	src.add(b"efgh").unwrap();
	let mut dst = Buffer::new();

	let moved = src.remove_buffer(&mut dst, 6).unwrap();
	assert_eq!(moved, 6);
	assert_eq!(src.len(), 2);
	assert_eq!(dst.len(), 6);
	assert_eq!(dst.pullup(None).unwrap(), b"abcdef");
	assert_eq!(src.pullup(None).unwrap(), b"gh");
}

#[test]
fn ptr_set_add_then_set_is_consistent_with_search() {
	let mut buf = Buffer::new();
	buf.add(b"xxxneedlexxx").unwrap();
	let found = buf.search(b"needle", None);
	assert_eq!(found.pos(), Some(3));

	let reset = buf.ptr_set(&found, PtrHow::Set, 0);
	assert_eq!(reset.pos(), Some(0));
	let advanced = buf.ptr_set(&reset, PtrHow::Add, 3);
	assert_eq!(advanced.pos(), Some(3));
}

#[test]
fn add_fmt_grows_past_the_initial_scratch_size() {
	let mut buf = Buffer::new();
	let long = "x".repeat(500);
	let n = buf.add_fmt(format_args!("{long}")).unwrap();
	assert_eq!(n, 500);
	assert_eq!(buf.pullup(None).unwrap().len(), 500);
}

#[test]
fn callback_handle_removal_stops_future_notifications() {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	let mut buf = Buffer::new();
	let count = Arc::new(AtomicUsize::new(0));
	let count2 = count.clone();
	let handle = buf.add_callback(move |_| { count2.fetch_add(1, Ordering::SeqCst); });

	buf.add(b"a").unwrap();
	assert_eq!(count.load(Ordering::SeqCst), 1);

	buf.remove_callback(handle).unwrap();
	buf.add(b"b").unwrap();
	assert_eq!(count.load(Ordering::SeqCst), 1);
}
