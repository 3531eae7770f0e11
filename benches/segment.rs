// SPDX-License-Identifier: Apache-2.0

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use evbuf::{Buffer, BufferOptions};

fn reserve_commit(c: &mut Criterion) {
	c.bench_function("reserve_then_commit 4KiB", |b| b.iter_batched(
		Buffer::new,
		|mut buf| {
			let space = buf.reserve_space(4096).unwrap();
			space.fill(black_box(0x42));
			buf.commit_space(4096).unwrap();
		},
		BatchSize::SmallInput,
	));
}

fn prepend(c: &mut Criterion) {
	let opts = BufferOptions::default().set_min_segment_size(256);
	c.bench_function("prepend into head slack", |b| b.iter_batched(
		|| Buffer::new_with_options(opts),
		|mut buf| buf.prepend(black_box(b"header: value\r\n")).unwrap(),
		BatchSize::SmallInput,
	));
}

fn pullup_across_segments(c: &mut Criterion) {
	c.bench_function("pullup after many small adds", |b| b.iter_batched(
		|| {
			let mut buf = Buffer::new();
			for _ in 0..64 {
				buf.add(b"0123456789abcdef").unwrap();
			}
			buf
		},
		|mut buf| buf.pullup(None).unwrap().len(),
		BatchSize::SmallInput,
	));
}

fn drain(c: &mut Criterion) {
	c.bench_function("drain past a segment boundary", |b| b.iter_batched(
		|| {
			let mut buf = Buffer::new();
			buf.add(&[1u8; 512]).unwrap();
			buf.add(&[2u8; 512]).unwrap();
			buf
		},
		|mut buf| buf.drain(600).unwrap(),
		BatchSize::SmallInput,
	));
}

criterion_group!(benches, reserve_commit, prepend, pullup_across_segments, drain);
criterion_main!(benches);
