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

//! ## How it works
//!
//! A [`Buffer`] is a FIFO queue of byte segments called a chain. Bytes are
//! appended at the tail and drained from the head; segments are claimed from
//! a small per-chain pool of recycled allocations rather than the global
//! allocator whenever possible, so a steady-state read/write cycle settles
//! into reusing the same handful of backing buffers.
//!
//! ### Segments
//!
//! A segment's live range sits between `misalign` (bytes already drained)
//! and `misalign + off` (bytes written so far); capacity past that is free
//! for appends. New segments are sized to the next power of two at or above
//! what was asked for, clamped to a configurable minimum
//! (`BufferOptions::min_segment_size`). Besides plain owned segments, a
//! chain can hold *pinned* segments wrapping caller memory
//! (`Buffer::add_reference`) and *file* segments referencing an open file
//! descriptor by offset and length (`Buffer::add_file`) without reading
//! their contents into memory at all.
//!
//! ### Zero-copy transfers
//!
//! Moving data between two buffers (`Buffer::add_buffer`,
//! `Buffer::remove_buffer`) relinks whole segments instead of copying bytes;
//! only a segment that straddles the requested boundary is split, and only
//! that segment's overlap is copied. Writing a file segment to a socket
//! (`Buffer::write_atmost`) uses `sendfile` on Linux rather than reading the
//! file into the buffer first.
//!
//! ### Cursors, search and lines
//!
//! A `Ptr` remembers the segment and in-segment offset it last resolved to,
//! so repeated `Buffer::ptr_set` calls with `PtrHow::Add` don't re-walk the
//! chain from the head each time. `Buffer::search` looks for a byte needle
//! across segment boundaries without first pulling the chain contiguous;
//! line-oriented reads (`Buffer::readln`) build on the same cross-segment
//! cursor to support four end-of-line dialects.
//!
//! ### Callbacks, freezing and locking
//!
//! A buffer can notify registered callbacks of every successful mutation's
//! `{orig_size, n_added, n_deleted}` delta, either immediately or, once an
//! `EventLoop` is bound, coalesced into a single deferred dispatch per
//! entry. Freeze gates reject structural mutation at the front or back
//! independently of callbacks. An optional same-thread-reentrant `Lock` lets
//! a caller compose several operations into one critical section without
//! the buffer deadlocking itself.

mod buffer;
mod callback;
mod cursor;
mod error;
mod event_loop;
#[cfg(unix)]
mod io;
mod line;
mod lock;
mod pattern;
mod pool;
mod segment;

pub use buffer::{Buffer, BufferOptions};
pub use callback::{CallbackHandle, CallbackInfo};
pub use cursor::{Ptr, PtrHow};
pub use error::{Error, ErrorKind, Result};
pub use event_loop::{DeferredJob, EventLoop, Inline};
pub use line::EolStyle;
pub use lock::{Lock, LockGuard};
