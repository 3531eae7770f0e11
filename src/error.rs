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

use std::{error, io, result};
use amplify_derive::Display;

/// The distinct failure modes a buffer operation can report (§7 of the
/// design). `NotFound` exists for completeness; callers observe it as
/// `-1`/`None` rather than as an `Err`, matching the convention that "no
/// match yet" is not a hard error.
#[derive(Copy, Clone, Debug, Display)]
pub enum ErrorKind {
	#[display("allocation failed")]
	OutOfMemory,
	#[display("operation rejected by a freeze gate")]
	Frozen,
	#[display("invalid argument")]
	BadArgument,
	#[display("I/O error")]
	Io,
	#[display("operation unsupported on this segment kind")]
	UnsupportedSegmentKind,
	#[display("no match")]
	NotFound,
}

#[derive(Debug, Display)]
#[display("{kind}")]
pub struct Error {
	kind: ErrorKind,
	source: Option<Box<dyn error::Error + Send + Sync + 'static>>,
}

impl error::Error for Error {
	fn source(&self) -> Option<&(dyn error::Error + 'static)> {
		self.source
			.as_deref()
			.map(|e| e as &(dyn error::Error + 'static))
	}
}

impl Error {
	fn new(kind: ErrorKind) -> Self {
		Self { kind, source: None }
	}

	fn with_source(kind: ErrorKind, source: impl error::Error + Send + Sync + 'static) -> Self {
		Self { kind, source: Some(Box::new(source)) }
	}

	pub fn kind(&self) -> ErrorKind { self.kind }

	pub(crate) fn out_of_memory() -> Self { Self::new(ErrorKind::OutOfMemory) }
	pub(crate) fn frozen() -> Self { Self::new(ErrorKind::Frozen) }
	pub(crate) fn bad_argument() -> Self { Self::new(ErrorKind::BadArgument) }
	pub(crate) fn unsupported_segment_kind() -> Self { Self::new(ErrorKind::UnsupportedSegmentKind) }
	pub(crate) fn not_found() -> Self { Self::new(ErrorKind::NotFound) }

	pub(crate) fn io(source: io::Error) -> Self {
		Self::with_source(ErrorKind::Io, source)
	}

	/// Returns the underlying [`io::Error`], if this is an I/O failure.
	pub fn io_source(&self) -> Option<&io::Error> {
		self.source
			.as_deref()
			.and_then(|e| e.downcast_ref::<io::Error>())
	}
}

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self { Self::io(value) }
}

pub type Result<T = ()> = result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_matches_kind() {
		let err = Error::frozen();
		assert_eq!(err.to_string(), "operation rejected by a freeze gate");
	}

	#[test]
	fn io_roundtrip() {
		let io_err = io::Error::new(io::ErrorKind::Other, "boom");
		let err: Error = io_err.into();
		assert!(matches!(err.kind(), ErrorKind::Io));
		assert!(err.io_source().is_some());
	}
}
