// SPDX-License-Identifier: Apache-2.0

//! Line-oriented scanning (§4.3's `readln`), supporting the four end-of-line
//! dialects the spec names. Grounded on the `LineTerminator` pattern and the
//! ASCII-vs-Unicode split in `orio::pattern`'s `Whitespace`, generalized from
//! a single "any CR/LF run" rule to four distinct scanning dialects.

use crate::pattern::ByteCursor;
use crate::segment::Chain;

/// Which end-of-line convention [`find_line`] scans for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EolStyle {
	/// The longest run of `\r`/`\n` terminates the line; all of it is
	/// consumed.
	Any,
	/// An optional `\r` followed by a single `\n`; both consumed.
	Crlf,
	/// Exactly `\r\n`, found as a literal substring scan; a `\r` not
	/// immediately followed by `\n` is an ordinary body byte, not a
	/// terminator.
	CrlfStrict,
	/// A single `\n`; consumed.
	Lf,
}

/// The result of a successful scan: the logical line length (excluding the
/// terminator) and the total number of bytes the terminator itself occupies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct LineMatch {
	pub(crate) line_len: usize,
	pub(crate) terminator_len: usize,
}

/// Scans `chain` from its head for a line terminator matching `style`.
/// Returns `None` if no complete line is present yet ("no line yet" is not an
/// error, per §4.3/§7).
///
/// Resolves the open question on a lone `\r` at end-of-stream under
/// [`EolStyle::Any`] conservatively: a run of terminator bytes only ends the
/// scan once a non-terminator byte follows it (or there's unambiguously more
/// data after), so a trailing `\r` with nothing after it yet is treated as
/// "no line yet" rather than guessed at.
pub(crate) fn find_line(chain: &Chain, style: EolStyle) -> Option<LineMatch> {
	let mut cursor = ByteCursor::new(chain, 0);
	// Only `CrlfStrict` ever sets this: a `\r` whose look-ahead was itself a
	// `\r` has to be re-examined as the start of its own possible match.
	let mut pending: Option<u8> = None;
	let mut line_len = 0usize;

	loop {
		let byte = match pending.take().or_else(|| cursor.next()) {
			Some(b) => b,
			None => return None,
		};
		match style {
			EolStyle::Lf => {
				if byte == b'\n' {
					return Some(LineMatch { line_len, terminator_len: 1 });
				}
				line_len += 1;
			}
			EolStyle::CrlfStrict => {
				if byte == b'\r' {
					match cursor.next() {
						Some(b'\n') => return Some(LineMatch { line_len, terminator_len: 2 }),
						Some(b'\r') => {
							line_len += 1;
							pending = Some(b'\r');
						}
						Some(_) => line_len += 2,
						None => return None,
					}
				} else {
					line_len += 1;
				}
			}
			EolStyle::Crlf => {
				if byte == b'\r' {
					return match cursor.next() {
						Some(b'\n') => Some(LineMatch { line_len, terminator_len: 2 }),
						Some(_) => Some(LineMatch { line_len, terminator_len: 1 }),
						None => None,
					};
				}
				if byte == b'\n' {
					return Some(LineMatch { line_len, terminator_len: 1 });
				}
				line_len += 1;
			}
			EolStyle::Any => {
				if byte == b'\r' || byte == b'\n' {
					let mut terminator_len = 1;
					loop {
						match cursor.next() {
							Some(b) if b == b'\r' || b == b'\n' => terminator_len += 1,
							Some(_) => return Some(LineMatch { line_len, terminator_len }),
							None => return None,
						}
					}
				}
				line_len += 1;
			}
		}
	}
}
