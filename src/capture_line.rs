//! Fixed-column capture-log records
//!
//! The bus sniffer writes one record per physical line. Everything the decoder
//! needs sits at fixed character columns:
//!
//! ```text
//! [0, 21)   sequence number and request name (ignored)
//! [21, 38)  date and time of the capture, to the second
//! [39, 46)  fractional millisecond offset added to the date and time
//! [46, 49)  direction marker; blank for receive-direction (DCE) traffic
//! [47, ..)  space-separated hex byte tokens
//! ```
//!
//! Columns count characters, so a non-ASCII request name does not shift the
//! fields after it.
//!
//! The direction marker overlaps the first payload token. A send line always
//! has a token starting at column 47, so only receive-direction lines leave
//! the marker blank.

use std::ops::Range;

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

/// Columns holding the capture date and time.
pub const TIMESTAMP_COLUMNS: Range<usize> = 21..38;

/// Columns holding the millisecond offset.
pub const MILLIS_COLUMNS: Range<usize> = 39..46;

/// Columns holding the direction marker.
pub const DIRECTION_COLUMNS: Range<usize> = 46..49;

/// First column of the hex payload.
pub const PAYLOAD_START: usize = 47;

/// Stand-in for a non-ASCII payload character, so it fails hex decoding later.
const NON_ASCII_DIGIT: u8 = b'?';

/// Errors raised while reading the metadata fields of a capture line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureLineError {
    /// The date/time column matched none of the configured formats.
    #[error("line {line}: unparseable timestamp '{text}'")]
    Timestamp {
        /// 1-based line number in the capture file.
        line: usize,
        /// Trimmed content of the timestamp column.
        text: String,
    },

    /// The millisecond column is not a finite number.
    #[error("line {line}: unparseable millisecond offset '{text}'")]
    Millis {
        /// 1-based line number in the capture file.
        line: usize,
        /// Trimmed content of the millisecond column.
        text: String,
    },

    /// Adding the millisecond offset overflowed the representable range.
    #[error("line {line}: timestamp {base} + {millis} ms is out of range")]
    OutOfRange {
        /// 1-based line number in the capture file.
        line: usize,
        /// Parsed date and time before the offset.
        base: NaiveDateTime,
        /// Offset that could not be applied.
        millis: f64,
    },
}

/// Result type alias for capture line parsing.
pub type Result<T> = std::result::Result<T, CaptureLineError>;

/// Traffic direction recorded by the sniffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host-to-instrument traffic carrying telemetry payload
    Send,
    /// DCE / receive-direction traffic, never part of a frame
    Receive,
}

/// One line of the capture log, borrowed from the reader's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLine<'a> {
    text: &'a str,
    number: usize,
}

impl<'a> CaptureLine<'a> {
    /// Wrap a raw line. `number` is the 1-based line number used in errors.
    pub fn new(text: &'a str, number: usize) -> Self {
        Self { text, number }
    }

    /// 1-based line number in the capture file.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Raw text of the line.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Direction of the traffic on this line.
    ///
    /// A blank (or truncated) marker column means receive direction.
    pub fn direction(&self) -> Direction {
        if self.column(DIRECTION_COLUMNS).trim().is_empty() {
            Direction::Receive
        } else {
            Direction::Send
        }
    }

    /// Whether this line contributes bytes to frame assembly.
    #[inline]
    pub fn is_payload_bearing(&self) -> bool {
        self.direction() == Direction::Send
    }

    /// Hex digits of the payload with separators stripped and case folded.
    pub fn payload_digits(&self) -> impl Iterator<Item = u8> + 'a {
        let text: &'a str = self.text;
        text.chars()
            .skip(PAYLOAD_START)
            .filter(|c| !c.is_whitespace())
            .map(|c| {
                if c.is_ascii() {
                    c.to_ascii_lowercase() as u8
                } else {
                    NON_ASCII_DIGIT
                }
            })
    }

    /// Reconstruct the capture time of this line.
    ///
    /// The date/time column is tried against each of `formats` in order; the
    /// millisecond column is then added with nanosecond resolution.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureLineError`] if either column does not parse or the sum
    /// overflows.
    pub fn timestamp<S: AsRef<str>>(&self, formats: &[S]) -> Result<NaiveDateTime> {
        let text = self.column(TIMESTAMP_COLUMNS).trim();
        let base = formats
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format.as_ref()).ok())
            .ok_or_else(|| CaptureLineError::Timestamp {
                line: self.number,
                text: text.to_string(),
            })?;

        let millis_text = self.column(MILLIS_COLUMNS).trim();
        let millis: f64 = millis_text
            .parse()
            .ok()
            .filter(|m: &f64| m.is_finite())
            .ok_or_else(|| CaptureLineError::Millis {
                line: self.number,
                text: millis_text.to_string(),
            })?;

        let offset = Duration::nanoseconds((millis * 1_000_000.0).round() as i64);
        base.checked_add_signed(offset)
            .ok_or(CaptureLineError::OutOfRange {
                line: self.number,
                base,
                millis,
            })
    }

    /// Slice a column range, clamped to the line length.
    fn column(&self, range: Range<usize>) -> &'a str {
        let start = self.byte_offset(range.start);
        let end = self.byte_offset(range.end);
        self.text.get(start..end).unwrap_or("")
    }

    /// Byte offset of a character column, or the line length past its end.
    fn byte_offset(&self, column: usize) -> usize {
        self.text
            .char_indices()
            .nth(column)
            .map_or(self.text.len(), |(offset, _)| offset)
    }
}
