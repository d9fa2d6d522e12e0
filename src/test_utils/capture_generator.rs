//! Synthetic capture-log generation for testing
//!
//! Produces capture lines in the sniffer's fixed-column layout with known
//! frame content, for validating synchronization and decoding without a
//! recorded capture.
//!
//! # Example
//!
//! ```rust,ignore
//! use head_amp_lib::test_utils::{CaptureGenerator, SyntheticFrame};
//!
//! let mut gen = CaptureGenerator::new(16);
//! gen.dce_line()
//!     .stream(&[0x00, 0x11])
//!     .stream(&SyntheticFrame::ramp(1).with_marker());
//!
//! let capture = gen.to_capture();
//! ```
//!
//! Frame content must not produce a run of eight `f` digits anywhere except
//! the marker. Channel words always have a zero top nibble, so `f` digits
//! inside a frame never reach that length.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::frame_layout::{CHANNEL_COUNT, FRAME_BYTES};

/// Header line written by the sniffer (skipped by the decoder)
pub const HEADER_LINE: &str =
    "Seq   Request        Date/Time         Millis  Data (hex)";

/// Request name printed on send lines
const SEND_REQUEST: &str = "IRP_MJ_WRITE";

/// Request name printed on receive-direction lines
const DCE_REQUEST: &str = "IOCTL_SERIAL";

/// Timestamp column format
const TIMESTAMP_FORMAT: &str = "%m/%d/%y %H:%M:%S";

/// Frame boundary marker bytes
pub const MARKER: [u8; 4] = [0xFF; 4];

/// Known frame content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticFrame {
    /// Raw 28-bit value per channel word, index 0 is channel 1. Slots 9 and 10
    /// are written to the wire but never decoded.
    pub raw: [i32; CHANNEL_COUNT],
    /// 12-bit gain code
    pub gain: u16,
}

impl SyntheticFrame {
    /// Frame with the given raw channel words and gain code
    pub fn new(raw: [i32; CHANNEL_COUNT], gain: u16) -> Self {
        Self { raw, gain }
    }

    /// Frame with distinct, easily recognised values derived from `seed`
    pub fn ramp(seed: i32) -> Self {
        let mut raw = [0; CHANNEL_COUNT];
        for (i, value) in raw.iter_mut().enumerate() {
            *value = seed * 0x0001_0000 + (i as i32 + 1) * 0x0000_1111;
        }
        Self {
            raw,
            gain: 0x0a00 | (seed as u16 & 0x00ff) << 1,
        }
    }

    /// The 50 frame bytes (no marker)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FRAME_BYTES);
        for value in self.raw {
            bytes.extend_from_slice(&((value as u32) & 0x0fff_ffff).to_be_bytes());
        }
        bytes.extend_from_slice(&(self.gain & 0x0fff).to_be_bytes());
        bytes
    }

    /// Marker followed by the frame bytes
    pub fn with_marker(&self) -> Vec<u8> {
        let mut bytes = MARKER.to_vec();
        bytes.extend(self.to_bytes());
        bytes
    }

    /// Frame bytes as lowercase hex
    pub fn hex(&self) -> String {
        to_hex(&self.to_bytes())
    }

    /// Expected gain code text
    pub fn gain_code(&self) -> String {
        format!("{:04x}", self.gain & 0x0fff)
    }
}

/// Lowercase hex without separators
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Builds a capture log line by line
#[derive(Debug, Clone)]
pub struct CaptureGenerator {
    /// Maximum bytes per line for [`CaptureGenerator::stream`]
    pub bytes_per_line: usize,
    start: NaiveDateTime,
    line_interval_ms: f64,
    elapsed_ms: f64,
    sequence: usize,
    lines: Vec<String>,
    /// Capture time of each line; `None` for the header
    stamps: Vec<Option<NaiveDateTime>>,
}

impl Default for CaptureGenerator {
    fn default() -> Self {
        Self::new(16)
    }
}

impl CaptureGenerator {
    /// Create a generator writing at most `bytes_per_line` bytes per line.
    /// The header line is already in place.
    pub fn new(bytes_per_line: usize) -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 2, 6)
            .and_then(|d| d.and_hms_opt(14, 23, 45))
            .unwrap_or_default();
        Self {
            bytes_per_line: bytes_per_line.max(1),
            start,
            line_interval_ms: 12.5,
            elapsed_ms: 0.0,
            sequence: 0,
            lines: vec![HEADER_LINE.to_string()],
            stamps: vec![None],
        }
    }

    /// Use a different capture start time
    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    /// Use a different spacing between lines
    pub fn with_line_interval_ms(mut self, interval: f64) -> Self {
        self.line_interval_ms = interval;
        self
    }

    /// Append one send line carrying exactly `bytes`
    pub fn send_line(&mut self, bytes: &[u8]) -> &mut Self {
        let payload = bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        self.push(SEND_REQUEST, &format!(" {}", payload))
    }

    /// Append one send line with raw payload text, for malformed input
    pub fn send_text(&mut self, payload: &str) -> &mut Self {
        self.push(SEND_REQUEST, &format!(" {}", payload))
    }

    /// Append a receive-direction line (blank direction marker)
    pub fn dce_line(&mut self) -> &mut Self {
        self.push(DCE_REQUEST, "    GET_COMMSTATUS")
    }

    /// Append `bytes` as send lines of at most `bytes_per_line` bytes each
    pub fn stream(&mut self, bytes: &[u8]) -> &mut Self {
        for chunk in bytes.chunks(self.bytes_per_line) {
            self.send_line(chunk);
        }
        self
    }

    /// All lines so far, header first
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Capture time written on a 1-based line number
    pub fn stamp(&self, line_number: usize) -> Option<NaiveDateTime> {
        self.stamps
            .get(line_number.checked_sub(1)?)
            .copied()
            .flatten()
    }

    /// The whole log as text, newline terminated
    pub fn to_capture(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    /// Format a record in the sniffer's column layout.
    ///
    /// `tail` starts at column 46, so a leading space followed by a hex token
    /// yields a non-blank direction marker.
    pub fn format_line(
        sequence: usize,
        request: &str,
        timestamp: NaiveDateTime,
        millis: f64,
        tail: &str,
    ) -> String {
        format!(
            "{:<6}{:<15}{} {:>7.3}{}",
            sequence % 1_000_000,
            request,
            timestamp.format(TIMESTAMP_FORMAT),
            millis,
            tail
        )
    }

    fn push(&mut self, request: &str, tail: &str) -> &mut Self {
        self.sequence += 1;
        let whole_seconds = (self.elapsed_ms / 1000.0).floor();
        let millis = self.elapsed_ms - whole_seconds * 1000.0;
        let second = self.start + Duration::seconds(whole_seconds as i64);
        let stamp = second + Duration::nanoseconds((millis * 1_000_000.0).round() as i64);

        self.lines.push(Self::format_line(
            self.sequence,
            request,
            second,
            millis,
            tail,
        ));
        self.stamps.push(Some(stamp));
        self.elapsed_ms += self.line_interval_ms;
        self
    }
}
