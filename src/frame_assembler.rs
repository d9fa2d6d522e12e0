//! Frame synchronization and assembly from capture-log lines
//!
//! Frames arrive as hex text split arbitrarily across capture lines. The
//! assembler is fed one line at a time and alternates between two phases:
//!
//! 1. **Searching**: payload digits accumulate until the `ffffffff` sentinel
//!    appears. Digits after the sentinel seed the next frame and the current
//!    line's timestamp is recorded for it.
//!
//!    `ff` bytes ahead of the marker extend the run of `f` digits, so the
//!    sentinel is taken as the last byte-aligned `ffffffff` of the run. A run
//!    that reaches the end of the buffered digits may continue on the next
//!    line and is only committed once a different digit follows it.
//! 2. **Assembling**: payload digits accumulate until a full frame
//!    ([`FRAME_HEX_LEN`] digits) is buffered, which is then emitted.
//!
//! # Usage
//!
//! ```rust,ignore
//! use head_amp_lib::capture_line::CaptureLine;
//! use head_amp_lib::frame_assembler::{HexAssembler, ProcessResult};
//!
//! let mut assembler = HexAssembler::new(ExcessPolicy::default(), formats);
//!
//! for (i, text) in lines.iter().enumerate().skip(1) {
//!     let line = CaptureLine::new(text, i + 1);
//!     let mut result = assembler.process_line(&line);
//!     while let ProcessResult::Frame(frame) = result {
//!         handle(frame);
//!         result = assembler.advance(&line);
//!     }
//! }
//! ```

use chrono::NaiveDateTime;

use crate::capture_line::{self, CaptureLine};
use crate::config::{DecodeConfig, ExcessPolicy};
use crate::frame_layout::FRAME_HEX_LEN;
use crate::hex_queue::HexQueue;

/// Frame boundary marker: four `0xFF` bytes
pub const SENTINEL: &[u8] = b"ffffffff";

/// Location of a sentinel in the search buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPoint {
    /// Digit index of the sentinel's first digit
    pub sentinel_index: usize,
    /// Digits buffered after the sentinel, counted from the buffer's end
    pub offset: usize,
    /// Whether a digit other than `f` follows the sentinel
    pub closed: bool,
}

/// Locates frame boundaries in accumulated hex text
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSynchronizer;

impl FrameSynchronizer {
    /// Find the first sentinel in `buffer`.
    ///
    /// Within a longer run of `f` digits the last sentinel starting on a byte
    /// boundary wins; if none does, the first match is used.
    /// `offset = len - index - 8`: the number of trailing digits that belong
    /// to the frame starting after the sentinel.
    pub fn locate(buffer: &HexQueue) -> Option<SyncPoint> {
        let first = buffer.find(SENTINEL)?;
        let run_end = first + buffer.run_len(first, SENTINEL[0]);
        let sentinel_index = (first..=run_end - SENTINEL.len())
            .rev()
            .find(|&i| buffer.stream_position(i) % 2 == 0)
            .unwrap_or(first);
        Some(SyncPoint {
            sentinel_index,
            offset: buffer.len() - sentinel_index - SENTINEL.len(),
            closed: run_end < buffer.len(),
        })
    }
}

/// Hex text of one frame plus where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledFrame {
    /// Exactly [`FRAME_HEX_LEN`] digits
    pub digits: String,
    /// Timestamp of the line where the sentinel was matched
    pub timestamp: capture_line::Result<NaiveDateTime>,
    /// Line holding the sentinel
    pub start_line: usize,
    /// Line that supplied the last digit
    pub end_line: usize,
}

/// Result of processing a single line
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    /// No complete frame yet, continue feeding lines
    Accumulating,
    /// Complete frame ready
    Frame(AssembledFrame),
    /// Line carries no payload (receive direction)
    Skipped,
}

/// Frame whose sentinel has been seen but whose digits are still arriving
#[derive(Debug, Clone)]
struct PendingFrame {
    start_line: usize,
    timestamp: capture_line::Result<NaiveDateTime>,
}

/// Sentinel at the end of the buffer whose run of `f` digits may go on
#[derive(Debug, Clone)]
struct OpenSentinel {
    /// Stream position of the sentinel's first digit
    position: usize,
    frame: PendingFrame,
}

/// Assembles frames from capture-log lines
#[derive(Debug)]
pub struct HexAssembler {
    /// Search buffer while searching, frame buffer while assembling
    queue: HexQueue,
    /// Set once a sentinel is matched, cleared when the frame is emitted
    pending: Option<PendingFrame>,
    open_sentinel: Option<OpenSentinel>,
    excess_policy: ExcessPolicy,
    timestamp_formats: Vec<String>,
    dropped_digits: usize,
    frames_assembled: usize,
}

impl HexAssembler {
    /// Create an assembler
    ///
    /// # Arguments
    /// * `excess_policy` - Fate of digits left on a line after a frame
    /// * `timestamp_formats` - chrono formats for the timestamp column
    pub fn new(excess_policy: ExcessPolicy, timestamp_formats: Vec<String>) -> Self {
        Self {
            queue: HexQueue::with_capacity(FRAME_HEX_LEN * 2),
            pending: None,
            open_sentinel: None,
            excess_policy,
            timestamp_formats,
            dropped_digits: 0,
            frames_assembled: 0,
        }
    }

    /// Create an assembler from a decode configuration
    pub fn from_config(config: &DecodeConfig) -> Self {
        Self::new(config.excess_policy, config.timestamp_formats.clone())
    }

    /// Reset the assembler state
    pub fn reset(&mut self) {
        self.queue.clear();
        self.pending = None;
        self.open_sentinel = None;
    }

    /// Get current buffer size in digits (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.queue.len()
    }

    /// Check if a sentinel has been matched and a frame is being assembled.
    ///
    /// Stays false while a sentinel's run of `f` digits reaches the end of
    /// the buffered digits.
    pub fn is_synced(&self) -> bool {
        self.pending.is_some()
    }

    /// Digits discarded by [`ExcessPolicy::DropOnBoundaryLine`] so far
    pub fn dropped_digits(&self) -> usize {
        self.dropped_digits
    }

    /// Frames emitted so far
    pub fn frames_assembled(&self) -> usize {
        self.frames_assembled
    }

    /// Process a single capture line
    ///
    /// Returns `ProcessResult::Frame` when the line completes a frame. A line
    /// can carry more than one frame; call [`HexAssembler::advance`] with the
    /// same line until it stops returning frames.
    pub fn process_line(&mut self, line: &CaptureLine<'_>) -> ProcessResult {
        if !line.is_payload_bearing() {
            log::trace!("Line {}: receive direction, skipped", line.number());
            return ProcessResult::Skipped;
        }
        self.queue.push_digits(line.payload_digits());
        self.advance(line)
    }

    /// Continue on already-buffered digits without consuming a new line
    pub fn advance(&mut self, line: &CaptureLine<'_>) -> ProcessResult {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => match self.synchronize(line) {
                Some(pending) => pending,
                None => return ProcessResult::Accumulating,
            },
        };

        let Some(digits) = self.queue.pop_front(FRAME_HEX_LEN) else {
            self.pending = Some(pending);
            return ProcessResult::Accumulating;
        };

        if self.excess_policy == ExcessPolicy::DropOnBoundaryLine
            && pending.start_line == line.number()
            && !self.queue.is_empty()
        {
            log::warn!(
                "Line {}: dropping {} digits past a frame that started on the same line",
                line.number(),
                self.queue.len()
            );
            self.dropped_digits += self.queue.len();
            self.queue.clear();
        }

        self.frames_assembled += 1;
        log::debug!(
            "Frame assembled: lines {}..={} ({} digits left over)",
            pending.start_line,
            line.number(),
            self.queue.len()
        );

        ProcessResult::Frame(AssembledFrame {
            digits,
            timestamp: pending.timestamp,
            start_line: pending.start_line,
            end_line: line.number(),
        })
    }

    /// Signal end of input.
    ///
    /// Returns the number of buffered digits if input ended mid-frame, zero
    /// when it ended right after a sentinel. The partial frame is discarded
    /// either way.
    pub fn finish(&mut self) -> Option<usize> {
        let partial = match (self.pending.take(), self.open_sentinel.take()) {
            (Some(_), _) => Some(self.queue.len()),
            (None, Some(_)) => Some(0),
            (None, None) => None,
        };
        if let Some(digits) = partial {
            log::debug!("Input ended mid-frame with {} digits buffered", digits);
        }
        self.queue.clear();
        partial
    }

    /// Search the buffer for a sentinel and start a frame after it.
    fn synchronize(&mut self, line: &CaptureLine<'_>) -> Option<PendingFrame> {
        let Some(sync) = FrameSynchronizer::locate(&self.queue) else {
            // Keep a possible partial sentinel at the tail
            self.queue.retain_last(SENTINEL.len() - 1);
            self.open_sentinel = None;
            return None;
        };

        // An open sentinel that has not moved keeps the line it was seen on
        let position = self.queue.stream_position(sync.sentinel_index);
        let frame = match self.open_sentinel.take() {
            Some(open) if open.position == position => open.frame,
            _ => PendingFrame {
                start_line: line.number(),
                timestamp: line.timestamp(&self.timestamp_formats),
            },
        };
        self.queue.discard_front(sync.sentinel_index);

        if !sync.closed {
            log::trace!("Line {}: sentinel run reaches end of buffer", line.number());
            self.open_sentinel = Some(OpenSentinel { position, frame });
            return None;
        }

        self.queue.discard_front(SENTINEL.len());
        log::debug!(
            "Line {}: sentinel matched, {} digits seed the next frame",
            frame.start_line,
            sync.offset
        );
        Some(frame)
    }
}
