//! Capture-log replay: turns a line source into a series of readings.
//!
//! [`SeriesBuilder`] is the push side: it is fed one [`CaptureLine`] at a time
//! and drives assembly, decoding and scaling for every frame the line
//! completes. [`ReadingIterator`] is the pull side over any line source, and
//! the `decode_*` helpers collect a whole capture into a [`DecodeReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use head_amp_lib::config::DecodeConfig;
//! use head_amp_lib::replay::decode_file;
//!
//! let report = decode_file(Path::new("capture.txt"), &DecodeConfig::default())?;
//! for reading in &report.readings {
//!     println!("{} ch1={:?}", reading.timestamp(), reading.channel(1));
//! }
//! log::info!("{}", report.summary());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use crate::capture_line::{CaptureLine, CaptureLineError};
use crate::channel_scaler::ChannelScaler;
use crate::config::{DecodeConfig, FailurePolicy};
use crate::frame_assembler::{AssembledFrame, HexAssembler, ProcessResult};
use crate::frame_decoder::{FrameDecoder, FrameError, HexFrame};
use crate::reading::DecodedReading;

/// Line number of the capture header, skipped unconditionally.
const HEADER_LINE_NUMBER: usize = 1;

/// Errors that can end or interrupt a decode run.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Input ended before the frame in progress was complete.
    #[error("input ended mid-frame with {buffered_digits} hex digits buffered")]
    UnexpectedEndOfInput {
        /// Digits assembled after the sentinel when input ran out.
        buffered_digits: usize,
    },

    /// A frame failed length or hex validation.
    #[error("malformed frame starting on line {line}: {source}")]
    MalformedFrame {
        /// Line holding the frame's sentinel.
        line: usize,
        /// What was wrong with the frame.
        #[source]
        source: FrameError,
    },

    /// The timestamp of a frame's sentinel line did not parse.
    #[error("timestamp parse error: {0}")]
    TimestampParse(#[from] CaptureLineError),

    /// The capture could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Whether the error is a genuine failure rather than a graceful end of
    /// input.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnexpectedEndOfInput { .. })
    }
}

/// Result type alias for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// How a decode run ended.
#[derive(Debug)]
pub enum RunEnd {
    /// The line source ran out between frames.
    Exhausted,
    /// The line source ran out mid-frame; the partial frame was discarded.
    Truncated(DecodeError),
    /// A fatal error stopped the run. Readings before it are kept.
    Aborted(DecodeError),
}

impl RunEnd {
    /// The error attached to this outcome, if any.
    pub fn error(&self) -> Option<&DecodeError> {
        match self {
            Self::Exhausted => None,
            Self::Truncated(e) | Self::Aborted(e) => Some(e),
        }
    }
}

impl fmt::Display for RunEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("input exhausted"),
            Self::Truncated(e) => write!(f, "truncated ({})", e),
            Self::Aborted(e) => write!(f, "aborted ({})", e),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct DecodeReport {
    /// Readings in capture order.
    pub readings: Vec<DecodedReading>,
    /// Frames dropped under [`FailurePolicy::Skip`].
    pub skipped_frames: usize,
    /// Digits discarded by the excess policy.
    pub dropped_digits: usize,
    /// Lines read, header included.
    pub lines_read: usize,
    /// How the run ended.
    pub end: RunEnd,
}

impl DecodeReport {
    /// False only when a fatal error stopped the run.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !matches!(self.end, RunEnd::Aborted(_))
    }

    /// One-line description of the run for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} readings from {} lines, {} skipped frames, {} dropped digits, {}",
            self.readings.len(),
            self.lines_read,
            self.skipped_frames,
            self.dropped_digits,
            self.end
        )
    }
}

/// Builds the reading series one capture line at a time.
#[derive(Debug)]
pub struct SeriesBuilder {
    assembler: HexAssembler,
    decoder: FrameDecoder,
    scaler: ChannelScaler,
    failure_policy: FailurePolicy,
    skipped_frames: usize,
    halted: bool,
}

impl SeriesBuilder {
    /// Create a builder for the Head Amp layout and calibration.
    pub fn new(config: &DecodeConfig) -> Self {
        Self {
            assembler: HexAssembler::from_config(config),
            decoder: FrameDecoder::head_amp(),
            scaler: ChannelScaler::head_amp(),
            failure_policy: config.failure_policy,
            skipped_frames: 0,
            halted: false,
        }
    }

    /// Feed one line and return the outcome of every frame it completes.
    ///
    /// Under [`FailurePolicy::Stop`] a bad frame is returned as the last
    /// element and the builder halts: later lines are ignored. Under
    /// [`FailurePolicy::Skip`] bad frames are logged and counted instead.
    pub fn push_line(&mut self, line: &CaptureLine<'_>) -> Vec<Result<DecodedReading>> {
        let mut out = Vec::new();
        if self.halted {
            return out;
        }

        let mut result = self.assembler.process_line(line);
        while let ProcessResult::Frame(frame) = result {
            let start_line = frame.start_line;
            match self.decode(frame) {
                Ok(reading) => out.push(Ok(reading)),
                Err(e) => match self.failure_policy {
                    FailurePolicy::Stop => {
                        log::debug!("Stopping at bad frame from line {}", start_line);
                        self.halted = true;
                        out.push(Err(e));
                        return out;
                    }
                    FailurePolicy::Skip => {
                        log::warn!("Skipping frame from line {}: {}", start_line, e);
                        self.skipped_frames += 1;
                    }
                },
            }
            result = self.assembler.advance(line);
        }
        out
    }

    /// Signal end of input.
    pub fn finish(&mut self) -> RunEnd {
        match self.assembler.finish() {
            Some(buffered_digits) => {
                RunEnd::Truncated(DecodeError::UnexpectedEndOfInput { buffered_digits })
            }
            None => RunEnd::Exhausted,
        }
    }

    /// Whether a bad frame has stopped the run.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Frames dropped under [`FailurePolicy::Skip`] so far.
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Digits discarded by the excess policy so far.
    pub fn dropped_digits(&self) -> usize {
        self.assembler.dropped_digits()
    }

    fn decode(&self, frame: AssembledFrame) -> Result<DecodedReading> {
        let timestamp = frame.timestamp?;
        let malformed = |source: FrameError| DecodeError::MalformedFrame {
            line: frame.start_line,
            source,
        };
        let hex = HexFrame::new(frame.digits).map_err(malformed)?;
        let raw = self.decoder.decode(&hex).map_err(malformed)?;
        let channels = self.scaler.apply(&raw.channels);
        Ok(DecodedReading::new(timestamp, channels, raw.gain))
    }
}

/// Lazily decodes readings from a line source.
///
/// The first line is treated as the capture header. Iteration ends after the
/// first error it yields; [`ReadingIterator::end`] then tells how.
pub struct ReadingIterator<L> {
    lines: L,
    builder: SeriesBuilder,
    pending: VecDeque<Result<DecodedReading>>,
    lines_read: usize,
    end: Option<RunEnd>,
    failed: bool,
}

impl<L> ReadingIterator<L>
where
    L: Iterator<Item = io::Result<String>>,
{
    /// Create an iterator over `lines`.
    pub fn new(lines: L, config: &DecodeConfig) -> Self {
        Self {
            lines,
            builder: SeriesBuilder::new(config),
            pending: VecDeque::new(),
            lines_read: 0,
            end: None,
            failed: false,
        }
    }

    /// Lines read so far, header included.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Frames skipped so far.
    pub fn skipped_frames(&self) -> usize {
        self.builder.skipped_frames()
    }

    /// Digits discarded by the excess policy so far.
    pub fn dropped_digits(&self) -> usize {
        self.builder.dropped_digits()
    }

    /// How the line source ended, once it has run out.
    ///
    /// `None` while lines remain, and after an error was yielded.
    pub fn end(&self) -> Option<&RunEnd> {
        self.end.as_ref()
    }

    /// Drain the iterator into a report.
    pub fn into_report(mut self) -> DecodeReport {
        let mut readings = Vec::new();
        let mut fatal = None;
        for item in self.by_ref() {
            match item {
                Ok(reading) => readings.push(reading),
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }
        }

        let end = match fatal {
            Some(e) => RunEnd::Aborted(e),
            None => self.end.take().unwrap_or(RunEnd::Exhausted),
        };
        DecodeReport {
            readings,
            skipped_frames: self.builder.skipped_frames(),
            dropped_digits: self.builder.dropped_digits(),
            lines_read: self.lines_read,
            end,
        }
    }

    fn pull_line(&mut self) {
        match self.lines.next() {
            None => {
                let end = self.builder.finish();
                log::debug!("Line source exhausted after {} lines: {}", self.lines_read, end);
                self.end = Some(end);
            }
            Some(Err(e)) => {
                log::warn!("Read failed after line {}: {}", self.lines_read, e);
                self.pending.push_back(Err(DecodeError::Io(e)));
                self.failed = true;
            }
            Some(Ok(text)) => {
                self.lines_read += 1;
                if self.lines_read == HEADER_LINE_NUMBER {
                    return;
                }
                let line = CaptureLine::new(&text, self.lines_read);
                self.pending.extend(self.builder.push_line(&line));
            }
        }
    }
}

impl<L> Iterator for ReadingIterator<L>
where
    L: Iterator<Item = io::Result<String>>,
{
    type Item = Result<DecodedReading>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.end.is_some() || self.failed || self.builder.is_halted() {
                return None;
            }
            self.pull_line();
        }
    }
}

/// Iterator over readings from a buffered reader
pub type ReaderReadings<R> = ReadingIterator<io::Lines<R>>;

/// Create a reading iterator over a buffered reader.
pub fn readings_from_reader<R: BufRead>(reader: R, config: &DecodeConfig) -> ReaderReadings<R> {
    ReadingIterator::new(reader.lines(), config)
}

/// Open a capture file and iterate its readings.
///
/// # Errors
///
/// Returns `DecodeError::Io` if the file cannot be opened.
pub fn open(path: &Path, config: &DecodeConfig) -> Result<ReaderReadings<BufReader<File>>> {
    let file = File::open(path)?;
    log::info!("Decoding capture {}", path.display());
    Ok(readings_from_reader(BufReader::new(file), config))
}

/// Decode every line of an in-memory or streamed line source.
pub fn decode_lines<I>(lines: I, config: &DecodeConfig) -> DecodeReport
where
    I: IntoIterator<Item = io::Result<String>>,
{
    ReadingIterator::new(lines.into_iter(), config).into_report()
}

/// Decode a whole capture from a buffered reader.
pub fn decode_reader<R: BufRead>(reader: R, config: &DecodeConfig) -> DecodeReport {
    readings_from_reader(reader, config).into_report()
}

/// Decode a whole capture file.
///
/// Truncation and decode failures are reported in [`DecodeReport::end`]
/// rather than as an error.
///
/// # Errors
///
/// Returns `DecodeError::Io` if the file cannot be opened.
///
/// # Example
///
/// ```rust,ignore
/// let report = decode_file(Path::new("capture.txt"), &DecodeConfig::from_env())?;
/// println!("Decoded {} readings", report.readings.len());
/// ```
pub fn decode_file(path: &Path, config: &DecodeConfig) -> Result<DecodeReport> {
    let report = open(path, config)?.into_report();
    log::info!("{}: {}", path.display(), report.summary());
    Ok(report)
}
