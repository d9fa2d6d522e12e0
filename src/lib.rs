//! `head-amp-decode` - Head Amp telemetry decoder for serial capture logs
//!
//! The instrument streams fixed-layout 50-byte frames, each preceded by an
//! `ff ff ff ff` marker, over a serial link. A bus sniffer records the traffic
//! as a fixed-column text log. This crate recovers the frames from that log
//! and turns them into timestamped, calibrated readings:
//!
//! ```text
//! capture lines -> HexAssembler -> FrameDecoder -> ChannelScaler -> DecodedReading
//! ```

pub mod capture_line;
pub mod channel_scaler;
mod cli;
pub mod config;
pub mod frame_assembler;
pub mod frame_decoder;
pub mod frame_layout;
pub mod hex_queue;
pub mod reading;
pub mod replay;
pub mod test_utils;

pub use cli::run;
pub use config::{DecodeConfig, ExcessPolicy, FailurePolicy};
pub use reading::{DecodedReading, GainCode};
pub use replay::{decode_file, decode_lines, decode_reader, DecodeError, DecodeReport, RunEnd};
