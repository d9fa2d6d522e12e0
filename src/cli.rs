//! Command-line entry point
//!
//! Decodes one capture file and writes the readings as JSON lines.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::config::{DecodeConfig, ExcessPolicy, FailurePolicy};
use crate::replay::{decode_file, DecodeReport, RunEnd};

/// Decode Head Amp telemetry frames from a serial capture log
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the capture log
    capture: PathBuf,

    /// JSON decode configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// What to do with a frame that fails to decode
    #[arg(long, value_enum)]
    failure_policy: Option<FailurePolicy>,

    /// What to do with digits left on a line after a frame
    #[arg(long, value_enum)]
    excess_policy: Option<ExcessPolicy>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    debug: bool,
}

impl Args {
    /// Config file, then environment, then flags.
    fn decode_config(&self) -> Result<DecodeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let mut config = DecodeConfig::load(path)
                    .with_context(|| format!("Failed to load config file: {:?}", path))?;
                config.apply_env();
                config
            }
            None => DecodeConfig::from_env(),
        };
        if let Some(policy) = self.failure_policy {
            config.failure_policy = policy;
        }
        if let Some(policy) = self.excess_policy {
            config.excess_policy = policy;
        }
        Ok(config)
    }
}

/// Write one JSON object per reading.
fn write_readings<W: Write>(out: W, report: &DecodeReport) -> Result<()> {
    let mut out = BufWriter::new(out);
    for reading in &report.readings {
        serde_json::to_writer(&mut out, reading)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Run the decoder
///
/// Initializes logging, decodes the capture named on the command line and
/// writes the readings. Readings decoded before a failure are written even
/// when the run is aborted.
///
/// # Errors
///
/// Returns an error if the capture or config cannot be read, the output cannot
/// be written, or a bad frame stopped the run.
pub fn run() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = args.decode_config()?;
    log::debug!("Decode config: {:?}", config);

    let report = decode_file(&args.capture, &config)
        .with_context(|| format!("Failed to open capture file: {:?}", args.capture))?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            write_readings(file, &report)?;
            log::info!("Wrote {} readings to {}", report.readings.len(), path.display());
        }
        None => write_readings(io::stdout().lock(), &report)?,
    }

    if let RunEnd::Aborted(e) = &report.end {
        bail!("decode stopped after {} readings: {}", report.readings.len(), e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CaptureGenerator, SyntheticFrame};

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "head-amp-decode",
            "capture.txt",
            "--failure-policy",
            "skip",
            "--excess-policy",
            "carry",
            "-d",
        ])
        .unwrap();
        assert_eq!(args.capture, PathBuf::from("capture.txt"));
        assert!(args.debug);

        let config = args.decode_config().unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.excess_policy, ExcessPolicy::Carry);
    }

    #[test]
    fn test_args_policy_flags_are_optional() {
        let args = Args::try_parse_from(["head-amp-decode", "capture.txt", "--excess-policy", "drop"])
            .unwrap();
        assert_eq!(args.failure_policy, None);
        assert_eq!(args.excess_policy, Some(ExcessPolicy::DropOnBoundaryLine));
    }

    #[test]
    fn test_args_reject_unknown_policy() {
        let result =
            Args::try_parse_from(["head-amp-decode", "capture.txt", "--failure-policy", "maybe"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_write_readings_as_json_lines() {
        let mut gen = CaptureGenerator::new(16);
        gen.stream(&SyntheticFrame::ramp(1).with_marker())
            .stream(&SyntheticFrame::ramp(2).with_marker());
        let report =
            crate::replay::decode_reader(gen.to_capture().as_bytes(), &DecodeConfig::default());

        let mut out = Vec::new();
        write_readings(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["gainSetting"], SyntheticFrame::ramp(1).gain_code());
        assert!(first["channel9"].is_null());
    }
}
