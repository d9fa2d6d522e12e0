//! Generates the Head Amp capture-log test fixture.
//!
//! Run with: `cargo run --bin generate_capture_fixture`
//!
//! This creates `head_amp/capture.txt` with three complete frames and one
//! truncated frame:
//! - A receive-direction line and three noise bytes before the first sentinel
//! - Frame 1 (ramp seed 1), then another receive-direction line
//! - Frames 2 and 3 (ramp seeds 2 and 3)
//! - Frame 4 cut off after 16 bytes, which must not produce a reading

use std::fs;
use std::path::Path;

use head_amp_lib::test_utils::{CaptureGenerator, SyntheticFrame};

/// Bytes per send line, as the sniffer writes them.
const BYTES_PER_LINE: usize = 16;

/// Build the fixture log.
fn fixture_capture() -> CaptureGenerator {
    let mut gen = CaptureGenerator::new(BYTES_PER_LINE);
    gen.dce_line().stream(&[0x00, 0x12, 0x34]);
    gen.stream(&SyntheticFrame::ramp(1).with_marker());
    gen.dce_line();
    gen.stream(&SyntheticFrame::ramp(2).with_marker());
    gen.stream(&SyntheticFrame::ramp(3).with_marker());
    gen.stream(&SyntheticFrame::ramp(4).with_marker()[..20]);
    gen
}

fn main() -> std::io::Result<()> {
    let fixture_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("head_amp");
    fs::create_dir_all(&fixture_dir)?;

    let gen = fixture_capture();
    let output_path = fixture_dir.join("capture.txt");
    fs::write(&output_path, gen.to_capture())?;

    println!(
        "Created capture.txt with {} lines at {}",
        gen.lines().len(),
        output_path.display()
    );
    Ok(())
}
