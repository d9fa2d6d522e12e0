//! Integration tests for replay fixtures.
//!
//! These tests verify that the checked-in capture log in `tests/fixtures/`
//! decodes to the frames `generate_capture_fixture` wrote into it.

use chrono::{NaiveDate, NaiveDateTime};
use head_amp_lib::channel_scaler::ChannelScaler;
use head_amp_lib::config::{DecodeConfig, FailurePolicy};
use head_amp_lib::replay::{decode_file, open, DecodeError, RunEnd};
use head_amp_lib::test_utils::SyntheticFrame;
use std::path::{Path, PathBuf};

/// Path to the Head Amp capture fixture.
fn capture_fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("head_amp")
        .join("capture.txt")
}

/// Capture time of the fixture's first line plus `micros`.
fn at_micros(micros: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 6)
        .unwrap()
        .and_hms_opt(14, 23, 45)
        .unwrap()
        + chrono::Duration::microseconds(micros)
}

#[test]
fn test_fixture_decodes_three_readings() {
    let path = capture_fixture();
    assert!(path.exists(), "Fixture file should exist");

    let report = decode_file(&path, &DecodeConfig::default()).expect("Should load fixture");

    assert_eq!(report.readings.len(), 3, "{}", report.summary());
    assert_eq!(report.lines_read, 18);
    assert_eq!(report.skipped_frames, 0);
    assert_eq!(report.dropped_digits, 0);
}

#[test]
fn test_fixture_ends_with_truncated_frame() {
    let report = decode_file(&capture_fixture(), &DecodeConfig::default()).unwrap();

    assert!(report.is_complete());
    assert!(matches!(
        report.end,
        RunEnd::Truncated(DecodeError::UnexpectedEndOfInput {
            buffered_digits: 32
        })
    ));
}

#[test]
fn test_fixture_reading_values() {
    let report = decode_file(&capture_fixture(), &DecodeConfig::default()).unwrap();
    let scaler = ChannelScaler::head_amp();

    for (reading, seed) in report.readings.iter().zip(1..) {
        let frame = SyntheticFrame::ramp(seed);
        assert_eq!(reading.gain().as_str(), frame.gain_code());
        for channel in 1..=12u8 {
            let raw = frame.raw[usize::from(channel) - 1];
            assert_eq!(
                reading.channel(channel),
                scaler.scale(channel, raw),
                "seed {} channel {}",
                seed,
                channel
            );
        }
    }

    assert_eq!(report.readings[0].gain().as_str(), "0a02");
    assert!(report.readings[0].is_missing(9));
    assert!(report.readings[2].is_missing(10));
}

#[test]
fn test_fixture_timestamps_from_sentinel_lines() {
    let report = decode_file(&capture_fixture(), &DecodeConfig::default()).unwrap();
    let stamps: Vec<NaiveDateTime> = report.readings.iter().map(|r| r.timestamp()).collect();

    // Sentinel lines carry 25.0, 87.5 and 137.5 ms offsets
    assert_eq!(
        stamps,
        vec![at_micros(25_000), at_micros(87_500), at_micros(137_500)]
    );
}

#[test]
fn test_fixture_policies_agree_on_clean_capture() {
    let stop = decode_file(&capture_fixture(), &DecodeConfig::default()).unwrap();
    let skip = decode_file(
        &capture_fixture(),
        &DecodeConfig {
            failure_policy: FailurePolicy::Skip,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(stop.readings, skip.readings);
}

#[test]
fn test_fixture_iterates_lazily() {
    let mut readings = open(&capture_fixture(), &DecodeConfig::default()).unwrap();

    let first = readings.next().expect("Should yield a reading").unwrap();
    assert_eq!(first.gain().as_str(), "0a02");
    // Frame 1 completes on line 7 of the fixture
    assert_eq!(readings.lines_read(), 7);
    assert!(readings.end().is_none());

    assert_eq!(readings.by_ref().filter(Result::is_ok).count(), 2);
    assert!(matches!(readings.end(), Some(RunEnd::Truncated(_))));
}
