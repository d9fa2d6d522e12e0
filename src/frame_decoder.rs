//! Decoding of assembled frames into raw channel readings
//!
//! Works on the hex text of exactly one frame. Each field is read per the
//! [`FrameLayout`]: the top nibble of the field word is forced to zero and the
//! rest is decoded big-endian. Channel words become `i32`, the gain word is
//! kept as its zero-padded hex code.

use thiserror::Error;

use crate::frame_layout::{
    FieldSpec, FieldTarget, FrameLayout, CHANNEL_COUNT, FRAME_HEX_LEN, HEAD_AMP_LAYOUT,
};
use crate::reading::GainCode;

/// Errors produced while decoding a single frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame text is not exactly [`FRAME_HEX_LEN`] digits.
    #[error("frame has {actual} hex digits, expected {expected}")]
    WrongLength {
        /// Digits supplied
        actual: usize,
        /// Digits required
        expected: usize,
    },

    /// A field contains a character that is not a hex digit.
    #[error("{field}: invalid hex digit {found:?} at frame offset {offset}")]
    InvalidHex {
        /// Field being decoded
        field: FieldTarget,
        /// Hex-digit offset within the frame
        offset: usize,
        /// Offending character
        found: char,
    },

    /// The layout does not fit a Head Amp frame.
    #[error("frame layout is malformed")]
    InvalidLayout,
}

/// Result type alias for frame decoding.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Hex text of one complete frame. Always [`FRAME_HEX_LEN`] digits long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexFrame(String);

impl HexFrame {
    /// Wrap frame text, rejecting anything that is not exactly one frame long.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::WrongLength`] for any other length.
    pub fn new(digits: impl Into<String>) -> Result<Self> {
        let digits = digits.into();
        if digits.len() != FRAME_HEX_LEN {
            return Err(FrameError::WrongLength {
                actual: digits.len(),
                expected: FRAME_HEX_LEN,
            });
        }
        Ok(Self(digits))
    }

    /// Frame text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unscaled content of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReading {
    /// Raw value per channel, index 0 is channel 1. `None` for absent slots.
    pub channels: [Option<i32>; CHANNEL_COUNT],
    /// Gain setting code
    pub gain: GainCode,
}

impl RawReading {
    /// Raw value for a 1-based channel number
    pub fn channel(&self, channel: u8) -> Option<i32> {
        let index = usize::from(channel).checked_sub(1)?;
        self.channels.get(index).copied().flatten()
    }
}

/// Decodes frames according to a validated layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDecoder {
    layout: FrameLayout,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::head_amp()
    }
}

impl FrameDecoder {
    /// Decoder for the Head Amp frame layout
    pub fn head_amp() -> Self {
        Self {
            layout: HEAD_AMP_LAYOUT,
        }
    }

    /// Decoder for a custom layout
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidLayout`] if the layout is not well formed.
    pub fn with_layout(layout: FrameLayout) -> Result<Self> {
        if !layout.is_well_formed() {
            return Err(FrameError::InvalidLayout);
        }
        Ok(Self { layout })
    }

    /// Layout in use
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Decode one frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidHex`] for the first field containing a
    /// non-hex character.
    pub fn decode(&self, frame: &HexFrame) -> Result<RawReading> {
        let mut channels = [None; CHANNEL_COUNT];
        let mut gain = None;

        for field in self.layout.fields() {
            let bytes = field_bytes(frame.as_str(), field)?;
            match field.target {
                FieldTarget::Channel(n) => {
                    let word = [bytes[0], bytes[1], bytes[2], bytes[3]];
                    channels[usize::from(n) - 1] = Some(i32::from_be_bytes(word));
                }
                FieldTarget::Gain => {
                    gain = Some(GainCode::from_bytes(&bytes));
                }
            }
        }

        // Layout validation guarantees exactly one gain field
        let gain = gain.ok_or(FrameError::InvalidLayout)?;
        Ok(RawReading { channels, gain })
    }
}

/// Bytes of one field with the top nibble of the first byte cleared.
fn field_bytes(frame: &str, field: &FieldSpec) -> Result<Vec<u8>> {
    let range = field.hex_range();
    let text = &frame.as_bytes()[range.clone()];
    let mut bytes = Vec::with_capacity(field.byte_length);

    for (i, pair) in text.chunks_exact(2).enumerate() {
        let offset = range.start + i * 2;
        let high = if i == 0 {
            0
        } else {
            nibble(pair[0], field, offset)?
        };
        let low = nibble(pair[1], field, offset + 1)?;
        bytes.push(high << 4 | low);
    }
    Ok(bytes)
}

fn nibble(digit: u8, field: &FieldSpec, offset: usize) -> Result<u8> {
    char::from(digit)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or(FrameError::InvalidHex {
            field: field.target,
            offset,
            found: char::from(digit),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frame text with the given 8-digit words and a 4-digit gain word.
    fn frame_text(words: [&str; 12], gain: &str) -> String {
        let mut text: String = words.concat();
        text.push_str(gain);
        text
    }

    fn sample_frame() -> HexFrame {
        HexFrame::new(frame_text(
            [
                "0dfecba9", "00000001", "0000000a", "00000064", "00000000", "0fffffff",
                "00000010", "00000100", "0123abcd", "0aaaaaaa", "00001000", "00010000",
            ],
            "0abc",
        ))
        .unwrap()
    }

    #[test]
    fn test_rejects_short_frame() {
        let result = HexFrame::new("00".repeat(49));
        assert_eq!(
            result,
            Err(FrameError::WrongLength {
                actual: 98,
                expected: FRAME_HEX_LEN
            })
        );
    }

    #[test]
    fn test_rejects_long_frame() {
        assert!(matches!(
            HexFrame::new("0".repeat(FRAME_HEX_LEN + 1)),
            Err(FrameError::WrongLength { .. })
        ));
    }

    #[test]
    fn test_decodes_channel_words() {
        let raw = FrameDecoder::head_amp().decode(&sample_frame()).unwrap();
        assert_eq!(raw.channel(1), Some(0x0dfe_cba9));
        assert_eq!(raw.channel(2), Some(1));
        assert_eq!(raw.channel(3), Some(10));
        assert_eq!(raw.channel(4), Some(100));
        assert_eq!(raw.channel(5), Some(0));
        assert_eq!(raw.channel(6), Some(0x0fff_ffff));
        assert_eq!(raw.channel(7), Some(0x10));
        assert_eq!(raw.channel(8), Some(0x100));
        assert_eq!(raw.channel(11), Some(0x1000));
        assert_eq!(raw.channel(12), Some(0x10000));
    }

    #[test]
    fn test_absent_channels_ignore_frame_bytes() {
        let raw = FrameDecoder::head_amp().decode(&sample_frame()).unwrap();
        assert_eq!(raw.channel(9), None);
        assert_eq!(raw.channel(10), None);
        assert_eq!(raw.channels[8], None);
        assert_eq!(raw.channels[9], None);
    }

    #[test]
    fn test_top_nibble_is_masked() {
        let mut text = sample_frame().as_str().to_string();
        // Overwrite the top nibble of channel 1 and of the gain word
        text.replace_range(0..1, "f");
        text.replace_range(96..97, "z");
        let raw = FrameDecoder::head_amp()
            .decode(&HexFrame::new(text).unwrap())
            .unwrap();
        assert_eq!(raw.channel(1), Some(0x0dfe_cba9));
        assert_eq!(raw.gain.as_str(), "0abc");
    }

    #[test]
    fn test_gain_is_padded_code() {
        let raw = FrameDecoder::head_amp().decode(&sample_frame()).unwrap();
        assert_eq!(raw.gain.as_str(), "0abc");
    }

    #[test]
    fn test_invalid_hex_reports_field() {
        let mut text = sample_frame().as_str().to_string();
        text.replace_range(12..13, "x");
        let result = FrameDecoder::head_amp().decode(&HexFrame::new(text).unwrap());
        assert_eq!(
            result,
            Err(FrameError::InvalidHex {
                field: FieldTarget::Channel(2),
                offset: 12,
                found: 'x'
            })
        );
    }

    #[test]
    fn test_sign_prefix_is_not_hex() {
        let mut text = sample_frame().as_str().to_string();
        text.replace_range(1..2, "+");
        assert!(matches!(
            FrameDecoder::head_amp().decode(&HexFrame::new(text).unwrap()),
            Err(FrameError::InvalidHex { found: '+', .. })
        ));
    }

    #[test]
    fn test_decoding_is_repeatable() {
        let decoder = FrameDecoder::head_amp();
        let frame = sample_frame();
        assert_eq!(decoder.decode(&frame), decoder.decode(&frame));
    }

    // =========================================================================
    // Custom layouts
    // =========================================================================

    const GAIN_FIELD: FieldSpec = FieldSpec {
        byte_offset: 48,
        byte_length: 2,
        target: FieldTarget::Gain,
    };

    #[test]
    fn test_with_layout_rejects_malformed_layout() {
        static OVERLAPPING: &[FieldSpec] = &[
            FieldSpec {
                byte_offset: 0,
                byte_length: 4,
                target: FieldTarget::Channel(1),
            },
            FieldSpec {
                byte_offset: 2,
                byte_length: 4,
                target: FieldTarget::Channel(2),
            },
            GAIN_FIELD,
        ];
        assert_eq!(
            FrameDecoder::with_layout(FrameLayout::new(OVERLAPPING)),
            Err(FrameError::InvalidLayout)
        );
    }

    #[test]
    fn test_with_layout_decodes_listed_fields_only() {
        static CHANNEL_ONE: &[FieldSpec] = &[
            FieldSpec {
                byte_offset: 0,
                byte_length: 4,
                target: FieldTarget::Channel(1),
            },
            GAIN_FIELD,
        ];
        let decoder = FrameDecoder::with_layout(FrameLayout::new(CHANNEL_ONE)).unwrap();
        assert_eq!(decoder.layout().fields(), CHANNEL_ONE);

        let raw = decoder.decode(&sample_frame()).unwrap();
        assert_eq!(raw.channel(1), Some(0x0dfe_cba9));
        assert_eq!(raw.channel(2), None);
        assert_eq!(raw.gain.as_str(), "0abc");
    }

    #[test]
    fn test_head_amp_layout_is_accepted() {
        let decoder = FrameDecoder::with_layout(HEAD_AMP_LAYOUT).unwrap();
        assert_eq!(decoder.layout(), FrameDecoder::head_amp().layout());
    }
}
