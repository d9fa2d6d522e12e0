//! Binary layout of a Head Amp telemetry frame
//!
//! A frame is 50 bytes following the `ff ff ff ff` marker. Every field is a
//! big-endian word whose top nibble is not part of the reading, so a 4-byte
//! channel word carries a 28-bit value and the 2-byte gain word a 12-bit code.
//!
//! ```text
//! byte  0        4        8       12       16       20       24       28
//!       | ch1    | ch2    | ch3    | ch4    | ch5    | ch6    | ch7    | ch8    |
//! byte 32       36       40       44       48  50
//!       | (ch9)  | (ch10) | ch11   | ch12   |gain|
//! ```
//!
//! Channels 9 and 10 occupy bytes on the wire but are not populated by the
//! instrument; the layout has no entry for them.

/// Bytes in one frame
pub const FRAME_BYTES: usize = 50;

/// Hex digits in one frame
pub const FRAME_HEX_LEN: usize = FRAME_BYTES * 2;

/// Number of logical channel slots in a reading
pub const CHANNEL_COUNT: usize = 12;

/// Channel slots that are never populated
pub const ABSENT_CHANNELS: [u8; 2] = [9, 10];

/// What a field decodes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    /// Raw reading for a 1-based channel number
    Channel(u8),
    /// Gain setting code
    Gain,
}

impl std::fmt::Display for FieldTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel(n) => write!(f, "channel{}", n),
            Self::Gain => f.write_str("gainSetting"),
        }
    }
}

/// One field of the frame layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Offset of the field's first byte within the frame
    pub byte_offset: usize,
    /// Width of the field in bytes
    pub byte_length: usize,
    /// Decoded destination
    pub target: FieldTarget,
}

impl FieldSpec {
    const fn channel(channel: u8, byte_offset: usize) -> Self {
        Self {
            byte_offset,
            byte_length: 4,
            target: FieldTarget::Channel(channel),
        }
    }

    /// Hex-digit range of this field within a frame.
    pub const fn hex_range(&self) -> std::ops::Range<usize> {
        self.byte_offset * 2..(self.byte_offset + self.byte_length) * 2
    }
}

/// Ordered list of fields making up a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    fields: &'static [FieldSpec],
}

impl FrameLayout {
    /// Wrap a field list. Use [`FrameLayout::is_well_formed`] to check it.
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// Fields in frame order
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Field decoding into `target`, if the layout has one
    pub fn field(&self, target: FieldTarget) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.target == target)
    }

    /// Check the layout against the frame size.
    ///
    /// Fields must be non-empty, ascending, non-overlapping and inside
    /// [`FRAME_BYTES`]. Channel words are exactly 4 bytes, the gain word at
    /// most 4. Each channel appears once, is in `1..=CHANNEL_COUNT` and is not
    /// one of [`ABSENT_CHANNELS`]. Exactly one gain field is present.
    pub const fn is_well_formed(&self) -> bool {
        let mut seen = [false; CHANNEL_COUNT + 1];
        let mut gains = 0;
        let mut end = 0;
        let mut i = 0;
        while i < self.fields.len() {
            let field = &self.fields[i];
            if field.byte_length == 0
                || field.byte_offset < end
                || field.byte_offset + field.byte_length > FRAME_BYTES
            {
                return false;
            }
            end = field.byte_offset + field.byte_length;
            match field.target {
                FieldTarget::Channel(n) => {
                    let n = n as usize;
                    if field.byte_length != 4
                        || n == 0
                        || n > CHANNEL_COUNT
                        || n == ABSENT_CHANNELS[0] as usize
                        || n == ABSENT_CHANNELS[1] as usize
                        || seen[n]
                    {
                        return false;
                    }
                    seen[n] = true;
                }
                FieldTarget::Gain => {
                    if field.byte_length > 4 {
                        return false;
                    }
                    gains += 1;
                }
            }
            i += 1;
        }
        gains == 1
    }
}

const HEAD_AMP_FIELDS: &[FieldSpec] = &[
    FieldSpec::channel(1, 0),
    FieldSpec::channel(2, 4),
    FieldSpec::channel(3, 8),
    FieldSpec::channel(4, 12),
    FieldSpec::channel(5, 16),
    FieldSpec::channel(6, 20),
    FieldSpec::channel(7, 24),
    FieldSpec::channel(8, 28),
    FieldSpec::channel(11, 40),
    FieldSpec::channel(12, 44),
    FieldSpec {
        byte_offset: 48,
        byte_length: 2,
        target: FieldTarget::Gain,
    },
];

/// Layout of the Head Amp telemetry frame
pub const HEAD_AMP_LAYOUT: FrameLayout = FrameLayout::new(HEAD_AMP_FIELDS);

const _: () = assert!(HEAD_AMP_LAYOUT.is_well_formed());
