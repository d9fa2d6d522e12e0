//! Decoded readings handed to downstream consumers

use chrono::NaiveDateTime;
use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::frame_layout::{ABSENT_CHANNELS, CHANNEL_COUNT};

/// Column names of the channel slots, in slot order
pub const CHANNEL_KEYS: [&str; CHANNEL_COUNT] = [
    "channel1",
    "channel2",
    "channel3",
    "channel4",
    "channel5",
    "channel6",
    "channel7",
    "channel8",
    "channel9",
    "channel10",
    "channel11",
    "channel12",
];

/// Opaque hardware gain setting, kept as a zero-padded hex code
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct GainCode(String);

impl GainCode {
    /// Encode field bytes as lowercase hex, two digits per byte.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// The code text, e.g. `"0abc"`
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GainCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One decoded telemetry frame
///
/// Channel values are physical current. Slots for channels 9 and 10 are
/// always `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedReading {
    timestamp: NaiveDateTime,
    channels: [Option<f64>; CHANNEL_COUNT],
    gain: GainCode,
}

impl DecodedReading {
    /// Build a reading. Absent channel slots are cleared regardless of input.
    pub fn new(
        timestamp: NaiveDateTime,
        mut channels: [Option<f64>; CHANNEL_COUNT],
        gain: GainCode,
    ) -> Self {
        for channel in ABSENT_CHANNELS {
            channels[usize::from(channel) - 1] = None;
        }
        Self {
            timestamp,
            channels,
            gain,
        }
    }

    /// Capture time attributed to the frame
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Scaled value for a 1-based channel number, `None` when missing
    pub fn channel(&self, channel: u8) -> Option<f64> {
        let index = usize::from(channel).checked_sub(1)?;
        self.channels.get(index).copied().flatten()
    }

    /// Whether a 1-based channel slot is missing
    pub fn is_missing(&self, channel: u8) -> bool {
        self.channel(channel).is_none()
    }

    /// All slots, index 0 is channel 1
    pub fn channels(&self) -> &[Option<f64>; CHANNEL_COUNT] {
        &self.channels
    }

    /// Gain setting code
    pub fn gain(&self) -> &GainCode {
        &self.gain
    }
}

impl Serialize for DecodedReading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("DecodedReading", CHANNEL_COUNT + 2)?;
        record.serialize_field("time", &self.timestamp)?;
        for (key, value) in CHANNEL_KEYS.iter().zip(self.channels.iter()) {
            record.serialize_field(*key, value)?;
        }
        record.serialize_field("gainSetting", &self.gain)?;
        record.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 6)
            .unwrap()
            .and_hms_milli_opt(14, 23, 45, 125)
            .unwrap()
    }

    #[test]
    fn test_gain_code_from_bytes() {
        assert_eq!(GainCode::from_bytes(&[0x0a, 0xbc]).as_str(), "0abc");
        assert_eq!(GainCode::from_bytes(&[0x00, 0x01]).to_string(), "0001");
    }

    #[test]
    fn test_absent_slots_are_forced_missing() {
        let reading = DecodedReading::new(
            timestamp(),
            [Some(1.0); CHANNEL_COUNT],
            GainCode::from_bytes(&[0, 0]),
        );
        assert!(reading.is_missing(9));
        assert!(reading.is_missing(10));
        assert_eq!(reading.channel(1), Some(1.0));
        assert_eq!(reading.channel(12), Some(1.0));
        assert_eq!(reading.channel(0), None);
    }

    #[test]
    fn test_serializes_as_flat_record() {
        let mut channels = [Some(0.5); CHANNEL_COUNT];
        channels[0] = Some(0.2);
        let reading =
            DecodedReading::new(timestamp(), channels, GainCode::from_bytes(&[0x0a, 0xbc]));

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["time"], "2024-02-06T14:23:45.125");
        assert_eq!(value["channel1"], 0.2);
        assert_eq!(value["channel8"], 0.5);
        assert!(value["channel9"].is_null());
        assert!(value["channel10"].is_null());
        assert_eq!(value["channel12"], 0.5);
        assert_eq!(value["gainSetting"], "0abc");
        assert_eq!(value.as_object().unwrap().len(), 14);
    }
}
