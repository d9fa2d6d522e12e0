//! Conversion of raw channel readings to physical current

use crate::frame_layout::CHANNEL_COUNT;

/// Calibration divisor of the instrument's analog front end
pub const CALIBRATION_DIVISOR: f64 = 234_800_968.0;

/// Per-channel multipliers, index 0 is channel 1. `None` marks absent slots.
const HEAD_AMP_SCALES: [Option<f64>; CHANNEL_COUNT] = [
    Some(0.2),
    Some(20.0),
    Some(20.0),
    Some(0.1),
    Some(1.0),
    Some(1.0),
    Some(1.0),
    Some(1.0),
    None,
    None,
    Some(1.0),
    Some(1.0),
];

/// Scales raw readings with a fixed divisor/multiplier pair per channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelScaler {
    scales: [Option<f64>; CHANNEL_COUNT],
}

impl Default for ChannelScaler {
    fn default() -> Self {
        Self::head_amp()
    }
}

impl ChannelScaler {
    /// Scaler with the Head Amp calibration
    pub fn head_amp() -> Self {
        Self {
            scales: HEAD_AMP_SCALES,
        }
    }

    /// Multiplier for a 1-based channel number, `None` if the slot is absent
    pub fn multiplier(&self, channel: u8) -> Option<f64> {
        let index = usize::from(channel).checked_sub(1)?;
        self.scales.get(index).copied().flatten()
    }

    /// Scale one raw value. Returns `None` for absent channels.
    pub fn scale(&self, channel: u8, raw: i32) -> Option<f64> {
        self.multiplier(channel)
            .map(|multiplier| f64::from(raw) / CALIBRATION_DIVISOR * multiplier)
    }

    /// Scale every slot of a raw reading.
    pub fn apply(&self, raw: &[Option<i32>; CHANNEL_COUNT]) -> [Option<f64>; CHANNEL_COUNT] {
        let mut scaled = [None; CHANNEL_COUNT];
        for (index, value) in raw.iter().enumerate() {
            let channel = (index + 1) as u8;
            scaled[index] = value.and_then(|v| self.scale(channel, v));
        }
        scaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_identity() {
        let scaler = ChannelScaler::head_amp();
        assert_eq!(scaler.scale(2, 234_800_968), Some(20.0));
        assert_eq!(scaler.scale(5, 234_800_968), Some(1.0));
    }

    #[test]
    fn test_zero_scales_to_zero() {
        let scaler = ChannelScaler::head_amp();
        for channel in [1, 2, 3, 4, 5, 6, 7, 8, 11, 12] {
            assert_eq!(scaler.scale(channel, 0), Some(0.0), "channel {}", channel);
        }
    }

    #[test]
    fn test_absent_channels_bypass_scaling() {
        let scaler = ChannelScaler::head_amp();
        assert_eq!(scaler.scale(9, 1234), None);
        assert_eq!(scaler.scale(10, 1234), None);
        assert_eq!(scaler.scale(0, 1234), None);
        assert_eq!(scaler.scale(13, 1234), None);
    }

    #[test]
    fn test_multipliers() {
        let scaler = ChannelScaler::head_amp();
        assert_eq!(scaler.multiplier(1), Some(0.2));
        assert_eq!(scaler.multiplier(4), Some(0.1));
        assert_eq!(scaler.multiplier(12), Some(1.0));
    }

    #[test]
    fn test_apply_keeps_missing_slots() {
        let mut raw = [Some(234_800_968); CHANNEL_COUNT];
        raw[8] = None;
        raw[9] = None;
        let scaled = ChannelScaler::head_amp().apply(&raw);
        assert_eq!(scaled[0], Some(0.2));
        assert_eq!(scaled[1], Some(20.0));
        assert_eq!(scaled[3], Some(0.1));
        assert_eq!(scaled[8], None);
        assert_eq!(scaled[9], None);
        assert_eq!(scaled[11], Some(1.0));
    }
}
