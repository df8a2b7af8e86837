//! PCM sample formats and tick-to-byte conversion

use serde::{Deserialize, Serialize};
use virtual_time::{VirtualTime, NANOS_PER_SEC};

use crate::error::{MixerError, Result};

/// Layout of interleaved little-endian PCM samples.
///
/// 8-bit samples are unsigned (silence = 0x80), 16-bit samples are signed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleFormat {
    pub bit_depth: u16,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self { bit_depth: 16, channels: 2, sample_rate: 44_100 }
    }
}

impl SampleFormat {
    pub const fn new(bit_depth: u16, channels: u16, sample_rate: u32) -> Self {
        Self { bit_depth, channels, sample_rate }
    }

    pub fn validate(&self) -> Result<()> {
        let depth_ok = matches!(self.bit_depth, 8 | 16);
        let channels_ok = matches!(self.channels, 1 | 2);
        if !depth_ok || !channels_ok || self.sample_rate == 0 {
            return Err(MixerError::UnsupportedFormat {
                bit_depth: self.bit_depth,
                channels: self.channels,
                sample_rate: self.sample_rate,
            });
        }
        Ok(())
    }

    #[inline]
    pub const fn bytes_per_sample(&self) -> usize {
        (self.bit_depth / 8) as usize
    }

    /// Bytes in one sample frame (one sample per channel).
    #[inline]
    pub const fn frame_size(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    #[inline]
    pub const fn silence(&self) -> u8 {
        if self.bit_depth == 8 {
            0x80
        } else {
            0
        }
    }

    /// Round `offset` down to a frame boundary.
    #[inline]
    pub const fn align_down(&self, offset: usize) -> usize {
        offset - offset % self.frame_size()
    }

    /// Number of whole sample frames covering `ticks`, rounded to nearest.
    ///
    /// Negative spans map to zero frames.
    pub fn ticks_to_frames(&self, ticks: VirtualTime) -> usize {
        if ticks.is_negative() {
            return 0;
        }
        let nanos = ticks.as_nanos() as u128;
        let scaled = nanos * self.sample_rate as u128;
        let half = NANOS_PER_SEC as u128 / 2;
        ((scaled + half) / NANOS_PER_SEC as u128) as usize
    }

    /// Byte count covering `ticks` in this format.
    ///
    /// Rounds to the nearest whole frame and then scales by the frame size,
    /// rather than rounding the raw byte product. The result is always frame
    /// aligned, so a cursor never lands inside a sample.
    pub fn ticks_to_bytes(&self, ticks: VirtualTime) -> usize {
        self.ticks_to_frames(ticks) * self.frame_size()
    }

    /// Inverse of [`Self::ticks_to_bytes`], truncating partial frames.
    pub fn bytes_to_ticks(&self, bytes: usize) -> VirtualTime {
        let frames = (bytes / self.frame_size()) as i128;
        VirtualTime::from_nanos(frames * NANOS_PER_SEC as i128 / self.sample_rate as i128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(SampleFormat::new(16, 2, 48_000).validate().is_ok());
        assert!(SampleFormat::new(8, 1, 11_025).validate().is_ok());
        assert!(SampleFormat::new(24, 2, 48_000).validate().is_err());
        assert!(SampleFormat::new(16, 6, 48_000).validate().is_err());
        assert!(SampleFormat::new(16, 2, 0).validate().is_err());
    }

    #[test]
    fn test_frame_size_and_alignment() {
        let fmt = SampleFormat::new(16, 2, 44_100);
        assert_eq!(fmt.frame_size(), 4);
        assert_eq!(fmt.align_down(11), 8);
        assert_eq!(fmt.align_down(12), 12);
    }

    #[test]
    fn test_ticks_to_bytes_at_60hz() {
        let fmt = SampleFormat::new(16, 1, 44_100);
        assert_eq!(fmt.ticks_to_bytes(VirtualTime::from_nanos(16_666_666)), 1470);
        assert_eq!(fmt.ticks_to_bytes(VirtualTime::from_nanos(16_666_667)), 1470);
        assert_eq!(fmt.ticks_to_bytes(VirtualTime::from_secs(1)), 88_200);
        assert_eq!(fmt.ticks_to_bytes(VirtualTime::from_nanos(-5)), 0);
    }

    #[test]
    fn test_ticks_to_bytes_rounds_whole_frames() {
        // 1.4 samples: raw byte rounding would give 3 bytes, half a sample.
        let fmt = SampleFormat::new(16, 1, 1000);
        assert_eq!(fmt.ticks_to_bytes(VirtualTime::from_nanos(1_400_000)), 2);
        assert_eq!(fmt.ticks_to_bytes(VirtualTime::from_nanos(1_600_000)), 4);
    }

    #[test]
    fn test_bytes_to_ticks() {
        let fmt = SampleFormat::new(8, 1, 1000);
        assert_eq!(fmt.bytes_to_ticks(250), VirtualTime::from_millis(250));
    }
}
