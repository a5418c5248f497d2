//! # Audio Statistics Engine
//!
//! Pure computation over a chunk of little-endian 16-bit signed PCM bytes.
//! Producers call this inline on every `/audio/process` request; the result
//! feeds the stats broadcast sent to audio subscribers.
//!
//! ## Degradation rules:
//! - Fewer than 2 bytes: no computation is attempted, everything is zero.
//! - A trailing odd byte is ignored, not an error.
//! - Zero whole samples: RMS is 0.0 (no division by zero).

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Peak and RMS figures for one PCM chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PcmStats {
    /// Maximum absolute sample value. `i16::MIN` saturates to `i16::MAX`
    /// rather than overflowing on negation.
    pub peak: i16,

    /// Root mean square of the sample magnitudes.
    pub rms: f64,

    /// Number of whole samples the chunk contained.
    pub sample_count: usize,
}

/// Analyze a chunk of raw PCM bytes.
///
/// Reads consecutive little-endian `i16` samples until the input runs out;
/// a leftover byte at the end is dropped silently.
pub fn analyze_chunk(bytes: &[u8]) -> PcmStats {
    let mut cursor = Cursor::new(bytes);
    let mut peak: u16 = 0;
    let mut sum_squares: f64 = 0.0;
    let mut sample_count: usize = 0;

    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        let magnitude = sample.unsigned_abs();
        if magnitude > peak {
            peak = magnitude;
        }
        sum_squares += f64::from(sample) * f64::from(sample);
        sample_count += 1;
    }

    let rms = if sample_count > 0 {
        (sum_squares / sample_count as f64).sqrt()
    } else {
        0.0
    };

    PcmStats {
        peak: peak.min(i16::MAX as u16) as i16,
        rms,
        sample_count,
    }
}

/// Playback duration in seconds for `total_bytes` of 16-bit PCM.
///
/// Returns 0.0 when the sample rate or channel count is zero instead of
/// dividing by zero.
pub fn buffer_duration_secs(total_bytes: usize, sample_rate: u32, channels: u16) -> f64 {
    let bytes_per_second = u64::from(sample_rate) * u64::from(channels) * 2;
    if bytes_per_second == 0 {
        return 0.0;
    }
    total_bytes as f64 / bytes_per_second as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode i16 samples as little-endian PCM bytes.
    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_peak_and_rms() {
        let stats = analyze_chunk(&pcm(&[100, -200, 50]));

        assert_eq!(stats.peak, 200);
        assert_eq!(stats.sample_count, 3);
        let expected = ((100.0f64 * 100.0 + 200.0 * 200.0 + 50.0 * 50.0) / 3.0).sqrt();
        assert!((stats.rms - expected).abs() < 1e-9);
        assert!((stats.rms - 132.29).abs() < 0.01);
    }

    #[test]
    fn test_empty_chunk_is_all_zero() {
        assert_eq!(analyze_chunk(&[]), PcmStats::default());
    }

    #[test]
    fn test_sub_sample_chunk_is_all_zero() {
        assert_eq!(analyze_chunk(&[0x7f]), PcmStats::default());
    }

    #[test]
    fn test_trailing_odd_byte_is_ignored() {
        let mut bytes = pcm(&[300]);
        bytes.push(0xff);

        let stats = analyze_chunk(&bytes);
        assert_eq!(stats.sample_count, 1);
        assert_eq!(stats.peak, 300);
    }

    #[test]
    fn test_most_negative_sample_saturates() {
        let stats = analyze_chunk(&pcm(&[i16::MIN]));
        assert_eq!(stats.peak, i16::MAX);
    }

    #[test]
    fn test_buffer_duration() {
        // 16000 bytes at 8 kHz mono 16-bit = 1 second
        assert!((buffer_duration_secs(16000, 8000, 1) - 1.0).abs() < 1e-9);
        // stereo halves the duration
        assert!((buffer_duration_secs(16000, 8000, 2) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_buffer_duration_zero_denominator() {
        assert_eq!(buffer_duration_secs(16000, 0, 1), 0.0);
        assert_eq!(buffer_duration_secs(16000, 8000, 0), 0.0);
    }
}
