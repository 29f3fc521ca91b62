//! Loudness estimation over 16-bit PCM buffers
//!
//! Used upstream to gate the hearing-speech flag. Pure functions, no state
//! carried between calls.

/// Full-scale reference for 16-bit PCM.
pub const FULL_SCALE: f32 = 32768.0;

/// RMS values at or below this floor map to negative infinity dBFS.
const RMS_EPSILON: f32 = 1e-10;

/// Root-mean-square level over the first `len` samples.
///
/// `len` is clamped into `[0, samples.len()]`; an empty window yields 0.0.
pub fn rms(samples: &[i16], len: usize) -> f32 {
    let len = len.min(samples.len());
    if len == 0 {
        return 0.0;
    }

    let sum_squares: f64 = samples[..len]
        .iter()
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    (sum_squares / len as f64).sqrt() as f32
}

/// Convert an RMS level to dBFS against the 16-bit full scale.
///
/// Returns `f32::NEG_INFINITY` (not an error) for silence.
pub fn to_dbfs(rms: f32) -> f32 {
    if rms <= RMS_EPSILON {
        return f32::NEG_INFINITY;
    }
    20.0 * (rms / FULL_SCALE).log10()
}

/// Simple loudness gate for the hearing-speech flag.
pub fn is_speech_level(dbfs: f32, threshold_dbfs: f32) -> bool {
    dbfs > threshold_dbfs
}
