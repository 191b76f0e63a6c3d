//! Note length and tempo arithmetic
//!
//! RTTTL lengths are reciprocal note values: `4` is a quarter note, `8` an eighth.
//! At `bpm` beats per minute a quarter note lasts `60000 / bpm` milliseconds.
//! All arithmetic truncates like the ringtone players this format comes from, so
//! `calculate_duration(4, 0, 120)` is exactly 500 ms.

use serde::Serialize;

/// Lowest accepted tempo multiplier.
pub const MIN_TEMPO_SCALE: f32 = 0.1;
/// Highest accepted tempo multiplier.
pub const MAX_TEMPO_SCALE: f32 = 4.0;
/// Highest tempo a tune header may declare; a whole note is still 4 ms.
pub const MAX_BPM: u32 = 60_000;
/// Shortest note the player schedules; short notes at high tempo truncate to zero.
pub const MIN_NOTE_MS: u32 = 1;

/// Convert a note length, dot count and tempo into milliseconds.
///
/// Each dot adds half of the previous increment: one dot is 1.5x, two dots 1.75x.
///
/// A zero `duration` or `bpm` is clamped to 1. The tune parser rejects both before
/// they can reach playback, so the clamp only matters to direct callers.
///
/// # Examples
/// ```
/// use rtttl::duration::calculate_duration;
///
/// assert_eq!(calculate_duration(4, 0, 120), 500);
/// assert_eq!(calculate_duration(4, 1, 120), 750);
/// assert_eq!(calculate_duration(8, 0, 120), 250);
/// ```
pub fn calculate_duration(duration: u32, dots: u8, bpm: u32) -> u32 {
    let base = (60_000 / bpm.max(1)) * 4 / duration.max(1);
    let mut total = base;
    let mut add = base / 2;
    for _ in 0..dots {
        total += add;
        add /= 2;
    }
    total
}

/// Runtime tempo multiplier, always within [`MIN_TEMPO_SCALE`, `MAX_TEMPO_SCALE`].
///
/// `2.0` plays twice as fast (every note half as long), `0.5` half as fast.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct TempoScale(f32);

impl TempoScale {
    pub const NORMAL: TempoScale = TempoScale(1.0);

    /// Clamp `scale` into the accepted range. Non-finite input resets to 1.0.
    pub fn new(scale: f32) -> Self {
        if !scale.is_finite() {
            return Self::NORMAL;
        }
        TempoScale(scale.clamp(MIN_TEMPO_SCALE, MAX_TEMPO_SCALE))
    }

    pub fn get(self) -> f32 {
        self.0
    }

    /// Scale a duration, truncating to whole milliseconds.
    pub fn scale_ms(self, ms: u32) -> u32 {
        if self.0 == 1.0 {
            return ms;
        }
        (ms as f32 / self.0) as u32
    }
}

impl Default for TempoScale {
    fn default() -> Self {
        Self::NORMAL
    }
}
