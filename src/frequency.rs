//! Equal-tempered note frequencies
//!
//! A fixed table covering C0 through B8 (12 semitones x 9 octaves), anchored at
//! A4 = 440 Hz. Lookups outside the table return 0 Hz so an unplayable note
//! (`b#8`, octave 9) degrades to a rest instead of failing.

/// Number of semitones per octave.
pub const SEMITONES_PER_OCTAVE: usize = 12;

/// Table index of A4 (440 Hz).
pub const A4_INDEX: usize = 57;

/// Note frequency table in Hz. Index = `octave * 12 + semitone`.
pub const NOTE_FREQUENCIES: [f32; 108] = [
    // Octave 0
    16.35, 17.32, 18.35, 19.45, 20.60, 21.83, 23.12, 24.50, 25.96, 27.50, 29.14, 30.87,
    // Octave 1
    32.70, 34.65, 36.71, 38.89, 41.20, 43.65, 46.25, 49.00, 51.91, 55.00, 58.27, 61.74,
    // Octave 2
    65.41, 69.30, 73.42, 77.78, 82.41, 87.31, 92.50, 98.00, 103.83, 110.00, 116.54, 123.47,
    // Octave 3
    130.81, 138.59, 146.83, 155.56, 164.81, 174.61, 185.00, 196.00, 207.65, 220.00, 233.08, 246.94,
    // Octave 4
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00, 466.16, 493.88,
    // Octave 5
    523.25, 554.37, 587.33, 622.25, 659.25, 698.46, 739.99, 783.99, 830.61, 880.00, 932.33, 987.77,
    // Octave 6
    1046.50, 1108.73, 1174.66, 1244.51, 1318.51, 1396.91, 1479.98, 1567.98, 1661.22, 1760.00, 1864.66, 1975.53,
    // Octave 7
    2093.00, 2217.46, 2349.32, 2489.02, 2637.02, 2793.83, 2959.96, 3135.96, 3322.44, 3520.00, 3729.31, 3951.07,
    // Octave 8
    4186.01, 4434.92, 4698.63, 4978.03, 5274.04, 5587.65, 5919.91, 6271.93, 6644.88, 7040.00, 7458.62, 7902.13,
];

/// Look up the frequency of `semitone` (0 = C, 11 = B, 12 after a sharpened B)
/// in `octave`.
///
/// # Examples
/// ```
/// use rtttl::frequency::frequency;
///
/// assert_eq!(frequency(9, 4), 440.0); // A4
/// assert_eq!(frequency(0, 9), 0.0);   // beyond the table
/// ```
pub fn frequency(semitone: u8, octave: u8) -> f32 {
    let index = octave as usize * SEMITONES_PER_OCTAVE + semitone as usize;
    NOTE_FREQUENCIES.get(index).copied().unwrap_or(0.0)
}
