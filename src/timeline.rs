//! # Timeline
//!
//! Offline decoding of a tune into absolute note timings, without driving any output.
//! Used by `rtttl inspect` and handy for checking a tune before it is played.
//!
//! ## Timing
//! One traversal at tempo scale 1.0. `start_ms` accumulates the unscaled durations
//! of the notes before it; no envelope or loop gap is included. Like the scheduler,
//! every note lasts at least `MIN_NOTE_MS`.
//!
//! ## Example
//! ```rust
//! use rtttl::timeline;
//!
//! let data = timeline("Intro:d=4,o=5,b=120:c,8p,e")?;
//!
//! assert_eq!(data.name, "Intro");
//! assert_eq!(data.entries.len(), 3);
//! assert_eq!(data.entries[1].start_ms, 500);
//! assert!(data.entries[1].rest);
//! assert_eq!(data.total_ms, 1250);
//! # Ok::<(), rtttl::RtttlError>(())
//! ```

use serde::Serialize;

use crate::duration::MIN_NOTE_MS;
use crate::error::RtttlError;
use crate::output::AUDIBLE_THRESHOLD_HZ;
use crate::tune::{Header, Tune};

/// Timing of one note
///
/// # Fields
/// - `index`: position in the note section (0, 1, 2, ...)
/// - `note`: the note in normalized RTTTL form, e.g. `8c#6.`
/// - `frequency_hz`: table frequency, 0.0 for rests and notes outside the table
/// - `rest`: true when nothing would sound, including inaudible notes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub index: usize,
    pub note: String,
    pub start_ms: u64,
    pub duration_ms: u32,
    pub frequency_hz: f32,
    pub rest: bool,
}

/// A whole tune laid out in time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub name: String,
    pub header: Header,
    pub entries: Vec<TimelineEntry>,
    pub total_ms: u64,
}

impl Timeline {
    /// Number of notes that actually sound
    pub fn audible_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.rest).count()
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> Result<String, RtttlError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Parse `text` and lay its notes out in time.
pub fn timeline(text: &str) -> Result<Timeline, RtttlError> {
    let tune = Tune::parse(text)?;
    from_tune(&tune)
}

/// Lay out an already parsed tune
pub fn from_tune(tune: &Tune) -> Result<Timeline, RtttlError> {
    let bpm = tune.header().bpm;
    let mut entries = Vec::new();
    let mut start_ms = 0u64;

    for (index, note) in tune.notes().enumerate() {
        let note = note?;
        let duration_ms = note.duration_ms(bpm).max(MIN_NOTE_MS);
        let frequency_hz = note.frequency_hz();

        entries.push(TimelineEntry {
            index,
            note: note.to_string(),
            start_ms,
            duration_ms,
            frequency_hz,
            rest: frequency_hz <= AUDIBLE_THRESHOLD_HZ,
        });
        start_ms += duration_ms as u64;
    }

    Ok(Timeline {
        name: tune.name().to_string(),
        header: tune.header(),
        entries,
        total_ms: start_ms,
    })
}
