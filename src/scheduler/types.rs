//! Scheduler state and tick outcome types

use serde::Serialize;

use crate::tune::NoteToken;

/// Whether a session is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Read-only snapshot of the scheduler, for status queries.
///
/// # Fields
/// - `remaining_loops`: 0 = not looping, 1-254 = traversals left, 255 = forever
/// - `frequency_hz`: frequency currently sounding, 0.0 during rests, gaps and idle
/// - `bpm`: tempo from the tune header, before scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub remaining_loops: u8,
    pub volume: u8,
    pub tempo_scale: f32,
    pub frequency_hz: f32,
    pub bpm: u32,
}

impl PlayerStatus {
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_looping(&self) -> bool {
        self.remaining_loops > 0
    }

    /// Header tempo times the tempo scale, rounded
    pub fn current_bpm(&self) -> u32 {
        (self.bpm as f32 * self.tempo_scale + 0.5) as u32
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            remaining_loops: 0,
            volume: 180,
            tempo_scale: 1.0,
            frequency_hz: 0.0,
            bpm: 120,
        }
    }
}

/// A note started by a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub note: NoteToken,
    /// Frequency driven on the output; 0.0 when the note played as a rest
    pub frequency_hz: f32,
    /// Duration after tempo scaling
    pub duration_ms: u32,
    pub start_ms: u64,
}

/// What a call to [`Scheduler::tick`](super::Scheduler::tick) did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// No session
    Idle,
    /// The current note (or loop gap) has not ended yet
    Waiting,
    /// A new note started
    Note(NoteEvent),
    /// The tune ended and playback went back to the first note
    Restarted { remaining_loops: u8 },
    /// The tune ended and the session is over
    Finished,
}
