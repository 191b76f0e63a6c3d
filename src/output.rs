//! # Tone Output
//!
//! The boundary between the scheduler and whatever makes sound: a PWM pin on a
//! board, a software synthesiser, or a log.
//!
//! ## Calling Contract
//! For an audible note (above [`AUDIBLE_THRESHOLD_HZ`]) the scheduler issues:
//! 1. `set_tone(frequency, volume)` at the note boundary
//! 2. `set_volume(level)` once per fade step, ramping down towards
//!    `max(volume / 4, fade_floor)`
//! 3. `silence()` `gap_ms` before the next note boundary
//!
//! Rests and inaudible notes get a single `silence()`. The ramp and the gap sit inside
//! the note's scheduled duration, so they never shift later notes.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Frequencies at or below this are played as rests
pub const AUDIBLE_THRESHOLD_HZ: f32 = 20.0;

/// A single-channel square-wave tone generator.
pub trait ToneOutput {
    /// Start (or retune) the tone at `frequency_hz` with PWM level `volume`.
    fn set_tone(&mut self, frequency_hz: f32, volume: u8);

    /// Change the level of the tone that is already sounding.
    fn set_volume(&mut self, volume: u8);

    /// Stop the tone.
    fn silence(&mut self);
}

impl<T: ToneOutput + ?Sized> ToneOutput for Box<T> {
    fn set_tone(&mut self, frequency_hz: f32, volume: u8) {
        (**self).set_tone(frequency_hz, volume)
    }

    fn set_volume(&mut self, volume: u8) {
        (**self).set_volume(volume)
    }

    fn silence(&mut self) {
        (**self).silence()
    }
}

/// Note-end fade and inter-note gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Envelope {
    /// Silence before the next note boundary
    pub gap_ms: u32,
    /// Level drop per fade step
    pub fade_step: u8,
    /// Length of one fade step
    pub fade_step_ms: u32,
    /// The fade never goes below this level (or a quarter of the volume, if higher)
    pub fade_floor: u8,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            gap_ms: 20,
            fade_step: 15,
            fade_step_ms: 1,
            fade_floor: 30,
        }
    }
}

/// Absolute times (ms) at which a sounding note changes phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotePlan {
    pub release_at: u64,
    pub silence_at: u64,
    pub end: u64,
}

impl Envelope {
    /// Lowest level the fade reaches for `volume`
    pub fn floor_for(&self, volume: u8) -> u8 {
        (volume / 4).max(self.fade_floor)
    }

    /// Number of fade steps for `volume`
    pub fn fade_steps(&self, volume: u8) -> u32 {
        let floor = self.floor_for(volume);
        if volume <= floor || self.fade_step == 0 {
            return 0;
        }
        let span = (volume - floor) as u32;
        let step = self.fade_step as u32;
        span.div_ceil(step)
    }

    /// Lay out a note starting at `start` and lasting `duration_ms`.
    ///
    /// Long notes sustain, fade, then sit silent for `gap_ms`. Notes too short for
    /// that start fading immediately and fall silent once the fade is done.
    pub fn plan(&self, start: u64, duration_ms: u32, volume: u8) -> NotePlan {
        let end = start + duration_ms as u64;
        let fade_ms = self.fade_steps(volume) as u64 * self.fade_step_ms as u64;
        let silence_at = end
            .saturating_sub(self.gap_ms as u64)
            .max((start + fade_ms).min(end));
        let release_at = silence_at.saturating_sub(fade_ms).max(start);
        NotePlan {
            release_at,
            silence_at,
            end,
        }
    }

    /// Fade level at `now` for a release that began at `release_at`
    pub fn level_at(&self, volume: u8, release_at: u64, now: u64) -> u8 {
        let step_ms = self.fade_step_ms.max(1) as u64;
        let steps = now.saturating_sub(release_at) / step_ms;
        let drop = steps.saturating_mul(self.fade_step as u64);
        let level = (volume as u64).saturating_sub(drop) as u8;
        level.max(self.floor_for(volume).min(volume))
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl ToneOutput for NullOutput {
    fn set_tone(&mut self, _frequency_hz: f32, _volume: u8) {}
    fn set_volume(&mut self, _volume: u8) {}
    fn silence(&mut self) {}
}

/// One call made on a [`ToneOutput`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputEvent {
    Tone { frequency_hz: f32, volume: u8 },
    Volume(u8),
    Silence,
}

/// Records every call into a shared log.
///
/// Clones share the same log, so a test can keep one clone while the other is moved
/// into a scheduler or a worker thread.
#[derive(Debug, Default, Clone)]
pub struct RecordingOutput {
    events: Arc<Mutex<Vec<OutputEvent>>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Frequencies of every `set_tone` call, in order
    pub fn tones(&self) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OutputEvent::Tone { frequency_hz, .. } => Some(frequency_hz),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, event: OutputEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl ToneOutput for RecordingOutput {
    fn set_tone(&mut self, frequency_hz: f32, volume: u8) {
        self.push(OutputEvent::Tone {
            frequency_hz,
            volume,
        });
    }

    fn set_volume(&mut self, volume: u8) {
        self.push(OutputEvent::Volume(volume));
    }

    fn silence(&mut self) {
        self.push(OutputEvent::Silence);
    }
}

/// Logs each write through `tracing`. Used by the CLI when there is no PWM pin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingOutput;

impl ToneOutput for TracingOutput {
    fn set_tone(&mut self, frequency_hz: f32, volume: u8) {
        tracing::info!("tone {:.2} Hz at level {}", frequency_hz, volume);
    }

    fn set_volume(&mut self, volume: u8) {
        tracing::trace!("level {}", volume);
    }

    fn silence(&mut self) {
        tracing::debug!("silence");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_steps() {
        let envelope = Envelope::default();
        // 180 -> floor 45; (180 - 45) / 15 = 9 steps
        assert_eq!(envelope.floor_for(180), 45);
        assert_eq!(envelope.fade_steps(180), 9);
        // 100 -> floor 30; 70 / 15 rounds up to 5
        assert_eq!(envelope.fade_steps(100), 5);
        // Quiet notes have nothing to fade
        assert_eq!(envelope.fade_steps(20), 0);
    }

    #[test]
    fn test_plan_long_note() {
        let envelope = Envelope::default();
        let plan = envelope.plan(1000, 500, 180);
        assert_eq!(plan.end, 1500);
        assert_eq!(plan.silence_at, 1480);
        assert_eq!(plan.release_at, 1471);
    }

    #[test]
    fn test_plan_short_note() {
        let envelope = Envelope::default();
        // 15 ms note: fade takes 9 ms, gap is dropped to fit
        let plan = envelope.plan(0, 15, 180);
        assert_eq!(plan.release_at, 0);
        assert_eq!(plan.silence_at, 9);
        assert_eq!(plan.end, 15);

        // Shorter than the fade itself
        let plan = envelope.plan(0, 5, 180);
        assert_eq!(plan.silence_at, 5);
        assert_eq!(plan.release_at, 0);
    }

    #[test]
    fn test_level_ramp() {
        let envelope = Envelope::default();
        assert_eq!(envelope.level_at(180, 100, 100), 180);
        assert_eq!(envelope.level_at(180, 100, 101), 165);
        assert_eq!(envelope.level_at(180, 100, 105), 105);
        assert_eq!(envelope.level_at(180, 100, 200), 45);
        assert_eq!(envelope.level_at(20, 0, 50), 20);
    }

    #[test]
    fn test_recording_output_shares_log() {
        let recorder = RecordingOutput::new();
        let mut moved = recorder.clone();
        moved.set_tone(440.0, 100);
        moved.set_volume(50);
        moved.silence();
        assert_eq!(
            recorder.events(),
            vec![
                OutputEvent::Tone {
                    frequency_hz: 440.0,
                    volume: 100
                },
                OutputEvent::Volume(50),
                OutputEvent::Silence,
            ]
        );
        assert_eq!(recorder.tones(), vec![440.0]);
    }
}
