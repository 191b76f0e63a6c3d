//! The playback state machine
//!
//! Turns a validated tune into a time-ordered series of tone writes. Every call does a
//! small fixed amount of work and returns; nothing in here sleeps.

use crate::command::{Command, LOOP_FOREVER};
use crate::config::PlayerConfig;
use crate::duration::{TempoScale, MIN_NOTE_MS};
use crate::error::RtttlError;
use crate::output::{Envelope, NotePlan, ToneOutput, AUDIBLE_THRESHOLD_HZ};
use crate::tune::Tune;

use super::types::{NoteEvent, PlaybackState, PlayerStatus, Tick};

/// The envelope of the note that is currently sounding
#[derive(Debug)]
struct Sounding {
    plan: NotePlan,
    level: u8,
    silenced: bool,
}

/// One playback session. Dropping it releases the tune's storage.
#[derive(Debug)]
struct Session {
    tune: Tune,
    cursor: usize,
    remaining_loops: u8,
    next_at: u64,
    sounding: Option<Sounding>,
    notes_this_pass: usize,
}

/// Non-blocking RTTTL sequencer driving a single [`ToneOutput`].
///
/// The scheduler is the only writer of playback state. Call [`tick`](Self::tick)
/// from a polling loop at least once per note boundary (every millisecond or so for a
/// smooth fade), or hand the scheduler to a
/// [`BackgroundPlayer`](crate::worker::BackgroundPlayer).
///
/// # Example
/// ```
/// use rtttl::{NullOutput, PlayerConfig, Scheduler, Tick};
///
/// let mut scheduler = Scheduler::new(NullOutput, &PlayerConfig::default());
/// scheduler.play("Two:d=4,o=5,b=120:c,d", 0)?;
///
/// assert!(matches!(scheduler.tick(0), Tick::Note(_)));
/// assert_eq!(scheduler.tick(100), Tick::Waiting);
/// assert!(matches!(scheduler.tick(500), Tick::Note(_)));
/// assert_eq!(scheduler.tick(1000), Tick::Finished);
/// assert!(!scheduler.is_playing());
/// # Ok::<(), rtttl::RtttlError>(())
/// ```
#[derive(Debug)]
pub struct Scheduler<O: ToneOutput> {
    output: O,
    envelope: Envelope,
    loop_gap_ms: u64,
    volume: u8,
    tempo_scale: TempoScale,
    bpm: u32,
    frequency_hz: f32,
    session: Option<Session>,
}

impl<O: ToneOutput> Scheduler<O> {
    pub fn new(output: O, config: &PlayerConfig) -> Self {
        Self {
            output,
            envelope: config.envelope,
            loop_gap_ms: config.loop_gap_ms,
            volume: config.volume,
            tempo_scale: TempoScale::NORMAL,
            bpm: 120,
            frequency_hz: 0.0,
            session: None,
        }
    }

    /// Parse `text` and start playing it, replacing any current session.
    ///
    /// `loops`: 0 plays once, 1-254 plays that many traversals, 255 repeats until
    /// [`stop`](Self::stop).
    ///
    /// # Errors
    /// [`RtttlError::MalformedTune`] if the tune does not parse. The scheduler is left
    /// exactly as it was, including any session already playing.
    pub fn play(&mut self, text: &str, loops: u8) -> Result<(), RtttlError> {
        let tune = Tune::parse(text)?;
        self.play_tune(tune, loops);
        Ok(())
    }

    /// Start an already validated tune, replacing any current session.
    pub fn play_tune(&mut self, tune: Tune, loops: u8) {
        if self.session.take().is_some() {
            self.output.silence();
        }
        tracing::info!(
            "playing '{}' at {} bpm, loops {}",
            tune.name(),
            tune.header().bpm,
            loops
        );

        self.frequency_hz = 0.0;
        self.tempo_scale = TempoScale::NORMAL;
        self.bpm = tune.header().bpm;
        self.session = Some(Session {
            tune,
            cursor: 0,
            remaining_loops: loops,
            next_at: 0,
            sounding: None,
            notes_this_pass: 0,
        });
    }

    /// Silence the output and end the session. Safe to call at any time.
    pub fn stop(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("playback stopped");
        }
        self.output.silence();
        self.frequency_hz = 0.0;
    }

    /// Advance playback to `now` (milliseconds on any monotonic clock).
    pub fn tick(&mut self, now: u64) -> Tick {
        let Some(session) = self.session.as_mut() else {
            return Tick::Idle;
        };

        if now < session.next_at {
            if let Some(sounding) = session.sounding.as_mut() {
                if !sounding.silenced {
                    if now >= sounding.plan.silence_at {
                        self.output.silence();
                        self.frequency_hz = 0.0;
                        sounding.silenced = true;
                    } else if now >= sounding.plan.release_at {
                        let level =
                            self.envelope
                                .level_at(self.volume, sounding.plan.release_at, now);
                        if level != sounding.level {
                            self.output.set_volume(level);
                            sounding.level = level;
                        }
                    }
                }
            }
            return Tick::Waiting;
        }

        // The previous note is over
        if let Some(sounding) = session.sounding.take() {
            if !sounding.silenced {
                self.output.silence();
                self.frequency_hz = 0.0;
            }
        }

        let mut notes = session.tune.notes_from(session.cursor);
        let next = notes.parse_next_note();
        session.cursor = notes.position();

        let note = match next {
            Ok(Some(note)) => note,
            Ok(None) => return self.finish_pass(now),
            Err(e) => {
                tracing::warn!("stopping on undecodable note: {}", e);
                self.stop();
                return Tick::Finished;
            }
        };

        session.notes_this_pass += 1;
        let duration_ms = self
            .tempo_scale
            .scale_ms(note.duration_ms(session.tune.header().bpm))
            .max(MIN_NOTE_MS);
        session.next_at = now + duration_ms as u64;

        let frequency_hz = note.frequency_hz();
        let played_hz = if frequency_hz > AUDIBLE_THRESHOLD_HZ {
            self.output.set_tone(frequency_hz, self.volume);
            session.sounding = Some(Sounding {
                plan: self.envelope.plan(now, duration_ms, self.volume),
                level: self.volume,
                silenced: false,
            });
            frequency_hz
        } else {
            if !note.is_rest() {
                tracing::debug!("note {} is outside the audible table, resting", note);
            }
            self.output.silence();
            0.0
        };
        self.frequency_hz = played_hz;

        tracing::debug!("note {} {:.2} Hz for {} ms", note, played_hz, duration_ms);

        Tick::Note(NoteEvent {
            note,
            frequency_hz: played_hz,
            duration_ms,
            start_ms: now,
        })
    }

    /// Apply the loop policy once the tune is exhausted
    fn finish_pass(&mut self, now: u64) -> Tick {
        let Some(session) = self.session.as_mut() else {
            return Tick::Idle;
        };

        let played = std::mem::take(&mut session.notes_this_pass);
        let remaining = match session.remaining_loops {
            _ if played == 0 => 0,
            LOOP_FOREVER => LOOP_FOREVER,
            n => n.saturating_sub(1),
        };

        if remaining == 0 {
            self.session = None;
            self.output.silence();
            self.frequency_hz = 0.0;
            tracing::info!("playback finished");
            return Tick::Finished;
        }

        session.remaining_loops = remaining;
        session.cursor = 0;
        session.next_at = now + self.loop_gap_ms;
        tracing::info!("restarting tune, loops remaining {}", remaining);
        Tick::Restarted {
            remaining_loops: remaining,
        }
    }

    /// Earliest time at which [`tick`](Self::tick) has something to do, given the
    /// current time. `None` when idle.
    pub fn next_wakeup(&self, now: u64) -> Option<u64> {
        let session = self.session.as_ref()?;
        let envelope_at = session
            .sounding
            .as_ref()
            .filter(|s| !s.silenced)
            .map(|s| {
                if now < s.plan.release_at {
                    s.plan.release_at
                } else {
                    (now + self.envelope.fade_step_ms.max(1) as u64).min(s.plan.silence_at)
                }
            });
        Some(match envelope_at {
            Some(at) => at.min(session.next_at),
            None => session.next_at,
        })
    }

    /// Apply a control command
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Play { tune, loops } => self.play_tune(tune, loops),
            Command::Stop => self.stop(),
            Command::SetVolume(volume) => self.set_volume(volume),
            Command::SetTempo(scale) => self.set_tempo_scale(scale),
        }
    }

    /// Set the PWM level. A tone that is sounding is updated immediately.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
        if self.frequency_hz > AUDIBLE_THRESHOLD_HZ {
            self.output.set_volume(volume);
            if let Some(sounding) = self.session.as_mut().and_then(|s| s.sounding.as_mut()) {
                sounding.level = volume;
            }
        }
        tracing::debug!("volume set to {}", volume);
    }

    /// Set the tempo multiplier, clamped to 0.1-4.0. The note already sounding keeps its
    /// length; the change applies from the next note boundary.
    pub fn set_tempo_scale(&mut self, scale: f32) {
        self.tempo_scale = TempoScale::new(scale);
        tracing::debug!("tempo scale {:.2}", self.tempo_scale.get());
    }

    pub fn state(&self) -> PlaybackState {
        if self.session.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_looping(&self) -> bool {
        self.remaining_loops() > 0
    }

    pub fn remaining_loops(&self) -> u8 {
        self.session.as_ref().map_or(0, |s| s.remaining_loops)
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn tempo_scale(&self) -> f32 {
        self.tempo_scale.get()
    }

    pub fn current_frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    pub fn current_bpm(&self) -> u32 {
        self.status().current_bpm()
    }

    /// The tune being played, if any
    pub fn tune(&self) -> Option<&Tune> {
        self.session.as_ref().map(|s| &s.tune)
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.state(),
            remaining_loops: self.remaining_loops(),
            volume: self.volume,
            tempo_scale: self.tempo_scale.get(),
            frequency_hz: self.frequency_hz,
            bpm: self.bpm,
        }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Stop playback and hand back the output driver
    pub fn into_output(mut self) -> O {
        self.stop();
        self.output
    }
}
