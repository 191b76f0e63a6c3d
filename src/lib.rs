pub mod clock;
pub mod command;
pub mod config;
pub mod duration;
pub mod error;
pub mod frequency;
pub mod output;
pub mod parser;
pub mod scheduler;
pub mod synth;
pub mod timeline;
pub mod tune;
pub mod worker;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use command::{Command, LOOP_FOREVER};
pub use config::PlayerConfig;
pub use duration::{calculate_duration, TempoScale};
pub use error::*;
pub use frequency::frequency;
pub use output::{Envelope, NullOutput, OutputEvent, RecordingOutput, ToneOutput, TracingOutput};
pub use parser::NoteParser;
pub use scheduler::{NoteEvent, PlaybackState, PlayerStatus, Scheduler, Tick};
pub use synth::{render, render_wav, RenderOptions, SynthOutput};
pub use timeline::{timeline, Timeline, TimelineEntry};
pub use tune::{Header, NoteToken, PitchClass, Tune};
pub use worker::{BackgroundPlayer, PlayerHandle};

/// Parse and validate an RTTTL string.
/// Shorthand for [`Tune::parse`].
pub fn parse(text: &str) -> Result<Tune, RtttlError> {
    Tune::parse(text)
}

/// Parse a tune and report its total length in milliseconds for one traversal.
pub fn tune_length_ms(text: &str) -> Result<u64, RtttlError> {
    Ok(timeline(text)?.total_ms)
}
