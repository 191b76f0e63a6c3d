//! # Scheduler Module
//!
//! The playback engine: a state machine that turns a static RTTTL string into live
//! tone-on / tone-off writes without blocking its caller.
//!
//! ## Sub-modules
//! - `types` - PlaybackState, PlayerStatus, Tick, NoteEvent
//! - `engine` - The [`Scheduler`] itself
//!
//! ## States
//! ```text
//!          play()                      tune exhausted, no loops left
//!   Idle ─────────► Playing ─────────────────────────────────────► Idle
//!    ▲                │  ▲
//!    │     stop()     │  │ tune exhausted, loops left:
//!    └────────────────┘  └─ rewind after loop-gap-ms
//! ```
//!
//! ## Tick Contract
//! [`Scheduler::tick`] takes the current time in milliseconds. If the sounding note
//! has not reached its end it only advances the fade envelope; otherwise it decodes
//! the next note, writes it to the output and records `now + duration` as the next
//! boundary. Tempo changes therefore apply from the next boundary onwards.
//!
//! ## Loop Policy
//! - `0` - play once
//! - `1..=254` - play that many traversals in total
//! - `255` - repeat until [`Scheduler::stop`]
//!
//! A traversal that produces no notes ends the session whatever the loop count.
//!
//! ## Concurrency
//! The scheduler is a plain single-owner value. Poll it from your own loop
//! (cooperative model) or move it into a [`BackgroundPlayer`](crate::worker::BackgroundPlayer)
//! and talk to it through commands.

mod engine;
mod types;


pub use engine::Scheduler;
pub use types::{NoteEvent, PlaybackState, PlayerStatus, Tick};
