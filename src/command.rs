//! Control messages applied by the scheduler's single owner.

use crate::tune::Tune;

/// Loop count meaning "repeat until stopped"
pub const LOOP_FOREVER: u8 = 255;

/// Commands sent from control surfaces to whoever owns the [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replace the current session with `tune`.
    ///
    /// `loops`: 0 plays once, 1-254 plays that many traversals, [`LOOP_FOREVER`] repeats
    /// until stopped. The tune is validated before the command is built.
    Play { tune: Tune, loops: u8 },

    /// Silence and return to idle.
    Stop,

    /// Set the PWM level (0-255).
    SetVolume(u8),

    /// Set the tempo multiplier; clamped to 0.1-4.0 when applied.
    SetTempo(f32),
}
