//! # Square-Wave Renderer
//!
//! Renders a tune offline to 16-bit mono PCM, the way a piezo buzzer driven by a PWM
//! pin would sound. The [`Scheduler`] runs unchanged against a [`ManualClock`] that
//! advances one millisecond per step; [`SynthOutput`] turns its tone writes into
//! samples.
//!
//! ```rust,no_run
//! use rtttl::{render_wav, PlayerConfig, RenderOptions};
//!
//! render_wav(
//!     "Nokia:d=4,o=5,b=160:8e6,8d6,f#,8e6",
//!     0,
//!     &PlayerConfig::default(),
//!     &RenderOptions::default(),
//!     "nokia.wav",
//! )?;
//! # Ok::<(), rtttl::RtttlError>(())
//! ```

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::clock::{Clock, ManualClock};
use crate::config::PlayerConfig;
use crate::error::RtttlError;
use crate::output::ToneOutput;
use crate::scheduler::Scheduler;

/// Peak sample value at volume 255
const FULL_SCALE: f32 = 12000.0;

/// Limits for an offline render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub sample_rate: u32,
    /// Hard stop, so looping tunes still produce a finite file
    pub max_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            max_ms: 60_000,
        }
    }
}

/// A [`ToneOutput`] that synthesizes a square wave at the current frequency and level
#[derive(Debug, Clone)]
pub struct SynthOutput {
    sample_rate: u32,
    frequency_hz: f32,
    level: u8,
    phase: f32,
}

impl SynthOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frequency_hz: 0.0,
            level: 0,
            phase: 0.0,
        }
    }

    pub fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Produce the next sample and advance the oscillator
    pub fn next_sample(&mut self) -> i16 {
        if self.frequency_hz <= 0.0 || self.level == 0 {
            return 0;
        }
        let amplitude = FULL_SCALE * self.level as f32 / 255.0;
        let sample = if self.phase < 0.5 { amplitude } else { -amplitude };

        self.phase += self.frequency_hz / self.sample_rate as f32;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        sample as i16
    }
}

impl ToneOutput for SynthOutput {
    fn set_tone(&mut self, frequency_hz: f32, volume: u8) {
        self.frequency_hz = frequency_hz;
        self.level = volume;
        self.phase = 0.0;
    }

    fn set_volume(&mut self, volume: u8) {
        self.level = volume;
    }

    fn silence(&mut self) {
        self.frequency_hz = 0.0;
        self.level = 0;
    }
}

/// Play `text` through a [`SynthOutput`] and collect the samples.
///
/// Stops when the session ends or after `options.max_ms`, whichever comes first.
pub fn render(
    text: &str,
    loops: u8,
    config: &PlayerConfig,
    options: &RenderOptions,
) -> Result<Vec<i16>, RtttlError> {
    if options.sample_rate == 0 {
        return Err(RtttlError::ConfigError(
            "sample rate must be positive".to_string(),
        ));
    }

    let mut scheduler = Scheduler::new(SynthOutput::new(options.sample_rate), config);
    scheduler.play(text, loops)?;

    let clock = ManualClock::new();
    let rate = options.sample_rate as u64;
    let mut samples = Vec::new();

    while clock.now_ms() < options.max_ms {
        let now = clock.now_ms();
        scheduler.tick(now);
        if !scheduler.is_playing() {
            break;
        }

        // Spread the fractional samples per millisecond evenly
        let count = (now + 1) * rate / 1000 - now * rate / 1000;
        let output = scheduler.output_mut();
        samples.extend((0..count).map(|_| output.next_sample()));

        clock.advance(1);
    }

    if scheduler.is_playing() {
        tracing::warn!("render stopped at the {} ms limit", options.max_ms);
    }
    Ok(samples)
}

/// Write PCM samples to a mono 16-bit WAV file
pub fn write_wav(samples: &[i16], sample_rate: u32, path: impl AsRef<Path>) -> Result<(), RtttlError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Render `text` straight to a WAV file. Returns the number of samples written.
pub fn render_wav(
    text: &str,
    loops: u8,
    config: &PlayerConfig,
    options: &RenderOptions,
    path: impl AsRef<Path>,
) -> Result<usize, RtttlError> {
    let samples = render(text, loops, config, options)?;
    write_wav(&samples, options.sample_rate, path)?;
    tracing::info!(
        "rendered {} samples ({} ms)",
        samples.len(),
        samples.len() as u64 * 1000 / options.sample_rate as u64
    );
    Ok(samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::LOOP_FOREVER;

    fn options(sample_rate: u32, max_ms: u64) -> RenderOptions {
        RenderOptions {
            sample_rate,
            max_ms,
        }
    }

    #[test]
    fn test_render_length_matches_tune() {
        let samples = render(
            "One:d=4,o=5,b=120:c",
            0,
            &PlayerConfig::default(),
            &options(8000, 60_000),
        )
        .unwrap();
        assert_eq!(samples.len(), 4000);
    }

    #[test]
    fn test_render_square_wave_and_gap() {
        let samples = render(
            "One:d=4,o=5,b=120:c",
            0,
            &PlayerConfig::default(),
            &options(8000, 60_000),
        )
        .unwrap();

        let peak = (FULL_SCALE * 180.0 / 255.0) as i16;
        assert_eq!(samples[0], peak);
        assert!(samples[..100].iter().any(|&s| s == -peak));

        // Silent for the last 20 ms
        assert!(samples[3840..].iter().all(|&s| s == 0));
    }

    #[test]
    fn test_render_rest_is_silent() {
        let samples = render(
            "Rest:d=4,o=5,b=120:p",
            0,
            &PlayerConfig::default(),
            &options(8000, 60_000),
        )
        .unwrap();
        assert_eq!(samples.len(), 4000);
        assert!(samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_render_caps_infinite_loop() {
        let samples = render(
            "Loop:d=4,o=5,b=120:c",
            LOOP_FOREVER,
            &PlayerConfig::default(),
            &options(1000, 2000),
        )
        .unwrap();
        assert_eq!(samples.len(), 2000);
    }

    #[test]
    fn test_render_rejects_bad_input() {
        let config = PlayerConfig::default();
        let err = render("Bad", 0, &config, &options(8000, 1000)).unwrap_err();
        assert!(err.is_malformed());

        let err = render("Ok:d=4,o=5,b=120:c", 0, &config, &options(0, 1000)).unwrap_err();
        assert!(matches!(err, RtttlError::ConfigError(_)));
    }

    #[test]
    fn test_render_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.wav");

        let written = render_wav(
            "One:d=8,o=5,b=120:c",
            0,
            &PlayerConfig::default(),
            &options(8000, 60_000),
            &path,
        )
        .unwrap();
        assert_eq!(written, 2000);

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 2000);
    }

    #[test]
    fn test_synth_output_silence() {
        let mut synth = SynthOutput::new(8000);
        synth.set_tone(440.0, 255);
        assert_eq!(synth.next_sample(), FULL_SCALE as i16);
        synth.silence();
        assert_eq!(synth.next_sample(), 0);
        assert_eq!(synth.frequency_hz(), 0.0);
    }
}
