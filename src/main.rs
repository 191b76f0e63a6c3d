use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use rtttl::{
    BackgroundPlayer, Clock, MonotonicClock, PlayerConfig, RenderOptions, Scheduler,
    TracingOutput,
};

/// RTTTL ringtone player
#[derive(Parser)]
#[command(name = "rtttl")]
#[command(about = "Play, inspect and render RTTTL ringtones")]
struct Cli {
    /// Player configuration (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a tune in real time, logging every tone change
    Play {
        #[command(flatten)]
        source: TuneSource,

        /// 0 = once, 1-254 = that many times, 255 = forever
        #[arg(long, default_value_t = 0)]
        loops: u8,

        /// PWM level 0-255
        #[arg(long)]
        volume: Option<u8>,

        /// Tempo multiplier, 0.1-4.0
        #[arg(long)]
        tempo: Option<f32>,

        /// Poll the scheduler from this thread instead of a worker thread
        #[arg(long)]
        cooperative: bool,
    },

    /// Print note timings as YAML
    Inspect {
        #[command(flatten)]
        source: TuneSource,
    },

    /// Render a tune to a WAV file
    Render {
        #[command(flatten)]
        source: TuneSource,

        /// Output WAV path
        #[arg(long, short)]
        output: PathBuf,

        #[arg(long, default_value_t = 0)]
        loops: u8,

        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,

        /// Length cap for looping tunes
        #[arg(long, default_value_t = 60)]
        max_seconds: u64,
    },
}

/// A tune given inline or read from a file
#[derive(Debug, Args)]
struct TuneSource {
    /// RTTTL text, e.g. "Beep:d=4,o=5,b=120:c"
    #[arg(required_unless_present = "file")]
    tune: Option<String>,

    /// Read the tune from a file instead
    #[arg(long, conflicts_with = "tune")]
    file: Option<PathBuf>,
}

impl TuneSource {
    fn read(&self) -> Result<String> {
        match (&self.tune, &self.file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read tune file: {}", path.display()))?;
                Ok(content.trim().to_string())
            }
            (None, None) => anyhow::bail!("No tune given"),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PlayerConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => PlayerConfig::default(),
    };

    match cli.command {
        Commands::Play {
            source,
            loops,
            volume,
            tempo,
            cooperative,
        } => {
            let text = source.read()?;
            let config = PlayerConfig {
                volume: volume.unwrap_or(config.volume),
                ..config
            };
            if cooperative {
                play_cooperative(&text, loops, tempo, &config)
            } else {
                play_background(&text, loops, tempo, &config)
            }
        }
        Commands::Inspect { source } => {
            let data = rtttl::timeline(&source.read()?)?;
            print!("{}", data.to_yaml()?);
            Ok(())
        }
        Commands::Render {
            source,
            output,
            loops,
            sample_rate,
            max_seconds,
        } => {
            let options = RenderOptions {
                sample_rate,
                max_ms: max_seconds.saturating_mul(1000),
            };
            rtttl::render_wav(&source.read()?, loops, &config, &options, &output)?;
            eprintln!("Wrote {}", output.display());
            Ok(())
        }
    }
}

fn play_background(text: &str, loops: u8, tempo: Option<f32>, config: &PlayerConfig) -> Result<()> {
    let player = BackgroundPlayer::spawn(TracingOutput, MonotonicClock::new(), config)?;
    let handle = player.handle();

    match tempo {
        Some(scale) => handle.play_scaled(text, loops, scale)?,
        None => handle.play(text, loops)?,
    }

    while !handle.wait_until_idle(Duration::from_secs(1)) {}

    player.shutdown()?;
    Ok(())
}

fn play_cooperative(text: &str, loops: u8, tempo: Option<f32>, config: &PlayerConfig) -> Result<()> {
    let clock = MonotonicClock::new();
    let mut scheduler = Scheduler::new(TracingOutput, config);

    scheduler.play(text, loops)?;
    if let Some(scale) = tempo {
        scheduler.set_tempo_scale(scale);
    }

    loop {
        let now = clock.now_ms();
        scheduler.tick(now);
        match scheduler.next_wakeup(now) {
            Some(at) if at > now => thread::sleep(Duration::from_millis(at - now)),
            Some(_) => {}
            None => break,
        }
    }
    Ok(())
}
