//! # Background Player
//!
//! Runs a [`Scheduler`] on its own thread so callers never poll. Control calls are
//! turned into [`Command`]s and pushed through a bounded crossbeam channel; the worker
//! is the only thread that touches playback state.
//!
//! ## Threads
//! ```text
//!  PlayerHandle (any thread) ──send_timeout──► [ bounded queue ] ──► worker thread
//!        ▲                                                             │ apply + tick
//!        └────────────── AtomicCell<PlayerStatus> ◄─── publish ────────┘
//! ```
//!
//! ## Blocking
//! - Control calls block for at most `send-timeout-ms` when the queue is full, then
//!   fail with [`RtttlError::ChannelFull`].
//! - The worker sleeps in `recv` while idle and in `recv_timeout` until the next note
//!   or envelope step while playing.
//! - Status getters never block; they read the last published snapshot.
//!
//! ## Ordering
//! The queue is FIFO. A batch from [`PlayerHandle::send_all`] is applied as a unit
//! before the worker ticks again, and [`PlayerHandle::settle`] queues a marker behind
//! the caller's own commands and waits for the worker to reach it.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::atomic::AtomicCell;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::command::Command;
use crate::config::PlayerConfig;
use crate::error::RtttlError;
use crate::output::ToneOutput;
use crate::scheduler::{PlayerStatus, Scheduler};
use crate::tune::Tune;

#[derive(Debug)]
enum Message {
    Commands(Vec<Command>),
    /// Answered once everything queued before it is applied and published
    Sync(Sender<()>),
    Shutdown,
}

/// Cloneable control surface for a [`BackgroundPlayer`].
///
/// Every method is safe to call from any thread. Commands are validated before they
/// are queued, so a malformed tune never reaches the worker.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: Sender<Message>,
    status: Arc<AtomicCell<PlayerStatus>>,
    send_timeout: Duration,
}

impl PlayerHandle {
    /// Parse `text` and queue it for playback, replacing the current session.
    ///
    /// # Errors
    /// - [`RtttlError::MalformedTune`] if the tune does not parse; nothing is queued
    /// - [`RtttlError::ChannelFull`] if the queue stayed full for the send timeout
    /// - [`RtttlError::WorkerStopped`] if the worker has shut down
    pub fn play(&self, text: &str, loops: u8) -> Result<(), RtttlError> {
        let tune = Tune::parse(text)?;
        self.play_tune(tune, loops)
    }

    pub fn play_tune(&self, tune: Tune, loops: u8) -> Result<(), RtttlError> {
        self.send(Command::Play { tune, loops })
    }

    /// Like [`play`](Self::play), but the first note already uses `scale`.
    ///
    /// `play` resets the tempo scale, so a separate `set_tempo_scale` could arrive
    /// after the first note has been scheduled. Both commands travel as one batch.
    pub fn play_scaled(&self, text: &str, loops: u8, scale: f32) -> Result<(), RtttlError> {
        let tune = Tune::parse(text)?;
        self.send_all(vec![Command::Play { tune, loops }, Command::SetTempo(scale)])
    }

    pub fn stop(&self) -> Result<(), RtttlError> {
        self.send(Command::Stop)
    }

    pub fn set_volume(&self, volume: u8) -> Result<(), RtttlError> {
        self.send(Command::SetVolume(volume))
    }

    pub fn set_tempo_scale(&self, scale: f32) -> Result<(), RtttlError> {
        self.send(Command::SetTempo(scale))
    }

    /// Queue a raw command
    pub fn send(&self, command: Command) -> Result<(), RtttlError> {
        self.send_all(vec![command])
    }

    /// Queue commands that the worker applies back to back, with no tick in between
    pub fn send_all(&self, commands: Vec<Command>) -> Result<(), RtttlError> {
        match self.tx.send_timeout(Message::Commands(commands), self.send_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                warn!("command queue full, dropping command");
                Err(RtttlError::ChannelFull {
                    timeout_ms: self.send_timeout.as_millis() as u64,
                })
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(RtttlError::WorkerStopped),
        }
    }

    /// Last snapshot published by the worker
    pub fn status(&self) -> PlayerStatus {
        self.status.load()
    }

    pub fn is_playing(&self) -> bool {
        self.status().is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.status().is_looping()
    }

    pub fn remaining_loops(&self) -> u8 {
        self.status().remaining_loops
    }

    pub fn volume(&self) -> u8 {
        self.status().volume
    }

    pub fn tempo_scale(&self) -> f32 {
        self.status().tempo_scale
    }

    pub fn current_frequency_hz(&self) -> f32 {
        self.status().frequency_hz
    }

    pub fn current_bpm(&self) -> u32 {
        self.status().current_bpm()
    }

    /// Wait until every command this thread sent so far is applied and visible in
    /// [`status`](Self::status). Returns `false` on timeout or if the worker is gone.
    pub fn settle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (reply_tx, reply_rx) = channel::bounded(1);
        if self.tx.send_deadline(Message::Sync(reply_tx), deadline).is_err() {
            return false;
        }
        reply_rx.recv_deadline(deadline).is_ok()
    }

    /// Wait until every queued command is applied and playback has ended.
    /// Returns `false` on timeout.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if !self.settle(timeout) {
            return false;
        }
        while self.is_playing() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

/// Owns the worker thread. Dropping it stops playback and joins the thread.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use rtttl::{BackgroundPlayer, MonotonicClock, NullOutput, PlayerConfig};
///
/// let player = BackgroundPlayer::spawn(NullOutput, MonotonicClock::new(), &PlayerConfig::default())?;
/// player.handle().play("Beep:d=32,o=5,b=900:c", 0)?;
/// assert!(player.handle().wait_until_idle(Duration::from_secs(2)));
/// player.shutdown()?;
/// # Ok::<(), rtttl::RtttlError>(())
/// ```
#[derive(Debug)]
pub struct BackgroundPlayer<O: ToneOutput + Send + 'static> {
    handle: PlayerHandle,
    thread: Option<JoinHandle<O>>,
}

impl<O: ToneOutput + Send + 'static> BackgroundPlayer<O> {
    /// Start the worker thread.
    ///
    /// # Errors
    /// [`RtttlError::Io`] if the OS refuses to create the thread.
    pub fn spawn<C>(output: O, clock: C, config: &PlayerConfig) -> Result<Self, RtttlError>
    where
        C: Clock + 'static,
    {
        let (tx, rx) = channel::bounded(config.channel_capacity.max(1));
        let scheduler = Scheduler::new(output, config);

        let status = Arc::new(AtomicCell::new(scheduler.status()));

        let worker_status = Arc::clone(&status);
        let thread = thread::Builder::new()
            .name("rtttl-player".into())
            .spawn(move || run(scheduler, clock, rx, worker_status))?;

        Ok(Self {
            handle: PlayerHandle {
                tx,
                status,
                send_timeout: Duration::from_millis(config.send_timeout_ms),
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &PlayerHandle {
        &self.handle
    }

    /// Stop playback, join the worker and hand the output driver back.
    ///
    /// # Errors
    /// [`RtttlError::WorkerStopped`] if the worker thread panicked.
    pub fn shutdown(mut self) -> Result<O, RtttlError> {
        self.join().ok_or(RtttlError::WorkerStopped)
    }

    fn join(&mut self) -> Option<O> {
        let thread = self.thread.take()?;
        // A full queue still drains, so a blocking send is fine here
        let _ = self.handle.tx.send(Message::Shutdown);
        match thread.join() {
            Ok(output) => Some(output),
            Err(_) => {
                warn!("player worker panicked");
                None
            }
        }
    }
}

impl<O: ToneOutput + Send + 'static> Drop for BackgroundPlayer<O> {
    fn drop(&mut self) {
        let _ = self.join();
    }
}

/// Why the worker woke up
enum Wake {
    Message(Message),
    Deadline,
    Disconnected,
}

fn wait_for(rx: &Receiver<Message>, wakeup: Option<u64>, now: u64) -> Wake {
    let result = match wakeup {
        None => return rx.recv().map_or(Wake::Disconnected, Wake::Message),
        Some(at) if at <= now => rx.try_recv().map_err(|e| match e {
            TryRecvError::Empty => Wake::Deadline,
            TryRecvError::Disconnected => Wake::Disconnected,
        }),
        Some(at) => rx
            .recv_timeout(Duration::from_millis(at - now))
            .map_err(|e| match e {
                RecvTimeoutError::Timeout => Wake::Deadline,
                RecvTimeoutError::Disconnected => Wake::Disconnected,
            }),
    };
    result.map_or_else(|wake| wake, Wake::Message)
}

/// Worker loop: wait for a command or the next deadline, apply, tick, publish
fn run<O, C>(
    mut scheduler: Scheduler<O>,
    clock: C,
    rx: Receiver<Message>,
    status: Arc<AtomicCell<PlayerStatus>>,
) -> O
where
    O: ToneOutput,
    C: Clock,
{
    debug!("player worker started");

    loop {
        let now = clock.now_ms();
        let mut reply = None;
        match wait_for(&rx, scheduler.next_wakeup(now), now) {
            Wake::Message(Message::Commands(commands)) => {
                for command in commands {
                    debug!("applying {:?}", command);
                    scheduler.apply(command);
                }
            }
            Wake::Message(Message::Sync(tx)) => reply = Some(tx),
            Wake::Message(Message::Shutdown) => break,
            Wake::Deadline => {}
            Wake::Disconnected => {
                debug!("command channel disconnected");
                break;
            }
        }

        scheduler.tick(clock.now_ms());
        status.store(scheduler.status());
        if let Some(tx) = reply {
            let _ = tx.send(());
        }
    }

    scheduler.stop();
    status.store(scheduler.status());
    debug!("player worker finished");
    scheduler.into_output()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, MonotonicClock};
    use crate::command::LOOP_FOREVER;
    use crate::output::{OutputEvent, RecordingOutput};

    const FAST: &str = "Fast:d=32,o=5,b=900:c,d,e";
    const WAIT: Duration = Duration::from_secs(5);

    fn spawn_recording() -> (BackgroundPlayer<RecordingOutput>, RecordingOutput) {
        let recorder = RecordingOutput::new();
        let player = BackgroundPlayer::spawn(
            recorder.clone(),
            MonotonicClock::new(),
            &PlayerConfig::default(),
        )
        .unwrap();
        (player, recorder)
    }

    /// Blocks in `set_tone` until the test releases it
    struct GateOutput {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl ToneOutput for GateOutput {
        fn set_tone(&mut self, _frequency_hz: f32, _volume: u8) {
            let _ = self.entered.send(());
            let _ = self.release.recv();
        }
        fn set_volume(&mut self, _volume: u8) {}
        fn silence(&mut self) {}
    }

    #[test]
    fn test_initial_status() {
        let (player, _) = spawn_recording();
        let status = player.handle().status();
        assert!(!status.is_playing());
        assert_eq!(status.volume, 180);
        assert_eq!(status.current_bpm(), 120);
    }

    #[test]
    fn test_play_runs_to_completion() {
        let (player, recorder) = spawn_recording();
        player.handle().play(FAST, 0).unwrap();
        assert!(player.handle().wait_until_idle(WAIT));

        assert_eq!(recorder.tones().len(), 3);
        assert_eq!(recorder.events().last(), Some(&OutputEvent::Silence));
        assert_eq!(player.handle().current_frequency_hz(), 0.0);
    }

    #[test]
    fn test_loops_in_background() {
        let (player, recorder) = spawn_recording();
        player.handle().play(FAST, 2).unwrap();
        assert!(player.handle().wait_until_idle(WAIT));
        assert_eq!(recorder.tones().len(), 6);
    }

    #[test]
    fn test_stop_from_another_thread() {
        let (player, recorder) = spawn_recording();
        let handle = player.handle().clone();
        handle.play(FAST, LOOP_FOREVER).unwrap();
        assert!(handle.settle(WAIT));
        assert!(handle.is_playing());
        assert_eq!(handle.remaining_loops(), LOOP_FOREVER);

        let remote = handle.clone();
        thread::spawn(move || remote.stop().unwrap()).join().unwrap();

        assert!(handle.wait_until_idle(WAIT));
        assert!(!handle.is_looping());
        assert_eq!(handle.current_frequency_hz(), 0.0);
        assert_eq!(recorder.events().last(), Some(&OutputEvent::Silence));
    }

    #[test]
    fn test_malformed_tune_is_not_queued() {
        let (player, recorder) = spawn_recording();
        let result = player.handle().play("NoColonsHere", 0);
        assert!(result.unwrap_err().is_malformed());
        assert!(player.handle().settle(WAIT));
        assert!(!player.handle().is_playing());
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_settings_reach_status() {
        let (player, _) = spawn_recording();
        let handle = player.handle();
        handle.set_volume(42).unwrap();
        handle.set_tempo_scale(9.0).unwrap();
        assert!(handle.settle(WAIT));
        assert_eq!(handle.volume(), 42);
        assert_eq!(handle.tempo_scale(), 4.0);
    }

    #[test]
    fn test_shutdown_returns_output() {
        let (player, recorder) = spawn_recording();
        let handle = player.handle().clone();
        handle.play(FAST, LOOP_FOREVER).unwrap();

        let output = player.shutdown().unwrap();
        assert_eq!(output.events().last(), Some(&OutputEvent::Silence));
        assert_eq!(recorder.events().last(), Some(&OutputEvent::Silence));
        assert!(!handle.is_playing());

        let err = handle.stop().unwrap_err();
        assert!(matches!(err, RtttlError::WorkerStopped));
    }

    #[test]
    fn test_full_queue_times_out() {
        let (entered_tx, entered_rx) = channel::unbounded();
        let (release_tx, release_rx) = channel::unbounded();
        let config = PlayerConfig {
            channel_capacity: 1,
            send_timeout_ms: 20,
            ..PlayerConfig::default()
        };
        let player = BackgroundPlayer::spawn(
            GateOutput {
                entered: entered_tx,
                release: release_rx,
            },
            MonotonicClock::new(),
            &config,
        )
        .unwrap();

        player.handle().play(FAST, 0).unwrap();
        // The worker is now stuck inside set_tone
        entered_rx.recv_timeout(WAIT).unwrap();

        player.handle().set_volume(1).unwrap();
        let err = player.handle().set_volume(2).unwrap_err();
        assert!(matches!(err, RtttlError::ChannelFull { timeout_ms: 20 }));

        drop(release_tx);
        assert!(player.handle().wait_until_idle(WAIT));
        assert_eq!(player.handle().volume(), 1);
        player.shutdown().unwrap();
    }

    #[test]
    fn test_play_scaled_applies_to_first_note() {
        let clock = ManualClock::new();
        let recorder = RecordingOutput::new();
        let player =
            BackgroundPlayer::spawn(recorder.clone(), clock.clone(), &PlayerConfig::default())
                .unwrap();
        let handle = player.handle();

        handle.play_scaled("T:d=4,o=5,b=120:c,d", 0, 2.0).unwrap();
        assert!(handle.settle(WAIT));
        assert_eq!(handle.tempo_scale(), 2.0);
        assert_eq!(recorder.tones(), vec![523.25]);

        // The first note lasts 250 ms, so the second one is due by 260 ms
        clock.set(260);
        assert!(handle.settle(WAIT));
        assert_eq!(recorder.tones(), vec![523.25, 587.33]);
        player.shutdown().unwrap();
    }

    #[test]
    fn test_play_scaled_rejects_malformed_tune() {
        let (player, recorder) = spawn_recording();
        let err = player.handle().play_scaled("NoColonsHere", 0, 2.0).unwrap_err();
        assert!(err.is_malformed());
        assert!(player.handle().settle(WAIT));
        assert_eq!(player.handle().tempo_scale(), 1.0);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_settle_waits_for_own_commands() {
        let (entered_tx, entered_rx) = channel::unbounded();
        let (release_tx, release_rx) = channel::unbounded();
        let player = BackgroundPlayer::spawn(
            GateOutput {
                entered: entered_tx,
                release: release_rx,
            },
            MonotonicClock::new(),
            &PlayerConfig::default(),
        )
        .unwrap();

        let first = player.handle().clone();
        let second = player.handle().clone();
        first.play(FAST, 0).unwrap();
        entered_rx.recv_timeout(WAIT).unwrap();

        // Another handle's traffic must not let this settle return early
        second.set_volume(7).unwrap();
        first.set_volume(9).unwrap();
        assert!(!first.settle(Duration::from_millis(50)));

        drop(release_tx);
        assert!(first.settle(WAIT));
        assert_eq!(first.volume(), 9);
        player.shutdown().unwrap();
    }
}
