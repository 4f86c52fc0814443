use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use rtrb::{Consumer, Producer, RingBuffer};
use thiserror::Error;

use super::message::{CommandReceiver, NoteOutcome, OutcomeSender, PlayerCommand};
use crate::config::ChoirConfig;
use crate::io::sink::{AudioSink, SinkFactory};
use crate::sequencing::{NoteLength, Pitch, PitchCatalog};

/// Sound + Stop fit with room to spare; the coordinator never queues more
const COMMAND_QUEUE_SIZE: usize = 4;

/// Upper bound on how long the coordinator sleeps between liveness checks
/// while waiting for a note to finish
const OUTCOME_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Constructed, no thread yet
    Idle,
    /// Thread running, waiting for commands
    Started,
    /// A `sound` call is in flight
    Sounding,
    /// Told to stop; the thread may still be winding down until `join`
    Stopped,
}

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("the {0} player is already started")]
    AlreadyStarted(Pitch),

    #[error("the {0} player has not been started")]
    NotStarted(Pitch),

    #[error("failed to spawn the {pitch} player thread")]
    Spawn {
        pitch: Pitch,
        #[source]
        source: io::Error,
    },

    #[error("command queue for the {0} player is full")]
    QueueFull(Pitch),

    #[error("the {0} player thread exited without answering")]
    Disconnected(Pitch),

    #[error("the {0} player thread panicked")]
    Panicked(Pitch),
}

/// Coordinator-side ends of a running player thread
struct Link {
    commands: Producer<PlayerCommand>,
    outcomes: Consumer<NoteOutcome>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Link {
    fn wake(&self) {
        self.handle.thread().unpark();
    }

    /// Block until the thread reports on the note it was given
    fn await_outcome(
        &mut self,
        pitch: Pitch,
        cancel: &AtomicBool,
    ) -> Result<NoteOutcome, PlayerError> {
        loop {
            if let Ok(outcome) = self.outcomes.pop() {
                return Ok(outcome);
            }
            if self.handle.is_finished() {
                // It may have answered right before exiting
                if let Ok(outcome) = self.outcomes.pop() {
                    return Ok(outcome);
                }
                if self.stop.load(Ordering::Acquire) || cancel.load(Ordering::Acquire) {
                    return Ok(NoteOutcome::Cancelled);
                }
                return Err(PlayerError::Disconnected(pitch));
            }
            thread::park_timeout(OUTCOME_POLL);
        }
    }
}

/// State owned by a player's background thread
struct Bell<F: SinkFactory> {
    pitch: Pitch,
    name: &'static str,
    waveform: Arc<[i8]>,
    silence: Vec<i8>,
    chunk_frames: usize,
    factory: Arc<F>,
    commands: Consumer<PlayerCommand>,
    outcomes: Producer<NoteOutcome>,
    stop: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
}

impl<F: SinkFactory> Bell<F> {
    fn run(mut self) {
        debug!("{} picks up the {} bell", self.name, self.pitch);

        loop {
            match CommandReceiver::pop(&mut self.commands) {
                Some(PlayerCommand::Sound { frames, reply_to }) => {
                    let outcome = self.ring(frames);
                    if !self.outcomes.send(outcome) {
                        warn!("{} could not report on the {} bell", self.name, self.pitch);
                    }
                    reply_to.unpark();
                }
                Some(PlayerCommand::Stop) => break,
                None => {
                    if self.stop.load(Ordering::Acquire) || self.commands.is_abandoned() {
                        break;
                    }
                    thread::park();
                }
            }
        }

        debug!("{} puts down the {} bell", self.name, self.pitch);
    }

    fn interrupted(&self) -> bool {
        self.stop.load(Ordering::Acquire) || self.cancel.load(Ordering::Acquire)
    }

    fn ring(&self, frames: usize) -> NoteOutcome {
        if self.interrupted() {
            return NoteOutcome::Cancelled;
        }

        let mut sink = match self.factory.open(self.pitch) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("{} skips a {} note: {e}", self.name, self.pitch);
                return NoteOutcome::Skipped;
            }
        };

        let frames = frames.min(self.waveform.len());
        for chunk in self.waveform[..frames].chunks(self.chunk_frames) {
            if self.interrupted() {
                return NoteOutcome::Cancelled;
            }
            if let Err(e) = sink.write(chunk) {
                warn!("{} drops a {} note: {e}", self.name, self.pitch);
                return NoteOutcome::Skipped;
            }
        }

        let finished = if self.silence.is_empty() {
            sink.drain()
        } else {
            sink.write(&self.silence).and_then(|()| sink.drain())
        };
        if let Err(e) = finished {
            warn!("{} drops a {} note: {e}", self.name, self.pitch);
            return NoteOutcome::Skipped;
        }

        NoteOutcome::Sounded
    }
}

/// One bell-ringer: owns a single pitch and a background thread that
/// sounds it on command.
///
/// Lifecycle: `Idle → start() → Started ⇄ Sounding → stop() → Stopped`,
/// then `join()` reaps the thread. A joined player may be started again for
/// another performance.
pub struct Player<F: SinkFactory> {
    pitch: Pitch,
    name: &'static str,
    waveform: Arc<[i8]>,
    config: Arc<ChoirConfig>,
    factory: Arc<F>,
    cancel: Arc<AtomicBool>,
    state: PlayerState,
    /// Frames commanded by the latest `sound`
    current_frames: usize,
    link: Option<Link>,
}

impl<F: SinkFactory> Player<F> {
    /// `cancel` is shared by the whole choir; setting it interrupts any
    /// note in progress.
    pub fn new(
        pitch: Pitch,
        name: &'static str,
        catalog: &PitchCatalog,
        factory: Arc<F>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pitch,
            name,
            waveform: catalog.waveform(pitch).clone(),
            config: catalog.config().clone(),
            factory,
            cancel,
            state: PlayerState::Idle,
            current_frames: 0,
            link: None,
        }
    }

    pub fn pitch(&self) -> Pitch {
        self.pitch
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_frames(&self) -> usize {
        self.current_frames
    }

    /// True while a background thread exists that has not been joined
    pub fn is_live(&self) -> bool {
        self.link.is_some()
    }

    /// Spawn the background thread.
    ///
    /// Allowed from `Idle` or `Stopped`. A stopped player that was never
    /// joined is joined first.
    pub fn start(&mut self) -> Result<(), PlayerError> {
        match self.state {
            PlayerState::Started | PlayerState::Sounding => {
                return Err(PlayerError::AlreadyStarted(self.pitch));
            }
            PlayerState::Stopped => self.join()?,
            PlayerState::Idle => {}
        }

        let (commands, command_rx) = RingBuffer::<PlayerCommand>::new(COMMAND_QUEUE_SIZE);
        let (outcome_tx, outcomes) = RingBuffer::<NoteOutcome>::new(COMMAND_QUEUE_SIZE);
        let stop = Arc::new(AtomicBool::new(false));

        let bell = Bell {
            pitch: self.pitch,
            name: self.name,
            waveform: self.waveform.clone(),
            silence: vec![0; self.config.note_gap_frames],
            chunk_frames: self.config.chunk_frames.max(1),
            factory: self.factory.clone(),
            commands: command_rx,
            outcomes: outcome_tx,
            stop: stop.clone(),
            cancel: self.cancel.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("bell-{}", self.pitch.code()))
            .spawn(move || bell.run())
            .map_err(|source| PlayerError::Spawn {
                pitch: self.pitch,
                source,
            })?;

        self.link = Some(Link {
            commands,
            outcomes,
            stop,
            handle,
        });
        self.state = PlayerState::Started;
        Ok(())
    }

    /// Ring this player's bell for `length`, blocking until the note has
    /// been played (or skipped, or cancelled).
    pub fn sound(&mut self, length: NoteLength) -> Result<NoteOutcome, PlayerError> {
        let frames = length.frames(&self.config);
        self.sound_frames(frames)
    }

    /// Like [`sound`](Self::sound) with an explicit frame count, capped at
    /// one measure.
    pub fn sound_frames(&mut self, frames: usize) -> Result<NoteOutcome, PlayerError> {
        if self.state != PlayerState::Started {
            return Err(PlayerError::NotStarted(self.pitch));
        }
        let frames = frames.min(self.waveform.len());
        let link = self
            .link
            .as_mut()
            .ok_or(PlayerError::NotStarted(self.pitch))?;

        let command = PlayerCommand::Sound {
            frames,
            reply_to: thread::current(),
        };
        link.commands
            .push(command)
            .map_err(|_| PlayerError::QueueFull(self.pitch))?;
        link.wake();

        self.current_frames = frames;
        self.state = PlayerState::Sounding;
        let outcome = link.await_outcome(self.pitch, &self.cancel);
        self.state = PlayerState::Started;
        outcome
    }

    /// Signal the background thread to finish. Never blocks.
    ///
    /// A no-op on a player that was never started.
    pub fn stop(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        link.stop.store(true, Ordering::Release);
        // A full queue still sees the stop flag once the thread wakes
        let _ = link.commands.push(PlayerCommand::Stop);
        link.wake();
        self.state = PlayerState::Stopped;
    }

    /// Wait for the background thread to exit.
    ///
    /// Call `stop` first: joining a running player blocks until something
    /// else stops it.
    pub fn join(&mut self) -> Result<(), PlayerError> {
        match self.link.take() {
            Some(link) => link
                .handle
                .join()
                .map_err(|_| PlayerError::Panicked(self.pitch)),
            None => Ok(()),
        }
    }
}

impl<F: SinkFactory> Drop for Player<F> {
    fn drop(&mut self) {
        if self.link.is_some() {
            self.stop();
            let _ = self.join();
        }
    }
}
