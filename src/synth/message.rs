use std::thread::Thread;

use rtrb::{Consumer, Producer};

/// Coordinator → player thread
#[derive(Debug, Clone)]
pub enum PlayerCommand {
    /// Ring for `frames` frames, then acknowledge and unpark `reply_to`
    Sound { frames: usize, reply_to: Thread },
    /// Leave the command loop
    Stop,
}

/// Player thread → coordinator, one per `Sound`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOutcome {
    /// Every frame reached the sink
    Sounded,
    /// The sink could not be opened or failed mid-note; the note was dropped
    Skipped,
    /// A stop or cancel arrived before the note finished
    Cancelled,
}

pub trait CommandReceiver {
    fn pop(&mut self) -> Option<PlayerCommand>;

    /// True once the sending side has been dropped
    fn is_abandoned(&self) -> bool;
}

impl CommandReceiver for Consumer<PlayerCommand> {
    fn pop(&mut self) -> Option<PlayerCommand> {
        Consumer::pop(self).ok()
    }

    fn is_abandoned(&self) -> bool {
        Consumer::is_abandoned(self)
    }
}

pub trait OutcomeSender {
    /// Returns false if the outcome could not be queued
    fn send(&mut self, outcome: NoteOutcome) -> bool;
}

impl OutcomeSender for Producer<NoteOutcome> {
    fn send(&mut self, outcome: NoteOutcome) -> bool {
        self.push(outcome).is_ok()
    }
}
