// Purpose: the players and the conductor that sequences them
// One thread per pitch; the choir hands out notes strictly one at a time

pub mod choir;
pub mod message;
pub mod player;

pub use choir::{CancelHandle, Choir, ChoirError, PerformanceOutcome};
pub use message::NoteOutcome;
pub use player::{Player, PlayerError, PlayerState};
