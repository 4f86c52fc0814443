pub mod config;
pub mod io; // Audio sinks
pub mod sequencing; // Pitches, note lengths and scores
pub mod synth; // Players and the choir that conducts them

pub use config::{ChoirConfig, ConfigError};
pub use sequencing::{NoteLength, Pitch, PitchCatalog, Score, ScoreEvent, ScoreRejection};
pub use synth::{CancelHandle, Choir, ChoirError, PerformanceOutcome};
