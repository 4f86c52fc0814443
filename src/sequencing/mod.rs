pub mod duration;
pub mod pitch;
pub mod score;

pub use duration::NoteLength;
pub use pitch::{synthesize, Pitch, PitchCatalog};
pub use score::{parse, LineError, LineErrorKind, Score, ScoreEvent, ScoreRejection};
