#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::ChoirConfig;

/// Symbolic note length as a fraction of one measure.
/// Lengths halve at each step and are kept as integer denominators,
/// so millisecond values never drift.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteLength {
    Whole,
    Half,
    Quarter,
    Eighth,
}

impl NoteLength {
    /// Longest to shortest
    pub const ALL: [NoteLength; 4] = [
        NoteLength::Whole,
        NoteLength::Half,
        NoteLength::Quarter,
        NoteLength::Eighth,
    ];

    /// Parts per measure: 1, 2, 4 or 8. Doubles as the score code.
    pub const fn denominator(self) -> u32 {
        match self {
            NoteLength::Whole => 1,
            NoteLength::Half => 2,
            NoteLength::Quarter => 4,
            NoteLength::Eighth => 8,
        }
    }

    /// Fraction of a measure (1.0, 0.5, 0.25, 0.125)
    pub fn fraction(self) -> f64 {
        1.0 / self.denominator() as f64
    }

    pub fn code(self) -> &'static str {
        match self {
            NoteLength::Whole => "1",
            NoteLength::Half => "2",
            NoteLength::Quarter => "4",
            NoteLength::Eighth => "8",
        }
    }

    pub fn from_code(code: &str) -> Option<NoteLength> {
        Self::ALL.iter().copied().find(|l| l.code() == code)
    }

    /// Playback time in milliseconds for a measure of `measure_secs` seconds
    pub const fn time_ms(self, measure_secs: u32) -> u64 {
        measure_secs as u64 * 1000 / self.denominator() as u64
    }

    /// Frames a player emits for this length.
    ///
    /// The time is capped at one measure, since a bell's waveform is only
    /// one measure long.
    pub fn frames(self, config: &ChoirConfig) -> usize {
        let ms = self.time_ms(config.measure_secs).min(config.measure_ms());
        (config.sample_rate as u64 * ms / 1000) as usize
    }
}
