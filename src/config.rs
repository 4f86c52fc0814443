#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host-supplied settings shared by the pitch catalog and the choir.
///
/// Built once at startup and handed around explicitly (usually behind an
/// `Arc`). Nothing in the crate reads configuration from globals.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ChoirConfig {
    /// Samples per second of the 8-bit mono PCM the players emit
    pub sample_rate: u32,
    /// Length of one measure (a whole note) in seconds
    pub measure_secs: u32,
    /// Frequency of A4 in Hz; every other pitch is tuned relative to it
    pub reference_hz: f64,
    /// Peak amplitude of a synthesized sample (at most 127 for i8 PCM)
    pub max_volume: f64,
    /// Frames handed to a sink per write; cancellation is checked between writes
    pub chunk_frames: usize,
    /// Silent frames appended after every note so repeated pitches stay distinct
    pub note_gap_frames: usize,
}

impl ChoirConfig {
    pub const DEFAULT_SAMPLE_RATE: u32 = 48 * 1024;

    /// Longest measure `validate` accepts
    pub const MAX_MEASURE_SECS: u32 = 3600;

    pub fn new() -> Self {
        Self {
            sample_rate: Self::DEFAULT_SAMPLE_RATE,
            measure_secs: 1,
            reference_hz: 440.0,
            max_volume: 127.0,
            chunk_frames: 1024,
            note_gap_frames: 5,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_measure_secs(mut self, measure_secs: u32) -> Self {
        self.measure_secs = measure_secs;
        self
    }

    pub fn with_reference_hz(mut self, reference_hz: f64) -> Self {
        self.reference_hz = reference_hz;
        self
    }

    pub fn with_max_volume(mut self, max_volume: f64) -> Self {
        self.max_volume = max_volume;
        self
    }

    pub fn with_chunk_frames(mut self, chunk_frames: usize) -> Self {
        self.chunk_frames = chunk_frames;
        self
    }

    pub fn with_note_gap_frames(mut self, note_gap_frames: usize) -> Self {
        self.note_gap_frames = note_gap_frames;
        self
    }

    /// Number of frames in one full measure, which is also the length of
    /// every synthesized waveform.
    pub fn measure_frames(&self) -> usize {
        self.sample_rate as usize * self.measure_secs as usize
    }

    /// Length of one measure in milliseconds
    pub fn measure_ms(&self) -> u64 {
        self.measure_secs as u64 * 1000
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.measure_secs == 0 {
            return Err(ConfigError::ZeroMeasure);
        }
        if self.measure_secs > Self::MAX_MEASURE_SECS {
            return Err(ConfigError::MeasureTooLong(self.measure_secs));
        }
        if self.chunk_frames == 0 {
            return Err(ConfigError::ZeroChunk);
        }
        if !self.reference_hz.is_finite() || self.reference_hz <= 0.0 {
            return Err(ConfigError::BadReference(self.reference_hz));
        }
        if !(self.max_volume > 0.0 && self.max_volume <= i8::MAX as f64) {
            return Err(ConfigError::BadVolume(self.max_volume));
        }
        Ok(())
    }
}

impl Default for ChoirConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("measure length must be at least one second")]
    ZeroMeasure,

    #[error("measure length must be at most {} seconds, got {0}", ChoirConfig::MAX_MEASURE_SECS)]
    MeasureTooLong(u32),

    #[error("chunk size must be at least one frame")]
    ZeroChunk,

    #[error("reference frequency must be a positive number of Hz, got {0}")]
    BadReference(f64),

    #[error("max volume must be in (0, 127], got {0}")]
    BadVolume(f64),
}
