/*
Pitch Catalog
=============

The choir owns exactly one bell per pitch. The set is closed: a rest
pseudo-pitch plus the chromatic octave from A4 up to A5.

Codes (as written in score files):
  REST  A4  A4S  B4  C4  C4S  D4  D4S  E4  F4  F4S  G4  G4S  A5

The ordering is significant. Each pitch sits one half step above the one
before it, counting from A4, so `C4` here is three half steps above A4 (the
bell labelled C4 in the set, not MIDI C4).

Equal-tempered tuning:
  freq = reference * 2^(half_steps / 12)

Waveform synthesis:
  sample[i] = round(sin(i * 2π * freq / sample_rate) * max_volume)

for i in [0, sample_rate * measure_secs). Every buffer is exactly one
measure long; REST is all zeros of the same length so a rest plays silence
for its duration like any other bell.
*/

use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{ChoirConfig, ConfigError};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pitch {
    Rest,
    A4,
    As4,
    B4,
    C4,
    Cs4,
    D4,
    Ds4,
    E4,
    F4,
    Fs4,
    G4,
    Gs4,
    A5,
}

impl Pitch {
    /// Every pitch in catalog order, REST first.
    pub const ALL: [Pitch; 14] = [
        Pitch::Rest,
        Pitch::A4,
        Pitch::As4,
        Pitch::B4,
        Pitch::C4,
        Pitch::Cs4,
        Pitch::D4,
        Pitch::Ds4,
        Pitch::E4,
        Pitch::F4,
        Pitch::Fs4,
        Pitch::G4,
        Pitch::Gs4,
        Pitch::A5,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Position in `Pitch::ALL`
    pub fn index(self) -> usize {
        self as usize
    }

    /// Textual code used in score files
    pub fn code(self) -> &'static str {
        match self {
            Pitch::Rest => "REST",
            Pitch::A4 => "A4",
            Pitch::As4 => "A4S",
            Pitch::B4 => "B4",
            Pitch::C4 => "C4",
            Pitch::Cs4 => "C4S",
            Pitch::D4 => "D4",
            Pitch::Ds4 => "D4S",
            Pitch::E4 => "E4",
            Pitch::F4 => "F4",
            Pitch::Fs4 => "F4S",
            Pitch::G4 => "G4",
            Pitch::Gs4 => "G4S",
            Pitch::A5 => "A5",
        }
    }

    /// Look up a pitch by its score code. Codes are case-sensitive.
    pub fn from_code(code: &str) -> Option<Pitch> {
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }

    pub fn is_rest(self) -> bool {
        self == Pitch::Rest
    }

    /// Half steps above the A4 reference, or None for REST
    pub fn half_steps(self) -> Option<i32> {
        match self {
            Pitch::Rest => None,
            other => Some(other.index() as i32 - 1),
        }
    }

    /// Equal-tempered frequency in Hz given the A4 reference frequency
    pub fn frequency(self, reference_hz: f64) -> Option<f64> {
        self.half_steps()
            .map(|steps| reference_hz * 2.0_f64.powf(steps as f64 / 12.0))
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Render one measure of signed 8-bit PCM for `pitch`.
///
/// Pure: the same pitch and configuration always give a bit-identical buffer.
pub fn synthesize(pitch: Pitch, config: &ChoirConfig) -> Vec<i8> {
    let len = config.measure_frames();
    let Some(freq) = pitch.frequency(config.reference_hz) else {
        return vec![0; len];
    };

    let step = freq * TAU / config.sample_rate as f64;
    (0..len)
        .map(|i| ((i as f64 * step).sin() * config.max_volume).round() as i8)
        .collect()
}

/// Every pitch's waveform, synthesized once and shared read-only.
#[derive(Debug, Clone)]
pub struct PitchCatalog {
    config: Arc<ChoirConfig>,
    waveforms: Vec<Arc<[i8]>>,
}

impl PitchCatalog {
    pub fn new(config: ChoirConfig) -> Result<Self, ConfigError> {
        Self::from_shared(Arc::new(config))
    }

    pub fn from_shared(config: Arc<ChoirConfig>) -> Result<Self, ConfigError> {
        config.validate()?;
        let waveforms = Pitch::ALL
            .iter()
            .map(|&pitch| Arc::from(synthesize(pitch, &config)))
            .collect();

        Ok(Self { config, waveforms })
    }

    pub fn config(&self) -> &Arc<ChoirConfig> {
        &self.config
    }

    pub fn waveform(&self, pitch: Pitch) -> &Arc<[i8]> {
        &self.waveforms[pitch.index()]
    }

    pub fn pitches(&self) -> impl Iterator<Item = Pitch> {
        Pitch::ALL.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Eight samples per second with A4 tuned to 2 Hz puts a quarter cycle
    /// between consecutive samples.
    fn tiny_config() -> ChoirConfig {
        ChoirConfig::new()
            .with_sample_rate(8)
            .with_reference_hz(2.0)
    }

    #[test]
    fn codes_round_trip_for_every_pitch() {
        for pitch in Pitch::ALL {
            assert_eq!(Pitch::from_code(pitch.code()), Some(pitch));
        }
        assert_eq!(Pitch::from_code("XX"), None);
        assert_eq!(Pitch::from_code("a4"), None);
    }

    #[test]
    fn rest_comes_first_and_index_matches_order() {
        assert_eq!(Pitch::ALL[0], Pitch::Rest);
        for (i, pitch) in Pitch::ALL.iter().enumerate() {
            assert_eq!(pitch.index(), i);
        }
    }

    #[test]
    fn equal_tempered_frequencies() {
        assert_eq!(Pitch::Rest.frequency(440.0), None);
        assert_eq!(Pitch::A4.frequency(440.0), Some(440.0));

        let a5 = Pitch::A5.frequency(440.0).unwrap();
        assert!((a5 - 880.0).abs() < 1e-9);

        // E4 in this set is seven half steps above A4
        let e = Pitch::E4.frequency(440.0).unwrap();
        assert!((e - 659.255).abs() < 0.01);
    }

    #[test]
    fn golden_samples_for_a4() {
        let wave = synthesize(Pitch::A4, &tiny_config());
        assert_eq!(wave, vec![0, 127, 0, -127, 0, 127, 0, -127]);
    }

    #[test]
    fn golden_samples_for_a5_land_on_zero_crossings() {
        let wave = synthesize(Pitch::A5, &tiny_config());
        assert_eq!(wave, vec![0; 8]);
    }

    #[test]
    fn synthesis_is_deterministic() {
        let config = ChoirConfig::default();
        for pitch in Pitch::ALL {
            assert_eq!(synthesize(pitch, &config), synthesize(pitch, &config));
        }
    }

    #[test]
    fn every_buffer_is_one_measure_long() {
        let config = ChoirConfig::default();
        for pitch in Pitch::ALL {
            assert_eq!(synthesize(pitch, &config).len(), config.measure_frames());
        }
    }

    #[test]
    fn rest_is_silent() {
        let wave = synthesize(Pitch::Rest, &ChoirConfig::default());
        assert!(wave.iter().all(|&s| s == 0));
    }

    #[test]
    fn amplitude_respects_max_volume() {
        let config = ChoirConfig::default().with_max_volume(64.0);
        let wave = synthesize(Pitch::Cs4, &config);
        assert!(wave.iter().all(|&s| (-64..=64).contains(&s)));
        assert!(wave.iter().any(|&s| s == 64 || s == -64));
    }

    #[test]
    fn catalog_caches_the_synthesized_buffers() {
        let catalog = PitchCatalog::new(tiny_config()).unwrap();
        assert_eq!(catalog.pitches().count(), Pitch::COUNT);
        assert_eq!(
            &catalog.waveform(Pitch::A4)[..],
            &synthesize(Pitch::A4, catalog.config())[..]
        );
        // Same allocation on every lookup
        assert!(Arc::ptr_eq(
            catalog.waveform(Pitch::B4),
            catalog.waveform(Pitch::B4)
        ));
    }

    #[test]
    fn catalog_rejects_invalid_config() {
        let result = PitchCatalog::new(ChoirConfig::default().with_sample_rate(0));
        assert!(matches!(result, Err(ConfigError::ZeroSampleRate)));
    }
}
