use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use thiserror::Error;

use super::message::NoteOutcome;
use super::player::{Player, PlayerError};
use crate::config::{ChoirConfig, ConfigError};
use crate::io::sink::SinkFactory;
use crate::sequencing::{Pitch, PitchCatalog, Score, ScoreRejection};

/// Bell-ringers, one per pitch in catalog order
const ROSTER: [&str; Pitch::COUNT] = [
    "Agnes", "Bram", "Cora", "Dmitri", "Edda", "Felix", "Greta", "Hugo", "Ines", "Jonas",
    "Kaia", "Lorenz", "Mira", "Nils",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceOutcome {
    /// Nothing was loaded (or the loaded score was rejected); no bell rang
    NoScore,
    /// Every event was dispatched. `skipped` notes could not reach the sink.
    Completed { notes: usize, skipped: usize },
    /// Cancelled part way; `played` notes had finished
    Cancelled { played: usize },
}

#[derive(Error, Debug)]
pub enum ChoirError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Player(#[from] PlayerError),
}

/// Cancels a performance from any thread
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Interrupt the note in progress and skip the rest of the score.
    ///
    /// Applies to the running performance, or to the next one if none is
    /// running. Cleared when that performance returns.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// The conductor and the full ensemble.
///
/// Walks a score in order, handing each event to the player that owns its
/// pitch and waiting for that note to finish before moving on. That wait is
/// the whole ordering guarantee: at most one bell rings at any moment.
pub struct Choir<F: SinkFactory> {
    catalog: PitchCatalog,
    players: Vec<Player<F>>,
    score: Option<Arc<Score>>,
    cancel: Arc<AtomicBool>,
}

impl<F: SinkFactory> Choir<F> {
    /// Recruit one player per pitch in the catalog
    pub fn assemble(catalog: &PitchCatalog, factory: F) -> Self {
        let factory = Arc::new(factory);
        let cancel = Arc::new(AtomicBool::new(false));

        let players: Vec<Player<F>> = catalog
            .pitches()
            .map(|pitch| {
                Player::new(
                    pitch,
                    ROSTER[pitch.index()],
                    catalog,
                    factory.clone(),
                    cancel.clone(),
                )
            })
            .collect();
        info!("choir recruited: {} players", players.len());

        Self {
            catalog: catalog.clone(),
            players,
            score: None,
            cancel,
        }
    }

    /// Build the catalog from `config` and assemble around it
    pub fn with_config(config: ChoirConfig, factory: F) -> Result<Self, ChoirError> {
        let catalog = PitchCatalog::new(config)?;
        Ok(Self::assemble(&catalog, factory))
    }

    pub fn catalog(&self) -> &PitchCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ChoirConfig {
        self.catalog.config()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player<F>> {
        self.players.iter()
    }

    pub fn player(&self, pitch: Pitch) -> &Player<F> {
        &self.players[pitch.index()]
    }

    /// Replace the score used by the next performance
    pub fn load_score(&mut self, score: Score) {
        self.score = Some(Arc::new(score));
    }

    /// Load a parse result. A rejected score unloads whatever was there,
    /// so the next `perform` reports that nothing is playable.
    pub fn load_parsed(&mut self, parsed: Result<Score, ScoreRejection>) {
        match parsed {
            Ok(score) => self.load_score(score),
            Err(rejection) => {
                warn!("{rejection}");
                self.score = None;
            }
        }
    }

    pub fn clear_score(&mut self) {
        self.score = None;
    }

    pub fn score(&self) -> Option<&Score> {
        self.score.as_deref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: self.cancel.clone(),
        }
    }

    /// Play the loaded score from start to finish.
    ///
    /// Every player is started, the events are dispatched one at a time, and
    /// every player is stopped and joined before this returns, whatever
    /// happened in between.
    pub fn perform(&mut self) -> Result<PerformanceOutcome, ChoirError> {
        let Some(score) = self.score.clone() else {
            warn!("no playable score loaded");
            return Ok(PerformanceOutcome::NoScore);
        };

        info!(
            "performing {} notes (~{} ms)",
            score.len(),
            score.total_ms(self.config().measure_secs)
        );

        let result = self.start_all().and_then(|()| self.ring(&score));

        self.stop_all();
        let joined = self.join_all();
        self.cancel.store(false, Ordering::Release);

        let outcome = result?;
        joined?;
        info!("performance finished: {outcome:?}");
        Ok(outcome)
    }

    fn start_all(&mut self) -> Result<(), ChoirError> {
        for player in &mut self.players {
            player.start()?;
        }
        Ok(())
    }

    fn ring(&mut self, score: &Score) -> Result<PerformanceOutcome, ChoirError> {
        let mut notes = 0;
        let mut skipped = 0;

        for (i, event) in score.iter().enumerate() {
            if self.cancel.load(Ordering::Acquire) {
                info!("performance cancelled after {notes} notes");
                return Ok(PerformanceOutcome::Cancelled { played: notes });
            }

            let player = &mut self.players[event.pitch.index()];
            debug!(
                "#{}: {} rings {} for a {:?} note",
                i + 1,
                player.name(),
                event.pitch,
                event.length
            );

            match player.sound(event.length)? {
                NoteOutcome::Sounded => notes += 1,
                NoteOutcome::Skipped => skipped += 1,
                NoteOutcome::Cancelled => {
                    info!("performance cancelled during note #{}", i + 1);
                    return Ok(PerformanceOutcome::Cancelled { played: notes });
                }
            }
        }

        Ok(PerformanceOutcome::Completed { notes, skipped })
    }

    fn stop_all(&mut self) {
        for player in &mut self.players {
            player.stop();
        }
    }

    /// Join every player, even if some fail; reports the first failure
    fn join_all(&mut self) -> Result<(), ChoirError> {
        let mut first = None;
        for player in &mut self.players {
            if let Err(e) = player.join() {
                error!("{e}");
                if first.is_none() {
                    first = Some(e);
                }
            }
        }
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
