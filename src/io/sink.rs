use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::sequencing::Pitch;

/// The audio sink could not take a player's samples
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    #[error("audio output disconnected")]
    Disconnected,
}

/// Destination for one note's 8-bit mono PCM.
///
/// `write` may block until the samples are accepted; `drain` blocks until
/// everything written has been played.
pub trait AudioSink: Send {
    fn write(&mut self, samples: &[i8]) -> Result<(), SinkError>;

    fn drain(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl AudioSink for Box<dyn AudioSink> {
    fn write(&mut self, samples: &[i8]) -> Result<(), SinkError> {
        (**self).write(samples)
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        (**self).drain()
    }
}

/// Opens a sink for a player each time it sounds a note.
///
/// This is the "bell" a player picks up: the choir hands one factory to all
/// players, and each opens its own sink per note.
pub trait SinkFactory: Send + Sync + 'static {
    type Sink: AudioSink;

    fn open(&self, pitch: Pitch) -> Result<Self::Sink, SinkError>;
}

impl<F, S> SinkFactory for F
where
    F: Fn(Pitch) -> Result<S, SinkError> + Send + Sync + 'static,
    S: AudioSink,
{
    type Sink = S;

    fn open(&self, pitch: Pitch) -> Result<Self::Sink, SinkError> {
        self(pitch)
    }
}

/// Discards everything immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, _samples: &[i8]) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Discards samples but takes as long as a device would to play them.
///
/// Used for headless runs and for exercising cancellation in tests.
#[derive(Debug, Clone)]
pub struct PacedSink {
    sample_rate: u32,
    /// When the last written sample finishes playing
    deadline: Option<Instant>,
}

impl PacedSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            deadline: None,
        }
    }

    /// A factory handing every player its own paced sink
    pub fn factory(sample_rate: u32) -> impl SinkFactory<Sink = PacedSink> + Clone {
        move |_pitch: Pitch| Ok::<_, SinkError>(PacedSink::new(sample_rate))
    }
}

impl AudioSink for PacedSink {
    fn write(&mut self, samples: &[i8]) -> Result<(), SinkError> {
        let now = Instant::now();
        let play_time =
            Duration::from_secs_f64(samples.len() as f64 / self.sample_rate.max(1) as f64);
        let start = self.deadline.map_or(now, |d| d.max(now));
        let deadline = start + play_time;
        self.deadline = Some(deadline);

        // One write of lookahead, like a small device buffer
        if start > now {
            thread::sleep(start - now);
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        if let Some(deadline) = self.deadline.take() {
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }
        Ok(())
    }
}

/// One note as seen by a [`Recorder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedNote {
    pub pitch: Pitch,
    pub frames: usize,
    /// Frames that were not silence
    pub audible_frames: usize,
    pub drained: bool,
}

#[derive(Debug, Default)]
struct RecorderState {
    notes: Vec<RecordedNote>,
    open_sinks: usize,
    max_open_sinks: usize,
    /// Notes dropped by `clear`; sink ids keep counting past them
    cleared: usize,
    fail_on: Vec<Pitch>,
}

impl RecorderState {
    fn note_mut(&mut self, id: usize) -> Option<&mut RecordedNote> {
        let index = id.checked_sub(self.cleared)?;
        self.notes.get_mut(index)
    }
}

/// Records every note the choir plays, in order.
///
/// Tracks how many sinks are open at once, which is how tests see that no
/// two bells ever ring together. Can be told to refuse certain pitches to
/// simulate an unavailable device.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<RecorderState>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opening a sink for any of `pitches` fails with `SinkError::Unavailable`
    pub fn failing_on(pitches: &[Pitch]) -> Self {
        let recorder = Self::new();
        recorder.lock().fail_on = pitches.to_vec();
        recorder
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        // A panicking test thread must not hide what was recorded
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn notes(&self) -> Vec<RecordedNote> {
        self.lock().notes.clone()
    }

    pub fn pitches(&self) -> Vec<Pitch> {
        self.lock().notes.iter().map(|n| n.pitch).collect()
    }

    /// Highest number of sinks that were ever open simultaneously
    pub fn max_concurrent(&self) -> usize {
        self.lock().max_open_sinks
    }

    pub fn open_now(&self) -> usize {
        self.lock().open_sinks
    }

    /// Forget the notes recorded so far. Sinks still open keep working but
    /// their notes are no longer reported.
    pub fn clear(&self) {
        let mut state = self.lock();
        let dropped = state.notes.len();
        state.cleared += dropped;
        state.notes.clear();
        state.max_open_sinks = state.open_sinks;
    }
}

impl SinkFactory for Recorder {
    type Sink = RecordingSink;

    fn open(&self, pitch: Pitch) -> Result<RecordingSink, SinkError> {
        let mut state = self.lock();
        if state.fail_on.contains(&pitch) {
            return Err(SinkError::Unavailable(format!("no bell for {pitch}")));
        }

        state.open_sinks += 1;
        state.max_open_sinks = state.max_open_sinks.max(state.open_sinks);
        let id = state.cleared + state.notes.len();
        state.notes.push(RecordedNote {
            pitch,
            frames: 0,
            audible_frames: 0,
            drained: false,
        });

        Ok(RecordingSink {
            recorder: self.clone(),
            id,
        })
    }
}

/// Sink handed out by [`Recorder`]; closes its slot when dropped
#[derive(Debug)]
pub struct RecordingSink {
    recorder: Recorder,
    id: usize,
}

impl AudioSink for RecordingSink {
    fn write(&mut self, samples: &[i8]) -> Result<(), SinkError> {
        let mut state = self.recorder.lock();
        if let Some(note) = state.note_mut(self.id) {
            note.frames += samples.len();
            note.audible_frames += samples.iter().filter(|&&s| s != 0).count();
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        if let Some(note) = self.recorder.lock().note_mut(self.id) {
            note.drained = true;
        }
        Ok(())
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        let mut state = self.recorder.lock();
        state.open_sinks = state.open_sinks.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_tracks_notes_and_overlap() {
        let recorder = Recorder::new();
        {
            let mut a = recorder.open(Pitch::A4).unwrap();
            a.write(&[1, 2, 0, 3]).unwrap();
            a.drain().unwrap();
        }
        {
            let mut b = recorder.open(Pitch::B4).unwrap();
            let _c = recorder.open(Pitch::C4).unwrap();
            b.write(&[0, 0]).unwrap();
        }

        let notes = recorder.notes();
        assert_eq!(recorder.pitches(), vec![Pitch::A4, Pitch::B4, Pitch::C4]);
        assert_eq!(notes[0].frames, 4);
        assert_eq!(notes[0].audible_frames, 3);
        assert!(notes[0].drained);
        assert!(!notes[1].drained);
        assert_eq!(recorder.max_concurrent(), 2);
        assert_eq!(recorder.open_now(), 0);
    }

    #[test]
    fn clearing_leaves_open_sinks_usable() {
        let recorder = Recorder::new();
        let mut old = recorder.open(Pitch::A4).unwrap();
        old.write(&[1, 1]).unwrap();

        recorder.clear();
        assert!(recorder.notes().is_empty());
        assert!(old.write(&[1, 2]).is_ok());
        assert!(old.drain().is_ok());

        let mut new = recorder.open(Pitch::B4).unwrap();
        new.write(&[3, 0, 3]).unwrap();
        drop(old);
        drop(new);

        let notes = recorder.notes();
        assert_eq!(recorder.pitches(), vec![Pitch::B4]);
        assert_eq!(notes[0].frames, 3);
        assert_eq!(notes[0].audible_frames, 2);
        assert_eq!(recorder.open_now(), 0);
    }

    #[test]
    fn recorder_can_refuse_pitches() {
        let recorder = Recorder::failing_on(&[Pitch::D4]);
        assert!(matches!(
            recorder.open(Pitch::D4),
            Err(SinkError::Unavailable(_))
        ));
        assert!(recorder.open(Pitch::E4).is_ok());
        assert_eq!(recorder.pitches(), vec![Pitch::E4]);
    }

    #[test]
    fn paced_sink_takes_real_time() {
        let mut sink = PacedSink::new(1000);
        let start = Instant::now();
        sink.write(&[0; 50]).unwrap();
        sink.write(&[0; 50]).unwrap();
        sink.drain().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn closures_are_factories() {
        let factory = |_pitch: Pitch| Ok::<_, SinkError>(NullSink);
        let mut sink = factory.open(Pitch::Rest).unwrap();
        assert!(sink.write(&[0; 16]).is_ok());
    }
}
