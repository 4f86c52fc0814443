use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use log::warn;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::duration::NoteLength;
use super::pitch::Pitch;

/// One beat of the score: which bell rings, and for how long
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreEvent {
    pub pitch: Pitch,
    pub length: NoteLength,
}

impl ScoreEvent {
    pub fn new(pitch: Pitch, length: NoteLength) -> Self {
        Self { pitch, length }
    }
}

impl fmt::Display for ScoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pitch.code(), self.length.code())
    }
}

/// A fully validated, ordered sequence of events.
///
/// Only the parser builds one, and it is immutable afterwards. There is
/// no partially-valid score: a source with any bad line yields a
/// [`ScoreRejection`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    events: Vec<ScoreEvent>,
}

impl Score {
    /// Parse score text. See [`parse`].
    pub fn parse(source: &str) -> Result<Score, ScoreRejection> {
        parse(source.lines())
    }

    /// Read and parse a score file.
    ///
    /// The outer error is the file read; the inner result is the parse.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Result<Score, ScoreRejection>> {
        let source = fs::read_to_string(path)?;
        Ok(Self::parse(&source))
    }

    pub fn events(&self) -> &[ScoreEvent] {
        &self.events
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Nominal playing time, each note capped at one measure
    pub fn total_ms(&self, measure_secs: u32) -> u64 {
        self.events
            .iter()
            .map(|e| e.length.time_ms(measure_secs))
            .sum()
    }
}

impl<'a> IntoIterator for &'a Score {
    type Item = &'a ScoreEvent;
    type IntoIter = std::slice::Iter<'a, ScoreEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineErrorKind {
    #[error("expected `<PITCH> <LENGTH>` separated by one space, found {0} field(s)")]
    WrongTokenCount(usize),

    #[error("unknown pitch `{0}`")]
    UnknownPitch(String),

    #[error("unknown note length `{0}`")]
    UnknownLength(String),
}

/// A malformed score line. `line` is 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct LineError {
    pub line: usize,
    pub kind: LineErrorKind,
}

/// Whole-score rejection carrying every offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRejection {
    pub errors: Vec<LineError>,
}

impl fmt::Display for ScoreRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "score rejected with {} invalid line(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ScoreRejection {}

fn is_token(field: &str) -> bool {
    !field.is_empty() && !field.contains(char::is_whitespace)
}

/// Parse one non-blank line into an event.
///
/// Fields are split on single spaces, so padding, tabs and doubled spaces
/// all make a malformed line. A trailing `\r` is dropped.
fn parse_line(line: &str) -> Result<ScoreEvent, LineErrorKind> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let fields: Vec<&str> = line.split(' ').collect();
    let (pitch, length) = match fields.as_slice() {
        [pitch, length] if is_token(pitch) && is_token(length) => (*pitch, *length),
        _ => return Err(LineErrorKind::WrongTokenCount(fields.len())),
    };

    let pitch =
        Pitch::from_code(pitch).ok_or_else(|| LineErrorKind::UnknownPitch(pitch.to_string()))?;
    let length = NoteLength::from_code(length)
        .ok_or_else(|| LineErrorKind::UnknownLength(length.to_string()))?;

    Ok(ScoreEvent::new(pitch, length))
}

/// Parse score lines of the form `<PITCH> <LENGTH>`.
///
/// Blank (or whitespace-only) lines are skipped. Every remaining line is
/// checked, even after a failure, so the rejection lists all bad lines at
/// once. Empty input is a valid, empty score.
pub fn parse<I, S>(lines: I) -> Result<Score, ScoreRejection>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut events = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(event) => events.push(event),
            Err(kind) => {
                let error = LineError {
                    line: idx + 1,
                    kind,
                };
                warn!("{error}");
                errors.push(error);
            }
        }
    }

    if errors.is_empty() {
        Ok(Score { events })
    } else {
        Err(ScoreRejection { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_score() {
        let score = Score::parse("A4 4").unwrap();
        assert_eq!(
            score.events(),
            &[ScoreEvent::new(Pitch::A4, NoteLength::Quarter)]
        );
    }

    #[test]
    fn one_bad_line_rejects_the_whole_score() {
        let rejection = Score::parse("A4 4\nXX 4").unwrap_err();
        assert_eq!(
            rejection.errors,
            vec![LineError {
                line: 2,
                kind: LineErrorKind::UnknownPitch("XX".into()),
            }]
        );
    }

    #[test]
    fn empty_input_is_an_empty_score() {
        let score = Score::parse("").unwrap();
        assert!(score.is_empty());
        assert_eq!(score.len(), 0);
    }

    #[test]
    fn blank_lines_are_skipped_but_count_toward_line_numbers() {
        let rejection = Score::parse("\nA4 4\n   \n\t\nB4 9\n").unwrap_err();
        assert_eq!(rejection.errors.len(), 1);
        assert_eq!(rejection.errors[0].line, 5);
        assert_eq!(
            rejection.errors[0].kind,
            LineErrorKind::UnknownLength("9".into())
        );

        let score = Score::parse("\n\nA4 4\n\nB4 8\n\n").unwrap();
        assert_eq!(score.len(), 2);
    }

    #[test]
    fn every_bad_line_is_reported() {
        let source = "A4 4\nA4\nH2 4\nC4 3\nD4 4 extra\nREST 2";
        let rejection = Score::parse(source).unwrap_err();

        let found: Vec<(usize, LineErrorKind)> = rejection
            .errors
            .into_iter()
            .map(|e| (e.line, e.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                (2, LineErrorKind::WrongTokenCount(1)),
                (3, LineErrorKind::UnknownPitch("H2".into())),
                (4, LineErrorKind::UnknownLength("3".into())),
                (5, LineErrorKind::WrongTokenCount(3)),
            ]
        );
    }

    #[test]
    fn order_is_preserved() {
        let score = Score::parse("E4 4\nD4 4\nC4 2\nREST 8\nA5 1").unwrap();
        let pitches: Vec<Pitch> = score.iter().map(|e| e.pitch).collect();
        assert_eq!(
            pitches,
            vec![Pitch::E4, Pitch::D4, Pitch::C4, Pitch::Rest, Pitch::A5]
        );
        assert_eq!(score.events()[3].length, NoteLength::Eighth);
    }

    #[test]
    fn accepts_crlf_line_endings() {
        let score = Score::parse("G4S 8\r\nF4S 2\r\n").unwrap();
        assert_eq!(
            score.events(),
            &[
                ScoreEvent::new(Pitch::Gs4, NoteLength::Eighth),
                ScoreEvent::new(Pitch::Fs4, NoteLength::Half),
            ]
        );

        let lines = ["A4 4\r", "B4 8\r"];
        assert_eq!(parse(lines).unwrap().len(), 2);
    }

    #[test]
    fn fields_must_be_separated_by_one_space() {
        let source = "B4  4\n A4 4\nA4 4 \nA4\t4\nA4 \t4\nC4 4";
        let rejection = Score::parse(source).unwrap_err();

        let found: Vec<(usize, LineErrorKind)> = rejection
            .errors
            .into_iter()
            .map(|e| (e.line, e.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                (1, LineErrorKind::WrongTokenCount(3)),
                (2, LineErrorKind::WrongTokenCount(3)),
                (3, LineErrorKind::WrongTokenCount(3)),
                (4, LineErrorKind::WrongTokenCount(1)),
                (5, LineErrorKind::WrongTokenCount(2)),
            ]
        );
        assert!(Score::parse("B4  4").is_err());
    }

    #[test]
    fn accepts_any_line_iterator() {
        let lines = vec![String::from("A4 1"), String::new(), String::from("REST 4")];
        let score = parse(lines).unwrap();
        assert_eq!(score.len(), 2);
    }

    #[test]
    fn total_ms_sums_lengths() {
        let score = Score::parse("A4 1\nB4 2\nC4 4\nD4 8").unwrap();
        assert_eq!(score.total_ms(1), 1875);
        assert_eq!(score.total_ms(2), 3750);
    }

    #[test]
    fn rejection_display_lists_lines() {
        let rejection = Score::parse("XX 4\nA4 0").unwrap_err();
        let text = rejection.to_string();
        assert!(text.contains("2 invalid line(s)"));
        assert!(text.contains("line 1: unknown pitch `XX`"));
        assert!(text.contains("line 2: unknown note length `0`"));
    }

    #[test]
    fn event_display_uses_score_codes() {
        let event = ScoreEvent::new(Pitch::As4, NoteLength::Half);
        assert_eq!(event.to_string(), "A4S 2");
    }

    #[test]
    fn bundled_songs_parse() {
        let root = env!("CARGO_MANIFEST_DIR");
        let mary = Score::from_path(format!("{root}/songs/mary_had_a_little_lamb.txt"))
            .unwrap()
            .unwrap();
        assert!(!mary.is_empty());
        assert_eq!(mary.events()[0], ScoreEvent::new(Pitch::E4, NoteLength::Quarter));

        let bad = Score::from_path(format!("{root}/songs/bad_song.txt"))
            .unwrap()
            .unwrap_err();
        let lines: Vec<usize> = bad.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 5, 6, 7]);
        assert_eq!(bad.errors[1].kind, LineErrorKind::WrongTokenCount(3));
    }
}
