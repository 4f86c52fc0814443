//! Command-line host: argument parsing and the performance loop

use std::path::PathBuf;

use color_eyre::eyre::{bail, eyre, Result as EyreResult, WrapErr};
use log::{info, warn};

use bellchoir::{
    io::{DeviceOutput, PacedSink, SinkFactory},
    Choir, ChoirConfig, PerformanceOutcome, Score,
};

const USAGE: &str = "Usage: bellchoir [--silent] [--sample-rate N] <score>...";

#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    /// Pace playback in real time without opening a sound device
    pub silent: bool,
    pub sample_rate: u32,
    pub scores: Vec<PathBuf>,
}

impl Args {
    pub fn parse(args: impl IntoIterator<Item = String>) -> EyreResult<Self> {
        let mut parsed = Args {
            silent: false,
            sample_rate: ChoirConfig::DEFAULT_SAMPLE_RATE,
            scores: Vec::new(),
        };

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--silent" => parsed.silent = true,
                "--sample-rate" => {
                    let value = args
                        .next()
                        .ok_or_else(|| eyre!("--sample-rate needs a value\n{}", USAGE))?;
                    parsed.sample_rate = value
                        .parse()
                        .wrap_err_with(|| format!("invalid sample rate `{value}`"))?;
                }
                "-h" | "--help" => bail!(USAGE),
                flag if flag.starts_with("--") => bail!("unknown option `{}`\n{}", flag, USAGE),
                path => parsed.scores.push(PathBuf::from(path)),
            }
        }

        if parsed.scores.is_empty() {
            bail!(USAGE);
        }
        Ok(parsed)
    }
}

pub struct BellChoir {
    args: Args,
}

impl BellChoir {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    pub fn run(self) -> EyreResult<()> {
        let config = ChoirConfig::new().with_sample_rate(self.args.sample_rate);

        if self.args.silent {
            info!("silent mode: no audio device");
            let factory = PacedSink::factory(config.sample_rate);
            return self.perform_all(config, factory);
        }

        // The stream must outlive the performances
        let (output, factory) =
            DeviceOutput::open(config.sample_rate).wrap_err("failed to open audio output")?;
        info!(
            "audio: {} Hz, {} channel(s)",
            output.device_rate, output.channels
        );
        self.perform_all(config, factory)
    }

    fn perform_all<F: SinkFactory>(&self, config: ChoirConfig, factory: F) -> EyreResult<()> {
        let mut choir = Choir::with_config(config, factory).wrap_err("failed to assemble choir")?;

        for path in &self.args.scores {
            info!("loading {}", path.display());
            let parsed = Score::from_path(path)
                .wrap_err_with(|| format!("failed to read score `{}`", path.display()))?;
            choir.load_parsed(parsed);

            match choir.perform()? {
                PerformanceOutcome::NoScore => warn!("{}: invalid song, skipped", path.display()),
                PerformanceOutcome::Completed { notes, skipped } => {
                    info!("{}: {notes} notes played, {skipped} skipped", path.display())
                }
                PerformanceOutcome::Cancelled { played } => {
                    info!("{}: stopped after {played} notes", path.display())
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> EyreResult<Args> {
        Args::parse(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags_and_paths() {
        let parsed = args(&["--silent", "--sample-rate", "8000", "a.txt", "b.txt"]).unwrap();
        assert!(parsed.silent);
        assert_eq!(parsed.sample_rate, 8000);
        assert_eq!(parsed.scores, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
    }

    #[test]
    fn defaults_to_the_standard_rate() {
        let parsed = args(&["song.txt"]).unwrap();
        assert!(!parsed.silent);
        assert_eq!(parsed.sample_rate, 49_152);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(args(&[]).is_err());
        assert!(args(&["--sample-rate"]).is_err());
        assert!(args(&["--sample-rate", "fast", "a.txt"]).is_err());
        assert!(args(&["--loud", "a.txt"]).is_err());
    }
}
