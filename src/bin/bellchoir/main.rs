//! bellchoir - play score files on a hand-bell choir
//!
//! Run with: cargo run -- songs/mary_had_a_little_lamb.txt

mod app;

use app::{Args, BellChoir};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse(std::env::args().skip(1))?;
    BellChoir::new(args).run()
}
