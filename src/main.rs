mod config;
mod grid;
mod input;
mod levels;
mod logger;
mod pathfinder;
mod rng;
mod session;
mod snake;
mod term;

use std::path::PathBuf;
use std::thread::sleep;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::config::Settings;
use crate::levels::{list_levels, FileLevels};
use crate::rng::SessionRng;
use crate::session::Session;
use crate::term::TermManager;

#[derive(Parser)]
#[command(name = "snaze")]
#[command(version, about = "Snake in a maze, played by hand or by a bot")]
struct Cli {
    /// Directory holding one level per file
    #[arg(default_value = "levels")]
    levels: PathBuf,

    /// YAML settings file; defaults are used when it doesn't exist
    #[arg(default_value = "snaze.yaml")]
    config: PathBuf,

    /// Seed for food placement, level order and bot moves
    #[arg(long)]
    seed: Option<u64>,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.log_file {
        logger::init(path)?;
    }

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    let levels = list_levels(&cli.levels)
        .with_context(|| format!("listing levels in {}", cli.levels.display()))?;
    let rng = match cli.seed {
        Some(seed) => SessionRng::new(seed),
        None => SessionRng::from_random(),
    };
    info!(seed = rng.seed(), ?settings, "starting snaze");

    let mut session = Session::new(settings, levels, Box::new(FileLevels), rng)
        .with_context(|| format!("no level files in {}", cli.levels.display()))?;

    let mut term = TermManager::new()?;
    run(&mut session, &mut term)
}

/// Input, update and draw, once per frame, until the player quits.
fn run(session: &mut Session, term: &mut TermManager) -> Result<()> {
    term.present(&session.view())?;

    while !session.is_finished() {
        session.collect_input(term)?;
        session.advance()?;
        term.present(&session.view())?;

        if let Some(delay) = session.frame_delay() {
            sleep(delay);
        }
    }

    info!(score = session.score(), lives = session.lives(), "session finished");
    Ok(())
}
