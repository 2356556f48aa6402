//! CLAIMWAR CLI - Run a tournament between bot programs
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: main() / run() - orchestration
//! - Level 2: setup (scratch files, roster, lineup), tournament, final report
//! - Level 3: per-round reporting
//! - Level 4: formatting utilities (see `report`)

mod report;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use claimwar_tournament::{roster, run_tournament, Bot, TournamentConfig, DEFAULT_ROUNDS};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "claimwar")]
#[command(about = "Referee a CLAIMWAR tournament between bot programs")]
struct Cli {
    /// Tag bots with initials and dump the board after each round
    #[arg(short, long)]
    verbose: bool,

    /// Roster file: alternating name and command lines, `#` comments
    #[arg(long, value_name = "FILE", default_value = "bots.txt")]
    roster: PathBuf,

    /// Directory whose subdirectories get a fresh data.txt before play
    #[arg(long, value_name = "DIR", default_value = "bots")]
    bots_dir: PathBuf,

    /// Random seed (enemy orderings, scoring)
    #[arg(long)]
    seed: Option<u64>,

    /// Milliseconds a bot gets to answer each prompt
    #[arg(long, default_value = "2000")]
    move_deadline_ms: u64,

    /// Milliseconds a bot gets to exit after its score
    #[arg(long, default_value = "1000")]
    shutdown_deadline_ms: u64,

    /// Scoring trials per active top-row vertex (default: number of bots)
    #[arg(long)]
    trials: Option<usize>,

    /// Print final results as JSON
    #[arg(long)]
    json: bool,

    /// Number of rounds
    #[arg(value_name = "ROUNDS")]
    rounds: Option<usize>,
}

impl Cli {
    fn config(&self) -> TournamentConfig {
        let mut config = TournamentConfig::default()
            .with_rounds(self.rounds.unwrap_or(DEFAULT_ROUNDS))
            .with_move_deadline(Duration::from_millis(self.move_deadline_ms))
            .with_shutdown_deadline(Duration::from_millis(self.shutdown_deadline_ms))
            .with_verbose(self.verbose);
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(trials) = self.trials {
            config = config.with_trials_per_vertex(trials);
        }
        config
    }
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(&cli)
}

/// 1. Reset scratch files and load the roster
/// 2. Play every round, reporting as we go
/// 3. Report final standings
///
/// With `--json`, progress goes to stderr and stdout carries only the result.
fn run(cli: &Cli) -> Result<()> {
    let config = cli.config();
    let mut rng = config.rng();

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let progress: &mut dyn Write = if cli.json { &mut stderr } else { &mut stdout };

    let mut bots = setup(progress, cli, &config, &mut rng)?;
    report::print_lineup(progress, &bots, config.verbose)?;

    // Board dumps pick among joint owners at random
    let mut display_rng = config.rng();

    writeln!(progress, "Running {} rounds.", config.rounds)?;
    let result = run_tournament(&mut bots, &config, &mut rng, |round, outcome, bots| {
        if let Err(e) = report::print_round(progress, round, outcome, bots, config.verbose, &mut display_rng) {
            tracing::warn!("Failed to report round {}: {}", round, e);
        }
    });

    if cli.json {
        report::print_json(&mut io::stdout(), &result)?;
    } else {
        report::print_final(progress, &result)?;
    }
    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn setup(
    progress: &mut dyn Write,
    cli: &Cli,
    config: &TournamentConfig,
    rng: &mut rand_chacha::ChaCha8Rng,
) -> Result<Vec<Bot>> {
    writeln!(progress, "Initializing bots.")?;
    let reset = roster::reset_scratch_files(&cli.bots_dir)?;
    tracing::debug!("Reset {} scratch files", reset);

    let specs = roster::load(&cli.roster)?;
    if specs.is_empty() {
        bail!("Roster {} lists no bots", cli.roster.display());
    }
    Ok(Bot::lineup(specs, config.verbose, rng))
}
