//! CLAIMWAR Tournament - Driving bot programs through rounds
//!
//! This crate provides tournament infrastructure:
//! - Roster loading and per-bot scratch files
//! - Process links speaking the line protocol with hard deadlines
//! - The per-round engine (destroy and activation phases, scoring)
//! - The multi-round tournament loop
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run_tournament (orchestration)
//! - Level 2: run_round, destroy/activation phases
//! - Level 3: exchanges with bot processes
//! - Level 4: utilities, configuration

pub mod bot;
pub mod config;
pub mod process;
pub mod roster;
pub mod round;
mod tournament;

pub use bot::Bot;
pub use config::{TournamentConfig, DEFAULT_ROUNDS};
pub use process::{BotLink, Exchange, ExchangeOutcome, LaunchError, ProcessLink, Shutdown};
pub use roster::{BotSpec, RosterError};
pub use round::{run_round, run_round_with, RoundOutcome};
pub use tournament::{compute_standings, run_tournament, run_tournament_with, Standing, TournamentResult};
