//! Tournament execution - repeated rounds over a fixed lineup
//!
//! Level 1 - Orchestration

use std::collections::BTreeSet;

use claimwar_core::BotId;
use rand::Rng;
use serde::Serialize;

use crate::bot::Bot;
use crate::config::TournamentConfig;
use crate::process::{BotLink, ProcessLink};
use crate::round::{run_round_with, RoundOutcome};

/// Standing of a bot at the end of the tournament
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Standing {
    /// Index of the bot in the lineup
    pub index: BotId,
    pub name: String,
    /// Cumulative score
    pub score: u64,
    /// Score earned in the final round
    pub last_delta: u64,
}

/// Result of a tournament
#[derive(Clone, Debug, Serialize)]
pub struct TournamentResult {
    /// Final standings sorted by score (descending, ties in lineup order)
    pub standings: Vec<Standing>,
    /// Names of bots that missed a deadline in any round
    pub slow: Vec<String>,
    /// Number of rounds played
    pub rounds_played: usize,
}

impl TournamentResult {
    /// Get winner (top standing)
    pub fn winner(&self) -> Option<&Standing> {
        self.standings.first()
    }

    /// Get standing for a specific bot index
    pub fn standing_for(&self, index: BotId) -> Option<&Standing> {
        self.standings.iter().find(|s| s.index == index)
    }
}

/// Run a tournament with every bot as a child process
///
/// `on_round` is called after each round with its index and outcome.
pub fn run_tournament<R, C>(bots: &mut [Bot], config: &TournamentConfig, rng: &mut R, on_round: C) -> TournamentResult
where
    R: Rng + ?Sized,
    C: FnMut(usize, &RoundOutcome, &[Bot]),
{
    run_tournament_with(bots, config, rng, on_round, |_, bot| {
        ProcessLink::connect(bot.name.clone(), &bot.command)
    })
}

/// Run a tournament over links produced by `connect`
pub fn run_tournament_with<R, C, L, F>(
    bots: &mut [Bot],
    config: &TournamentConfig,
    rng: &mut R,
    mut on_round: C,
    mut connect: F,
) -> TournamentResult
where
    R: Rng + ?Sized,
    C: FnMut(usize, &RoundOutcome, &[Bot]),
    L: BotLink,
    F: FnMut(BotId, &Bot) -> L,
{
    let mut slow: BTreeSet<BotId> = BTreeSet::new();

    for round in 0..config.rounds {
        tracing::debug!("Starting round {}", round);
        let outcome = run_round_with(bots, config, rng, &mut connect);
        slow.extend(outcome.slow.iter().copied());
        on_round(round, &outcome, bots);
    }

    TournamentResult {
        standings: compute_standings(bots),
        slow: slow.iter().map(|&id| bots[id].name.clone()).collect(),
        rounds_played: config.rounds,
    }
}

/// Standings sorted by cumulative score
pub fn compute_standings(bots: &[Bot]) -> Vec<Standing> {
    let mut standings: Vec<Standing> = bots
        .iter()
        .enumerate()
        .map(|(index, bot)| Standing {
            index,
            name: bot.name.clone(),
            score: bot.score,
            last_delta: bot.delta_score,
        })
        .collect();
    standings.sort_by(|a, b| b.score.cmp(&a.score));
    standings
}
