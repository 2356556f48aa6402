//! Round engine - one full game on a fresh board
//!
//! Level 2 - Phases
//!
//! Every turn has a destroy phase and an activation phase, each visiting the
//! bots in lineup order. Destroys apply as soon as they are read. Activation
//! claims are checked against a snapshot taken at the start of the phase and
//! committed together once every bot has answered, so bots naming the same
//! vertex in the same phase become joint owners.

use std::collections::BTreeSet;

use claimwar_core::{parse_move, Board, BotId, Choice, Message, Phase, Pos, ScoreSheet, VertexStatus};
use rand::Rng;

use crate::bot::Bot;
use crate::config::TournamentConfig;
use crate::process::{BotLink, Exchange, ProcessLink};

/// Result of one round
#[derive(Clone, Debug)]
pub struct RoundOutcome {
    /// Bots that missed a deadline at least once this round
    pub slow: BTreeSet<BotId>,
    /// Points earned this round, indexed by [`BotId`]
    pub deltas: Vec<u64>,
    /// Final board, kept for reporting
    pub board: Board,
    pub turns: usize,
    pub side: usize,
    pub scoring: ScoreSheet,
}

/// Per-bot state that only lives for one round
struct Seat<L> {
    link: L,
    last_choice: Option<Pos>,
    /// Report line queued for the next message
    report: Option<String>,
}

// ============================================================================
// Level 1 - Entry points
// ============================================================================

/// Play one round with every bot running as a child process
pub fn run_round<R: Rng + ?Sized>(bots: &mut [Bot], config: &TournamentConfig, rng: &mut R) -> RoundOutcome {
    run_round_with(bots, config, rng, |_, bot| ProcessLink::connect(bot.name.clone(), &bot.command))
}

/// Play one round over links produced by `connect`
///
/// Updates every bot's `score` and `delta_score` in place.
pub fn run_round_with<L, F, R>(
    bots: &mut [Bot],
    config: &TournamentConfig,
    rng: &mut R,
    mut connect: F,
) -> RoundOutcome
where
    L: BotLink,
    F: FnMut(BotId, &Bot) -> L,
    R: Rng + ?Sized,
{
    let (turns, side) = Board::dimensions(bots.len());
    let begin = Message::Begin {
        bots: bots.len(),
        turns,
        side,
    }
    .to_string();

    let seats = bots
        .iter()
        .enumerate()
        .map(|(id, bot)| {
            let mut link = connect(id, bot);
            link.handshake(&begin, config.move_deadline);
            Seat {
                link,
                last_choice: None,
                report: None,
            }
        })
        .collect();

    let mut engine = RoundEngine {
        bots: &*bots,
        config,
        board: Board::new(side),
        seats,
        slow: BTreeSet::new(),
    };

    for turn in 0..turns {
        engine.destroy_phase(turn);
        engine.activation_phase(turn);
    }

    tracing::info!("Finished, computing score.");
    let scoring = config.scorer(bots.len()).score(&engine.board, bots.len(), rng);
    let RoundEngine {
        board,
        mut seats,
        mut slow,
        ..
    } = engine;

    for (id, bot) in bots.iter_mut().enumerate() {
        bot.delta_score = scoring.delta(id);
        bot.score += bot.delta_score;
    }

    for (id, seat) in seats.iter_mut().enumerate() {
        let bot = &bots[id];
        let score = Message::Score {
            own: bot.delta_score,
            enemies: bot.enemies().iter().map(|&e| bots[e].delta_score).collect(),
        };
        let outgoing: Vec<String> = seat.report.take().into_iter().chain([score.to_string()]).collect();
        let shutdown = seat.link.stop(&outgoing, config.shutdown_deadline);
        if shutdown.slow {
            tracing::warn!("Bot {} was too slow to halt.", bot.name);
            slow.insert(id);
        }
    }

    RoundOutcome {
        slow,
        deltas: scoring.deltas.clone(),
        board,
        turns,
        side,
        scoring,
    }
}

// ============================================================================
// Level 2 - Phases
// ============================================================================

struct RoundEngine<'a, L> {
    bots: &'a [Bot],
    config: &'a TournamentConfig,
    board: Board,
    seats: Vec<Seat<L>>,
    slow: BTreeSet<BotId>,
}

impl<L: BotLink> RoundEngine<'_, L> {
    /// Each valid destroy breaks its vertex immediately
    fn destroy_phase(&mut self, turn: usize) {
        for id in 0..self.seats.len() {
            let target = self.ask(id, Phase::Destroy, turn);
            let accepted = target.filter(|&pos| match self.board.break_vertex(pos) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("Bot {} destroy rejected: {}", self.bots[id].name, e);
                    false
                }
            });
            self.seats[id].last_choice = accepted;
        }
        self.queue_reports(Phase::Destroy, turn);
    }

    /// Claims are validated against one snapshot and committed together
    fn activation_phase(&mut self, turn: usize) {
        let snapshot = self.board.snapshot();
        let mut claims: Vec<(BotId, Pos)> = Vec::new();

        for id in 0..self.seats.len() {
            let target = self.ask(id, Phase::Activate, turn);
            let accepted = target.filter(|&pos| {
                let claimable = snapshot.is_claimable(pos);
                if !claimable {
                    tracing::debug!(
                        "Bot {} claim of {} rejected: vertex is {:?}",
                        self.bots[id].name,
                        pos,
                        snapshot.status(pos)
                    );
                }
                claimable
            });
            if let Some(pos) = accepted {
                claims.push((id, pos));
            }
            self.seats[id].last_choice = accepted;
        }

        if let Err(e) = self.board.commit_claims(&claims) {
            // Nothing touches the board between snapshot and commit
            tracing::error!("Activation commit failed on turn {}: {}", turn, e);
        }
        debug_assert!(claims
            .iter()
            .all(|&(_, pos)| self.board.status(pos) == Some(VertexStatus::Active)));

        self.queue_reports(Phase::Activate, turn);
    }

    // ========================================================================
    // Level 3 - Steps
    // ========================================================================

    /// Send the queued report and the prompt, return the named vertex if any
    fn ask(&mut self, id: BotId, phase: Phase, turn: usize) -> Option<Pos> {
        let prompt = Message::Prompt { phase, turn }.to_string();
        let seat = &mut self.seats[id];
        let outgoing: Vec<String> = seat.report.take().into_iter().chain([prompt]).collect();
        let exchange = seat.link.exchange(&outgoing, self.config.move_deadline);
        self.note_timing(id, phase, &exchange);

        let line = exchange.response?;
        match parse_move(&line) {
            Ok(pos) => Some(pos),
            Err(e) => {
                tracing::debug!("Bot {} passes on {} {}: {}", self.bots[id].name, phase.prompt_keyword(), turn, e);
                None
            }
        }
    }

    fn note_timing(&mut self, id: BotId, phase: Phase, exchange: &Exchange) {
        if exchange.slow {
            tracing::warn!(
                "Bot {} was too slow to {} ({:?}).",
                self.bots[id].name,
                phase.verb(),
                exchange.elapsed
            );
            self.slow.insert(id);
        }
    }

    /// Build every bot's report for the phase just played
    fn queue_reports(&mut self, phase: Phase, turn: usize) {
        let choices: Vec<Option<Pos>> = self.seats.iter().map(|s| s.last_choice).collect();
        for (id, seat) in self.seats.iter_mut().enumerate() {
            seat.report = Some(report_line(phase, turn, &choices, id, self.bots[id].enemies()));
        }
    }
}

// ============================================================================
// Level 4 - Formatting
// ============================================================================

/// `BROKEN|OWNED <turn> <own> <enemies...>` for bot `id`
pub fn report_line(phase: Phase, turn: usize, choices: &[Option<Pos>], id: BotId, enemies: &[BotId]) -> String {
    Message::Report {
        phase,
        turn,
        own: Choice(choices[id]),
        enemies: enemies.iter().map(|&e| Choice(choices[e])).collect(),
    }
    .to_string()
}
