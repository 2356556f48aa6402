//! Randomized reachability scoring
//!
//! For every active top-row vertex, a number of independent trials are run.
//! A trial is a depth-first walk over active vertices that visits children in
//! a freshly shuffled order. If the walk reaches a sink, every owner of every
//! vertex on the current path earns one point. If it backtracks past the
//! start vertex, the trial earns nothing.
//!
//! ## Architecture
//! - Level 2: `Scorer::score` (all starting columns)
//! - Level 3: `Scorer::trial` (one walk)
//! - Level 4: frame construction and crediting

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashSet;

use crate::board::{Board, BotId, Pos, VertexStatus};

/// Per-bot points awarded by one scoring pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScoreSheet {
    /// Points per bot, indexed by [`BotId`]
    pub deltas: Vec<u64>,
    /// Trials attempted
    pub trials: usize,
    /// Trials that reached a sink
    pub successes: usize,
}

impl ScoreSheet {
    pub fn delta(&self, bot: BotId) -> u64 {
        self.deltas.get(bot).copied().unwrap_or(0)
    }
}

/// One level of the depth-first walk
#[derive(Clone, Debug)]
struct Frame {
    pos: Pos,
    /// Active children not yet attempted, in shuffled order
    remaining: Vec<Pos>,
}

/// Scoring engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scorer {
    trials_per_vertex: usize,
}

impl Scorer {
    pub fn new(trials_per_vertex: usize) -> Self {
        Self { trials_per_vertex }
    }

    /// One trial per bot for every starting vertex
    pub fn for_bots(bot_count: usize) -> Self {
        Self::new(bot_count)
    }

    pub fn trials_per_vertex(&self) -> usize {
        self.trials_per_vertex
    }

    /// Score a finished board for `bot_count` bots
    pub fn score<R: Rng + ?Sized>(&self, board: &Board, bot_count: usize, rng: &mut R) -> ScoreSheet {
        let mut sheet = ScoreSheet {
            deltas: vec![0; bot_count],
            ..Default::default()
        };

        let starts: Vec<Pos> = board
            .top_row()
            .filter(|&pos| board.status(pos) == Some(VertexStatus::Active))
            .collect();

        for start in starts {
            for _ in 0..self.trials_per_vertex {
                sheet.trials += 1;
                if let Some(path) = self.trial(board, start, rng) {
                    sheet.successes += 1;
                    credit(board, &path, &mut sheet.deltas);
                }
            }
        }

        sheet
    }

    /// Run one randomized walk from `start`
    ///
    /// Returns the path from `start` down to the sink that was reached, or
    /// `None` if every branch was exhausted. `start` must be active.
    pub fn trial<R: Rng + ?Sized>(&self, board: &Board, start: Pos, rng: &mut R) -> Option<Vec<Pos>> {
        if board.status(start) != Some(VertexStatus::Active) {
            return None;
        }

        let mut visited: FxHashSet<Pos> = FxHashSet::default();
        let mut stack = vec![frame(board, start, rng)];

        while let Some(top) = stack.last_mut() {
            if board.is_sink(top.pos) {
                return Some(stack.iter().map(|f| f.pos).collect());
            }
            match top.remaining.pop() {
                Some(child) => {
                    if visited.insert(child) {
                        stack.push(frame(board, child, rng));
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }

        None
    }
}

/// Frame for `pos` with its active children shuffled
fn frame<R: Rng + ?Sized>(board: &Board, pos: Pos, rng: &mut R) -> Frame {
    let mut remaining: Vec<Pos> = board
        .children(pos)
        .iter()
        .copied()
        .filter(|&child| board.status(child) == Some(VertexStatus::Active))
        .collect();
    remaining.shuffle(rng);
    Frame { pos, remaining }
}

/// +1 to every owner of every vertex on `path`
fn credit(board: &Board, path: &[Pos], deltas: &mut [u64]) {
    for &pos in path {
        if let Some(vertex) = board.get(pos) {
            for &bot in vertex.owners() {
                if let Some(delta) = deltas.get_mut(bot) {
                    *delta += 1;
                }
            }
        }
    }
}
