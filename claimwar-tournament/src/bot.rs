//! Bot entities that live for the whole tournament

use claimwar_core::BotId;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::roster::BotSpec;

/// Letters handed out as display initials in verbose mode
const INITIALS: &str = "abcdefghijklmnopqrstuvwxyz";

/// A player program and its standing
#[derive(Clone, Debug, Serialize)]
pub struct Bot {
    /// Display name
    pub name: String,
    /// Program and arguments
    pub command: Vec<String>,
    /// Single-letter tag used in board dumps
    pub initial: Option<char>,
    /// Cumulative score over all rounds
    pub score: u64,
    /// Score earned in the last round
    pub delta_score: u64,
    /// Every other bot in this bot's private, fixed order
    #[serde(skip)]
    enemies: Vec<BotId>,
}

impl Bot {
    /// Bot with no enemies yet; see [`Bot::lineup`]
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            initial: None,
            score: 0,
            delta_score: 0,
            enemies: Vec::new(),
        }
    }

    /// Build the tournament lineup from roster entries
    ///
    /// Each bot gets its own random ordering of the other bots, drawn once
    /// here and reused for every round. With `initials`, bots are tagged
    /// `a`, `b`, ... in roster order.
    pub fn lineup<R: Rng + ?Sized>(specs: Vec<BotSpec>, initials: bool, rng: &mut R) -> Vec<Bot> {
        let mut letters = INITIALS.chars();
        let mut bots: Vec<Bot> = specs
            .into_iter()
            .map(|spec| {
                let mut bot = Bot::new(spec.name, spec.command);
                if initials {
                    bot.initial = letters.next();
                }
                bot
            })
            .collect();
        assign_enemies(&mut bots, rng);
        bots
    }

    /// Enemy ids in this bot's private order
    pub fn enemies(&self) -> &[BotId] {
        &self.enemies
    }

    /// Initial if assigned, otherwise `?`
    pub fn glyph(&self) -> char {
        self.initial.unwrap_or('?')
    }
}

/// Give each bot a shuffled ordering of every other bot
pub fn assign_enemies<R: Rng + ?Sized>(bots: &mut [Bot], rng: &mut R) {
    let n = bots.len();
    for (i, bot) in bots.iter_mut().enumerate() {
        let mut order: Vec<BotId> = (0..n).filter(|&j| j != i).collect();
        order.shuffle(rng);
        bot.enemies = order;
    }
}
