//! Configuration types for tournament play
//!
//! Level 4 - Utilities and configuration

use std::time::Duration;

use claimwar_core::Scorer;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Default number of rounds in a tournament
pub const DEFAULT_ROUNDS: usize = 100;

/// Tournament configuration
#[derive(Clone, Debug)]
pub struct TournamentConfig {
    /// Number of rounds to play
    pub rounds: usize,
    /// Time a bot gets to answer a DESTROY or ACTIVATE prompt
    pub move_deadline: Duration,
    /// Time a bot gets to exit after its SCORE line
    pub shutdown_deadline: Duration,
    /// Scoring trials per active top-row vertex (None = one per bot)
    pub trials_per_vertex: Option<usize>,
    /// Random seed for reproducibility (None = random)
    pub seed: Option<u64>,
    /// Assign display initials and dump the board after each round
    pub verbose: bool,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            move_deadline: Duration::from_secs(2),
            shutdown_deadline: Duration::from_secs(1),
            trials_per_vertex: None,
            seed: None,
            verbose: false,
        }
    }
}

impl TournamentConfig {
    /// Set number of rounds
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set per-move deadline
    pub fn with_move_deadline(mut self, deadline: Duration) -> Self {
        self.move_deadline = deadline;
        self
    }

    /// Set shutdown deadline
    pub fn with_shutdown_deadline(mut self, deadline: Duration) -> Self {
        self.shutdown_deadline = deadline;
        self
    }

    /// Override scoring trials per starting vertex
    pub fn with_trials_per_vertex(mut self, trials: usize) -> Self {
        self.trials_per_vertex = Some(trials);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Scorer for a tournament of `bot_count` bots
    pub fn scorer(&self, bot_count: usize) -> Scorer {
        match self.trials_per_vertex {
            Some(trials) => Scorer::new(trials),
            None => Scorer::for_bots(bot_count),
        }
    }

    /// RNG seeded from `seed`, or from entropy when unset
    pub fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_tournament_config_defaults() {
        let config = TournamentConfig::default();
        assert_eq!(config.rounds, 100);
        assert_eq!(config.move_deadline, Duration::from_secs(2));
        assert_eq!(config.shutdown_deadline, Duration::from_secs(1));
        assert!(config.trials_per_vertex.is_none());
        assert!(!config.verbose);
    }

    #[test]
    fn test_builders() {
        let config = TournamentConfig::default()
            .with_rounds(5)
            .with_seed(9)
            .with_move_deadline(Duration::from_millis(250))
            .with_verbose(true);
        assert_eq!(config.rounds, 5);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.move_deadline, Duration::from_millis(250));
        assert!(config.verbose);
    }

    #[test]
    fn test_scorer_defaults_to_bot_count() {
        let config = TournamentConfig::default();
        assert_eq!(config.scorer(4).trials_per_vertex(), 4);

        let config = config.with_trials_per_vertex(10);
        assert_eq!(config.scorer(4).trials_per_vertex(), 10);
    }

    #[test]
    fn test_seeded_rng_deterministic() {
        let config = TournamentConfig::default().with_seed(42);
        let mut rng1 = config.rng();
        let mut rng2 = config.rng();
        assert_eq!(rng1.gen::<u64>(), rng2.gen::<u64>());
    }
}
