//! CLAIMWAR Core - Board, protocol and scoring
//!
//! This crate provides the I/O-free parts of the CLAIMWAR referee:
//! - Board geometry (pyramidal grid with horizontal wraparound)
//! - Vertex state and its one-shot transitions
//! - The line protocol spoken with bot processes
//! - Randomized reachability scoring

pub mod board;
pub mod protocol;
pub mod scoring;

// Re-exports for convenient access
pub use board::{Board, BoardError, BotId, Pos, StatusSnapshot, Vertex, VertexStatus};
pub use protocol::{parse_move, Choice, Message, Phase, ProtocolError, MOVE_KEYWORD};
pub use scoring::{ScoreSheet, Scorer};
