//! Line protocol between the controller and bot processes
//!
//! Every message is a single line of space-separated fields. [`Message`]
//! renders controller lines without the trailing newline; the transport
//! appends it. Bots answer prompts with `VERTEX x,y`; any other line is a
//! pass.

use std::fmt;

use crate::board::Pos;

/// Keyword a bot uses to name a vertex
pub const MOVE_KEYWORD: &str = "VERTEX";

/// One of the two steps of a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Destroy,
    Activate,
}

impl Phase {
    /// Keyword of the prompt asking for a move
    pub fn prompt_keyword(self) -> &'static str {
        match self {
            Phase::Destroy => "DESTROY",
            Phase::Activate => "ACTIVATE",
        }
    }

    /// Keyword of the report describing the phase's results
    pub fn report_keyword(self) -> &'static str {
        match self {
            Phase::Destroy => "BROKEN",
            Phase::Activate => "OWNED",
        }
    }

    /// Verb used in slow-bot diagnostics
    pub fn verb(self) -> &'static str {
        match self {
            Phase::Destroy => "destroy",
            Phase::Activate => "claim",
        }
    }
}

/// A bot's accepted claim for a phase, `N` when there is none
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Choice(pub Option<Pos>);

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(pos) => write!(f, "{}", pos),
            None => f.write_str("N"),
        }
    }
}

impl From<Option<Pos>> for Choice {
    fn from(pos: Option<Pos>) -> Self {
        Choice(pos)
    }
}

/// Controller -> bot message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// `BEGIN <bots> <turns> <side>`
    Begin { bots: usize, turns: usize, side: usize },
    /// `BROKEN|OWNED <turn> <own> <enemy>...`
    Report {
        phase: Phase,
        turn: usize,
        own: Choice,
        enemies: Vec<Choice>,
    },
    /// `DESTROY|ACTIVATE <turn>`
    Prompt { phase: Phase, turn: usize },
    /// `SCORE <own> <enemy>...`
    Score { own: u64, enemies: Vec<u64> },
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Begin { bots, turns, side } => write!(f, "BEGIN {} {} {}", bots, turns, side),
            Message::Report { phase, turn, own, enemies } => {
                write!(f, "{} {} {}", phase.report_keyword(), turn, own)?;
                for enemy in enemies {
                    write!(f, " {}", enemy)?;
                }
                Ok(())
            }
            Message::Prompt { phase, turn } => write!(f, "{} {}", phase.prompt_keyword(), turn),
            Message::Score { own, enemies } => {
                write!(f, "SCORE {}", own)?;
                for enemy in enemies {
                    write!(f, " {}", enemy)?;
                }
                Ok(())
            }
        }
    }
}

/// Why a bot's reply was not a move
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty reply")]
    Empty,

    #[error("reply is not a VERTEX move: {0:?}")]
    NotAMove(String),

    #[error("malformed coordinates: {0:?}")]
    BadCoordinates(String),
}

/// Parse a `VERTEX x,y` reply
pub fn parse_move(line: &str) -> Result<Pos, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }

    let rest = match line.split_once(char::is_whitespace) {
        Some((MOVE_KEYWORD, rest)) => rest.trim(),
        _ => return Err(ProtocolError::NotAMove(line.to_string())),
    };

    let bad = || ProtocolError::BadCoordinates(rest.to_string());
    let (x, y) = rest.split_once(',').ok_or_else(bad)?;
    let x = x.trim().parse::<usize>().map_err(|_| bad())?;
    let y = y.trim().parse::<usize>().map_err(|_| bad())?;
    Ok(Pos::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_line() {
        let msg = Message::Begin { bots: 2, turns: 4, side: 8 };
        assert_eq!(msg.to_string(), "BEGIN 2 4 8");
    }

    #[test]
    fn test_report_lines() {
        let msg = Message::Report {
            phase: Phase::Destroy,
            turn: 3,
            own: Choice(Some(Pos::new(1, 2))),
            enemies: vec![Choice(None), Choice(Some(Pos::new(0, 7)))],
        };
        assert_eq!(msg.to_string(), "BROKEN 3 1,2 N 0,7");

        let msg = Message::Report {
            phase: Phase::Activate,
            turn: 0,
            own: Choice(None),
            enemies: vec![],
        };
        assert_eq!(msg.to_string(), "OWNED 0 N");
    }

    #[test]
    fn test_prompt_and_score_lines() {
        assert_eq!(Message::Prompt { phase: Phase::Destroy, turn: 5 }.to_string(), "DESTROY 5");
        assert_eq!(Message::Prompt { phase: Phase::Activate, turn: 0 }.to_string(), "ACTIVATE 0");
        assert_eq!(
            Message::Score { own: 12, enemies: vec![0, 3] }.to_string(),
            "SCORE 12 0 3"
        );
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(parse_move("VERTEX 3,4"), Ok(Pos::new(3, 4)));
        assert_eq!(parse_move("VERTEX 3,4\n"), Ok(Pos::new(3, 4)));
        assert_eq!(parse_move("  VERTEX  0, 12 \r\n"), Ok(Pos::new(0, 12)));
    }

    #[test]
    fn test_parse_move_rejects_garbage() {
        assert_eq!(parse_move(""), Err(ProtocolError::Empty));
        assert_eq!(parse_move("\n"), Err(ProtocolError::Empty));
        assert!(matches!(parse_move("PASS"), Err(ProtocolError::NotAMove(_))));
        assert!(matches!(parse_move("VERTEXES 1,2"), Err(ProtocolError::NotAMove(_))));
        assert!(matches!(parse_move("VERTEX 1"), Err(ProtocolError::BadCoordinates(_))));
        assert!(matches!(parse_move("VERTEX -1,2"), Err(ProtocolError::BadCoordinates(_))));
        assert!(matches!(parse_move("VERTEX a,b"), Err(ProtocolError::BadCoordinates(_))));
        assert!(matches!(parse_move("VERTEX 1,2,3"), Err(ProtocolError::BadCoordinates(_))));
    }
}
