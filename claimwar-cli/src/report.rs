//! Console and JSON reporting
//!
//! Level 3/4 - Formatting utilities
//!
//! Progress goes to whatever writer the caller picks, so `--json` can keep
//! stdout for the result document alone.

use std::io::{self, Write};

use rand::Rng;

use claimwar_tournament::{Bot, RoundOutcome, TournamentResult};

/// Print the lineup, with initials in verbose mode
pub fn print_lineup(out: &mut dyn Write, bots: &[Bot], verbose: bool) -> io::Result<()> {
    writeln!(out, "Bots:")?;
    for bot in bots {
        if verbose {
            writeln!(out, "  {} ({})", bot.name, bot.glyph())?;
        } else {
            writeln!(out, "  {}", bot.name)?;
        }
    }
    Ok(())
}

/// Print one round's deltas, preceded by the board in verbose mode
pub fn print_round<R: Rng + ?Sized>(
    out: &mut dyn Write,
    round: usize,
    outcome: &RoundOutcome,
    bots: &[Bot],
    verbose: bool,
    rng: &mut R,
) -> io::Result<()> {
    writeln!(out, "  Round {}", round)?;
    if verbose {
        writeln!(out, "{}", board_dump(outcome, bots, rng))?;
    }
    writeln!(out, "  Results: {}", results_line(&outcome.deltas))
}

/// Print final standings and slow bots
pub fn print_final(out: &mut dyn Write, result: &TournamentResult) -> io::Result<()> {
    writeln!(out, "Final results:")?;
    for standing in &result.standings {
        writeln!(out, "  {}: {}", standing.name, standing.score)?;
    }
    if !result.slow.is_empty() {
        writeln!(out, "The following bots were too slow:")?;
        for name in &result.slow {
            writeln!(out, "  {}", name)?;
        }
    }
    Ok(())
}

/// Print the full result as one JSON document
pub fn print_json(out: &mut dyn Write, result: &TournamentResult) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, result)?;
    writeln!(out)?;
    Ok(())
}

/// Deltas separated by spaces
pub fn results_line(deltas: &[u64]) -> String {
    deltas.iter().map(u64::to_string).collect::<Vec<_>>().join(" ")
}

/// Board rows, bottom first, indented to match the round log
pub fn board_dump<R: Rng + ?Sized>(outcome: &RoundOutcome, bots: &[Bot], rng: &mut R) -> String {
    outcome
        .board
        .render(|id| bots.get(id).map(Bot::glyph).unwrap_or('?'), rng)
        .lines()
        .map(|row| format!("  {}", row))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimwar_tournament::Standing;

    fn result() -> TournamentResult {
        TournamentResult {
            standings: vec![
                Standing {
                    index: 1,
                    name: "Greedy".into(),
                    score: 40,
                    last_delta: 4,
                },
                Standing {
                    index: 0,
                    name: "Walker".into(),
                    score: 12,
                    last_delta: 0,
                },
            ],
            slow: vec!["Walker".into()],
            rounds_played: 3,
        }
    }

    #[test]
    fn test_results_line() {
        assert_eq!(results_line(&[3, 0, 12]), "3 0 12");
        assert_eq!(results_line(&[]), "");
    }

    #[test]
    fn test_print_final() {
        let mut out = Vec::new();
        print_final(&mut out, &result()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Final results:\n  Greedy: 40\n  Walker: 12\nThe following bots were too slow:\n  Walker\n"
        );
    }

    #[test]
    fn test_print_json_is_one_document() {
        let mut out = Vec::new();
        print_json(&mut out, &result()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["rounds_played"], 3);
        assert_eq!(value["standings"][0]["name"], "Greedy");
        assert_eq!(value["slow"][0], "Walker");
    }
}
