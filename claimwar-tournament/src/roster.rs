//! Roster loading and per-bot scratch files
//!
//! A roster is a text file whose non-comment lines alternate a bot's display
//! name and the command that launches it:
//!
//! ```text
//! # comment
//! Random walker
//! python3 bots/random/bot.py
//! Greedy
//! ./bots/greedy/greedy --fast
//! ```

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};

/// Name of the file each bot directory may use as scratch space
pub const SCRATCH_FILE: &str = "data.txt";

/// One roster entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotSpec {
    pub name: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
}

/// Malformed roster
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("bot {name:?} on line {line} has no command line")]
    MissingCommand { name: String, line: usize },

    #[error("bot {name:?} has an empty command on line {line}")]
    EmptyCommand { name: String, line: usize },
}

/// Parse roster text
///
/// Lines starting with `#` and blank lines are skipped while looking for a
/// name, so a blank line never names a bot; the line right after a name is
/// always its command.
pub fn parse(text: &str) -> Result<Vec<BotSpec>, RosterError> {
    let mut specs = Vec::new();
    let mut lines = text.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let name = line.trim_end().to_string();

        let (command_index, command_line) = lines.next().ok_or_else(|| RosterError::MissingCommand {
            name: name.clone(),
            line: index + 1,
        })?;
        let command: Vec<String> = command_line.split_whitespace().map(str::to_string).collect();
        if command.is_empty() {
            return Err(RosterError::EmptyCommand {
                name,
                line: command_index + 1,
            });
        }

        specs.push(BotSpec { name, command });
    }

    Ok(specs)
}

/// Load and parse a roster file
pub fn load(path: &Path) -> Result<Vec<BotSpec>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read roster: {}", path.display()))?;
    let specs = parse(&text).with_context(|| format!("Invalid roster: {}", path.display()))?;
    tracing::debug!("Loaded {} bots from {}", specs.len(), path.display());
    Ok(specs)
}

/// Truncate `data.txt` in every subdirectory of `dir`
///
/// Returns the number of scratch files reset. A missing `dir` resets nothing.
pub fn reset_scratch_files(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        tracing::debug!("No bot directory at {}, skipping scratch reset", dir.display());
        return Ok(0);
    }

    let mut reset = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path().join(SCRATCH_FILE);
        File::create(&path).with_context(|| format!("Failed to reset {}", path.display()))?;
        reset += 1;
    }
    Ok(reset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roster() {
        let text = "# bots\nAlpha\n./alpha --fast\n# another\nBeta\npython3 beta.py\n";
        let specs = parse(text).unwrap();
        assert_eq!(
            specs,
            vec![
                BotSpec {
                    name: "Alpha".into(),
                    command: vec!["./alpha".into(), "--fast".into()],
                },
                BotSpec {
                    name: "Beta".into(),
                    command: vec!["python3".into(), "beta.py".into()],
                },
            ]
        );
    }

    #[test]
    fn test_parse_skips_blank_lines_between_entries() {
        let specs = parse("\nAlpha\n./alpha\n\n\nBeta\n./beta").unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].name, "Beta");

        // Trailing blank lines never become a nameless bot
        let specs = parse("Alpha\n./alpha\n\n\n").unwrap();
        assert_eq!(specs.len(), 1);
    }

    #[test]
    fn test_missing_command() {
        let err = parse("Alpha\n./alpha\nBeta\n").unwrap_err();
        assert_eq!(
            err,
            RosterError::MissingCommand {
                name: "Beta".into(),
                line: 3
            }
        );
    }

    #[test]
    fn test_empty_command() {
        let err = parse("Alpha\n   \n").unwrap_err();
        assert_eq!(
            err,
            RosterError::EmptyCommand {
                name: "Alpha".into(),
                line: 2
            }
        );
    }

    #[test]
    fn test_empty_roster() {
        assert!(parse("# nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn test_reset_scratch_files() {
        let root = std::env::temp_dir().join(format!("claimwar-scratch-{}", std::process::id()));
        let bot_dir = root.join("alpha");
        fs::create_dir_all(&bot_dir).unwrap();
        fs::write(bot_dir.join(SCRATCH_FILE), "old state").unwrap();
        fs::create_dir_all(root.join("beta")).unwrap();
        fs::write(root.join("README"), "not a bot").unwrap();

        assert_eq!(reset_scratch_files(&root).unwrap(), 2);
        assert_eq!(fs::read_to_string(bot_dir.join(SCRATCH_FILE)).unwrap(), "");
        assert!(root.join("beta").join(SCRATCH_FILE).exists());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_reset_missing_dir() {
        let missing = std::env::temp_dir().join("claimwar-definitely-missing-dir");
        assert_eq!(reset_scratch_files(&missing).unwrap(), 0);
    }
}
