//! `match.jsonl` encoding: one canonical JSON event per line.

use std::path::Path;

use crate::domain::{to_canonical_string, HashmatchError, Result};
use crate::events::MatchEvent;

/// Encode events as canonical JSON lines, each terminated by `\n`.
pub fn to_jsonl(events: &[MatchEvent]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(&to_canonical_string(event)?);
        out.push('\n');
    }
    Ok(out)
}

/// Parse JSONL text. Blank lines are skipped.
pub fn parse_jsonl(text: &str) -> Result<Vec<MatchEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<MatchEvent>(line)
                .map_err(|e| HashmatchError::InvalidLog(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

/// Check that `seq` runs 0,1,2,... and every event names the same match.
pub fn validate_sequence(events: &[MatchEvent]) -> Result<()> {
    let Some(first) = events.first() else {
        return Ok(());
    };
    for (i, event) in events.iter().enumerate() {
        if event.seq != i as u64 {
            return Err(HashmatchError::InvalidLog(format!(
                "expected seq {i}, found {}",
                event.seq
            )));
        }
        if event.match_id != first.match_id {
            return Err(HashmatchError::InvalidLog(format!(
                "seq {i} belongs to match '{}', expected '{}'",
                event.match_id, first.match_id
            )));
        }
    }
    Ok(())
}

/// Read and validate a `match.jsonl` file.
pub fn read_match_log(path: &Path) -> Result<Vec<MatchEvent>> {
    let text = std::fs::read_to_string(path)?;
    let events = parse_jsonl(&text)?;
    validate_sequence(&events)?;
    Ok(events)
}
