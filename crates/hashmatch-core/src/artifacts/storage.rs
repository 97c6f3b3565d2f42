//! Locating match directories under a storage root.

use std::path::{Path, PathBuf};

use crate::artifacts::{read_json, MatchSummary, MATCH_LOG_FILE, MATCH_SUMMARY_FILE};
use crate::domain::{HashmatchError, Result};

/// Match ids become directory names, so only a conservative charset passes.
pub fn is_safe_match_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn collect(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) -> Result<()> {
    if dir.join(MATCH_LOG_FILE).is_file() {
        out.push(dir.to_path_buf());
        return Ok(());
    }
    if depth == 0 {
        return Ok(());
    }
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(HashmatchError::Io(e)),
    };
    for entry in read_dir {
        let path = entry?.path();
        if path.is_dir() {
            collect(&path, depth - 1, out)?;
        }
    }
    Ok(())
}

/// Every directory under `root` holding a `match.jsonl`, sorted by path.
/// Looks three levels deep so tournament `matches/<key>/` layouts are found.
pub fn list_match_directories(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    collect(root, 3, &mut out)?;
    out.sort();
    Ok(out)
}

/// Directory of `match_id`: `<root>/<match_id>` if present, otherwise the
/// first listed directory whose summary names that match.
pub fn find_match_directory(root: &Path, match_id: &str) -> Result<Option<PathBuf>> {
    if !is_safe_match_id(match_id) {
        return Err(HashmatchError::InvalidConfig(format!("unsafe match id: {match_id:?}")));
    }
    let direct = root.join(match_id);
    if direct.join(MATCH_LOG_FILE).is_file() {
        return Ok(Some(direct));
    }
    for dir in list_match_directories(root)? {
        let summary_path = dir.join(MATCH_SUMMARY_FILE);
        if !summary_path.is_file() {
            continue;
        }
        if let Ok(summary) = read_json::<MatchSummary>(&summary_path) {
            if summary.match_id == match_id {
                return Ok(Some(dir));
            }
        }
    }
    Ok(None)
}
