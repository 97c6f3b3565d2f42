//! `broadcast_manifest.json`: an index of every file a tournament produced.
//!
//! Entries are ordered with [`locale_compare`], which follows root-locale
//! collation for the characters that show up in artifact paths: punctuation
//! before digits before letters, letters compared case-insensitively with
//! lowercase first on ties.

use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifacts::{
    read_json, write_json, MATCH_LOG_FILE, MATCH_MANIFEST_FILE, STANDINGS_FILE,
    TOURNAMENT_MANIFEST_FILE,
};
use crate::domain::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastClass {
    /// Authoritative record: logs and manifests.
    Truth,
    Telemetry,
    /// Presentation: standings.
    Show,
}

impl BroadcastClass {
    pub fn for_path(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        match name {
            MATCH_LOG_FILE | MATCH_MANIFEST_FILE | TOURNAMENT_MANIFEST_FILE => Self::Truth,
            STANDINGS_FILE => Self::Show,
            _ => Self::Telemetry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastFile {
    pub path: String,
    pub class: BroadcastClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastManifest {
    pub tournament_id: String,
    pub files: Vec<BroadcastFile>,
}

impl BroadcastManifest {
    pub fn new(tournament_id: impl Into<String>, paths: impl IntoIterator<Item = String>) -> Self {
        let mut manifest = Self {
            tournament_id: tournament_id.into(),
            files: Vec::new(),
        };
        manifest.add_paths(paths, None);
        manifest
    }

    /// Insert paths (replacing the class of any already listed) and re-sort.
    pub fn add_paths(&mut self, paths: impl IntoIterator<Item = String>, class: Option<BroadcastClass>) {
        for path in paths {
            let class = class.unwrap_or_else(|| BroadcastClass::for_path(&path));
            match self.files.iter_mut().find(|f| f.path == path) {
                Some(existing) => existing.class = class,
                None => self.files.push(BroadcastFile { path, class }),
            }
        }
        self.files.sort_by(|a, b| locale_compare(&a.path, &b.path));
    }

    pub fn truth_paths(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .filter(|f| f.class == BroadcastClass::Truth)
            .map(|f| f.path.as_str())
    }

    pub fn read(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

/// Punctuation in root collation order.
const PUNCTUATION: &str = "_-,;:!?.'\"()[]{}@*/\\&#%`^+<=>|~$";

fn primary(c: char) -> (u8, u32) {
    if c.is_whitespace() {
        return (0, c as u32);
    }
    if let Some(pos) = PUNCTUATION.find(c) {
        return (1, pos as u32);
    }
    if let Some(d) = c.to_digit(10) {
        return (2, d);
    }
    if c.is_alphabetic() {
        return (3, c.to_lowercase().next().unwrap_or(c) as u32);
    }
    (4, c as u32)
}

pub fn locale_compare(a: &str, b: &str) -> Ordering {
    let by_primary = a.chars().map(primary).cmp(b.chars().map(primary));
    if by_primary != Ordering::Equal {
        return by_primary;
    }
    // Tertiary level: lowercase sorts before uppercase.
    let case_key = |s: &str| s.chars().map(|c| c.is_uppercase()).collect::<Vec<_>>();
    case_key(a).cmp(&case_key(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_before_digits_before_letters() {
        assert_eq!(locale_compare("a_b", "a1"), Ordering::Less);
        assert_eq!(locale_compare("a1", "ab"), Ordering::Less);
        assert_eq!(locale_compare("match.jsonl", "match_manifest.json"), Ordering::Greater);
        assert_eq!(locale_compare("B", "a"), Ordering::Greater);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("x", "x"), Ordering::Equal);
    }

    #[test]
    fn manifest_sorted_and_classified() {
        let manifest = BroadcastManifest::new(
            "t_1",
            [
                "standings.json".to_string(),
                "matches/r1-m1/match.jsonl".to_string(),
                "broadcast_manifest.json".to_string(),
                "matches/r1-m1/match_summary.json".to_string(),
            ],
        );
        let paths: Vec<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "broadcast_manifest.json",
                "matches/r1-m1/match_summary.json",
                "matches/r1-m1/match.jsonl",
                "standings.json",
            ]
        );
        assert_eq!(manifest.files[1].class, BroadcastClass::Telemetry);
        assert_eq!(manifest.files[2].class, BroadcastClass::Truth);
        assert_eq!(manifest.files[3].class, BroadcastClass::Show);
        assert_eq!(manifest.truth_paths().count(), 1);
    }

    #[test]
    fn add_paths_is_idempotent() {
        let mut manifest = BroadcastManifest::new("t_1", ["standings.json".to_string()]);
        manifest.add_paths(["receipt.json".to_string()], Some(BroadcastClass::Telemetry));
        let once = manifest.clone();
        manifest.add_paths(["receipt.json".to_string()], Some(BroadcastClass::Telemetry));
        assert_eq!(manifest, once);
        assert_eq!(manifest.files[0].path, "receipt.json");
    }
}
