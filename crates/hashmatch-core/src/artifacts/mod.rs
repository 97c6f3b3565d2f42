//! On-disk match artifacts.
//!
//! A match directory holds:
//! - `match.jsonl`: canonical events, one per line
//! - `match_manifest.json`: scenario and agent identity with content hashes
//! - `match_summary.json`: outcome plus `hashes{logHash, manifestHash}`
//! - `match_status.json`: lifecycle status with wall-clock timestamps
//! - `gateway_transcript.jsonl`: optional per-delivery timing
//!
//! Every JSON artifact is canonical JSON with a trailing newline.

pub mod broadcast;
pub mod storage;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::{ScoreMap, TerminationReason};
use crate::domain::{hash_file, to_canonical_file_contents, AgentId, Result};
use crate::engine::{winner_of, MatchResult};
use crate::events::to_jsonl;
use crate::gateway::{write_transcript, TranscriptEntry};
use crate::provenance::MatchManifest;

pub use broadcast::{locale_compare, BroadcastClass, BroadcastFile, BroadcastManifest};
pub use storage::{find_match_directory, is_safe_match_id, list_match_directories};

pub const MATCH_LOG_FILE: &str = "match.jsonl";
pub const MATCH_MANIFEST_FILE: &str = "match_manifest.json";
pub const MATCH_SUMMARY_FILE: &str = "match_summary.json";
pub const MATCH_STATUS_FILE: &str = "match_status.json";
pub const TRANSCRIPT_FILE: &str = "gateway_transcript.jsonl";
pub const RECEIPT_FILE: &str = "receipt.json";
pub const TOURNAMENT_MANIFEST_FILE: &str = "tournament_manifest.json";
pub const STANDINGS_FILE: &str = "standings.json";
pub const BROADCAST_MANIFEST_FILE: &str = "broadcast_manifest.json";
pub const TOURNAMENT_RECEIPT_FILE: &str = "tournament_receipt.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchHashes {
    pub log_hash: String,
    pub manifest_hash: String,
}

/// `match_summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: String,
    pub match_key: String,
    pub seed: u64,
    pub agent_ids: Vec<AgentId>,
    pub scores: ScoreMap,
    pub timeouts_per_agent: BTreeMap<AgentId, u32>,
    pub winner: Option<AgentId>,
    pub turns: u32,
    pub reason: TerminationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forfeited_by: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashes: Option<MatchHashes>,
}

impl MatchSummary {
    pub fn from_result(result: &MatchResult, match_key: &str) -> Self {
        Self {
            match_id: result.match_id.clone(),
            match_key: match_key.to_string(),
            seed: result.seed,
            agent_ids: result.agent_ids.clone(),
            scores: result.scores.clone(),
            timeouts_per_agent: result.timeouts_per_agent.clone(),
            winner: winner_of(&result.scores).cloned(),
            turns: result.turns,
            reason: result.reason,
            forfeited_by: result.forfeited_by.clone(),
            hashes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatusKind {
    Running,
    Complete,
    Incomplete,
    Failed,
}

impl MatchStatusKind {
    pub fn for_reason(reason: TerminationReason) -> Self {
        match reason {
            TerminationReason::SetupFailed => Self::Failed,
            TerminationReason::Error => Self::Incomplete,
            _ => Self::Complete,
        }
    }
}

/// `match_status.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchStatus {
    pub match_id: String,
    pub status: MatchStatusKind,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Inputs for [`write_match_artifacts`].
#[derive(Debug)]
pub struct MatchArtifacts<'a> {
    pub result: &'a MatchResult,
    pub manifest: &'a MatchManifest,
    pub match_key: &'a str,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// `error` for the status file, when the match did not complete.
    pub error: Option<String>,
    pub transcript: Option<&'a [TranscriptEntry]>,
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, to_canonical_file_contents(value)?)?;
    Ok(())
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Mark a match as started. Replaced by [`write_match_artifacts`] when it ends.
pub fn write_running_status(dir: &Path, match_id: &str, started_at: DateTime<Utc>) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let status = MatchStatus {
        match_id: match_id.to_string(),
        status: MatchStatusKind::Running,
        started_at: timestamp(started_at),
        ended_at: None,
        error: None,
    };
    write_json(&dir.join(MATCH_STATUS_FILE), &status)
}

/// Write the full artifact set into `dir` and return the summary as written.
pub fn write_match_artifacts(dir: &Path, artifacts: &MatchArtifacts<'_>) -> Result<MatchSummary> {
    std::fs::create_dir_all(dir)?;

    let log_path = dir.join(MATCH_LOG_FILE);
    std::fs::write(&log_path, to_jsonl(&artifacts.result.events)?)?;
    let manifest_path = dir.join(MATCH_MANIFEST_FILE);
    write_json(&manifest_path, artifacts.manifest)?;

    let mut summary = MatchSummary::from_result(artifacts.result, artifacts.match_key);
    summary.hashes = Some(MatchHashes {
        log_hash: hash_file(&log_path)?,
        manifest_hash: hash_file(&manifest_path)?,
    });
    write_json(&dir.join(MATCH_SUMMARY_FILE), &summary)?;

    let status = MatchStatus {
        match_id: artifacts.result.match_id.clone(),
        status: MatchStatusKind::for_reason(artifacts.result.reason),
        started_at: timestamp(artifacts.started_at),
        ended_at: Some(timestamp(artifacts.ended_at)),
        error: artifacts.error.clone(),
    };
    write_json(&dir.join(MATCH_STATUS_FILE), &status)?;

    if let Some(entries) = artifacts.transcript {
        write_transcript(&dir.join(TRANSCRIPT_FILE), entries)?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            MatchStatusKind::for_reason(TerminationReason::Lockdown),
            MatchStatusKind::Complete
        );
        assert_eq!(
            MatchStatusKind::for_reason(TerminationReason::Error),
            MatchStatusKind::Incomplete
        );
        assert_eq!(
            MatchStatusKind::for_reason(TerminationReason::SetupFailed),
            MatchStatusKind::Failed
        );
        assert_eq!(
            serde_json::to_string(&MatchStatusKind::Incomplete).unwrap(),
            "\"incomplete\""
        );
    }

    #[test]
    fn running_status_has_no_end() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("m-run");
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        write_running_status(&out, "m-run", at).unwrap();
        let raw: serde_json::Value = read_json(&out.join(MATCH_STATUS_FILE)).unwrap();
        assert_eq!(raw["status"], "running");
        assert_eq!(raw["startedAt"], "2024-05-01T10:00:00.000Z");
        assert!(raw.get("endedAt").is_none());
    }

    #[test]
    fn timestamps_are_utc_millis() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(at), "2024-05-01T10:00:00.000Z");
    }
}
