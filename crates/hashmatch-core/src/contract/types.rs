//! Match-level value types shared by the engine, the log and the artifacts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::AgentId;

/// Per-agent score table. Ordered so serialized output is stable.
pub type ScoreMap = BTreeMap<AgentId, i64>;

/// Build/version information attached to a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchProvenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_commit: Option<String>,
    pub engine_version: String,
}

/// Caller-owned match parameters. Immutable once the match starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    pub seed: u64,
    pub max_turns: u32,
    pub match_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<MatchProvenance>,
}

/// Closed set of reasons a match can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationReason {
    Completed,
    Capture,
    Lockdown,
    MaxTurns,
    Error,
    SetupFailed,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Capture => "capture",
            Self::Lockdown => "lockdown",
            Self::MaxTurns => "maxTurns",
            Self::Error => "error",
            Self::SetupFailed => "setupFailed",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a gateway delivery did not yield a usable action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeoutCause {
    /// Wall-clock deadline elapsed.
    Deadline,
    /// Response body exceeded the byte cap.
    ResponseTooLarge,
    /// Body was not JSON or not a valid action.
    Malformed,
    /// Connection failed or returned a non-success status.
    Network,
    /// A local agent reported an error instead of an action.
    AgentFailed,
}

impl TimeoutCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deadline => "deadline",
            Self::ResponseTooLarge => "responseTooLarge",
            Self::Malformed => "malformed",
            Self::Network => "network",
            Self::AgentFailed => "agentFailed",
        }
    }
}

impl fmt::Display for TimeoutCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalation of repeated timeouts into a forfeit.
///
/// `None` never forfeits. `Some(n)` ends the match once an agent has timed
/// out `n` turns in a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForfeitPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_timeouts: Option<u32>,
}

impl ForfeitPolicy {
    pub fn never() -> Self {
        Self::default()
    }

    pub fn after_consecutive_timeouts(n: u32) -> Self {
        Self {
            max_consecutive_timeouts: Some(n.max(1)),
        }
    }

    /// Whether `consecutive` timeouts in a row trigger a forfeit.
    pub fn triggers(&self, consecutive: u32) -> bool {
        matches!(self.max_consecutive_timeouts, Some(n) if consecutive >= n)
    }
}
