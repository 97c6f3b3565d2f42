//! Match events, the append-only log, and the reducers that fold it.
//!
//! The event sequence is the only authoritative record of a match. Every
//! other view (scores, timeouts, spectator scene) is derived by folding it.

pub mod jsonl;
pub mod playback;
pub mod reducer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{ScoreMap, TerminationReason, TimeoutCause};
use crate::domain::AgentId;

pub use jsonl::{parse_jsonl, read_match_log, to_jsonl, validate_sequence};
pub use playback::Playback;
pub use reducer::{fold, reduce, MatchPhase, MatchReducer, MatchReplayState, Reducer};

/// One sequenced entry in a match log.
///
/// On the wire: `{"type": "<Kind>", "seq": n, "matchId": "...", ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEvent {
    pub seq: u64,
    pub match_id: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum EventKind {
    MatchStarted {
        seed: u64,
        agent_ids: Vec<AgentId>,
        scenario_name: String,
        max_turns: u32,
        scene: Value,
    },
    ActionRequested {
        agent_id: AgentId,
        turn: u32,
    },
    AgentTimedOut {
        agent_id: AgentId,
        turn: u32,
        cause: TimeoutCause,
    },
    ActionAdjudicated {
        agent_id: AgentId,
        turn: u32,
        valid: bool,
        chosen_action: Value,
        feedback: Value,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        score_deltas: ScoreMap,
    },
    StateUpdated {
        turn: u32,
        scores: ScoreMap,
        summary: Value,
    },
    MatchEnded {
        reason: TerminationReason,
        scores: ScoreMap,
        turns: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        forfeited_by: Option<AgentId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    MatchSetupFailed {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::MatchStarted { .. } => "MatchStarted",
            Self::ActionRequested { .. } => "ActionRequested",
            Self::AgentTimedOut { .. } => "AgentTimedOut",
            Self::ActionAdjudicated { .. } => "ActionAdjudicated",
            Self::StateUpdated { .. } => "StateUpdated",
            Self::MatchEnded { .. } => "MatchEnded",
            Self::MatchSetupFailed { .. } => "MatchSetupFailed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MatchEnded { .. })
    }
}

/// Append-only log that folds each event through [`MatchReducer`] as it lands.
///
/// The engine reads scores and timeouts back from [`EventLog::state`], so the
/// live bookkeeping and offline replay share one code path.
#[derive(Debug, Clone)]
pub struct EventLog {
    match_id: String,
    events: Vec<MatchEvent>,
    state: Option<MatchReplayState>,
}

impl EventLog {
    pub fn new(match_id: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            events: Vec::new(),
            state: None,
        }
    }

    /// Stamp the next `seq` onto `kind` and append it.
    pub fn append(&mut self, kind: EventKind) -> &MatchEvent {
        let event = MatchEvent {
            seq: self.events.len() as u64,
            match_id: self.match_id.clone(),
            kind,
        };
        self.state = Some(reduce(self.state.take(), &event));
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn events(&self) -> &[MatchEvent] {
        &self.events
    }

    pub fn state(&self) -> Option<&MatchReplayState> {
        self.state.as_ref()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.events.last().is_some_and(|e| e.kind.is_terminal())
    }

    pub fn into_events(self) -> Vec<MatchEvent> {
        self.events
    }
}

/// The minimal log for a match whose setup failed: `MatchSetupFailed`
/// followed by `MatchEnded{setupFailed}` with zero turns.
pub fn setup_failed_events(match_id: &str, message: &str, details: Option<Value>) -> Vec<MatchEvent> {
    let mut log = EventLog::new(match_id);
    log.append(EventKind::MatchSetupFailed {
        message: message.to_string(),
        details,
    });
    log.append(EventKind::MatchEnded {
        reason: TerminationReason::SetupFailed,
        scores: ScoreMap::new(),
        turns: 0,
        forfeited_by: None,
        details: None,
    });
    log.into_events()
}
