//! The capability set every scenario implements.
//!
//! A scenario owns its authoritative [`Scenario::Instance`] only through the
//! engine. Agents see [`Scenario::Observation`]s derived per agent; spectators
//! see [`Scenario::public_summary`]. Neither can reach the instance itself.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::contract::types::{ScoreMap, TerminationReason};
use crate::domain::AgentId;

/// A broken scenario invariant. Fatal to the match, which ends with `error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioFault {
    #[error("agent '{0}' is not part of this match")]
    UnknownAgent(AgentId),

    #[error("scenario needs {expected} players, got {actual}")]
    PlayerCount { expected: String, actual: usize },

    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Allowed number of agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerCount {
    pub min: usize,
    pub max: usize,
}

impl PlayerCount {
    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: n }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min && n <= self.max
    }

    pub fn check(&self, n: usize) -> Result<(), ScenarioFault> {
        if self.accepts(n) {
            return Ok(());
        }
        let expected = if self.min == self.max {
            self.min.to_string()
        } else {
            format!("{}..={}", self.min, self.max)
        };
        Err(ScenarioFault::PlayerCount {
            expected,
            actual: n,
        })
    }
}

/// Outcome of adjudicating one action.
///
/// `feedback` always carries a string `code`; scenarios may add fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjudication {
    pub valid: bool,
    pub feedback: Value,
    pub score_deltas: ScoreMap,
}

impl Adjudication {
    pub fn accepted(code: &str) -> Self {
        Self {
            valid: true,
            feedback: json!({ "code": code }),
            score_deltas: ScoreMap::new(),
        }
    }

    pub fn rejected(code: &str, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            feedback: json!({ "code": code, "message": message.into() }),
            score_deltas: ScoreMap::new(),
        }
    }

    /// Attach an extra feedback field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.feedback {
            map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Add a score delta. Zero deltas are dropped.
    pub fn award(mut self, agent: &AgentId, delta: i64) -> Self {
        if delta != 0 {
            *self.score_deltas.entry(agent.clone()).or_insert(0) += delta;
        }
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.feedback.get("code").and_then(Value::as_str)
    }
}

/// A turn-based game's rules.
pub trait Scenario: Send + Sync {
    /// Authoritative state, hidden from agents.
    type Instance: Send;
    /// What one agent is allowed to see.
    type Observation: Serialize + Send + Sync;
    /// What one agent may do. Deserialized from remote agents.
    type Action: Serialize + DeserializeOwned + Clone + Debug + Send + Sync;

    fn name(&self) -> &'static str;

    fn player_count(&self) -> PlayerCount;

    /// Build the initial instance from a seed. Must be deterministic.
    fn init(&self, seed: u64, agents: &[AgentId]) -> Result<Self::Instance, ScenarioFault>;

    /// Filtered view for `agent`. Never leaks hidden state.
    fn observe(&self, instance: &Self::Instance, agent: &AgentId) -> Self::Observation;

    /// Validate and apply `action`. Invalid actions return `valid: false`;
    /// only broken invariants return `Err`.
    fn adjudicate(
        &self,
        instance: &mut Self::Instance,
        agent: &AgentId,
        action: &Self::Action,
    ) -> Result<Adjudication, ScenarioFault>;

    /// Hook run after every agent has acted in `turn`.
    fn end_turn(&self, _instance: &mut Self::Instance, _turn: u32) -> Result<(), ScenarioFault> {
        Ok(())
    }

    fn check_termination(&self, instance: &Self::Instance) -> Option<TerminationReason>;

    /// Action substituted when an agent times out.
    fn default_action(&self) -> Self::Action;

    /// Spectator view of the instance.
    fn public_summary(&self, instance: &Self::Instance) -> Value;

    /// Static, public hints about the scenario (ranges, action names).
    fn scenario_hints(&self) -> Value {
        json!({})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjudication_builders() {
        let a = AgentId::new("a-0");
        let adj = Adjudication::accepted("hack_progress")
            .with("progress", "1/2")
            .award(&a, 10)
            .award(&a, 5)
            .award(&AgentId::new("b-1"), 0);
        assert!(adj.valid);
        assert_eq!(adj.code(), Some("hack_progress"));
        assert_eq!(adj.feedback["progress"], "1/2");
        assert_eq!(adj.score_deltas.get(&a), Some(&15));
        assert_eq!(adj.score_deltas.len(), 1);

        let rej = Adjudication::rejected("unknown_room", "no such room");
        assert!(!rej.valid);
        assert_eq!(rej.code(), Some("unknown_room"));
    }

    #[test]
    fn player_count_check() {
        assert!(PlayerCount::exactly(2).check(2).is_ok());
        let err = PlayerCount::exactly(2).check(3).unwrap_err();
        assert_eq!(err.to_string(), "scenario needs 2 players, got 3");
        assert!(PlayerCount::between(1, 4).accepts(4));
        assert!(!PlayerCount::between(1, 4).accepts(0));
    }
}
