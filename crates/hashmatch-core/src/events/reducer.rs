//! Pure reducers over match events.
//!
//! A reducer maps `(prior state | none, event)` to a new state with no
//! clock, randomness or I/O. Folding any prefix of a log therefore gives
//! the state at that point, however the prefix was reached.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::contract::{ScoreMap, TerminationReason};
use crate::domain::AgentId;
use crate::events::{EventKind, MatchEvent};

/// A pure fold function over match events.
pub trait Reducer {
    type State: Clone;

    fn reduce(&self, prior: Option<Self::State>, event: &MatchEvent) -> Self::State;

    /// Fold `events` left to right from the empty state.
    fn fold(&self, events: &[MatchEvent]) -> Option<Self::State> {
        self.fold_from(None, events)
    }

    /// Continue folding from an existing state.
    fn fold_from(&self, state: Option<Self::State>, events: &[MatchEvent]) -> Option<Self::State> {
        events
            .iter()
            .fold(state, |acc, event| Some(self.reduce(acc, event)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchPhase {
    #[default]
    NotStarted,
    Running,
    SetupFailed,
    Ended,
}

/// Scenario-agnostic state reconstructed from a match log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReplayState {
    pub match_id: String,
    pub phase: MatchPhase,
    pub scenario_name: Option<String>,
    pub seed: Option<u64>,
    pub max_turns: u32,
    pub agent_ids: Vec<AgentId>,
    /// Latest turn seen; final turn count once ended.
    pub turn: u32,
    pub scores: ScoreMap,
    pub timeouts_per_agent: BTreeMap<AgentId, u32>,
    pub valid_actions: u32,
    pub invalid_actions: u32,
    /// Agent whose action was requested most recently and not yet adjudicated.
    pub awaiting: Option<AgentId>,
    /// Latest public scene snapshot.
    pub scene: Value,
    pub reason: Option<TerminationReason>,
    pub forfeited_by: Option<AgentId>,
    pub setup_error: Option<String>,
    pub last_seq: Option<u64>,
    pub event_count: usize,
}

impl MatchReplayState {
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended)
    }

    pub fn timeouts_for(&self, agent: &AgentId) -> u32 {
        self.timeouts_per_agent.get(agent).copied().unwrap_or(0)
    }
}

/// The generic reducer used by the engine and by offline tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchReducer;

impl Reducer for MatchReducer {
    type State = MatchReplayState;

    fn reduce(&self, prior: Option<MatchReplayState>, event: &MatchEvent) -> MatchReplayState {
        let mut state = prior.unwrap_or_else(|| MatchReplayState {
            match_id: event.match_id.clone(),
            ..MatchReplayState::default()
        });
        state.last_seq = Some(event.seq);
        state.event_count += 1;

        match &event.kind {
            EventKind::MatchStarted {
                seed,
                agent_ids,
                scenario_name,
                max_turns,
                scene,
            } => {
                state.phase = MatchPhase::Running;
                state.seed = Some(*seed);
                state.scenario_name = Some(scenario_name.clone());
                state.max_turns = *max_turns;
                state.agent_ids = agent_ids.clone();
                state.scores = agent_ids.iter().map(|id| (id.clone(), 0)).collect();
                state.timeouts_per_agent = agent_ids.iter().map(|id| (id.clone(), 0)).collect();
                state.scene = scene.clone();
            }
            EventKind::ActionRequested { agent_id, turn } => {
                state.turn = state.turn.max(*turn);
                state.awaiting = Some(agent_id.clone());
            }
            EventKind::AgentTimedOut { agent_id, .. } => {
                *state.timeouts_per_agent.entry(agent_id.clone()).or_insert(0) += 1;
            }
            EventKind::ActionAdjudicated {
                valid,
                score_deltas,
                ..
            } => {
                if *valid {
                    state.valid_actions += 1;
                } else {
                    state.invalid_actions += 1;
                }
                for (agent, delta) in score_deltas {
                    *state.scores.entry(agent.clone()).or_insert(0) += delta;
                }
                state.awaiting = None;
            }
            EventKind::StateUpdated { turn, summary, .. } => {
                state.turn = state.turn.max(*turn);
                state.scene = summary.clone();
            }
            EventKind::MatchEnded {
                reason,
                turns,
                forfeited_by,
                ..
            } => {
                state.phase = MatchPhase::Ended;
                state.reason = Some(*reason);
                state.turn = *turns;
                state.forfeited_by = forfeited_by.clone();
                state.awaiting = None;
            }
            EventKind::MatchSetupFailed { message, .. } => {
                state.phase = MatchPhase::SetupFailed;
                state.setup_error = Some(message.clone());
            }
        }
        state
    }
}

/// Apply one event with [`MatchReducer`].
pub fn reduce(prior: Option<MatchReplayState>, event: &MatchEvent) -> MatchReplayState {
    MatchReducer.reduce(prior, event)
}

/// Fold a whole log with [`MatchReducer`].
pub fn fold(events: &[MatchEvent]) -> Option<MatchReplayState> {
    MatchReducer.fold(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use crate::contract::TimeoutCause;
    use serde_json::json;

    fn sample_log() -> Vec<MatchEvent> {
        let a = AgentId::new("a-0");
        let b = AgentId::new("b-1");
        let mut log = EventLog::new("m-r");
        log.append(EventKind::MatchStarted {
            seed: 9,
            agent_ids: vec![a.clone(), b.clone()],
            scenario_name: "NumberGuess".to_string(),
            max_turns: 5,
            scene: json!({ "step": 0 }),
        });
        log.append(EventKind::ActionRequested {
            agent_id: a.clone(),
            turn: 1,
        });
        log.append(EventKind::ActionAdjudicated {
            agent_id: a.clone(),
            turn: 1,
            valid: true,
            chosen_action: json!({ "guess": 50 }),
            feedback: json!({ "code": "lower" }),
            score_deltas: ScoreMap::new(),
        });
        log.append(EventKind::ActionRequested {
            agent_id: b.clone(),
            turn: 1,
        });
        log.append(EventKind::AgentTimedOut {
            agent_id: b.clone(),
            turn: 1,
            cause: TimeoutCause::Deadline,
        });
        log.append(EventKind::ActionAdjudicated {
            agent_id: b.clone(),
            turn: 1,
            valid: false,
            chosen_action: json!({}),
            feedback: json!({ "code": "invalid" }),
            score_deltas: ScoreMap::new(),
        });
        log.append(EventKind::StateUpdated {
            turn: 1,
            scores: ScoreMap::new(),
            summary: json!({ "step": 2 }),
        });
        log.append(EventKind::ActionRequested {
            agent_id: a.clone(),
            turn: 2,
        });
        log.append(EventKind::ActionAdjudicated {
            agent_id: a.clone(),
            turn: 2,
            valid: true,
            chosen_action: json!({ "guess": 42 }),
            feedback: json!({ "code": "correct" }),
            score_deltas: [(a.clone(), 100)].into_iter().collect(),
        });
        log.append(EventKind::MatchEnded {
            reason: TerminationReason::Completed,
            scores: [(a, 100), (b, 0)].into_iter().collect(),
            turns: 2,
            forfeited_by: None,
            details: None,
        });
        log.into_events()
    }

    #[test]
    fn full_fold_reconstructs_scores_and_timeouts() {
        let events = sample_log();
        let state = fold(&events).unwrap();
        assert_eq!(state.phase, MatchPhase::Ended);
        assert_eq!(state.reason, Some(TerminationReason::Completed));
        assert_eq!(state.turn, 2);
        assert_eq!(state.scores[&AgentId::new("a-0")], 100);
        assert_eq!(state.scores[&AgentId::new("b-1")], 0);
        assert_eq!(state.timeouts_for(&AgentId::new("b-1")), 1);
        assert_eq!(state.valid_actions, 2);
        assert_eq!(state.invalid_actions, 1);
        assert_eq!(state.scene, json!({ "step": 2 }));
        assert_eq!(state.last_seq, Some(events.len() as u64 - 1));
    }

    #[test]
    fn split_fold_matches_direct_fold_at_every_cut() {
        let events = sample_log();
        let direct = fold(&events);
        for k in 0..=events.len() {
            let head = fold(&events[..k]);
            let continued = MatchReducer.fold_from(head, &events[k..]);
            assert_eq!(continued, direct, "cut at {k}");
        }
    }

    #[test]
    fn empty_fold_is_none() {
        assert!(fold(&[]).is_none());
    }

    #[test]
    fn setup_failed_log_folds_to_failed_phase_then_ended() {
        let events = crate::events::setup_failed_events("m-f", "boom", None);
        let after_first = fold(&events[..1]).unwrap();
        assert_eq!(after_first.phase, MatchPhase::SetupFailed);
        assert_eq!(after_first.setup_error.as_deref(), Some("boom"));
        let full = fold(&events).unwrap();
        assert_eq!(full.reason, Some(TerminationReason::SetupFailed));
        assert_eq!(full.turn, 0);
        assert!(full.scores.is_empty());
    }
}
