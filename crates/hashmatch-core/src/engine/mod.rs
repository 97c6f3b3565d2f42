//! The match engine: one turn loop, every outcome recorded as an event.
//!
//! [`run_match`] never returns an error. Setup faults, scenario faults,
//! timeouts and forfeits all end up in the log, and the final
//! [`MatchResult`] is read back from the folded log state.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, Instrument};

use crate::contract::{
    ForfeitPolicy, MatchConfig, Scenario, ScoreMap, TerminationReason,
};
use crate::domain::AgentId;
use crate::events::{setup_failed_events, EventKind, EventLog, MatchEvent, MatchReplayState};
use crate::gateway::{Delivery, DeliveryRequest, MatchSetup, Transport, DEFAULT_DEADLINE_MS};
use crate::metrics::METRICS;
use crate::obs::{self, MatchSpan};

/// Per-match knobs that are not part of the recorded config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub deadline: Duration,
    pub forfeit: ForfeitPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(DEFAULT_DEADLINE_MS),
            forfeit: ForfeitPolicy::never(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub match_id: String,
    pub seed: u64,
    pub agent_ids: Vec<AgentId>,
    pub events: Vec<MatchEvent>,
    pub scores: ScoreMap,
    pub turns: u32,
    pub timeouts_per_agent: BTreeMap<AgentId, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forfeited_by: Option<AgentId>,
    pub reason: TerminationReason,
}

impl MatchResult {
    /// Result as reconstructed from a complete log.
    pub fn from_state(state: &MatchReplayState, seed: u64, agent_ids: &[AgentId], events: Vec<MatchEvent>) -> Self {
        Self {
            match_id: state.match_id.clone(),
            seed,
            agent_ids: agent_ids.to_vec(),
            events,
            scores: state.scores.clone(),
            turns: state.turn,
            timeouts_per_agent: state.timeouts_per_agent.clone(),
            forfeited_by: state.forfeited_by.clone(),
            reason: state.reason.unwrap_or(TerminationReason::Error),
        }
    }

    /// Result of a complete log. An empty log yields an `error` result.
    pub fn from_events(events: Vec<MatchEvent>, seed: u64, agent_ids: &[AgentId]) -> Self {
        match crate::events::fold(&events) {
            Some(state) => Self::from_state(&state, seed, agent_ids, events),
            None => Self {
                match_id: String::new(),
                seed,
                agent_ids: agent_ids.to_vec(),
                events,
                scores: ScoreMap::new(),
                turns: 0,
                timeouts_per_agent: BTreeMap::new(),
                forfeited_by: None,
                reason: TerminationReason::Error,
            },
        }
    }

    /// Unique top scorer, if there is one.
    pub fn winner(&self) -> Option<&AgentId> {
        winner_of(&self.scores)
    }
}

pub fn winner_of(scores: &ScoreMap) -> Option<&AgentId> {
    let best = scores.values().max()?;
    let mut leaders = scores.iter().filter(|(_, s)| *s == best);
    let (first, _) = leaders.next()?;
    match leaders.next() {
        Some(_) => None,
        None => Some(first),
    }
}

struct Ending {
    reason: TerminationReason,
    turns: u32,
    forfeited_by: Option<AgentId>,
    details: Option<Value>,
}

impl Ending {
    fn new(reason: TerminationReason, turns: u32) -> Self {
        Self {
            reason,
            turns,
            forfeited_by: None,
            details: None,
        }
    }
}

/// Run one match to completion.
///
/// Agents act strictly in `agent_ids` order, one at a time. Termination is
/// checked after every adjudication and again after the turn's bookkeeping.
pub async fn run_match<S, T>(
    scenario: &S,
    transport: &mut T,
    agent_ids: &[AgentId],
    config: &MatchConfig,
    options: &EngineOptions,
) -> MatchResult
where
    S: Scenario,
    T: Transport<S::Observation, S::Action> + ?Sized,
{
    run_match_inner(scenario, transport, agent_ids, config, options)
        .instrument(MatchSpan::span(&config.match_id))
        .await
}

async fn run_match_inner<S, T>(
    scenario: &S,
    transport: &mut T,
    agent_ids: &[AgentId],
    config: &MatchConfig,
    options: &EngineOptions,
) -> MatchResult
where
    S: Scenario,
    T: Transport<S::Observation, S::Action> + ?Sized,
{
    let match_id = config.match_id.as_str();
    let mut instance = match scenario.init(config.seed, agent_ids) {
        Ok(instance) => instance,
        Err(fault) => {
            let message = fault.to_string();
            obs::emit_match_setup_failed(match_id, &message);
            METRICS.inc_setup_failures();
            let events = setup_failed_events(
                match_id,
                &message,
                Some(json!({ "scenario": scenario.name() })),
            );
            return MatchResult::from_events(events, config.seed, agent_ids);
        }
    };

    let hints = scenario.scenario_hints();
    transport.prepare(&MatchSetup {
        match_id,
        seed: config.seed,
        scenario_name: scenario.name(),
        scenario_hints: &hints,
        agent_ids,
    });

    obs::emit_match_started(match_id, scenario.name(), config.seed, agent_ids.len());
    let mut log = EventLog::new(match_id);
    log.append(EventKind::MatchStarted {
        seed: config.seed,
        agent_ids: agent_ids.to_vec(),
        scenario_name: scenario.name().to_string(),
        max_turns: config.max_turns,
        scene: scenario.public_summary(&instance),
    });

    let mut consecutive: BTreeMap<&AgentId, u32> = BTreeMap::new();
    let ending = 'turns: {
        for turn in 1..=config.max_turns {
            for agent_id in agent_ids {
                log.append(EventKind::ActionRequested {
                    agent_id: agent_id.clone(),
                    turn,
                });
                let observation = scenario.observe(&instance, agent_id);
                let delivery = transport
                    .deliver(DeliveryRequest {
                        match_id,
                        agent_id,
                        turn,
                        observation: &observation,
                        deadline: options.deadline,
                    })
                    .await;

                let action = match delivery {
                    Delivery::Action(action) => {
                        consecutive.insert(agent_id, 0);
                        action
                    }
                    Delivery::TimedOut(cause) => {
                        METRICS.inc_agent_timeouts();
                        obs::emit_agent_timed_out(match_id, agent_id.as_str(), turn, cause.as_str());
                        log.append(EventKind::AgentTimedOut {
                            agent_id: agent_id.clone(),
                            turn,
                            cause,
                        });
                        let streak = consecutive.entry(agent_id).or_insert(0);
                        *streak += 1;
                        if options.forfeit.triggers(*streak) {
                            break 'turns Ending {
                                forfeited_by: Some(agent_id.clone()),
                                details: Some(json!({ "consecutiveTimeouts": *streak })),
                                ..Ending::new(TerminationReason::Completed, turn)
                            };
                        }
                        scenario.default_action()
                    }
                };

                let adjudication = match scenario.adjudicate(&mut instance, agent_id, &action) {
                    Ok(adjudication) => adjudication,
                    Err(fault) => {
                        break 'turns Ending {
                            details: Some(json!({
                                "message": fault.to_string(),
                                "agentId": agent_id,
                            })),
                            ..Ending::new(TerminationReason::Error, turn)
                        };
                    }
                };
                debug!(agent_id = %agent_id, turn, valid = adjudication.valid, "adjudicated");
                log.append(EventKind::ActionAdjudicated {
                    agent_id: agent_id.clone(),
                    turn,
                    valid: adjudication.valid,
                    chosen_action: serde_json::to_value(&action).unwrap_or(Value::Null),
                    feedback: adjudication.feedback,
                    score_deltas: adjudication.score_deltas,
                });

                if let Some(reason) = scenario.check_termination(&instance) {
                    break 'turns Ending::new(reason, turn);
                }
            }

            if let Err(fault) = scenario.end_turn(&mut instance, turn) {
                break 'turns Ending {
                    details: Some(json!({ "message": fault.to_string() })),
                    ..Ending::new(TerminationReason::Error, turn)
                };
            }
            log.append(EventKind::StateUpdated {
                turn,
                scores: current_scores(&log),
                summary: scenario.public_summary(&instance),
            });
            if let Some(reason) = scenario.check_termination(&instance) {
                break 'turns Ending::new(reason, turn);
            }
        }
        Ending::new(TerminationReason::MaxTurns, config.max_turns)
    };

    log.append(EventKind::MatchEnded {
        reason: ending.reason,
        scores: current_scores(&log),
        turns: ending.turns,
        forfeited_by: ending.forfeited_by,
        details: ending.details,
    });

    METRICS.inc_matches_run();
    METRICS.add_turns_played(u64::from(ending.turns));
    obs::emit_match_ended(match_id, ending.reason.as_str(), ending.turns, log.len());

    MatchResult::from_events(log.into_events(), config.seed, agent_ids)
}

fn current_scores(log: &EventLog) -> ScoreMap {
    log.state().map(|s| s.scores.clone()).unwrap_or_default()
}
