//! ResourceRivals: two-player sealed-bid auction over a seeded list of objectives.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::contract::{Adjudication, PlayerCount, Scenario, ScenarioFault, TerminationReason};
use crate::domain::AgentId;
use crate::scenarios::integer_value;

pub const STARTING_RESOURCES: i64 = 100;
pub const OBJECTIVE_COUNT: usize = 5;
pub const MIN_OBJECTIVE_VALUE: i64 = 10;
pub const MAX_OBJECTIVE_VALUE: i64 = 50;

/// A sealed bid. `None` when the payload carried no usable integer.
/// Integral floats are accepted, as for guesses.
///
/// Accepts `{"bid": n}` and `{"type": "bid", "amount": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BidWire")]
pub struct BidAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid: Option<i64>,
}

impl BidAction {
    pub fn bid(n: i64) -> Self {
        Self { bid: Some(n) }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BidWire {
    Direct { bid: Value },
    Typed { amount: Value },
    Other(IgnoredAny),
}

impl From<BidWire> for BidAction {
    fn from(wire: BidWire) -> Self {
        let bid = match wire {
            BidWire::Direct { bid } => integer_value(&bid),
            BidWire::Typed { amount } => integer_value(&amount),
            BidWire::Other(IgnoredAny) => None,
        };
        Self { bid }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub objective_value: i64,
    pub bids: BTreeMap<AgentId, i64>,
    pub winner: Option<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastResultView {
    pub objective_value: i64,
    pub my_bid: i64,
    pub opponent_bid: i64,
    pub winner: Option<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateView {
    pub remaining_resources: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRivalsObservation {
    pub objective_value: i64,
    pub captured_score: i64,
    pub objectives_remaining: usize,
    pub opponent_captured_score: i64,
    pub last_result: Option<LastResultView>,
    /// Whether this agent already bid on the current objective.
    pub has_bid: bool,
    #[serde(rename = "_private")]
    pub private: PrivateView,
}

#[derive(Debug, Clone)]
pub struct ResourceRivalsInstance {
    players: Vec<AgentId>,
    objectives: Vec<i64>,
    current: usize,
    resources: BTreeMap<AgentId, i64>,
    captured: BTreeMap<AgentId, i64>,
    pending: BTreeMap<AgentId, i64>,
    last_result: Option<RoundResult>,
}

impl ResourceRivalsInstance {
    pub fn remaining_resources(&self, agent: &AgentId) -> Option<i64> {
        self.resources.get(agent).copied()
    }

    pub fn captured(&self, agent: &AgentId) -> i64 {
        self.captured.get(agent).copied().unwrap_or(0)
    }

    pub fn last_result(&self) -> Option<&RoundResult> {
        self.last_result.as_ref()
    }

    fn opponent_of(&self, agent: &AgentId) -> Option<&AgentId> {
        self.players.iter().find(|p| *p != agent)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceRivals;

impl ResourceRivals {
    /// Instance with explicit objective values.
    pub fn instance_with_objectives(
        &self,
        agents: &[AgentId],
        objectives: Vec<i64>,
    ) -> ResourceRivalsInstance {
        ResourceRivalsInstance {
            players: agents.to_vec(),
            objectives,
            current: 0,
            resources: agents
                .iter()
                .map(|a| (a.clone(), STARTING_RESOURCES))
                .collect(),
            captured: agents.iter().map(|a| (a.clone(), 0)).collect(),
            pending: BTreeMap::new(),
            last_result: None,
        }
    }

    fn resolve_round(&self, instance: &mut ResourceRivalsInstance) -> Result<RoundResult, ScenarioFault> {
        let value = instance
            .objectives
            .get(instance.current)
            .copied()
            .ok_or_else(|| ScenarioFault::Invariant("bid resolved past last objective".into()))?;
        let bids = std::mem::take(&mut instance.pending);

        for (agent, bid) in &bids {
            let pool = instance
                .resources
                .get_mut(agent)
                .ok_or_else(|| ScenarioFault::UnknownAgent(agent.clone()))?;
            *pool -= bid;
            if *pool < 0 {
                return Err(ScenarioFault::Invariant(format!("{agent} overspent resources")));
            }
        }

        let top = bids.values().copied().max().unwrap_or(0);
        let leaders: Vec<&AgentId> = bids.iter().filter(|(_, b)| **b == top).map(|(a, _)| a).collect();
        let winner = match leaders.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        };
        if let Some(w) = &winner {
            *instance.captured.entry(w.clone()).or_insert(0) += value;
        }
        instance.current += 1;

        let result = RoundResult {
            objective_value: value,
            bids,
            winner,
        };
        instance.last_result = Some(result.clone());
        Ok(result)
    }
}

impl Scenario for ResourceRivals {
    type Instance = ResourceRivalsInstance;
    type Observation = ResourceRivalsObservation;
    type Action = BidAction;

    fn name(&self) -> &'static str {
        "ResourceRivals"
    }

    fn player_count(&self) -> PlayerCount {
        PlayerCount::exactly(2)
    }

    fn init(&self, seed: u64, agents: &[AgentId]) -> Result<ResourceRivalsInstance, ScenarioFault> {
        self.player_count().check(agents.len())?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let objectives = (0..OBJECTIVE_COUNT)
            .map(|_| rng.gen_range(MIN_OBJECTIVE_VALUE..=MAX_OBJECTIVE_VALUE))
            .collect();
        Ok(self.instance_with_objectives(agents, objectives))
    }

    fn observe(&self, instance: &ResourceRivalsInstance, agent: &AgentId) -> ResourceRivalsObservation {
        let opponent = instance.opponent_of(agent);
        let last_result = instance.last_result.as_ref().map(|r| LastResultView {
            objective_value: r.objective_value,
            my_bid: r.bids.get(agent).copied().unwrap_or(0),
            opponent_bid: opponent.and_then(|o| r.bids.get(o)).copied().unwrap_or(0),
            winner: r.winner.clone(),
        });
        ResourceRivalsObservation {
            objective_value: instance.objectives.get(instance.current).copied().unwrap_or(0),
            captured_score: instance.captured(agent),
            objectives_remaining: instance.objectives.len().saturating_sub(instance.current),
            opponent_captured_score: opponent.map(|o| instance.captured(o)).unwrap_or(0),
            last_result,
            has_bid: instance.pending.contains_key(agent),
            private: PrivateView {
                remaining_resources: instance.remaining_resources(agent).unwrap_or(0),
            },
        }
    }

    fn adjudicate(
        &self,
        instance: &mut ResourceRivalsInstance,
        agent: &AgentId,
        action: &BidAction,
    ) -> Result<Adjudication, ScenarioFault> {
        let remaining = instance
            .remaining_resources(agent)
            .ok_or_else(|| ScenarioFault::UnknownAgent(agent.clone()))?;
        if instance.current >= instance.objectives.len() {
            return Ok(Adjudication::rejected("no_objective", "all objectives have been contested"));
        }
        if instance.pending.contains_key(agent) {
            return Ok(Adjudication::rejected("already_bid", "already bid on this objective"));
        }

        let (bid, mut adjudication) = match action.bid {
            Some(b) if (0..=remaining).contains(&b) => (b, Adjudication::accepted("bid_placed")),
            _ => (
                0,
                Adjudication::rejected(
                    "invalid_bid",
                    format!("bid must be an integer in [0, {remaining}]; counted as 0"),
                ),
            ),
        };
        adjudication = adjudication.with("bid", bid);
        instance.pending.insert(agent.clone(), bid);

        if instance.pending.len() < instance.players.len() {
            return Ok(adjudication.with("resolved", false));
        }

        let result = self.resolve_round(instance)?;
        adjudication = adjudication
            .with("resolved", true)
            .with("objectiveValue", result.objective_value)
            .with("tie", result.winner.is_none())
            .with("winner", json!(result.winner));
        if let Some(w) = &result.winner {
            adjudication = adjudication.award(w, result.objective_value);
        }
        Ok(adjudication)
    }

    fn check_termination(&self, instance: &ResourceRivalsInstance) -> Option<TerminationReason> {
        (instance.current >= instance.objectives.len()).then_some(TerminationReason::Completed)
    }

    fn default_action(&self) -> BidAction {
        BidAction { bid: None }
    }

    fn public_summary(&self, instance: &ResourceRivalsInstance) -> Value {
        json!({
            "objectivesTotal": instance.objectives.len(),
            "objectivesResolved": instance.current,
            "captured": instance.captured,
            "lastResult": instance.last_result,
        })
    }

    fn scenario_hints(&self) -> Value {
        json!({
            "startingResources": STARTING_RESOURCES,
            "objectiveCount": OBJECTIVE_COUNT,
            "actions": ["bid"],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> Vec<AgentId> {
        vec![AgentId::new("randomBidder-0"), AgentId::new("conservative-1")]
    }

    #[test]
    fn tie_spends_resources_and_captures_nothing() {
        let s = ResourceRivals;
        let ids = pair();
        let mut inst = s.instance_with_objectives(&ids, vec![30, 20]);

        let first = s.adjudicate(&mut inst, &ids[0], &BidAction::bid(20)).unwrap();
        assert!(first.valid);
        assert_eq!(first.feedback["resolved"], false);

        let second = s.adjudicate(&mut inst, &ids[1], &BidAction::bid(20)).unwrap();
        assert_eq!(second.feedback["tie"], true);
        assert!(second.score_deltas.is_empty());

        assert_eq!(inst.remaining_resources(&ids[0]), Some(80));
        assert_eq!(inst.remaining_resources(&ids[1]), Some(80));
        assert_eq!(inst.captured(&ids[0]), 0);
        assert_eq!(inst.captured(&ids[1]), 0);
        assert_eq!(inst.last_result().unwrap().winner, None);
        assert_eq!(s.check_termination(&inst), None);
    }

    #[test]
    fn higher_bid_captures_even_when_first_to_bid() {
        let s = ResourceRivals;
        let ids = pair();
        let mut inst = s.instance_with_objectives(&ids, vec![30]);
        s.adjudicate(&mut inst, &ids[0], &BidAction::bid(25)).unwrap();
        let adj = s.adjudicate(&mut inst, &ids[1], &BidAction::bid(10)).unwrap();
        assert_eq!(adj.score_deltas.get(&ids[0]), Some(&30));
        assert_eq!(inst.captured(&ids[0]), 30);
        assert_eq!(s.check_termination(&inst), Some(TerminationReason::Completed));

        let obs = s.observe(&inst, &ids[1]);
        let last = obs.last_result.unwrap();
        assert_eq!(last.my_bid, 10);
        assert_eq!(last.opponent_bid, 25);
        assert_eq!(obs.opponent_captured_score, 30);
        assert_eq!(obs.private.remaining_resources, 90);
    }

    #[test]
    fn invalid_bid_counts_as_zero() {
        let s = ResourceRivals;
        let ids = pair();
        let mut inst = s.instance_with_objectives(&ids, vec![30]);
        let adj = s.adjudicate(&mut inst, &ids[0], &BidAction::bid(500)).unwrap();
        assert!(!adj.valid);
        assert_eq!(adj.code(), Some("invalid_bid"));
        assert_eq!(adj.feedback["bid"], 0);
        s.adjudicate(&mut inst, &ids[1], &BidAction::bid(1)).unwrap();
        assert_eq!(inst.remaining_resources(&ids[0]), Some(100));
        assert_eq!(inst.captured(&ids[1]), 30);
    }

    #[test]
    fn bid_wire_formats_match_guesses() {
        let direct: BidAction = serde_json::from_str(r#"{"bid":20.0}"#).unwrap();
        assert_eq!(direct, BidAction::bid(20));
        let typed: BidAction = serde_json::from_str(r#"{"type":"bid","amount":15}"#).unwrap();
        assert_eq!(typed, BidAction::bid(15));
        let fractional: BidAction = serde_json::from_str(r#"{"bid":2.5}"#).unwrap();
        assert_eq!(fractional.bid, None);
        let junk: BidAction = serde_json::from_str(r#""all in""#).unwrap();
        assert_eq!(junk.bid, None);

        let s = ResourceRivals;
        let ids = pair();
        let mut inst = s.instance_with_objectives(&ids, vec![30]);
        let adj = s.adjudicate(&mut inst, &ids[0], &direct).unwrap();
        assert!(adj.valid);
        s.adjudicate(&mut inst, &ids[1], &BidAction::bid(10)).unwrap();
        assert_eq!(inst.remaining_resources(&ids[0]), Some(80));
        assert_eq!(inst.captured(&ids[0]), 30);
    }

    #[test]
    fn double_bid_rejected() {
        let s = ResourceRivals;
        let ids = pair();
        let mut inst = s.instance_with_objectives(&ids, vec![30]);
        s.adjudicate(&mut inst, &ids[0], &BidAction::bid(5)).unwrap();
        let adj = s.adjudicate(&mut inst, &ids[0], &BidAction::bid(5)).unwrap();
        assert_eq!(adj.code(), Some("already_bid"));
    }

    #[test]
    fn wrong_player_count_fails_init() {
        let err = ResourceRivals
            .init(1, &[AgentId::new("a-0")])
            .unwrap_err();
        assert!(matches!(err, ScenarioFault::PlayerCount { .. }));
    }

    #[test]
    fn observation_hides_private_under_underscore_key() {
        let s = ResourceRivals;
        let ids = pair();
        let inst = s.init(77, &ids).unwrap();
        let v = serde_json::to_value(s.observe(&inst, &ids[0])).unwrap();
        assert_eq!(v["_private"]["remainingResources"], STARTING_RESOURCES);
        assert_eq!(v["objectivesRemaining"], OBJECTIVE_COUNT);
    }
}
