//! Scripted Heist agent.
//!
//! Rules, first match wins: extract when carrying an objective in the
//! extraction room; pick up anything visible; hack an unhacked terminal in
//! the room; head for extraction once an objective is held; otherwise walk
//! to the least visited passable neighbour.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use async_trait::async_trait;

use crate::contract::{Agent, AgentConfig, AgentContext, AgentError};
use crate::domain::AgentId;
use crate::scenarios::heist::map::ItemKind;
use crate::scenarios::{HeistAction, HeistObservation};

#[derive(Debug, Clone)]
struct Edge {
    to: String,
    locked: bool,
    required_item: Option<String>,
}

pub struct ExplorerAgent {
    id: AgentId,
    graph: BTreeMap<String, Vec<Edge>>,
    visits: BTreeMap<String, u32>,
    /// Pickups already tried since the inventory last changed.
    attempted: BTreeSet<String>,
    inventory_size: usize,
}

impl ExplorerAgent {
    pub fn new(id: AgentId) -> Self {
        Self {
            id,
            graph: BTreeMap::new(),
            visits: BTreeMap::new(),
            attempted: BTreeSet::new(),
            inventory_size: 0,
        }
    }

    fn learn(&mut self, obs: &HeistObservation) {
        let edges = obs
            .adjacent_rooms
            .iter()
            .map(|a| Edge {
                to: a.room_id.clone(),
                locked: a.locked,
                required_item: a.required_item.clone(),
            })
            .collect();
        self.graph.insert(obs.current_room_id.clone(), edges);
        *self.visits.entry(obs.current_room_id.clone()).or_insert(0) += 1;
        if obs.inventory.len() != self.inventory_size {
            self.inventory_size = obs.inventory.len();
            self.attempted.clear();
        }
    }

    fn decide(&mut self, obs: &HeistObservation) -> HeistAction {
        let held: BTreeSet<&str> = obs.inventory.iter().map(|i| i.item_id.as_str()).collect();
        let has_objective = obs.inventory.iter().any(|i| i.kind == ItemKind::Objective);
        let extraction = obs.private.extraction_room_id.as_str();

        if has_objective && obs.current_room_id == extraction {
            return HeistAction::Extract;
        }

        if let Some(item) = obs
            .visible_items
            .iter()
            .find(|i| !self.attempted.contains(&i.id))
        {
            self.attempted.insert(item.id.clone());
            return HeistAction::Pickup {
                item_id: item.id.clone(),
            };
        }

        let unhacked = obs.visible_entities.iter().find(|e| {
            e.kind == "terminal" && !obs.private.terminal_hacked.get(&e.id).copied().unwrap_or(false)
        });
        if let Some(terminal) = unhacked {
            return HeistAction::UseTerminal {
                terminal_id: terminal.id.clone(),
            };
        }

        if has_objective {
            if let Some(next) = self.next_hop(&obs.current_room_id, extraction, &held) {
                return HeistAction::Move { to_room_id: next };
            }
        }

        let next = obs
            .adjacent_rooms
            .iter()
            .filter(|a| a.passable)
            .min_by_key(|a| (self.visits.get(&a.room_id).copied().unwrap_or(0), a.room_id.clone()));
        match next {
            Some(room) => HeistAction::Move {
                to_room_id: room.room_id.clone(),
            },
            None => HeistAction::Wait,
        }
    }

    /// First step of a shortest known path, BFS in room-id order.
    fn next_hop(&self, from: &str, to: &str, held: &BTreeSet<&str>) -> Option<String> {
        let mut parent: BTreeMap<&str, &str> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);
        while let Some(room) = queue.pop_front() {
            if room == to {
                let mut step = room;
                while let Some(&prev) = parent.get(step) {
                    if prev == from {
                        return Some(step.to_string());
                    }
                    step = prev;
                }
                return None;
            }
            let Some(edges) = self.graph.get(room) else {
                continue;
            };
            let mut open: Vec<&Edge> = edges
                .iter()
                .filter(|e| {
                    !e.locked || e.required_item.as_deref().map_or(true, |r| held.contains(r))
                })
                .collect();
            open.sort_by(|a, b| a.to.cmp(&b.to));
            for edge in open {
                if seen.insert(edge.to.as_str()) {
                    parent.insert(edge.to.as_str(), room);
                    queue.push_back(edge.to.as_str());
                }
            }
        }
        None
    }
}

#[async_trait]
impl Agent<HeistObservation, HeistAction> for ExplorerAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn init(&mut self, _config: &AgentConfig) {
        self.graph.clear();
        self.visits.clear();
        self.attempted.clear();
        self.inventory_size = 0;
    }

    async fn act(
        &mut self,
        obs: &HeistObservation,
        _ctx: &mut AgentContext,
    ) -> Result<HeistAction, AgentError> {
        self.learn(obs);
        Ok(self.decide(obs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Scenario;
    use crate::scenarios::Heist;

    #[tokio::test]
    async fn explorer_is_deterministic() {
        async fn play(seed: u64) -> Vec<HeistAction> {
            let id = AgentId::new("explorer-0");
            let scenario = Heist;
            let mut inst = scenario.init(seed, std::slice::from_ref(&id)).unwrap();
            let mut agent = ExplorerAgent::new(id.clone());
            let mut ctx = AgentContext::new(id.clone(), seed);
            let mut actions = Vec::new();
            for turn in 1..=12 {
                let obs = scenario.observe(&inst, &id);
                let action = agent.act(&obs, &mut ctx).await.unwrap();
                scenario.adjudicate(&mut inst, &id, &action).unwrap();
                actions.push(action);
                if scenario.check_termination(&inst).is_some() {
                    break;
                }
                scenario.end_turn(&mut inst, turn).unwrap();
                if scenario.check_termination(&inst).is_some() {
                    break;
                }
            }
            actions
        }
        assert_eq!(play(5).await, play(5).await);
    }

    #[tokio::test]
    async fn first_move_leaves_spawn() {
        let id = AgentId::new("explorer-0");
        let scenario = Heist;
        let inst = scenario.init(1, std::slice::from_ref(&id)).unwrap();
        let obs = scenario.observe(&inst, &id);
        let mut agent = ExplorerAgent::new(id.clone());
        let mut ctx = AgentContext::new(id, 1);
        let action = agent.act(&obs, &mut ctx).await.unwrap();
        assert_eq!(
            action,
            HeistAction::Move {
                to_room_id: "hallway".to_string()
            }
        );
    }
}
