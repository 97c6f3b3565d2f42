//! Spectator scene for Heist and the typed reducer that rebuilds it from a log.
//!
//! `MatchStarted.scene` and every `StateUpdated.summary` carry a full
//! [`HeistScene`]. Between snapshots the reducer applies adjudicated actions
//! itself so a playback cursor shows moves as they happen.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contract::{ScoreMap, TerminationReason};
use crate::domain::AgentId;
use crate::events::{EventKind, MatchEvent, Reducer};
use crate::scenarios::heist::map::{Door, Entity, EntityKind, Guard, Item, Room};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPosition {
    pub room_id: String,
    pub extracted: bool,
    pub captured: bool,
    #[serde(default)]
    pub spotted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeistScene {
    pub rooms: BTreeMap<String, Room>,
    pub doors: BTreeMap<String, Door>,
    pub items: BTreeMap<String, Item>,
    pub entities: BTreeMap<String, Entity>,
    pub guards: Vec<Guard>,
    pub agents: BTreeMap<AgentId, AgentPosition>,
    pub alert_level: u32,
    pub max_alert_level: u32,
    pub turn: u32,
    pub extraction_room_id: String,
    pub required_objectives: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SceneStatus {
    #[default]
    Waiting,
    Playing,
    Ended,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeistSceneState {
    pub scene: HeistScene,
    pub status: SceneStatus,
    pub reason: Option<TerminationReason>,
    pub scores: ScoreMap,
    /// Most recent adjudication: agent, action, feedback.
    pub last_action: Option<(AgentId, Value, Value)>,
}

impl HeistSceneState {
    pub fn inventory(&self, agent: &AgentId) -> Vec<&Item> {
        self.scene
            .items
            .values()
            .filter(|i| i.held_by.as_ref() == Some(agent))
            .collect()
    }

    pub fn agent_room(&self, agent: &AgentId) -> Option<&str> {
        self.scene.agents.get(agent).map(|a| a.room_id.as_str())
    }
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn apply_action(scene: &mut HeistScene, agent: &AgentId, action: &Value, feedback: &Value) {
    if let Some(level) = feedback.get("alertLevel").and_then(Value::as_u64) {
        scene.alert_level = level as u32;
    }
    if feedback.get("captured").and_then(Value::as_bool) == Some(true) {
        if let Some(pos) = scene.agents.get_mut(agent) {
            pos.captured = true;
        }
    }
    match (str_field(action, "type"), str_field(feedback, "code")) {
        (Some("move"), Some("moved")) => {
            if let (Some(pos), Some(to)) = (scene.agents.get_mut(agent), str_field(action, "toRoomId")) {
                pos.room_id = to.to_string();
                pos.spotted = feedback.get("spottedBy").is_some();
            }
        }
        (Some("pickup"), Some("picked_up")) => {
            if let Some(item) = str_field(action, "itemId").and_then(|id| scene.items.get_mut(id)) {
                item.held_by = Some(agent.clone());
                item.room_id = None;
            }
            if feedback.get("vaultOpened").and_then(Value::as_bool) == Some(true) {
                for entity in scene.entities.values_mut() {
                    if let EntityKind::Vault { opened, .. } = &mut entity.kind {
                        *opened = true;
                    }
                }
            }
        }
        (Some("use_terminal"), Some(code @ ("hack_progress" | "hack_complete"))) => {
            let terminal_id = str_field(action, "terminalId").unwrap_or_default();
            let mut granted = None;
            if let Some(entity) = scene.entities.get_mut(terminal_id) {
                if let EntityKind::Terminal {
                    progress,
                    hacked,
                    grants_item,
                    ..
                } = &mut entity.kind
                {
                    *progress += 1;
                    if code == "hack_complete" {
                        *hacked = true;
                        granted = grants_item.clone();
                    }
                }
            }
            if let Some(item) = granted.and_then(|id| scene.items.get_mut(&id)) {
                item.held_by = Some(agent.clone());
                item.room_id = None;
            }
        }
        (Some("extract"), Some("extracted")) => {
            if let Some(pos) = scene.agents.get_mut(agent) {
                pos.extracted = true;
            }
        }
        _ => {}
    }
}

/// Reducer producing [`HeistSceneState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeistSceneReducer;

impl Reducer for HeistSceneReducer {
    type State = HeistSceneState;

    fn reduce(&self, prior: Option<HeistSceneState>, event: &MatchEvent) -> HeistSceneState {
        let mut state = prior.unwrap_or_default();
        match &event.kind {
            EventKind::MatchStarted { scene, agent_ids, .. } => {
                if let Ok(parsed) = serde_json::from_value::<HeistScene>(scene.clone()) {
                    state.scene = parsed;
                }
                state.scores = agent_ids.iter().map(|a| (a.clone(), 0)).collect();
                state.status = SceneStatus::Playing;
            }
            EventKind::ActionAdjudicated {
                agent_id,
                chosen_action,
                feedback,
                score_deltas,
                ..
            } => {
                apply_action(&mut state.scene, agent_id, chosen_action, feedback);
                for (agent, delta) in score_deltas {
                    *state.scores.entry(agent.clone()).or_insert(0) += delta;
                }
                state.last_action = Some((agent_id.clone(), chosen_action.clone(), feedback.clone()));
            }
            EventKind::StateUpdated { summary, .. } => {
                if let Ok(parsed) = serde_json::from_value::<HeistScene>(summary.clone()) {
                    state.scene = parsed;
                }
            }
            EventKind::MatchEnded { reason, .. } => {
                state.status = SceneStatus::Ended;
                state.reason = Some(*reason);
            }
            EventKind::ActionRequested { .. }
            | EventKind::AgentTimedOut { .. }
            | EventKind::MatchSetupFailed { .. } => {}
        }
        state
    }
}
