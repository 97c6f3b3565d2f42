//! Heist: navigate a guarded facility, open the vault and extract.
//!
//! Guards are part of the instance and the spectator scene, never of an
//! agent observation. A guard that shares a room with an agent spots it;
//! sharing a room again at the next check is a capture. Every invalid
//! action raises the alert level; reaching [`map::MAX_ALERT_LEVEL`] locks
//! the facility down.

pub mod map;
pub mod scene;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::contract::{Adjudication, PlayerCount, Scenario, ScenarioFault, TerminationReason};
use crate::domain::AgentId;

use map::{generate_facility, EntityKind, Facility, ItemKind, MAX_ALERT_LEVEL};
use scene::AgentPosition;
pub use scene::{HeistScene, HeistSceneReducer, HeistSceneState};

pub const LOOT_MULTIPLIER: i64 = 1;
pub const HACK_BONUS: i64 = 10;
pub const EXTRACT_BONUS: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum HeistAction {
    Move { to_room_id: String },
    Pickup { item_id: String },
    UseTerminal { terminal_id: String },
    Extract,
    Wait,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjacentRoom {
    pub room_id: String,
    pub door_id: String,
    pub locked: bool,
    pub required_item: Option<String>,
    pub passable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hack_turns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_items: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub item_id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeistPrivate {
    pub alert_level: u32,
    pub extraction_room_id: String,
    pub terminal_progress: BTreeMap<String, u32>,
    pub terminal_hacked: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeistObservation {
    pub current_room_id: String,
    pub adjacent_rooms: Vec<AdjacentRoom>,
    pub visible_items: Vec<VisibleItem>,
    pub visible_entities: Vec<VisibleEntity>,
    pub inventory: Vec<InventoryItem>,
    pub turn: u32,
    #[serde(rename = "_private")]
    pub private: HeistPrivate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AgentState {
    room_id: String,
    extracted: bool,
    captured: bool,
    spotted: bool,
    cameras_seen: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GuardContact {
    Clear,
    Spotted(String),
    Captured(String),
}

#[derive(Debug, Clone)]
pub struct HeistInstance {
    facility: Facility,
    agents: BTreeMap<AgentId, AgentState>,
    alert_level: u32,
    turn: u32,
}

impl HeistInstance {
    pub fn facility(&self) -> &Facility {
        &self.facility
    }

    pub fn alert_level(&self) -> u32 {
        self.alert_level
    }

    pub fn agent_room(&self, agent: &AgentId) -> Option<&str> {
        self.agents.get(agent).map(|a| a.room_id.as_str())
    }

    pub fn holds(&self, agent: &AgentId, item_id: &str) -> bool {
        self.facility
            .items
            .get(item_id)
            .is_some_and(|i| i.held_by.as_ref() == Some(agent))
    }

    fn reject(&mut self, code: &str, message: impl Into<String>) -> Adjudication {
        self.alert_level = (self.alert_level + 1).min(MAX_ALERT_LEVEL);
        Adjudication::rejected(code, message).with("alertLevel", self.alert_level)
    }

    /// Checked after every move and after the guards step. Leaving the
    /// guard's room before the next check clears the sighting.
    fn check_guards(&mut self, agent: &AgentId) -> GuardContact {
        let Some(state) = self.agents.get_mut(agent) else {
            return GuardContact::Clear;
        };
        if state.extracted || state.captured {
            return GuardContact::Clear;
        }
        let Some(guard) = self.facility.guards.iter().find(|g| g.room_id == state.room_id) else {
            state.spotted = false;
            return GuardContact::Clear;
        };
        if state.spotted {
            state.captured = true;
            GuardContact::Captured(guard.guard_id.clone())
        } else {
            state.spotted = true;
            GuardContact::Spotted(guard.guard_id.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Heist;

impl Heist {
    /// Instance over a prepared facility, every agent at the spawn room.
    pub fn instance_with_facility(&self, agents: &[AgentId], facility: Facility) -> HeistInstance {
        let agent_states = agents
            .iter()
            .map(|a| {
                (
                    a.clone(),
                    AgentState {
                        room_id: facility.spawn_room_id.clone(),
                        extracted: false,
                        captured: false,
                        spotted: false,
                        cameras_seen: BTreeSet::new(),
                    },
                )
            })
            .collect();
        HeistInstance {
            facility,
            agents: agent_states,
            alert_level: 0,
            turn: 1,
        }
    }

    pub fn scene(&self, instance: &HeistInstance) -> HeistScene {
        let f = &instance.facility;
        HeistScene {
            rooms: f.rooms.clone(),
            doors: f.doors.clone(),
            items: f.items.clone(),
            entities: f.entities.clone(),
            guards: f.guards.clone(),
            agents: instance
                .agents
                .iter()
                .map(|(id, s)| {
                    (
                        id.clone(),
                        AgentPosition {
                            room_id: s.room_id.clone(),
                            extracted: s.extracted,
                            captured: s.captured,
                            spotted: s.spotted,
                        },
                    )
                })
                .collect(),
            alert_level: instance.alert_level,
            max_alert_level: MAX_ALERT_LEVEL,
            turn: instance.turn,
            extraction_room_id: f.extraction_room_id.clone(),
            required_objectives: f.required_objectives.clone(),
        }
    }

    fn do_move(&self, inst: &mut HeistInstance, agent: &AgentId, to: &str) -> Adjudication {
        let current = inst.agent_room(agent).unwrap_or_default().to_string();
        if !inst.facility.rooms.contains_key(to) {
            return inst.reject("unknown_room", format!("room '{to}' does not exist"));
        }
        let Some(door) = inst.facility.door_between(&current, to).cloned() else {
            return inst.reject(
                "no_door_between_rooms",
                format!("no door between '{current}' and '{to}'"),
            );
        };
        if door.is_locked {
            if let Some(required) = &door.required_item {
                if !inst.holds(agent, required) {
                    return inst
                        .reject("missing_required_item", format!("door needs '{required}'"))
                        .with("doorId", door.door_id.clone());
                }
            }
        }

        if let Some(state) = inst.agents.get_mut(agent) {
            state.room_id = to.to_string();
        }
        let mut adjudication = Adjudication::accepted("moved").with("roomId", to);

        let camera = inst.facility.entities.values().find(|e| {
            e.room_id == to && matches!(e.kind, EntityKind::Camera { disabled: false })
        });
        if let Some(camera_id) = camera.map(|c| c.entity_id.clone()) {
            let first_sighting = inst
                .agents
                .get_mut(agent)
                .is_some_and(|s| s.cameras_seen.insert(camera_id.clone()));
            if first_sighting {
                inst.alert_level = (inst.alert_level + 1).min(MAX_ALERT_LEVEL);
                adjudication = adjudication
                    .with("cameraSpotted", camera_id)
                    .with("alertLevel", inst.alert_level);
            }
        }
        match inst.check_guards(agent) {
            GuardContact::Clear => {}
            GuardContact::Spotted(guard_id) => adjudication = adjudication.with("spottedBy", guard_id),
            GuardContact::Captured(guard_id) => {
                adjudication = adjudication.with("captured", true).with("capturedBy", guard_id);
            }
        }
        adjudication
    }

    fn do_pickup(&self, inst: &mut HeistInstance, agent: &AgentId, item_id: &str) -> Adjudication {
        let current = inst.agent_room(agent).unwrap_or_default().to_string();
        let Some(item) = inst
            .facility
            .items
            .get(item_id)
            .filter(|i| i.held_by.is_none() && i.room_id.as_deref() == Some(current.as_str()))
            .cloned()
        else {
            return inst.reject("item_not_in_room", format!("'{item_id}' is not in '{current}'"));
        };

        let mut vault_opened = false;
        if current == inst.facility.vault_room_id {
            let vault_state = inst.facility.vault().and_then(|v| match &v.kind {
                EntityKind::Vault {
                    required_items,
                    opened,
                } => Some((v.entity_id.clone(), required_items.clone(), *opened)),
                _ => None,
            });
            if let Some((vault_id, required, false)) = vault_state {
                let missing: Vec<String> = required
                    .iter()
                    .filter(|r| !inst.holds(agent, r))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return inst
                        .reject("vault_locked", "vault needs more items")
                        .with("missing", missing);
                }
                if let Some(EntityKind::Vault { opened, .. }) =
                    inst.facility.entities.get_mut(&vault_id).map(|e| &mut e.kind)
                {
                    *opened = true;
                }
                vault_opened = true;
            }
        }

        if let Some(held) = inst.facility.items.get_mut(item_id) {
            held.held_by = Some(agent.clone());
            held.room_id = None;
        }
        let mut adjudication = Adjudication::accepted("picked_up").with("itemId", item_id);
        if vault_opened {
            adjudication = adjudication.with("vaultOpened", true);
        }
        if item.kind == ItemKind::Loot {
            adjudication = adjudication.award(agent, item.score_value.unwrap_or(0) * LOOT_MULTIPLIER);
        }
        adjudication
    }

    fn do_use_terminal(
        &self,
        inst: &mut HeistInstance,
        agent: &AgentId,
        terminal_id: &str,
    ) -> Adjudication {
        let current = inst.agent_room(agent).unwrap_or_default().to_string();
        let in_room = inst.facility.entities.get(terminal_id).is_some_and(|e| {
            e.room_id == current && matches!(e.kind, EntityKind::Terminal { .. })
        });
        if !in_room {
            return inst.reject(
                "terminal_not_in_room",
                format!("no terminal '{terminal_id}' in '{current}'"),
            );
        }
        let Some(EntityKind::Terminal {
            hack_turns,
            progress,
            hacked,
            grants_item,
        }) = inst.facility.entities.get_mut(terminal_id).map(|e| &mut e.kind)
        else {
            return inst.reject("terminal_not_in_room", "not a terminal");
        };
        if *hacked {
            let (turns, done) = (*hack_turns, *progress);
            return inst
                .reject("terminal_already_hacked", format!("'{terminal_id}' is already hacked"))
                .with("progress", format!("{done}/{turns}"));
        }

        *progress += 1;
        let label = format!("{}/{}", progress, hack_turns);
        if *progress < *hack_turns {
            return Adjudication::accepted("hack_progress").with("progress", label);
        }
        *hacked = true;
        let granted = grants_item.clone();

        let mut adjudication = Adjudication::accepted("hack_complete")
            .with("progress", label)
            .award(agent, HACK_BONUS);
        if let Some(item) = granted.as_ref().and_then(|id| inst.facility.items.get_mut(id)) {
            item.held_by = Some(agent.clone());
            item.room_id = None;
            adjudication = adjudication.with("granted", item.item_id.clone());
        }
        adjudication
    }

    fn do_extract(&self, inst: &mut HeistInstance, agent: &AgentId) -> Adjudication {
        let current = inst.agent_room(agent).unwrap_or_default().to_string();
        if current != inst.facility.extraction_room_id {
            return inst.reject("not_in_extraction_room", "extract only from the extraction room");
        }
        let missing: Vec<String> = inst
            .facility
            .required_objectives
            .iter()
            .filter(|o| !inst.holds(agent, o))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return inst
                .reject("missing_objectives", "objectives not secured")
                .with("missing", missing);
        }
        if let Some(state) = inst.agents.get_mut(agent) {
            state.extracted = true;
        }
        Adjudication::accepted("extracted").award(agent, EXTRACT_BONUS)
    }
}

fn entity_view(e: &map::Entity) -> VisibleEntity {
    let (kind, hack_turns, required_items, disabled) = match &e.kind {
        EntityKind::Terminal { hack_turns, .. } => ("terminal", Some(*hack_turns), None, None),
        EntityKind::Vault { required_items, .. } => ("vault", None, Some(required_items.clone()), None),
        EntityKind::Camera { disabled } => ("camera", None, None, Some(*disabled)),
    };
    VisibleEntity {
        id: e.entity_id.clone(),
        kind,
        hack_turns,
        required_items,
        disabled,
    }
}

impl Scenario for Heist {
    type Instance = HeistInstance;
    type Observation = HeistObservation;
    type Action = HeistAction;

    fn name(&self) -> &'static str {
        "Heist"
    }

    fn player_count(&self) -> PlayerCount {
        PlayerCount::between(1, 4)
    }

    fn init(&self, seed: u64, agents: &[AgentId]) -> Result<HeistInstance, ScenarioFault> {
        self.player_count().check(agents.len())?;
        Ok(self.instance_with_facility(agents, generate_facility(seed)))
    }

    fn observe(&self, inst: &HeistInstance, agent: &AgentId) -> HeistObservation {
        let f = &inst.facility;
        let current = inst
            .agent_room(agent)
            .unwrap_or(f.spawn_room_id.as_str())
            .to_string();

        let adjacent_rooms = f
            .doors_from(&current)
            .map(|(door, other)| {
                let has_item = door
                    .required_item
                    .as_deref()
                    .is_some_and(|r| inst.holds(agent, r));
                AdjacentRoom {
                    room_id: other.to_string(),
                    door_id: door.door_id.clone(),
                    locked: door.is_locked,
                    required_item: door.required_item.clone(),
                    passable: !door.is_locked || has_item,
                }
            })
            .collect();

        let visible_items = f
            .items
            .values()
            .filter(|i| i.held_by.is_none() && i.room_id.as_deref() == Some(current.as_str()))
            .map(|i| VisibleItem {
                id: i.item_id.clone(),
                kind: i.kind,
                label: i.label.clone(),
                score_value: i.score_value,
            })
            .collect();

        let visible_entities = f
            .entities
            .values()
            .filter(|e| e.room_id == current)
            .map(entity_view)
            .collect();

        let inventory = f
            .items
            .values()
            .filter(|i| i.held_by.as_ref() == Some(agent))
            .map(|i| InventoryItem {
                item_id: i.item_id.clone(),
                kind: i.kind,
            })
            .collect();

        let mut terminal_progress = BTreeMap::new();
        let mut terminal_hacked = BTreeMap::new();
        for e in f.entities.values() {
            if let EntityKind::Terminal {
                progress, hacked, ..
            } = &e.kind
            {
                terminal_progress.insert(e.entity_id.clone(), *progress);
                terminal_hacked.insert(e.entity_id.clone(), *hacked);
            }
        }

        HeistObservation {
            current_room_id: current,
            adjacent_rooms,
            visible_items,
            visible_entities,
            inventory,
            turn: inst.turn,
            private: HeistPrivate {
                alert_level: inst.alert_level,
                extraction_room_id: f.extraction_room_id.clone(),
                terminal_progress,
                terminal_hacked,
            },
        }
    }

    fn adjudicate(
        &self,
        inst: &mut HeistInstance,
        agent: &AgentId,
        action: &HeistAction,
    ) -> Result<Adjudication, ScenarioFault> {
        let Some(state) = inst.agents.get(agent) else {
            return Err(ScenarioFault::UnknownAgent(agent.clone()));
        };
        if !inst.facility.rooms.contains_key(&state.room_id) {
            return Err(ScenarioFault::Invariant(format!(
                "{agent} is in unknown room '{}'",
                state.room_id
            )));
        }

        Ok(match action {
            HeistAction::Move { to_room_id } => self.do_move(inst, agent, to_room_id),
            HeistAction::Pickup { item_id } => self.do_pickup(inst, agent, item_id),
            HeistAction::UseTerminal { terminal_id } => self.do_use_terminal(inst, agent, terminal_id),
            HeistAction::Extract => self.do_extract(inst, agent),
            HeistAction::Wait => Adjudication::accepted("waited"),
        })
    }

    fn end_turn(&self, inst: &mut HeistInstance, _turn: u32) -> Result<(), ScenarioFault> {
        for guard in &mut inst.facility.guards {
            guard.step();
        }
        let ids: Vec<AgentId> = inst.agents.keys().cloned().collect();
        for id in &ids {
            inst.check_guards(id);
        }
        inst.turn += 1;
        Ok(())
    }

    fn check_termination(&self, inst: &HeistInstance) -> Option<TerminationReason> {
        if inst.agents.values().any(|a| a.captured) {
            Some(TerminationReason::Capture)
        } else if inst.alert_level >= MAX_ALERT_LEVEL {
            Some(TerminationReason::Lockdown)
        } else if inst.agents.values().any(|a| a.extracted) {
            Some(TerminationReason::Completed)
        } else {
            None
        }
    }

    fn default_action(&self) -> HeistAction {
        HeistAction::Wait
    }

    fn public_summary(&self, inst: &HeistInstance) -> Value {
        serde_json::to_value(self.scene(inst)).unwrap_or(Value::Null)
    }

    fn scenario_hints(&self) -> Value {
        json!({
            "actions": ["move", "pickup", "use_terminal", "extract", "wait"],
            "maxAlertLevel": MAX_ALERT_LEVEL,
        })
    }
}
