//! Facility layout for Heist: rooms, doors, items, entities and guards.
//!
//! Everything here is public spectator data. What an agent may see is
//! filtered separately in the observation builder.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::domain::AgentId;

pub const DEFAULT_HACK_TURNS: u32 = 2;
pub const MAX_ALERT_LEVEL: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomKind {
    Spawn,
    Hallway,
    Security,
    Utility,
    Vault,
    Extraction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub label: String,
    pub kind: RoomKind,
}

/// Undirected connection between two rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Door {
    pub door_id: String,
    pub from: String,
    pub to: String,
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_item: Option<String>,
}

impl Door {
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }

    /// The room on the other side from `room`, if this door touches it.
    pub fn other_side(&self, room: &str) -> Option<&str> {
        if self.from == room {
            Some(&self.to)
        } else if self.to == room {
            Some(&self.from)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    Keycard,
    Tool,
    Loot,
    Intel,
    Objective,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: String,
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Room the item lies in. `None` while held or not yet granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub held_by: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EntityKind {
    Terminal {
        hack_turns: u32,
        progress: u32,
        hacked: bool,
        /// Intel item handed to whoever completes the hack.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grants_item: Option<String>,
    },
    Vault {
        required_items: Vec<String>,
        opened: bool,
    },
    Camera {
        disabled: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub entity_id: String,
    pub room_id: String,
    #[serde(flatten)]
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guard {
    pub guard_id: String,
    pub room_id: String,
    pub patrol: Vec<String>,
    pub patrol_index: usize,
}

impl Guard {
    /// Advance one step along the patrol loop.
    pub fn step(&mut self) {
        if self.patrol.is_empty() {
            return;
        }
        self.patrol_index = (self.patrol_index + 1) % self.patrol.len();
        self.room_id = self.patrol[self.patrol_index].clone();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub rooms: BTreeMap<String, Room>,
    pub doors: BTreeMap<String, Door>,
    pub items: BTreeMap<String, Item>,
    pub entities: BTreeMap<String, Entity>,
    pub guards: Vec<Guard>,
    pub spawn_room_id: String,
    pub extraction_room_id: String,
    pub vault_room_id: String,
    pub required_objectives: Vec<String>,
}

impl Facility {
    pub fn door_between(&self, a: &str, b: &str) -> Option<&Door> {
        self.doors.values().find(|d| d.connects(a, b))
    }

    pub fn doors_from<'a>(&'a self, room: &'a str) -> impl Iterator<Item = (&'a Door, &'a str)> + 'a {
        self.doors
            .values()
            .filter_map(move |d| d.other_side(room).map(|other| (d, other)))
    }

    pub fn vault(&self) -> Option<&Entity> {
        self.entities
            .values()
            .find(|e| matches!(e.kind, EntityKind::Vault { .. }))
    }
}

fn room(id: &str, label: &str, kind: RoomKind) -> (String, Room) {
    (
        id.to_string(),
        Room {
            room_id: id.to_string(),
            label: label.to_string(),
            kind,
        },
    )
}

fn door(id: &str, from: &str, to: &str, required_item: Option<&str>) -> (String, Door) {
    (
        id.to_string(),
        Door {
            door_id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            is_locked: required_item.is_some(),
            required_item: required_item.map(str::to_string),
        },
    )
}

fn item(id: &str, kind: ItemKind, label: &str, room_id: Option<&str>, value: Option<i64>) -> (String, Item) {
    (
        id.to_string(),
        Item {
            item_id: id.to_string(),
            kind,
            label: Some(label.to_string()),
            room_id: room_id.map(str::to_string),
            held_by: None,
            score_value: value,
        },
    )
}

fn entity(id: &str, room_id: &str, kind: EntityKind) -> (String, Entity) {
    (
        id.to_string(),
        Entity {
            entity_id: id.to_string(),
            room_id: room_id.to_string(),
            kind,
        },
    )
}

/// Build the facility for `seed`.
///
/// Topology is fixed: spawn, hallway, security, utility, vault, extraction.
/// The seed decides where the keycard lies, loot values, the camera room
/// and where the guard starts on its patrol. The patrol never enters the
/// vault wing, so whether a run meets the guard depends on timing.
pub fn generate_facility(seed: u64) -> Facility {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let rooms: BTreeMap<String, Room> = [
        room("spawn", "Loading Dock", RoomKind::Spawn),
        room("hallway", "Main Hallway", RoomKind::Hallway),
        room("security", "Security Office", RoomKind::Security),
        room("utility", "Utility Room", RoomKind::Utility),
        room("vault", "Vault", RoomKind::Vault),
        room("extraction", "Rooftop Exit", RoomKind::Extraction),
    ]
    .into_iter()
    .collect();

    let doors: BTreeMap<String, Door> = [
        door("door-1", "spawn", "hallway", None),
        door("door-2", "hallway", "security", None),
        door("door-3", "hallway", "utility", None),
        door("door-4", "hallway", "vault", Some("keycard-1")),
        door("door-5", "utility", "extraction", None),
    ]
    .into_iter()
    .collect();

    let side_rooms = ["security", "utility"];
    let keycard_room = *side_rooms.choose(&mut rng).unwrap_or(&"security");
    let loot_room = if keycard_room == "security" { "utility" } else { "security" };
    let camera_room = *["hallway", "security", "utility"]
        .choose(&mut rng)
        .unwrap_or(&"hallway");

    let items: BTreeMap<String, Item> = [
        item("keycard-1", ItemKind::Keycard, "Security Keycard", Some(keycard_room), None),
        item("intel-1", ItemKind::Intel, "Vault Codes", None, None),
        item(
            "loot-1",
            ItemKind::Loot,
            "Cash Box",
            Some(loot_room),
            Some(rng.gen_range(10..=30)),
        ),
        item(
            "loot-2",
            ItemKind::Loot,
            "Gold Bars",
            Some("vault"),
            Some(rng.gen_range(30..=60)),
        ),
        item("objective-1", ItemKind::Objective, "Prototype Drive", Some("vault"), None),
    ]
    .into_iter()
    .collect();

    let entities: BTreeMap<String, Entity> = [
        entity(
            "terminal-1",
            "security",
            EntityKind::Terminal {
                hack_turns: DEFAULT_HACK_TURNS,
                progress: 0,
                hacked: false,
                grants_item: Some("intel-1".to_string()),
            },
        ),
        entity(
            "vault-1",
            "vault",
            EntityKind::Vault {
                required_items: vec!["keycard-1".to_string(), "intel-1".to_string()],
                opened: false,
            },
        ),
        entity("camera-1", camera_room, EntityKind::Camera { disabled: false }),
    ]
    .into_iter()
    .collect();

    // Rounds of the security office, then a pause at the loading dock.
    let patrol: Vec<String> = ["hallway", "security", "hallway", "hallway", "spawn", "spawn"]
        .iter()
        .map(|r| r.to_string())
        .collect();
    let start = rng.gen_range(0..patrol.len());
    let guards = vec![Guard {
        guard_id: "guard-1".to_string(),
        room_id: patrol[start].clone(),
        patrol,
        patrol_index: start,
    }];

    Facility {
        rooms,
        doors,
        items,
        entities,
        guards,
        spawn_room_id: "spawn".to_string(),
        extraction_room_id: "extraction".to_string(),
        vault_room_id: "vault".to_string(),
        required_objectives: vec!["objective-1".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_facility() {
        assert_eq!(generate_facility(5), generate_facility(5));
    }

    #[test]
    fn every_door_joins_known_rooms() {
        let f = generate_facility(11);
        for d in f.doors.values() {
            assert!(f.rooms.contains_key(&d.from), "{}", d.door_id);
            assert!(f.rooms.contains_key(&d.to), "{}", d.door_id);
        }
        assert!(f.door_between("hallway", "vault").unwrap().is_locked);
        assert!(f.door_between("spawn", "vault").is_none());
    }

    #[test]
    fn guard_patrol_loops() {
        let mut g = Guard {
            guard_id: "g".into(),
            room_id: "a".into(),
            patrol: vec!["a".into(), "b".into()],
            patrol_index: 0,
        };
        g.step();
        assert_eq!(g.room_id, "b");
        g.step();
        assert_eq!(g.room_id, "a");
    }

    #[test]
    fn entity_wire_shape() {
        let f = generate_facility(3);
        let v = serde_json::to_value(&f.entities["terminal-1"]).unwrap();
        assert_eq!(v["kind"], "terminal");
        assert_eq!(v["hackTurns"], 2);
        assert_eq!(v["entityId"], "terminal-1");
        let back: Entity = serde_json::from_value(v).unwrap();
        assert_eq!(back, f.entities["terminal-1"]);
    }
}
