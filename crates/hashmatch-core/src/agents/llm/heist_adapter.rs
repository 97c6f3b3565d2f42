//! Heist prompt, observation rendering and action normalization for LLM agents.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::agents::llm::ollama::{ChatClient, ChatMessage, OllamaClient};
use crate::agents::llm::parse::parse_response;
use crate::contract::{Agent, AgentContext, AgentError};
use crate::domain::AgentId;
use crate::scenarios::heist::map::ItemKind;
use crate::scenarios::{HeistAction, HeistObservation};

pub const SYSTEM_PROMPT: &str = r#"You are playing the Heist scenario. Each turn you must choose one action.

VALID ACTIONS (respond with exactly one JSON object):
- Move to an adjacent room: {"type":"move","toRoomId":"room-id"}
- Pick up a visible item in the current room: {"type":"pickup","itemId":"item-id"}
- Hack/use a terminal in the current room: {"type":"use_terminal","terminalId":"terminal-id"}
- Extract in the extraction room: {"type":"extract"}
- Wait/do nothing: {"type":"wait"}

RULES:
- Only move to rooms listed as adjacent and passable.
- Only pick up items that are visible in the current room.
- Only use terminals that are visible in the current room.
- Only extract if you are in the extraction room.

Respond with ONLY a JSON object. No explanation, no markdown, no backticks."#;

fn join_or_none(parts: Vec<String>) -> String {
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}

fn kind_name(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Keycard => "keycard",
        ItemKind::Tool => "tool",
        ItemKind::Loot => "loot",
        ItemKind::Intel => "intel",
        ItemKind::Objective => "objective",
    }
}

/// Plain-text rendering of an observation for the user message.
pub fn format_observation(obs: &HeistObservation) -> String {
    let adjacent = if obs.adjacent_rooms.is_empty() {
        "none".to_string()
    } else {
        obs.adjacent_rooms
            .iter()
            .map(|r| {
                let required = r
                    .required_item
                    .as_deref()
                    .map(|i| format!(", requires {i}"))
                    .unwrap_or_default();
                format!(
                    "{} via {} ({}, {}{required})",
                    r.room_id,
                    r.door_id,
                    if r.passable { "passable" } else { "blocked" },
                    if r.locked { "locked" } else { "unlocked" },
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    };
    let items = join_or_none(
        obs.visible_items
            .iter()
            .map(|i| match (i.kind, i.score_value) {
                (ItemKind::Loot, Some(v)) => format!("{} (loot, value {v})", i.id),
                (kind, _) => format!("{} ({})", i.id, kind_name(kind)),
            })
            .collect(),
    );
    let entities = join_or_none(
        obs.visible_entities
            .iter()
            .map(|e| match e.kind {
                "terminal" => format!(
                    "{} (terminal, hack turns {})",
                    e.id,
                    e.hack_turns.unwrap_or_default()
                ),
                "vault" => format!(
                    "{} (vault, requires {})",
                    e.id,
                    e.required_items.as_deref().unwrap_or_default().join(", ")
                ),
                "camera" if e.disabled == Some(true) => format!("{} (camera, disabled)", e.id),
                other => format!("{} ({other})", e.id),
            })
            .collect(),
    );
    let inventory = join_or_none(
        obs.inventory
            .iter()
            .map(|i| format!("{} ({})", i.item_id, kind_name(i.kind)))
            .collect(),
    );

    let mut lines = vec![
        format!("Turn {}.", obs.turn),
        format!("Current room: {}.", obs.current_room_id),
        format!("Adjacent rooms: {adjacent}."),
        format!("Visible items: {items}."),
        format!("Visible entities: {entities}."),
        format!("Inventory: {inventory}."),
        format!("Alert level: {}.", obs.private.alert_level),
        format!("Extraction room: {}.", obs.private.extraction_room_id),
    ];
    if !obs.private.terminal_hacked.is_empty() {
        let status = obs
            .private
            .terminal_hacked
            .iter()
            .map(|(id, hacked)| format!("{id}: {}", if *hacked { "hacked" } else { "locked" }))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Terminal status: {status}."));
    }
    lines.join("\n")
}

fn non_empty(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Map a JSON object onto a Heist action, or `None` if it is not one.
pub fn normalize_action(map: &Map<String, Value>) -> Option<HeistAction> {
    match map.get("type")?.as_str()? {
        "wait" => Some(HeistAction::Wait),
        "extract" => Some(HeistAction::Extract),
        "move" => non_empty(map, "toRoomId").map(|to_room_id| HeistAction::Move { to_room_id }),
        "pickup" => non_empty(map, "itemId").map(|item_id| HeistAction::Pickup { item_id }),
        "use_terminal" => {
            non_empty(map, "terminalId").map(|terminal_id| HeistAction::UseTerminal { terminal_id })
        }
        _ => None,
    }
}

pub fn parse_heist_action(text: &str) -> Option<HeistAction> {
    parse_response(text, normalize_action)
}

/// Heist agent driven by a chat model. Unparseable replies become `wait`;
/// a client failure is reported as an agent failure.
pub struct LlmHeistAgent<C = OllamaClient> {
    id: AgentId,
    client: C,
}

impl<C: ChatClient> LlmHeistAgent<C> {
    pub fn new(id: AgentId, client: C) -> Self {
        Self { id, client }
    }
}

#[async_trait]
impl<C: ChatClient> Agent<HeistObservation, HeistAction> for LlmHeistAgent<C> {
    fn id(&self) -> &AgentId {
        &self.id
    }

    async fn act(
        &mut self,
        obs: &HeistObservation,
        _ctx: &mut AgentContext,
    ) -> Result<HeistAction, AgentError> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format_observation(obs)),
        ];
        let reply = self
            .client
            .chat(&messages)
            .await
            .map_err(|e| AgentError(e.to_string()))?;
        Ok(parse_heist_action(&reply).unwrap_or_else(|| {
            debug!(agent_id = %self.id, model = self.client.model(), "unparseable reply, waiting");
            HeistAction::Wait
        }))
    }
}
