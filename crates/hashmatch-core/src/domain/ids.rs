//! Identifier newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One agent slot within a match, conventionally `<agentKey>-<index>`.
///
/// Ordering is plain string ordering so that score maps serialize in a
/// stable order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Slot id for the agent at `index` built from `key`.
    pub fn for_slot(key: &str, index: usize) -> Self {
        Self(format!("{key}-{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_ids_follow_key_index_pattern() {
        assert_eq!(AgentId::for_slot("random", 0).as_str(), "random-0");
        assert_eq!(AgentId::for_slot("llm:ollama:qwen", 3).as_str(), "llm:ollama:qwen-3");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = AgentId::new("baseline-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"baseline-1\"");
        let back: AgentId = serde_json::from_str("\"baseline-1\"").unwrap();
        assert_eq!(back, id);
    }
}
