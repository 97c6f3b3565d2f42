//! Built-in agents and the closed registry of agent keys.
//!
//! Keys are parsed once into [`AgentKey`]; each scenario then builds its
//! typed agents through [`AgentRoster`]. Unknown or incompatible keys are
//! rejected before anything runs.

pub mod bidders;
pub mod explorer;
pub mod llm;
pub mod noop;
pub mod number_guess;

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::config::{OllamaConfig, RuntimeConfig};
use crate::contract::{BoxedAgent, Scenario};
use crate::domain::{AgentId, HashmatchError, Result};
use crate::scenarios::{Heist, NumberGuess, ResourceRivals, ScenarioKey};

pub use bidders::{ConservativeAgent, RandomBidderAgent};
pub use explorer::ExplorerAgent;
pub use llm::{LlmHeistAgent, OllamaClient};
pub use noop::NoopAgent;
pub use number_guess::{BaselineGuessAgent, RandomGuessAgent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
        }
    }
}

/// Provider and model behind an LLM agent key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LlmAgentSpec {
    pub provider: LlmProvider,
    /// `None` means the configured default model.
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgentKey {
    Noop,
    Random,
    Baseline,
    RandomBidder,
    Conservative,
    Explorer,
    OllamaHeist,
    /// `llm:<provider>:<model>`
    Llm(LlmAgentSpec),
}

impl AgentKey {
    pub fn supports(&self, scenario: ScenarioKey) -> bool {
        match self {
            Self::Noop => true,
            Self::Random | Self::Baseline => scenario == ScenarioKey::NumberGuess,
            Self::RandomBidder | Self::Conservative => scenario == ScenarioKey::ResourceRivals,
            Self::Explorer | Self::OllamaHeist | Self::Llm(_) => scenario == ScenarioKey::Heist,
        }
    }

    /// Prefix used for agent ids (`<prefix>-<index>`).
    pub fn id_prefix(&self) -> String {
        match self {
            Self::Llm(spec) => match &spec.model {
                Some(model) => format!("llm-{}-{}", spec.provider.as_str(), sanitize(model)),
                None => format!("llm-{}", spec.provider.as_str()),
            },
            other => other.to_string(),
        }
    }

    /// Source path, relative to the crate `src`, hashed for provenance.
    pub fn source_path(&self) -> &'static str {
        match self {
            Self::Noop => "agents/noop.rs",
            Self::Random | Self::Baseline => "agents/number_guess.rs",
            Self::RandomBidder | Self::Conservative => "agents/bidders.rs",
            Self::Explorer => "agents/explorer.rs",
            Self::OllamaHeist | Self::Llm(_) => "agents/llm",
        }
    }

    pub fn is_llm(&self) -> bool {
        matches!(self, Self::OllamaHeist | Self::Llm(_))
    }

    /// Resolved LLM settings, if this key is LLM-backed.
    pub fn llm_config(&self, runtime: &RuntimeConfig) -> Option<OllamaConfig> {
        match self {
            Self::OllamaHeist => Some(runtime.ollama.clone()),
            Self::Llm(spec) => {
                let mut cfg = runtime.ollama.clone();
                if let Some(model) = &spec.model {
                    cfg.model = model.clone();
                }
                Some(cfg)
            }
            _ => None,
        }
    }

    /// Manifest metadata for LLM agents.
    pub fn metadata(&self, runtime: &RuntimeConfig) -> Option<Value> {
        self.llm_config(runtime).map(|cfg| {
            json!({
                "provider": LlmProvider::Ollama.as_str(),
                "model": cfg.model,
            })
        })
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect()
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => f.write_str("noop"),
            Self::Random => f.write_str("random"),
            Self::Baseline => f.write_str("baseline"),
            Self::RandomBidder => f.write_str("randomBidder"),
            Self::Conservative => f.write_str("conservative"),
            Self::Explorer => f.write_str("explorer"),
            Self::OllamaHeist => f.write_str("ollama-heist"),
            Self::Llm(spec) => match &spec.model {
                Some(model) => write!(f, "llm:{}:{model}", spec.provider.as_str()),
                None => write!(f, "llm:{}", spec.provider.as_str()),
            },
        }
    }
}

impl FromStr for AgentKey {
    type Err = HashmatchError;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s {
            "noop" => Self::Noop,
            "random" => Self::Random,
            "baseline" => Self::Baseline,
            "randomBidder" => Self::RandomBidder,
            "conservative" => Self::Conservative,
            "explorer" => Self::Explorer,
            "ollama-heist" => Self::OllamaHeist,
            other if other.starts_with("llm:") => {
                let mut parts = other.splitn(3, ':').skip(1);
                let provider = match parts.next() {
                    Some("ollama") => LlmProvider::Ollama,
                    _ => return Err(HashmatchError::UnknownAgent(s.to_string())),
                };
                let model = parts.next().filter(|m| !m.trim().is_empty()).map(str::to_string);
                Self::Llm(LlmAgentSpec { provider, model })
            }
            _ => return Err(HashmatchError::UnknownAgent(s.to_string())),
        };
        Ok(key)
    }
}

/// Parse every key and check it against the scenario. Fails on the first
/// bad key so no match starts with an unresolvable roster.
pub fn validate_agent_keys(scenario: ScenarioKey, keys: &[String]) -> Result<Vec<AgentKey>> {
    if keys.is_empty() {
        return Err(HashmatchError::InvalidConfig("no agents given".to_string()));
    }
    keys.iter()
        .map(|raw| {
            let key: AgentKey = raw.parse()?;
            if !key.supports(scenario) {
                return Err(HashmatchError::IncompatibleAgent {
                    agent: raw.clone(),
                    scenario: scenario.as_str().to_string(),
                });
            }
            Ok(key)
        })
        .collect()
}

/// Scenario-side agent factory.
pub trait AgentRoster: Scenario {
    fn build_agent(
        &self,
        key: &AgentKey,
        id: AgentId,
        runtime: &RuntimeConfig,
    ) -> Result<BoxedAgent<Self::Observation, Self::Action>>;
}

fn incompatible(key: &AgentKey, scenario: ScenarioKey) -> HashmatchError {
    HashmatchError::IncompatibleAgent {
        agent: key.to_string(),
        scenario: scenario.as_str().to_string(),
    }
}

impl AgentRoster for NumberGuess {
    fn build_agent(
        &self,
        key: &AgentKey,
        id: AgentId,
        _runtime: &RuntimeConfig,
    ) -> Result<BoxedAgent<Self::Observation, Self::Action>> {
        Ok(match key {
            AgentKey::Noop => Box::new(NoopAgent::new(id, self.default_action())),
            AgentKey::Random => Box::new(RandomGuessAgent::new(id)),
            AgentKey::Baseline => Box::new(BaselineGuessAgent::new(id)),
            other => return Err(incompatible(other, ScenarioKey::NumberGuess)),
        })
    }
}

impl AgentRoster for ResourceRivals {
    fn build_agent(
        &self,
        key: &AgentKey,
        id: AgentId,
        _runtime: &RuntimeConfig,
    ) -> Result<BoxedAgent<Self::Observation, Self::Action>> {
        Ok(match key {
            AgentKey::Noop => Box::new(NoopAgent::new(id, self.default_action())),
            AgentKey::RandomBidder => Box::new(RandomBidderAgent::new(id)),
            AgentKey::Conservative => Box::new(ConservativeAgent::new(id)),
            other => return Err(incompatible(other, ScenarioKey::ResourceRivals)),
        })
    }
}

impl AgentRoster for Heist {
    fn build_agent(
        &self,
        key: &AgentKey,
        id: AgentId,
        runtime: &RuntimeConfig,
    ) -> Result<BoxedAgent<Self::Observation, Self::Action>> {
        Ok(match key {
            AgentKey::Noop => Box::new(NoopAgent::new(id, self.default_action())),
            AgentKey::Explorer => Box::new(ExplorerAgent::new(id)),
            AgentKey::OllamaHeist | AgentKey::Llm(_) => {
                let cfg = key
                    .llm_config(runtime)
                    .ok_or_else(|| incompatible(key, ScenarioKey::Heist))?;
                Box::new(LlmHeistAgent::new(id, OllamaClient::new(cfg)?))
            }
            other => return Err(incompatible(other, ScenarioKey::Heist)),
        })
    }
}
