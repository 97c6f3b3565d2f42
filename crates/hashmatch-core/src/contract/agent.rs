//! The contract every in-process agent implements.

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::Value;

use crate::domain::AgentId;

/// Passed once to [`Agent::init`] before turn 1.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub agent_id: AgentId,
    pub match_id: String,
    /// Per-agent seed derived from the match seed.
    pub seed: u64,
    pub scenario_name: String,
    pub scenario_hints: Value,
}

/// Per-turn context. The generator persists across the agent's turns.
pub struct AgentContext {
    pub agent_id: AgentId,
    pub turn: u32,
    pub rng: ChaCha8Rng,
}

impl AgentContext {
    pub fn new(agent_id: AgentId, seed: u64) -> Self {
        Self {
            agent_id,
            turn: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

/// An agent could not produce an action this turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("agent failed: {0}")]
pub struct AgentError(pub String);

/// Maps observations to actions, keeping whatever state it likes between turns.
#[async_trait]
pub trait Agent<O, A>: Send
where
    O: Sync,
    A: Send,
{
    fn id(&self) -> &AgentId;

    fn init(&mut self, _config: &AgentConfig) {}

    async fn act(&mut self, observation: &O, ctx: &mut AgentContext) -> Result<A, AgentError>;
}

/// Boxed agent for a scenario's observation/action pair.
pub type BoxedAgent<O, A> = Box<dyn Agent<O, A>>;
