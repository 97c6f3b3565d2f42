//! Scenario and agent contracts plus the match value types they exchange.

pub mod agent;
pub mod scenario;
pub mod types;

pub use agent::{Agent, AgentConfig, AgentContext, AgentError, BoxedAgent};
pub use scenario::{Adjudication, PlayerCount, Scenario, ScenarioFault};
pub use types::{
    ForfeitPolicy, MatchConfig, MatchProvenance, ScoreMap, TerminationReason, TimeoutCause,
};
