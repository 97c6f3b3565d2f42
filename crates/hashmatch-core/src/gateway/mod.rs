//! Agent gateway: how observations reach agents and actions come back.
//!
//! Two transports implement [`Transport`]:
//! - [`LocalTransport`] calls in-process agents under a cooperative deadline
//! - [`HttpTransport`] posts to remote agents with a hard deadline and byte cap
//!
//! Both collapse every failure into [`Delivery::TimedOut`], which the engine
//! treats uniformly.

pub mod http;
pub mod local;
pub mod transcript;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::contract::TimeoutCause;
use crate::domain::AgentId;

pub use http::HttpTransport;
pub use local::LocalTransport;
pub use transcript::{transcript_to_jsonl, write_transcript, TranscriptEntry, TranscriptRecorder};

/// Version tag sent with every networked turn request.
pub const PROTOCOL_VERSION: &str = "1";

pub const DEFAULT_DEADLINE_MS: u64 = 5_000;
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    pub default_deadline_ms: u64,
    pub max_response_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_deadline_ms: DEFAULT_DEADLINE_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl GatewayConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.default_deadline_ms)
    }
}

/// Facts handed to a transport before turn 1.
#[derive(Debug, Clone, Copy)]
pub struct MatchSetup<'a> {
    pub match_id: &'a str,
    pub seed: u64,
    pub scenario_name: &'a str,
    pub scenario_hints: &'a Value,
    pub agent_ids: &'a [AgentId],
}

/// One observation to deliver.
#[derive(Debug)]
pub struct DeliveryRequest<'a, O> {
    pub match_id: &'a str,
    pub agent_id: &'a AgentId,
    pub turn: u32,
    pub observation: &'a O,
    pub deadline: Duration,
}

/// Either an action or a timeout. Never both, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<A> {
    Action(A),
    TimedOut(TimeoutCause),
}

#[async_trait]
pub trait Transport<O, A>: Send
where
    O: Serialize + Sync,
    A: DeserializeOwned + Send,
{
    /// Called once before turn 1.
    fn prepare(&mut self, _setup: &MatchSetup<'_>) {}

    async fn deliver(&mut self, request: DeliveryRequest<'_, O>) -> Delivery<A>;

    /// Drain recorded transcript entries.
    fn take_transcript(&mut self) -> Vec<TranscriptEntry> {
        Vec::new()
    }
}
