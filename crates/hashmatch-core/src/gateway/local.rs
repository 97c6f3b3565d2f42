//! In-process transport.
//!
//! The agent future is raced against the deadline with
//! `tokio::time::timeout`. That only bites at an `.await` point, so a local
//! agent that blocks the thread cannot be cut off. Local agents are expected
//! to be fast.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::contract::{AgentConfig, AgentContext, BoxedAgent, TimeoutCause};
use crate::domain::AgentId;
use crate::gateway::{Delivery, DeliveryRequest, MatchSetup, Transport, TranscriptEntry, TranscriptRecorder};
use crate::seed::derive_agent_seed;

struct LocalSlot<O: Sync, A: Send> {
    agent: BoxedAgent<O, A>,
    ctx: AgentContext,
}

pub struct LocalTransport<O: Sync, A: Send> {
    slots: BTreeMap<AgentId, LocalSlot<O, A>>,
    transcript: TranscriptRecorder,
}

impl<O, A> LocalTransport<O, A>
where
    O: Sync,
    A: Send,
{
    pub fn new(agents: Vec<BoxedAgent<O, A>>) -> Self {
        let slots = agents
            .into_iter()
            .map(|agent| {
                let id = agent.id().clone();
                let ctx = AgentContext::new(id.clone(), 0);
                (id, LocalSlot { agent, ctx })
            })
            .collect();
        Self {
            slots,
            transcript: TranscriptRecorder::disabled(),
        }
    }

    pub fn with_transcript(mut self) -> Self {
        self.transcript = TranscriptRecorder::enabled();
        self
    }
}

#[async_trait]
impl<O, A> Transport<O, A> for LocalTransport<O, A>
where
    O: Serialize + Sync,
    A: DeserializeOwned + Send,
{
    fn prepare(&mut self, setup: &MatchSetup<'_>) {
        for (slot_index, agent_id) in setup.agent_ids.iter().enumerate() {
            let Some(slot) = self.slots.get_mut(agent_id) else {
                continue;
            };
            let seed = derive_agent_seed(setup.seed, slot_index);
            slot.ctx = AgentContext::new(agent_id.clone(), seed);
            slot.agent.init(&AgentConfig {
                agent_id: agent_id.clone(),
                match_id: setup.match_id.to_string(),
                seed,
                scenario_name: setup.scenario_name.to_string(),
                scenario_hints: setup.scenario_hints.clone(),
            });
        }
    }

    async fn deliver(&mut self, request: DeliveryRequest<'_, O>) -> Delivery<A> {
        let started = Instant::now();
        let Some(slot) = self.slots.get_mut(request.agent_id) else {
            warn!(agent_id = %request.agent_id, "no local agent registered");
            self.transcript.record(
                request.agent_id,
                request.turn,
                Some(TimeoutCause::AgentFailed),
                started,
                None,
            );
            return Delivery::TimedOut(TimeoutCause::AgentFailed);
        };
        slot.ctx.turn = request.turn;

        let outcome = tokio::time::timeout(
            request.deadline,
            slot.agent.act(request.observation, &mut slot.ctx),
        )
        .await;

        let delivery = match outcome {
            Ok(Ok(action)) => Delivery::Action(action),
            Ok(Err(err)) => {
                warn!(agent_id = %request.agent_id, error = %err, "local agent failed");
                Delivery::TimedOut(TimeoutCause::AgentFailed)
            }
            Err(_elapsed) => Delivery::TimedOut(TimeoutCause::Deadline),
        };
        let cause = match &delivery {
            Delivery::Action(_) => None,
            Delivery::TimedOut(c) => Some(*c),
        };
        self.transcript
            .record(request.agent_id, request.turn, cause, started, None);
        delivery
    }

    fn take_transcript(&mut self) -> Vec<TranscriptEntry> {
        self.transcript.take()
    }
}
