//! Agent that always plays the scenario's default action.

use async_trait::async_trait;

use crate::contract::{Agent, AgentContext, AgentError};
use crate::domain::AgentId;

pub struct NoopAgent<A> {
    id: AgentId,
    action: A,
}

impl<A> NoopAgent<A> {
    pub fn new(id: AgentId, action: A) -> Self {
        Self { id, action }
    }
}

#[async_trait]
impl<O, A> Agent<O, A> for NoopAgent<A>
where
    O: Sync,
    A: Clone + Send + Sync,
{
    fn id(&self) -> &AgentId {
        &self.id
    }

    async fn act(&mut self, _observation: &O, _ctx: &mut AgentContext) -> Result<A, AgentError> {
        Ok(self.action.clone())
    }
}
