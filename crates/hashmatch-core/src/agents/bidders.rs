//! ResourceRivals bidders.

use async_trait::async_trait;
use rand::Rng;

use crate::contract::{Agent, AgentContext, AgentError};
use crate::domain::AgentId;
use crate::scenarios::{BidAction, ResourceRivalsObservation};

/// Bids a seeded random amount up to the objective's value.
pub struct RandomBidderAgent {
    id: AgentId,
}

impl RandomBidderAgent {
    pub fn new(id: AgentId) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Agent<ResourceRivalsObservation, BidAction> for RandomBidderAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    async fn act(
        &mut self,
        obs: &ResourceRivalsObservation,
        ctx: &mut AgentContext,
    ) -> Result<BidAction, AgentError> {
        let cap = obs.private.remaining_resources.min(obs.objective_value).max(0);
        Ok(BidAction::bid(ctx.rng.gen_range(0..=cap)))
    }
}

/// Spreads its pool evenly over the remaining objectives.
pub struct ConservativeAgent {
    id: AgentId,
}

impl ConservativeAgent {
    pub fn new(id: AgentId) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Agent<ResourceRivalsObservation, BidAction> for ConservativeAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    async fn act(
        &mut self,
        obs: &ResourceRivalsObservation,
        _ctx: &mut AgentContext,
    ) -> Result<BidAction, AgentError> {
        let remaining = obs.private.remaining_resources.max(0);
        let share = remaining / obs.objectives_remaining.max(1) as i64;
        Ok(BidAction::bid(share.min(obs.objective_value).max(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::resource_rivals::PrivateView;

    fn observation(value: i64, remaining: i64, objectives: usize) -> ResourceRivalsObservation {
        ResourceRivalsObservation {
            objective_value: value,
            captured_score: 0,
            objectives_remaining: objectives,
            opponent_captured_score: 0,
            last_result: None,
            has_bid: false,
            private: PrivateView {
                remaining_resources: remaining,
            },
        }
    }

    #[tokio::test]
    async fn conservative_splits_pool() {
        let id = AgentId::new("conservative-0");
        let mut agent = ConservativeAgent::new(id.clone());
        let mut ctx = AgentContext::new(id, 0);
        let bid = agent.act(&observation(40, 100, 5), &mut ctx).await.unwrap();
        assert_eq!(bid.bid, Some(20));
        let bid = agent.act(&observation(10, 100, 5), &mut ctx).await.unwrap();
        assert_eq!(bid.bid, Some(10));
    }

    #[tokio::test]
    async fn random_bidder_never_overspends() {
        let id = AgentId::new("randomBidder-0");
        let mut agent = RandomBidderAgent::new(id.clone());
        let mut ctx = AgentContext::new(id, 3);
        for _ in 0..40 {
            let bid = agent.act(&observation(50, 12, 3), &mut ctx).await.unwrap();
            assert!((0..=12).contains(&bid.bid.unwrap()));
        }
    }
}
