//! NumberGuess agents: a seeded random guesser and a binary searcher.

use async_trait::async_trait;
use rand::Rng;

use crate::contract::{Agent, AgentConfig, AgentContext, AgentError};
use crate::domain::AgentId;
use crate::scenarios::number_guess::{GuessFeedback, NumberGuessAction, NumberGuessObservation};

pub struct RandomGuessAgent {
    id: AgentId,
}

impl RandomGuessAgent {
    pub fn new(id: AgentId) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Agent<NumberGuessObservation, NumberGuessAction> for RandomGuessAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    async fn act(
        &mut self,
        obs: &NumberGuessObservation,
        ctx: &mut AgentContext,
    ) -> Result<NumberGuessAction, AgentError> {
        Ok(NumberGuessAction::guess(
            ctx.rng.gen_range(obs.range_min..=obs.range_max),
        ))
    }
}

/// Narrows `[low, high]` from its own feedback and guesses the midpoint.
pub struct BaselineGuessAgent {
    id: AgentId,
    bounds: Option<(i64, i64)>,
}

impl BaselineGuessAgent {
    pub fn new(id: AgentId) -> Self {
        Self { id, bounds: None }
    }
}

#[async_trait]
impl Agent<NumberGuessObservation, NumberGuessAction> for BaselineGuessAgent {
    fn id(&self) -> &AgentId {
        &self.id
    }

    fn init(&mut self, _config: &AgentConfig) {
        self.bounds = None;
    }

    async fn act(
        &mut self,
        obs: &NumberGuessObservation,
        _ctx: &mut AgentContext,
    ) -> Result<NumberGuessAction, AgentError> {
        let (mut low, mut high) = self.bounds.unwrap_or((obs.range_min, obs.range_max));
        match (obs.last_guess, obs.feedback) {
            (Some(g), Some(GuessFeedback::Higher)) => low = low.max(g + 1),
            (Some(g), Some(GuessFeedback::Lower)) => high = high.min(g - 1),
            _ => {}
        }
        if low > high {
            low = obs.range_min;
            high = obs.range_max;
        }
        self.bounds = Some((low, high));
        Ok(NumberGuessAction::guess(low + (high - low) / 2))
    }
}
