//! NumberGuess: find a hidden integer with higher/lower feedback.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::contract::{
    Adjudication, PlayerCount, Scenario, ScenarioFault, TerminationReason,
};
use crate::domain::AgentId;
use crate::scenarios::integer_value;

pub const RANGE_MIN: i64 = 1;
pub const RANGE_MAX: i64 = 100;
pub const WIN_SCORE: i64 = 100;

/// A guess. `None` when the agent sent something that is not an integer.
///
/// Accepts `{"guess": n}` and `{"type": "guess", "value": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GuessWire")]
pub struct NumberGuessAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guess: Option<i64>,
}

impl NumberGuessAction {
    pub fn guess(n: i64) -> Self {
        Self { guess: Some(n) }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GuessWire {
    Direct { guess: Value },
    Typed { value: Value },
    Other(IgnoredAny),
}

impl From<GuessWire> for NumberGuessAction {
    fn from(wire: GuessWire) -> Self {
        let guess = match wire {
            GuessWire::Direct { guess } => integer_value(&guess),
            GuessWire::Typed { value } => integer_value(&value),
            GuessWire::Other(IgnoredAny) => None,
        };
        Self { guess }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuessFeedback {
    Higher,
    Lower,
    Correct,
    Invalid,
}

impl GuessFeedback {
    fn code(self) -> &'static str {
        match self {
            Self::Higher => "higher",
            Self::Lower => "lower",
            Self::Correct => "correct",
            Self::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberGuessObservation {
    pub range_min: i64,
    pub range_max: i64,
    pub last_guess: Option<i64>,
    pub feedback: Option<GuessFeedback>,
    pub step: u32,
}

#[derive(Debug, Clone)]
pub struct NumberGuessInstance {
    secret: i64,
    players: Vec<AgentId>,
    last: BTreeMap<AgentId, (Option<i64>, GuessFeedback)>,
    step: u32,
    winner: Option<AgentId>,
}

impl NumberGuessInstance {
    pub fn secret(&self) -> i64 {
        self.secret
    }

    pub fn winner(&self) -> Option<&AgentId> {
        self.winner.as_ref()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NumberGuess;

impl NumberGuess {
    /// Instance with a fixed secret.
    pub fn instance_with_secret(&self, agents: &[AgentId], secret: i64) -> NumberGuessInstance {
        NumberGuessInstance {
            secret,
            players: agents.to_vec(),
            last: BTreeMap::new(),
            step: 0,
            winner: None,
        }
    }
}

impl Scenario for NumberGuess {
    type Instance = NumberGuessInstance;
    type Observation = NumberGuessObservation;
    type Action = NumberGuessAction;

    fn name(&self) -> &'static str {
        "NumberGuess"
    }

    fn player_count(&self) -> PlayerCount {
        PlayerCount::between(1, 8)
    }

    fn init(&self, seed: u64, agents: &[AgentId]) -> Result<NumberGuessInstance, ScenarioFault> {
        self.player_count().check(agents.len())?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let secret = rng.gen_range(RANGE_MIN..=RANGE_MAX);
        Ok(self.instance_with_secret(agents, secret))
    }

    fn observe(&self, instance: &NumberGuessInstance, agent: &AgentId) -> NumberGuessObservation {
        let (last_guess, feedback) = match instance.last.get(agent) {
            Some((guess, feedback)) => (*guess, Some(*feedback)),
            None => (None, None),
        };
        NumberGuessObservation {
            range_min: RANGE_MIN,
            range_max: RANGE_MAX,
            last_guess,
            feedback,
            step: instance.step,
        }
    }

    fn adjudicate(
        &self,
        instance: &mut NumberGuessInstance,
        agent: &AgentId,
        action: &NumberGuessAction,
    ) -> Result<Adjudication, ScenarioFault> {
        if !instance.players.contains(agent) {
            return Err(ScenarioFault::UnknownAgent(agent.clone()));
        }
        instance.step += 1;

        let Some(guess) = action.guess.filter(|g| (RANGE_MIN..=RANGE_MAX).contains(g)) else {
            instance
                .last
                .insert(agent.clone(), (action.guess, GuessFeedback::Invalid));
            return Ok(Adjudication::rejected(
                GuessFeedback::Invalid.code(),
                format!("guess must be an integer in [{RANGE_MIN}, {RANGE_MAX}]"),
            ));
        };

        let feedback = match guess.cmp(&instance.secret) {
            std::cmp::Ordering::Less => GuessFeedback::Higher,
            std::cmp::Ordering::Greater => GuessFeedback::Lower,
            std::cmp::Ordering::Equal => GuessFeedback::Correct,
        };
        instance.last.insert(agent.clone(), (Some(guess), feedback));

        let mut adjudication = Adjudication::accepted(feedback.code()).with("guess", guess);
        if feedback == GuessFeedback::Correct && instance.winner.is_none() {
            instance.winner = Some(agent.clone());
            adjudication = adjudication.award(agent, WIN_SCORE);
        }
        Ok(adjudication)
    }

    fn check_termination(&self, instance: &NumberGuessInstance) -> Option<TerminationReason> {
        instance.winner.as_ref().map(|_| TerminationReason::Completed)
    }

    fn default_action(&self) -> NumberGuessAction {
        NumberGuessAction { guess: None }
    }

    fn public_summary(&self, instance: &NumberGuessInstance) -> Value {
        json!({
            "rangeMin": RANGE_MIN,
            "rangeMax": RANGE_MAX,
            "step": instance.step,
            "winner": instance.winner,
        })
    }

    fn scenario_hints(&self) -> Value {
        json!({
            "rangeMin": RANGE_MIN,
            "rangeMax": RANGE_MAX,
            "actions": ["guess"],
        })
    }
}
