//! Built-in scenarios and the closed registry that names them.

pub mod heist;
pub mod number_guess;
pub mod resource_rivals;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::domain::HashmatchError;

pub use heist::{Heist, HeistAction, HeistObservation};
pub use number_guess::{NumberGuess, NumberGuessAction, NumberGuessObservation};
pub use resource_rivals::{BidAction, ResourceRivals, ResourceRivalsObservation};

/// Integer payload field. Integral floats such as `20.0` count.
pub(crate) fn integer_value(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| {
        v.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
            .map(|f| f as i64)
    })
}

/// Every scenario this build can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScenarioKey {
    NumberGuess,
    ResourceRivals,
    Heist,
}

impl ScenarioKey {
    pub const ALL: [ScenarioKey; 3] = [Self::NumberGuess, Self::ResourceRivals, Self::Heist];

    /// Registry key, as typed on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NumberGuess => "numberGuess",
            Self::ResourceRivals => "resourceRivals",
            Self::Heist => "heist",
        }
    }

    /// Display name reported by the scenario itself.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NumberGuess => "NumberGuess",
            Self::ResourceRivals => "ResourceRivals",
            Self::Heist => "Heist",
        }
    }

    /// Source directory, relative to the crate `src`, hashed for provenance.
    pub fn source_path(&self) -> &'static str {
        match self {
            Self::NumberGuess => "scenarios/number_guess.rs",
            Self::ResourceRivals => "scenarios/resource_rivals.rs",
            Self::Heist => "scenarios/heist",
        }
    }

    /// Whether matches put every agent in one match (`false`) or pair them up.
    pub fn is_pairwise(&self) -> bool {
        matches!(self, Self::ResourceRivals)
    }
}

impl fmt::Display for ScenarioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKey {
    type Err = HashmatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| HashmatchError::UnknownScenario(s.to_string()))
    }
}
