//! Domain-level error taxonomy for Hashmatch.
//!
//! Only failures that must reach the invoking process live here. Invalid
//! actions, agent timeouts and scenario faults are captured as events instead.

/// Hashmatch domain errors.
#[derive(Debug, thiserror::Error)]
pub enum HashmatchError {
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("unknown agent key: {0}")]
    UnknownAgent(String),

    #[error("agent '{agent}' cannot play scenario '{scenario}'")]
    IncompatibleAgent { agent: String, scenario: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("setup failed: {0}")]
    Setup(String),

    #[error("provenance error: {0}")]
    Provenance(String),

    #[error("receipt error: {0}")]
    Receipt(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("non-canonical value: {0}")]
    NonCanonical(String),

    #[error("invalid event log: {0}")]
    InvalidLog(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Hashmatch domain operations.
pub type Result<T> = std::result::Result<T, HashmatchError>;
