//! Hashmatch core library
//!
//! Runs turn-based scenarios between pluggable agents, records every match
//! as a sequenced event log, and wraps finished artifacts in content hashes
//! and signed receipts so results can be replayed and verified offline.

pub mod agents;
pub mod artifacts;
pub mod config;
pub mod contract;
pub mod domain;
pub mod engine;
pub mod events;
pub mod gateway;
pub mod metrics;
pub mod obs;
pub mod provenance;
pub mod receipt;
pub mod runner;
pub mod scenarios;
pub mod seed;
pub mod telemetry;
pub mod tournament;

pub use agents::{validate_agent_keys, AgentKey, AgentRoster};
pub use artifacts::{
    write_match_artifacts, BroadcastManifest, MatchArtifacts, MatchStatus, MatchStatusKind, MatchSummary,
};
pub use config::{OllamaConfig, RuntimeConfig};
pub use contract::{
    Agent, AgentConfig, AgentContext, AgentError, ForfeitPolicy, MatchConfig, Scenario, ScenarioFault,
    ScoreMap, TerminationReason, TimeoutCause,
};
pub use domain::{canonical_json, compute_digest, hash_file, AgentId, HashmatchError, Result};
pub use engine::{run_match, EngineOptions, MatchResult};
pub use events::{fold, EventKind, EventLog, MatchEvent, MatchReplayState, Playback};
pub use gateway::{GatewayConfig, HttpTransport, LocalTransport, Transport};
pub use provenance::{build_match_manifest, compute_content_hash, MatchManifest};
pub use receipt::{
    sign_match_dir, sign_tournament_dir, verify_match_dir, verify_tournament_dir, Receipt,
    VerificationReport,
};
pub use runner::{run_match_request, GatewayMode, MatchOutcome, MatchRequest};
pub use scenarios::ScenarioKey;
pub use tournament::{run_tournament, TournamentConfig, TournamentResult};

/// Crate version, reported in manifests and `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
