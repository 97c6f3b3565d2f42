//! One match, end to end: resolve keys, preflight, pick a transport, run
//! the engine and persist artifacts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::agents::llm::preflight_llm_agents;
use crate::agents::{validate_agent_keys, AgentKey, AgentRoster};
use crate::artifacts::{
    is_safe_match_id, write_match_artifacts, write_running_status, MatchArtifacts, MatchSummary,
};
use crate::config::RuntimeConfig;
use crate::contract::{ForfeitPolicy, MatchConfig, MatchProvenance, Scenario, TerminationReason};
use crate::domain::{AgentId, HashmatchError, Result};
use crate::engine::{run_match, EngineOptions, MatchResult};
use crate::events::{setup_failed_events, EventKind};
use crate::gateway::{GatewayConfig, HttpTransport, LocalTransport, Transport, TranscriptEntry};
use crate::metrics::METRICS;
use crate::obs;
use crate::provenance::{build_match_manifest, ManifestInput};
use crate::scenarios::{Heist, NumberGuess, ResourceRivals, ScenarioKey};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GatewayMode {
    #[default]
    Local,
    /// One URL per agent, in agent order.
    Http { agent_urls: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub scenario_key: String,
    pub agent_keys: Vec<String>,
    pub seed: u64,
    pub max_turns: u32,
    pub match_id: Option<String>,
    /// Defaults to the match id.
    pub match_key: Option<String>,
    /// Explicit slot ids; defaults to `<key>-<index>`.
    pub agent_ids: Option<Vec<AgentId>>,
    pub out_dir: Option<PathBuf>,
    pub gateway: GatewayMode,
    pub gateway_config: GatewayConfig,
    pub forfeit: ForfeitPolicy,
    pub provenance: Option<MatchProvenance>,
    pub mode_key: Option<String>,
    pub transcript: bool,
}

impl MatchRequest {
    pub fn new(scenario_key: impl Into<String>, agent_keys: Vec<String>, seed: u64, max_turns: u32) -> Self {
        Self {
            scenario_key: scenario_key.into(),
            agent_keys,
            seed,
            max_turns,
            match_id: None,
            match_key: None,
            agent_ids: None,
            out_dir: None,
            gateway: GatewayMode::Local,
            gateway_config: GatewayConfig::default(),
            forfeit: ForfeitPolicy::never(),
            provenance: None,
            mode_key: None,
            transcript: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub result: MatchResult,
    pub scenario_name: &'static str,
    /// Set when artifacts were written.
    pub summary: Option<MatchSummary>,
}

impl MatchOutcome {
    pub fn reason(&self) -> TerminationReason {
        self.result.reason
    }
}

pub fn new_match_id() -> String {
    format!("m_{}", &Uuid::new_v4().simple().to_string()[..12])
}

/// Message worth surfacing for a match that did not complete.
pub fn failure_message(result: &MatchResult) -> Option<String> {
    result.events.iter().rev().find_map(|e| match &e.kind {
        EventKind::MatchSetupFailed { message, .. } => Some(message.clone()),
        EventKind::MatchEnded {
            reason: TerminationReason::Error,
            details,
            ..
        } => Some(
            details
                .as_ref()
                .and_then(|d| d.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("scenario error")
                .to_string(),
        ),
        _ => None,
    })
}

/// Resolve, run and (when `out_dir` is set) persist one match.
///
/// Key problems and I/O failures are errors. Preflight and agent setup
/// failures are not: they produce a `setupFailed` result with its two-event
/// log. Once a match has started its artifacts are always written, with
/// `match_status.json` reading `running` until the engine returns.
pub async fn run_match_request(request: &MatchRequest, runtime: &RuntimeConfig) -> Result<MatchOutcome> {
    let scenario: ScenarioKey = request.scenario_key.parse()?;
    let keys = validate_agent_keys(scenario, &request.agent_keys)?;
    if request.max_turns == 0 {
        return Err(HashmatchError::InvalidConfig("maxTurns must be positive".to_string()));
    }

    let agent_ids = match &request.agent_ids {
        Some(ids) if ids.len() == keys.len() => ids.clone(),
        Some(ids) => {
            return Err(HashmatchError::InvalidConfig(format!(
                "{} agent ids for {} agents",
                ids.len(),
                keys.len()
            )))
        }
        None => keys
            .iter()
            .enumerate()
            .map(|(i, k)| AgentId::for_slot(&k.id_prefix(), i))
            .collect(),
    };

    let match_id = request.match_id.clone().unwrap_or_else(new_match_id);
    if !is_safe_match_id(&match_id) {
        return Err(HashmatchError::InvalidConfig(format!("unsafe match id: {match_id:?}")));
    }
    if let GatewayMode::Http { agent_urls } = &request.gateway {
        if agent_urls.len() != keys.len() {
            return Err(HashmatchError::InvalidConfig(
                "an agent URL is required for every agent".to_string(),
            ));
        }
    }

    let config = MatchConfig {
        seed: request.seed,
        max_turns: request.max_turns,
        match_id: match_id.clone(),
        provenance: request.provenance.clone(),
    };
    let plan = Plan {
        request,
        runtime,
        keys: &keys,
        agent_ids: &agent_ids,
        config: &config,
    };

    let started_at = Utc::now();
    if let Some(dir) = &request.out_dir {
        write_running_status(dir, &match_id, started_at)?;
    }
    let ((result, transcript), scenario_name) = match scenario {
        ScenarioKey::NumberGuess => (plan.execute(&NumberGuess).await, NumberGuess.name()),
        ScenarioKey::ResourceRivals => (plan.execute(&ResourceRivals).await, ResourceRivals.name()),
        ScenarioKey::Heist => (plan.execute(&Heist).await, Heist.name()),
    };
    let ended_at = Utc::now();

    let summary = match &request.out_dir {
        Some(dir) => {
            let roster: Vec<(AgentKey, AgentId)> = keys.iter().cloned().zip(agent_ids.iter().cloned()).collect();
            let manifest = build_match_manifest(
                &ManifestInput {
                    match_id: &match_id,
                    mode_key: request.mode_key.as_deref(),
                    scenario,
                    agents: &roster,
                    max_turns: request.max_turns,
                    seed: request.seed,
                    provenance: request.provenance.as_ref(),
                },
                runtime,
            )
            .await;
            let summary = write_match_artifacts(
                dir,
                &MatchArtifacts {
                    result: &result,
                    manifest: &manifest,
                    match_key: request.match_key.as_deref().unwrap_or(&match_id),
                    started_at,
                    ended_at,
                    error: failure_message(&result),
                    transcript: request.transcript.then_some(transcript.as_slice()),
                },
            )?;
            info!(match_id = %match_id, dir = %dir.display(), "match artifacts written");
            Some(summary)
        }
        None => None,
    };

    Ok(MatchOutcome {
        result,
        scenario_name,
        summary,
    })
}

struct Plan<'a> {
    request: &'a MatchRequest,
    runtime: &'a RuntimeConfig,
    keys: &'a [AgentKey],
    agent_ids: &'a [AgentId],
    config: &'a MatchConfig,
}

impl Plan<'_> {
    fn options(&self) -> EngineOptions {
        let mut deadline = self.request.gateway_config.deadline();
        for cfg in self.keys.iter().filter_map(|k| k.llm_config(self.runtime)) {
            deadline = deadline.max(Duration::from_millis(cfg.timeout_ms));
        }
        EngineOptions {
            deadline,
            forfeit: self.request.forfeit,
        }
    }

    fn setup_failed(&self, message: &str, details: Option<Value>) -> (MatchResult, Vec<TranscriptEntry>) {
        let match_id = self.config.match_id.as_str();
        obs::emit_match_setup_failed(match_id, message);
        METRICS.inc_setup_failures();
        let events = setup_failed_events(match_id, message, details);
        (MatchResult::from_events(events, self.config.seed, self.agent_ids), Vec::new())
    }

    async fn execute<S: AgentRoster>(&self, scenario: &S) -> (MatchResult, Vec<TranscriptEntry>) {
        match &self.request.gateway {
            GatewayMode::Local => {
                let llm: Vec<_> = self.keys.iter().filter_map(|k| k.llm_config(self.runtime)).collect();
                if let Err(err) = preflight_llm_agents(&llm).await {
                    return self.setup_failed(&err.message, Some(err.details));
                }

                let mut agents = Vec::with_capacity(self.keys.len());
                for (key, id) in self.keys.iter().zip(self.agent_ids) {
                    match scenario.build_agent(key, id.clone(), self.runtime) {
                        Ok(agent) => agents.push(agent),
                        Err(err) => return self.setup_failed(&format!("agent {id}: {err}"), None),
                    }
                }
                let mut transport = LocalTransport::new(agents);
                if self.request.transcript {
                    transport = transport.with_transcript();
                }
                let result = run_match(scenario, &mut transport, self.agent_ids, self.config, &self.options()).await;
                (result, transport.take_transcript())
            }
            GatewayMode::Http { agent_urls } => {
                let endpoints: BTreeMap<AgentId, String> =
                    self.agent_ids.iter().cloned().zip(agent_urls.iter().cloned()).collect();
                let mut transport = match HttpTransport::new(endpoints, self.request.gateway_config) {
                    Ok(transport) => transport,
                    Err(err) => return self.setup_failed(&err.to_string(), None),
                };
                if self.request.transcript {
                    transport = transport.with_transcript();
                }
                let options = EngineOptions {
                    deadline: self.request.gateway_config.deadline(),
                    forfeit: self.request.forfeit,
                };
                let result = run_match(scenario, &mut transport, self.agent_ids, self.config, &options).await;
                let transcript =
                    <HttpTransport as Transport<S::Observation, S::Action>>::take_transcript(&mut transport);
                (result, transcript)
            }
        }
    }
}
