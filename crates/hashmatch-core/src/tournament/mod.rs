//! Tournaments: many matches under seeds derived from one config.
//!
//! Ids and seeds are pure functions of the config, so re-running a config
//! reproduces every match log. Matches share nothing and may run
//! concurrently; results are re-ordered by schedule position afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use crate::agents::{validate_agent_keys, AgentKey};
use crate::artifacts::{
    write_json, BroadcastManifest, MatchSummary, BROADCAST_MANIFEST_FILE, MATCH_LOG_FILE,
    MATCH_MANIFEST_FILE, MATCH_STATUS_FILE, MATCH_SUMMARY_FILE, STANDINGS_FILE,
    TOURNAMENT_MANIFEST_FILE, TRANSCRIPT_FILE,
};
use crate::config::RuntimeConfig;
use crate::contract::{ForfeitPolicy, MatchProvenance, TerminationReason};
use crate::domain::{compute_digest, AgentId, HashmatchError, Result, HASH_PREFIX};
use crate::gateway::GatewayConfig;
use crate::obs;
use crate::provenance::engine_version;
use crate::runner::{run_match_request, MatchRequest};
use crate::scenarios::ScenarioKey;
use crate::seed::derive_match_seed;

/// Directory under a tournament root holding one directory per match.
pub const MATCHES_DIR: &str = "matches";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentConfig {
    pub seed: u64,
    pub rounds: u32,
    pub max_turns: u32,
    pub scenario_key: String,
    pub agent_keys: Vec<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(skip)]
    pub gateway_config: GatewayConfig,
    #[serde(default)]
    pub forfeit: ForfeitPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<MatchProvenance>,
    #[serde(default)]
    pub transcript: bool,
}

fn default_concurrency() -> usize {
    1
}

impl TournamentConfig {
    pub fn new(scenario_key: impl Into<String>, agent_keys: Vec<String>, seed: u64, rounds: u32, max_turns: u32) -> Self {
        Self {
            seed,
            rounds,
            max_turns,
            scenario_key: scenario_key.into(),
            agent_keys,
            concurrency: default_concurrency(),
            gateway_config: GatewayConfig::default(),
            forfeit: ForfeitPolicy::never(),
            mode_key: None,
            provenance: None,
            transcript: false,
        }
    }

    /// `t_` plus the first 12 hex digits of the digest of the fields that
    /// decide what gets played.
    pub fn tournament_id(&self) -> Result<String> {
        let digest = compute_digest(&json!({
            "seed": self.seed,
            "rounds": self.rounds,
            "maxTurns": self.max_turns,
            "scenarioKey": self.scenario_key,
            "agentKeys": self.agent_keys,
            "modeKey": self.mode_key,
        }))?;
        let hex = digest.strip_prefix(HASH_PREFIX).unwrap_or(&digest);
        Ok(format!("t_{}", &hex[..12]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentAgent {
    pub agent_id: AgentId,
    pub agent_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMatch {
    /// 1-based.
    pub round: u32,
    /// 1-based within the round.
    pub index: u32,
    pub match_key: String,
    pub match_id: String,
    pub seed: u64,
    pub agents: Vec<TournamentAgent>,
}

/// Tournament-wide agent roster: `<key>-<index>` in config order.
pub fn tournament_agents(keys: &[AgentKey], raw: &[String]) -> Vec<TournamentAgent> {
    keys.iter()
        .zip(raw)
        .enumerate()
        .map(|(i, (key, raw))| TournamentAgent {
            agent_id: AgentId::for_slot(&key.id_prefix(), i),
            agent_key: raw.clone(),
        })
        .collect()
}

/// Every match of the tournament in play order.
pub fn schedule(config: &TournamentConfig, tournament_id: &str, roster: &[TournamentAgent]) -> Vec<ScheduledMatch> {
    let scenario = config.scenario_key.parse::<ScenarioKey>().ok();
    let pairings: Vec<Vec<TournamentAgent>> = if scenario.is_some_and(|s| s.is_pairwise()) {
        let mut pairs = Vec::new();
        for i in 0..roster.len() {
            for j in (i + 1)..roster.len() {
                pairs.push(vec![roster[i].clone(), roster[j].clone()]);
            }
        }
        pairs
    } else {
        vec![roster.to_vec()]
    };

    let mut out = Vec::new();
    for round in 0..config.rounds {
        for (m, agents) in pairings.iter().enumerate() {
            let match_key = format!("r{}-m{}", round + 1, m + 1);
            out.push(ScheduledMatch {
                round: round + 1,
                index: m as u32 + 1,
                match_id: format!("{tournament_id}-{match_key}"),
                seed: derive_match_seed(config.seed, round, m as u32),
                match_key,
                agents: agents.clone(),
            });
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub agent_id: AgentId,
    pub agent_key: String,
    pub score: i64,
    pub wins: u32,
    pub matches: u32,
    pub timeouts: u32,
}

/// Per-match record kept by the tournament.
pub type MatchSummaryRecord = MatchSummary;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentResult {
    pub tournament_id: String,
    pub config: TournamentConfig,
    pub agents: Vec<TournamentAgent>,
    pub schedule: Vec<ScheduledMatch>,
    pub matches: Vec<MatchSummaryRecord>,
    pub standings: Vec<Standing>,
    /// Match keys that ended `setupFailed` or `error`.
    pub failed_matches: Vec<String>,
}

pub fn compute_standings(agents: &[TournamentAgent], matches: &[MatchSummaryRecord]) -> Vec<Standing> {
    let mut table: BTreeMap<&AgentId, Standing> = agents
        .iter()
        .map(|a| {
            (
                &a.agent_id,
                Standing {
                    agent_id: a.agent_id.clone(),
                    agent_key: a.agent_key.clone(),
                    score: 0,
                    wins: 0,
                    matches: 0,
                    timeouts: 0,
                },
            )
        })
        .collect();

    for summary in matches {
        for id in &summary.agent_ids {
            if let Some(row) = table.get_mut(id) {
                row.matches += 1;
                row.score += summary.scores.get(id).copied().unwrap_or(0);
                row.timeouts += summary.timeouts_per_agent.get(id).copied().unwrap_or(0);
                if summary.winner.as_ref() == Some(id) {
                    row.wins += 1;
                }
            }
        }
    }

    let mut rows: Vec<Standing> = table.into_values().collect();
    rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.agent_id.cmp(&b.agent_id)));
    rows
}

fn match_dir(root: &Path, match_key: &str) -> PathBuf {
    root.join(MATCHES_DIR).join(match_key)
}

/// Run every scheduled match and aggregate. Unknown or incompatible agent
/// keys fail before any match runs; a failing match never stops the rest.
pub async fn run_tournament(
    config: &TournamentConfig,
    runtime: &RuntimeConfig,
    out_dir: Option<&Path>,
) -> Result<TournamentResult> {
    let scenario: ScenarioKey = config.scenario_key.parse()?;
    let keys = validate_agent_keys(scenario, &config.agent_keys)?;
    if config.rounds == 0 || config.max_turns == 0 {
        return Err(HashmatchError::InvalidConfig(
            "rounds and maxTurns must be positive".to_string(),
        ));
    }
    if scenario.is_pairwise() && keys.len() < 2 {
        return Err(HashmatchError::InvalidConfig(format!(
            "{scenario} needs at least two agents"
        )));
    }

    let tournament_id = config.tournament_id()?;
    let roster = tournament_agents(&keys, &config.agent_keys);
    let plan = schedule(config, &tournament_id, &roster);
    obs::emit_tournament_started(&tournament_id, scenario.as_str(), plan.len());

    let runtime = Arc::new(runtime.clone());
    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut join_set = JoinSet::new();
    for (idx, scheduled) in plan.iter().enumerate() {
        let request = MatchRequest {
            match_id: Some(scheduled.match_id.clone()),
            match_key: Some(scheduled.match_key.clone()),
            agent_ids: Some(scheduled.agents.iter().map(|a| a.agent_id.clone()).collect()),
            out_dir: out_dir.map(|d| match_dir(d, &scheduled.match_key)),
            gateway_config: config.gateway_config,
            forfeit: config.forfeit,
            provenance: config.provenance.clone(),
            mode_key: config.mode_key.clone(),
            transcript: config.transcript,
            ..MatchRequest::new(
                config.scenario_key.clone(),
                scheduled.agents.iter().map(|a| a.agent_key.clone()).collect(),
                scheduled.seed,
                config.max_turns,
            )
        };
        let runtime = Arc::clone(&runtime);
        let permits = Arc::clone(&permits);
        let match_key = scheduled.match_key.clone();
        join_set.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let outcome = run_match_request(&request, &runtime).await?;
            let summary = outcome
                .summary
                .unwrap_or_else(|| MatchSummary::from_result(&outcome.result, &match_key));
            Ok::<(usize, MatchSummary), HashmatchError>((idx, summary))
        });
    }

    let mut ordered: Vec<Option<MatchSummary>> = vec![None; plan.len()];
    while let Some(joined) = join_set.join_next().await {
        let (idx, summary) =
            joined.map_err(|e| HashmatchError::Setup(format!("match task join error: {e}")))??;
        ordered[idx] = Some(summary);
    }
    let matches: Vec<MatchSummary> = ordered.into_iter().flatten().collect();
    if matches.len() != plan.len() {
        return Err(HashmatchError::Setup("missing match results".to_string()));
    }

    let failed_matches: Vec<String> = matches
        .iter()
        .filter(|m| matches!(m.reason, TerminationReason::SetupFailed | TerminationReason::Error))
        .map(|m| m.match_key.clone())
        .collect();
    let standings = compute_standings(&roster, &matches);
    obs::emit_tournament_finished(&tournament_id, matches.len(), failed_matches.len());

    let result = TournamentResult {
        tournament_id,
        config: config.clone(),
        agents: roster,
        schedule: plan,
        matches,
        standings,
        failed_matches,
    };
    if let Some(dir) = out_dir {
        write_tournament_artifacts(&result, dir)?;
    }
    Ok(result)
}

/// `tournament_manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentManifest {
    pub tournament_id: String,
    pub scenario_key: String,
    pub seed: u64,
    pub rounds: u32,
    pub max_turns: u32,
    pub agents: Vec<TournamentAgent>,
    pub matches: Vec<ScheduledMatch>,
    pub engine_version: String,
}

/// Write the tournament-level files and the broadcast index. Match
/// directories are expected to exist already.
pub fn write_tournament_artifacts(result: &TournamentResult, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let manifest = TournamentManifest {
        tournament_id: result.tournament_id.clone(),
        scenario_key: result.config.scenario_key.clone(),
        seed: result.config.seed,
        rounds: result.config.rounds,
        max_turns: result.config.max_turns,
        agents: result.agents.clone(),
        matches: result.schedule.clone(),
        engine_version: engine_version().to_string(),
    };
    write_json(&dir.join(TOURNAMENT_MANIFEST_FILE), &manifest)?;
    write_json(&dir.join(STANDINGS_FILE), &result.standings)?;

    let mut paths = vec![
        TOURNAMENT_MANIFEST_FILE.to_string(),
        STANDINGS_FILE.to_string(),
    ];
    for scheduled in &result.schedule {
        let mdir = match_dir(dir, &scheduled.match_key);
        for file in [
            MATCH_LOG_FILE,
            MATCH_MANIFEST_FILE,
            MATCH_SUMMARY_FILE,
            MATCH_STATUS_FILE,
            TRANSCRIPT_FILE,
        ] {
            if mdir.join(file).is_file() {
                paths.push(format!("{MATCHES_DIR}/{}/{file}", scheduled.match_key));
            }
        }
    }
    BroadcastManifest::new(result.tournament_id.clone(), paths).write(&dir.join(BROADCAST_MANIFEST_FILE))?;
    info!(tournament_id = %result.tournament_id, dir = %dir.display(), "tournament artifacts written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rivals_config() -> TournamentConfig {
        TournamentConfig::new(
            "resourceRivals",
            vec!["randomBidder".into(), "conservative".into(), "noop".into()],
            42,
            2,
            10,
        )
    }

    #[test]
    fn pairwise_schedule_covers_every_pair_each_round() {
        let config = rivals_config();
        let keys = validate_agent_keys(ScenarioKey::ResourceRivals, &config.agent_keys).unwrap();
        let roster = tournament_agents(&keys, &config.agent_keys);
        let plan = schedule(&config, "t_x", &roster);
        assert_eq!(plan.len(), 6);
        assert_eq!(plan[0].match_key, "r1-m1");
        assert_eq!(plan[0].match_id, "t_x-r1-m1");
        assert_eq!(plan[5].match_key, "r2-m3");
        assert_eq!(plan[2].agents[0].agent_id, AgentId::new("conservative-1"));
        assert_eq!(plan[2].agents[1].agent_id, AgentId::new("noop-2"));
        assert_ne!(plan[0].seed, plan[3].seed);
        assert_eq!(schedule(&config, "t_x", &roster), plan);
    }

    #[test]
    fn free_for_all_schedule_is_one_match_per_round() {
        let config = TournamentConfig::new("heist", vec!["explorer".into(), "noop".into()], 1, 3, 10);
        let keys = validate_agent_keys(ScenarioKey::Heist, &config.agent_keys).unwrap();
        let plan = schedule(&config, "t_y", &tournament_agents(&keys, &config.agent_keys));
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|m| m.agents.len() == 2));
    }

    #[test]
    fn tournament_id_ignores_concurrency() {
        let a = rivals_config();
        let mut b = rivals_config();
        b.concurrency = 8;
        assert_eq!(a.tournament_id().unwrap(), b.tournament_id().unwrap());
        let mut c = rivals_config();
        c.seed = 43;
        assert_ne!(a.tournament_id().unwrap(), c.tournament_id().unwrap());
        assert!(a.tournament_id().unwrap().starts_with("t_"));
        assert_eq!(a.tournament_id().unwrap().len(), 14);
    }

    #[test]
    fn standings_sorted_by_score_then_id() {
        let agents = vec![
            TournamentAgent {
                agent_id: AgentId::new("a-0"),
                agent_key: "a".into(),
            },
            TournamentAgent {
                agent_id: AgentId::new("b-1"),
                agent_key: "b".into(),
            },
        ];
        let summary = MatchSummary {
            match_id: "m".into(),
            match_key: "r1-m1".into(),
            seed: 1,
            agent_ids: vec![AgentId::new("a-0"), AgentId::new("b-1")],
            scores: [(AgentId::new("a-0"), 5), (AgentId::new("b-1"), 5)].into_iter().collect(),
            timeouts_per_agent: [(AgentId::new("b-1"), 2)].into_iter().collect(),
            winner: None,
            turns: 3,
            reason: TerminationReason::MaxTurns,
            forfeited_by: None,
            hashes: None,
        };
        let rows = compute_standings(&agents, &[summary]);
        assert_eq!(rows[0].agent_id, AgentId::new("a-0"));
        assert_eq!(rows[1].timeouts, 2);
        assert_eq!(rows[1].matches, 1);
    }

    #[tokio::test]
    async fn unknown_agent_fails_before_running() {
        let config = TournamentConfig::new("heist", vec!["explorer".into(), "ghost".into()], 1, 1, 5);
        let err = run_tournament(&config, &RuntimeConfig::default(), None).await.unwrap_err();
        assert!(matches!(err, HashmatchError::UnknownAgent(_)));
    }
}
