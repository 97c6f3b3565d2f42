//! Reachability checks for LLM-backed agents, run before a match starts.

use std::collections::BTreeSet;
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::OllamaConfig;

/// Upper bound on one probe, independent of the chat timeout.
pub const PREFLIGHT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct PreflightError {
    pub message: String,
    /// Per-failure structured detail, recorded in `MatchSetupFailed`.
    pub details: Value,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

fn model_installed(wanted: &str, installed: &[TagEntry]) -> bool {
    installed
        .iter()
        .any(|t| t.name == wanted || t.name == format!("{wanted}:latest"))
}

async fn probe(client: &reqwest::Client, cfg: &OllamaConfig) -> Result<(), Value> {
    let url = format!("{}/api/tags", cfg.endpoint.trim_end_matches('/'));
    let failure = |reason: String| {
        json!({
            "provider": "ollama",
            "endpoint": cfg.endpoint,
            "model": cfg.model,
            "reason": reason,
        })
    };
    let limit = Duration::from_millis(cfg.timeout_ms.min(PREFLIGHT_TIMEOUT_MS));
    let fetched = tokio::time::timeout(limit, async {
        let response = client.get(&url).send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status().as_u16()));
        }
        response
            .json::<TagsResponse>()
            .await
            .map_err(|e| format!("invalid /api/tags response: {e}"))
    })
    .await;

    let tags = match fetched {
        Ok(Ok(tags)) => tags,
        Ok(Err(reason)) => return Err(failure(format!("unreachable: {reason}"))),
        Err(_) => return Err(failure(format!("timed out after {} ms", limit.as_millis()))),
    };
    if !model_installed(&cfg.model, &tags.models) {
        return Err(failure(format!("model '{}' is not installed", cfg.model)));
    }
    debug!(endpoint = %cfg.endpoint, model = %cfg.model, "preflight ok");
    Ok(())
}

/// Probe every distinct `(endpoint, model)` concurrently. Any failure fails
/// the whole preflight; `details.failures` lists each one.
pub async fn preflight_llm_agents(configs: &[OllamaConfig]) -> Result<(), PreflightError> {
    let unique: BTreeSet<(String, String)> = configs
        .iter()
        .map(|c| (c.endpoint.clone(), c.model.clone()))
        .collect();
    let targets: Vec<&OllamaConfig> = unique
        .iter()
        .filter_map(|(endpoint, model)| {
            configs
                .iter()
                .find(|c| &c.endpoint == endpoint && &c.model == model)
        })
        .collect();
    if targets.is_empty() {
        return Ok(());
    }

    let client = reqwest::Client::new();
    let results = join_all(targets.iter().map(|cfg| probe(&client, cfg))).await;
    let failures: Vec<Value> = results.into_iter().filter_map(Result::err).collect();
    if failures.is_empty() {
        return Ok(());
    }

    let first = failures[0]["reason"].as_str().unwrap_or("unknown").to_string();
    warn!(failures = failures.len(), "llm preflight failed");
    Err(PreflightError {
        message: format!("LLM preflight failed: {first}"),
        details: json!({ "failures": failures }),
    })
}
