//! Content hashing of the code that ran, and the match manifest built on it.
//!
//! A content hash covers a sorted set of files under one root. Files are
//! hashed in parallel, then combined in path order as `path\0sha256:<hex>\n`
//! lines, so the result never depends on directory enumeration order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::task::JoinSet;
use tracing::warn;

use crate::agents::AgentKey;
use crate::config::RuntimeConfig;
use crate::contract::MatchProvenance;
use crate::domain::{hash_bytes, AgentId, HashmatchError, Result, HASH_PREFIX};
use crate::scenarios::ScenarioKey;

/// Extensions that never carry semantics (generated declarations, maps, editor droppings).
pub const DEFAULT_EXCLUDE_EXTENSIONS: [&str; 4] = [".d.ts", ".map", ".bak", ".swp"];

pub const RUNNER_NAME: &str = "hashmatch";

/// Recorded in place of a content hash when the sources could not be read.
pub const HASH_UNAVAILABLE: &str = "unavailable";

/// Engine version recorded in manifests.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

fn is_excluded(rel: &str, exclude_exts: &[&str]) -> bool {
    exclude_exts.iter().any(|ext| rel.ends_with(ext))
}

fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_recursive(root: &Path, dir: &Path, exclude_exts: &[&str], out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        if name.starts_with('.') || name == "target" {
            continue;
        }
        if path.is_dir() {
            collect_recursive(root, &path, exclude_exts, out)?;
        } else if path.is_file() {
            let rel = relative_key(root, &path);
            if !is_excluded(&rel, exclude_exts) {
                out.push(rel);
            }
        }
    }
    Ok(())
}

/// Sorted, deduplicated `/`-separated paths relative to `root`.
pub fn collect_files(root: &Path, include_paths: &[&str], exclude_exts: &[&str]) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for include in include_paths {
        let path = root.join(include);
        if path.is_dir() {
            collect_recursive(root, &path, exclude_exts, &mut files)?;
        } else if path.is_file() {
            let rel = relative_key(root, &path);
            if !is_excluded(&rel, exclude_exts) {
                files.push(rel);
            }
        } else {
            return Err(HashmatchError::Provenance(format!(
                "missing source path: {}",
                path.display()
            )));
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Hash of the file set selected by `include_paths` under `root`.
pub async fn compute_content_hash(root: &Path, include_paths: &[&str], exclude_exts: &[&str]) -> Result<String> {
    let files = collect_files(root, include_paths, exclude_exts)?;

    let mut join_set = JoinSet::new();
    for (idx, rel) in files.iter().cloned().enumerate() {
        let full: PathBuf = root.join(&rel);
        join_set.spawn_blocking(move || std::fs::read(&full).map(|bytes| (idx, hash_bytes(&bytes))));
    }

    let mut hashes: Vec<Option<String>> = vec![None; files.len()];
    while let Some(joined) = join_set.join_next().await {
        let (idx, hash) = joined
            .map_err(|e| HashmatchError::Provenance(format!("hash task failed: {e}")))??;
        hashes[idx] = Some(hash);
    }

    let mut hasher = Sha256::new();
    for (rel, hash) in files.iter().zip(hashes) {
        let hash = hash.ok_or_else(|| HashmatchError::Provenance(format!("missing hash for {rel}")))?;
        hasher.update(rel.as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    Ok(format!("{HASH_PREFIX}{}", hex::encode(hasher.finalize())))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestScenario {
    pub id: String,
    pub version: String,
    pub contract_version: Option<String>,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAgent {
    pub id: AgentId,
    pub version: String,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConfig {
    pub max_turns: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRunner {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_commit: Option<String>,
}

/// `match_manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchManifest {
    pub match_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_key: Option<String>,
    pub scenario: ManifestScenario,
    pub agents: Vec<ManifestAgent>,
    pub config: ManifestConfig,
    pub runner: ManifestRunner,
    /// One entry per source set that fell back to [`HASH_UNAVAILABLE`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance_errors: Vec<String>,
}

/// Everything [`build_match_manifest`] needs to know about one match.
#[derive(Debug, Clone)]
pub struct ManifestInput<'a> {
    pub match_id: &'a str,
    pub mode_key: Option<&'a str>,
    pub scenario: ScenarioKey,
    pub agents: &'a [(AgentKey, AgentId)],
    pub max_turns: u32,
    pub seed: u64,
    pub provenance: Option<&'a MatchProvenance>,
}

async fn hash_or_record(root: &Path, source: &str, errors: &mut Vec<String>) -> String {
    match compute_content_hash(root, &[source], &DEFAULT_EXCLUDE_EXTENSIONS).await {
        Ok(hash) => hash,
        Err(err) => {
            let message = format!("{source}: {err}");
            if !errors.contains(&message) {
                warn!(root = %root.display(), error = %message, "content hash unavailable");
                errors.push(message);
            }
            HASH_UNAVAILABLE.to_string()
        }
    }
}

/// Hash scenario and agent sources and assemble the manifest.
///
/// Never fails: unreadable sources are recorded as [`HASH_UNAVAILABLE`]
/// with the cause in `provenance_errors`, so a finished match is always
/// persisted.
pub async fn build_match_manifest(input: &ManifestInput<'_>, runtime: &RuntimeConfig) -> MatchManifest {
    let root = runtime.source_root.as_path();
    let version = input
        .provenance
        .map(|p| p.engine_version.clone())
        .unwrap_or_else(|| engine_version().to_string());
    let mut errors = Vec::new();

    let scenario = ManifestScenario {
        id: input.scenario.as_str().to_string(),
        version: version.clone(),
        contract_version: None,
        content_hash: hash_or_record(root, input.scenario.source_path(), &mut errors).await,
    };

    let mut agents = Vec::with_capacity(input.agents.len());
    for (key, id) in input.agents {
        agents.push(ManifestAgent {
            id: id.clone(),
            version: version.clone(),
            content_hash: hash_or_record(root, key.source_path(), &mut errors).await,
            metadata: key.metadata(runtime),
        });
    }

    MatchManifest {
        match_id: input.match_id.to_string(),
        mode_key: input.mode_key.map(str::to_string),
        scenario,
        agents,
        config: ManifestConfig {
            max_turns: input.max_turns,
            seed: input.seed,
        },
        runner: ManifestRunner {
            name: RUNNER_NAME.to_string(),
            version,
            engine_commit: input.provenance.and_then(|p| p.engine_commit.clone()),
        },
        provenance_errors: errors,
    }
}
