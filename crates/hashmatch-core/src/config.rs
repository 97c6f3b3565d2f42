//! Runtime configuration resolved once at process start.
//!
//! [`RuntimeConfig`] is a plain value threaded into the runner, the LLM
//! agents and the artifact writers. It is never mutated after construction.

use std::path::PathBuf;

use crate::domain::{HashmatchError, Result};

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:3b";
pub const DEFAULT_OLLAMA_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_STORAGE_DIR: &str = "data/matches";
pub const DEFAULT_EXHIBITION_DIR: &str = "data/exhibitions";

/// Settings for the Ollama-backed agents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            timeout_ms: DEFAULT_OLLAMA_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub ollama: OllamaConfig,
    pub storage_dir: PathBuf,
    pub exhibition_dir: PathBuf,
    /// Root of the source tree hashed into match manifests.
    pub source_root: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            exhibition_dir: PathBuf::from(DEFAULT_EXHIBITION_DIR),
            source_root: default_source_root(),
        }
    }
}

/// Workspace-relative location of the core sources, for installed binaries
/// run from a checkout.
const WORKSPACE_SOURCE_ROOT: &str = "crates/hashmatch-core/src";

/// The core crate's own `src` directory: the build-time path when it still
/// exists, otherwise the checkout under the current directory.
pub fn default_source_root() -> PathBuf {
    let built = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
    if built.is_dir() {
        return built;
    }
    PathBuf::from(WORKSPACE_SOURCE_ROOT)
}

impl RuntimeConfig {
    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let timeout_ms = match get("OLLAMA_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                HashmatchError::InvalidConfig(format!("OLLAMA_TIMEOUT_MS is not a number: {raw}"))
            })?,
            None => DEFAULT_OLLAMA_TIMEOUT_MS,
        };
        if timeout_ms == 0 {
            return Err(HashmatchError::InvalidConfig(
                "OLLAMA_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            ollama: OllamaConfig {
                endpoint: get("OLLAMA_ENDPOINT")
                    .map(|e| e.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.ollama.endpoint),
                model: get("OLLAMA_MODEL").unwrap_or(defaults.ollama.model),
                timeout_ms,
            },
            storage_dir: get("HASHMATCH_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            exhibition_dir: get("EXHIBITION_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.exhibition_dir),
            source_root: get("HASHMATCH_SOURCE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.source_root),
        })
    }

    /// Build from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let cfg = RuntimeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.ollama.endpoint, "http://localhost:11434");
        assert_eq!(cfg.ollama.model, "qwen2.5:3b");
        assert_eq!(cfg.ollama.timeout_ms, 30_000);
        assert_eq!(cfg.storage_dir, PathBuf::from("data/matches"));
        assert_eq!(cfg.exhibition_dir, PathBuf::from("data/exhibitions"));
    }

    #[test]
    fn overrides_apply() {
        let cfg = RuntimeConfig::from_lookup(lookup(&[
            ("OLLAMA_ENDPOINT", "http://gpu-box:11434/"),
            ("OLLAMA_MODEL", "llama3.2"),
            ("OLLAMA_TIMEOUT_MS", "1500"),
            ("HASHMATCH_STORAGE_DIR", "/tmp/hm"),
        ]))
        .unwrap();
        assert_eq!(cfg.ollama.endpoint, "http://gpu-box:11434");
        assert_eq!(cfg.ollama.model, "llama3.2");
        assert_eq!(cfg.ollama.timeout_ms, 1500);
        assert_eq!(cfg.storage_dir, PathBuf::from("/tmp/hm"));
    }

    #[test]
    fn blank_values_fall_back() {
        let cfg = RuntimeConfig::from_lookup(lookup(&[("OLLAMA_MODEL", "  ")])).unwrap();
        assert_eq!(cfg.ollama.model, DEFAULT_OLLAMA_MODEL);
    }

    #[test]
    fn bad_timeout_rejected() {
        let err = RuntimeConfig::from_lookup(lookup(&[("OLLAMA_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("OLLAMA_TIMEOUT_MS"));
        assert!(RuntimeConfig::from_lookup(lookup(&[("OLLAMA_TIMEOUT_MS", "0")])).is_err());
    }

    #[test]
    fn source_root_override_and_default() {
        assert!(default_source_root().join("lib.rs").is_file());
        let cfg = RuntimeConfig::from_lookup(lookup(&[("HASHMATCH_SOURCE_ROOT", "/opt/hm/src")])).unwrap();
        assert_eq!(cfg.source_root, PathBuf::from("/opt/hm/src"));
    }
}
