//! Per-delivery transcript (`gateway_transcript.jsonl`).
//!
//! Timing lives here and only here, so the match log stays deterministic.

use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::contract::TimeoutCause;
use crate::domain::{to_canonical_string, AgentId, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub agent_id: AgentId,
    pub turn: u32,
    /// `action` on success, otherwise the timeout cause.
    pub outcome: String,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_bytes: Option<u64>,
}

/// Collects entries when enabled; a disabled recorder drops them.
#[derive(Debug, Default)]
pub struct TranscriptRecorder {
    enabled: bool,
    entries: Vec<TranscriptEntry>,
}

impl TranscriptRecorder {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            entries: Vec::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        agent_id: &AgentId,
        turn: u32,
        outcome: Option<TimeoutCause>,
        started: Instant,
        response_bytes: Option<u64>,
    ) {
        if !self.enabled {
            return;
        }
        self.entries.push(TranscriptEntry {
            agent_id: agent_id.clone(),
            turn,
            outcome: outcome.map_or_else(|| "action".to_string(), |c| c.as_str().to_string()),
            latency_ms: started.elapsed().as_millis() as u64,
            response_bytes,
        });
    }

    pub fn take(&mut self) -> Vec<TranscriptEntry> {
        std::mem::take(&mut self.entries)
    }
}

pub fn transcript_to_jsonl(entries: &[TranscriptEntry]) -> Result<String> {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&to_canonical_string(entry)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn write_transcript(path: &Path, entries: &[TranscriptEntry]) -> Result<()> {
    std::fs::write(path, transcript_to_jsonl(entries)?)?;
    Ok(())
}
