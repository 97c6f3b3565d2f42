//! Structured lifecycle events for matches, tournaments and receipts.
//!
//! Every function logs at a fixed level with a stable `event` field so log
//! pipelines can filter on it. Nothing here touches persisted artifacts.

use tracing::{info, warn};

/// RAII guard that keeps a `hashmatch.match` span entered.
///
/// ```ignore
/// let _span = MatchSpan::enter("m-abc");
/// // everything logged here carries match_id = "m-abc"
/// ```
pub struct MatchSpan {
    _span: tracing::span::EnteredSpan,
}

impl MatchSpan {
    pub fn enter(match_id: &str) -> Self {
        let span = tracing::info_span!("hashmatch.match", match_id = %match_id);
        Self {
            _span: span.entered(),
        }
    }

    /// Span without entering it, for instrumenting futures.
    pub fn span(match_id: &str) -> tracing::Span {
        tracing::info_span!("hashmatch.match", match_id = %match_id)
    }
}

pub fn emit_match_started(match_id: &str, scenario: &str, seed: u64, agents: usize) {
    info!(
        event = "match.started",
        match_id = %match_id,
        scenario = %scenario,
        seed = seed,
        agents = agents,
    );
}

pub fn emit_match_ended(match_id: &str, reason: &str, turns: u32, events: usize) {
    info!(
        event = "match.ended",
        match_id = %match_id,
        reason = %reason,
        turns = turns,
        events = events,
    );
}

/// Preflight or agent construction failed before turn 1.
pub fn emit_match_setup_failed(match_id: &str, message: &str) {
    warn!(event = "match.setup_failed", match_id = %match_id, message = %message);
}

pub fn emit_agent_timed_out(match_id: &str, agent_id: &str, turn: u32, cause: &str) {
    warn!(
        event = "agent.timed_out",
        match_id = %match_id,
        agent_id = %agent_id,
        turn = turn,
        cause = %cause,
    );
}

pub fn emit_tournament_started(tournament_id: &str, scenario: &str, matches: usize) {
    info!(
        event = "tournament.started",
        tournament_id = %tournament_id,
        scenario = %scenario,
        matches = matches,
    );
}

pub fn emit_tournament_finished(tournament_id: &str, matches: usize, failed: usize) {
    info!(
        event = "tournament.finished",
        tournament_id = %tournament_id,
        matches = matches,
        failed = failed,
    );
}

pub fn emit_receipt_signed(subject: &str, path: &str) {
    info!(event = "receipt.signed", subject = %subject, path = %path);
}

pub fn emit_receipt_verified(subject: &str, passed: bool, errors: usize) {
    if passed {
        info!(event = "receipt.verified", subject = %subject, passed = true);
    } else {
        warn!(
            event = "receipt.verified",
            subject = %subject,
            passed = false,
            errors = errors,
        );
    }
}
