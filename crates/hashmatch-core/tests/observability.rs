//! Structured lifecycle events around matches, tournaments and receipts.

use hashmatch_core::metrics::METRICS;
use hashmatch_core::obs::{
    emit_agent_timed_out, emit_match_ended, emit_match_setup_failed, emit_match_started,
    emit_receipt_signed, emit_receipt_verified, emit_tournament_finished, emit_tournament_started,
    MatchSpan,
};
use hashmatch_core::{run_match_request, MatchRequest, RuntimeConfig};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn match_lifecycle_events_carry_stable_names() {
    let _span = MatchSpan::enter("m-obs");
    emit_match_started("m-obs", "NumberGuess", 1, 2);
    emit_agent_timed_out("m-obs", "random-0", 3, "deadline");
    emit_match_ended("m-obs", "maxTurns", 10, 42);
    assert!(logs_contain("match.started"));
    assert!(logs_contain("agent.timed_out"));
    assert!(logs_contain("match.ended"));
    assert!(logs_contain("m-obs"));
}

#[traced_test]
#[test]
fn setup_failure_is_logged() {
    emit_match_setup_failed("m-fail", "ollama unreachable");
    assert!(logs_contain("match.setup_failed"));
    assert!(logs_contain("ollama unreachable"));
}

#[traced_test]
#[test]
fn tournament_and_receipt_events() {
    emit_tournament_started("t_abc", "heist", 4);
    emit_tournament_finished("t_abc", 4, 1);
    emit_receipt_signed("m-1", "/tmp/receipt.json");
    emit_receipt_verified("m-1", false, 2);
    assert!(logs_contain("tournament.started"));
    assert!(logs_contain("tournament.finished"));
    assert!(logs_contain("receipt.signed"));
    assert!(logs_contain("receipt.verified"));
}

#[traced_test]
#[tokio::test]
async fn engine_emits_start_and_end_and_counts_matches() {
    let before = METRICS.matches_run();
    run_match_request(
        &MatchRequest::new("numberGuess", vec!["baseline".into()], 4, 15),
        &RuntimeConfig::default(),
    )
    .await
    .unwrap();
    assert!(logs_contain("match.started"));
    assert!(logs_contain("match.ended"));
    assert!(METRICS.matches_run() > before);
}
