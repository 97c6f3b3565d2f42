//! Folding a recorded log reproduces the engine's own result, at every
//! split point and through the playback cursor.

use hashmatch_core::events::{parse_jsonl, to_jsonl, MatchReducer, Reducer};
use hashmatch_core::{fold, run_match_request, MatchRequest, MatchResult, Playback, RuntimeConfig, TerminationReason};

async fn play(scenario: &str, agents: &[&str], seed: u64, max_turns: u32) -> MatchResult {
    run_match_request(
        &MatchRequest::new(scenario, agents.iter().map(|a| a.to_string()).collect(), seed, max_turns),
        &RuntimeConfig::default(),
    )
    .await
    .unwrap()
    .result
}

fn assert_fold_matches(result: &MatchResult) {
    let state = fold(&result.events).unwrap();
    assert!(state.is_ended());
    assert_eq!(state.scores, result.scores);
    assert_eq!(state.turn, result.turns);
    assert_eq!(state.timeouts_per_agent, result.timeouts_per_agent);
    assert_eq!(state.reason, Some(result.reason));
    assert_eq!(state.last_seq, Some(result.events.len() as u64 - 1));
}

#[tokio::test]
async fn fold_reproduces_result_for_each_scenario() {
    assert_fold_matches(&play("numberGuess", &["random", "baseline"], 11, 30).await);
    assert_fold_matches(&play("resourceRivals", &["randomBidder", "conservative"], 12, 30).await);
    assert_fold_matches(&play("heist", &["explorer", "noop"], 13, 30).await);
}

#[tokio::test]
async fn split_fold_equals_direct_fold() {
    let result = play("heist", &["explorer", "explorer"], 5, 25).await;
    let direct = MatchReducer.fold(&result.events);
    for k in (0..=result.events.len()).step_by(3) {
        let head = MatchReducer.fold(&result.events[..k]);
        assert_eq!(MatchReducer.fold_from(head, &result.events[k..]), direct, "cut at {k}");
    }
}

#[tokio::test]
async fn jsonl_round_trip_preserves_fold() {
    let result = play("resourceRivals", &["randomBidder", "conservative"], 21, 20).await;
    let text = to_jsonl(&result.events).unwrap();
    let parsed = parse_jsonl(&text).unwrap();
    assert_eq!(parsed, result.events);
    assert_eq!(fold(&parsed), fold(&result.events));
}

#[tokio::test]
async fn playback_scrubbing_matches_straight_replay() {
    let result = play("numberGuess", &["baseline"], 8, 20).await;
    let n = result.events.len();
    let mut playback = Playback::new(MatchReducer, result.events.clone());

    let end = playback.seek(n - 1).cloned();
    playback.seek(n / 2);
    playback.step_back();
    playback.step_forward();
    let mid = playback.state().cloned();
    assert_eq!(mid, fold(&result.events[..=n / 2]));

    playback.seek(usize::MAX);
    assert!(playback.is_finished());
    assert_eq!(playback.state().cloned(), end);
    assert_eq!(end.map(|s| s.reason), Some(Some(result.reason)));
    assert!(result.reason != TerminationReason::SetupFailed);
}
