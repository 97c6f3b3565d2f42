//! Networked agents behind a real local HTTP server.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::routing::post;
use axum::{Json, Router};
use hashmatch_core::artifacts::{read_json, MatchStatus, MatchStatusKind, MATCH_STATUS_FILE, TRANSCRIPT_FILE};
use hashmatch_core::gateway::{Delivery, DeliveryRequest, TranscriptEntry};
use hashmatch_core::runner::GatewayMode;
use hashmatch_core::{
    run_match_request, AgentId, EventKind, GatewayConfig, HttpTransport, MatchRequest, RuntimeConfig,
    TimeoutCause, Transport,
};
use serde_json::{json, Value};

/// Slack allowed past the deadline for one delivery to resolve.
const DEADLINE_SLACK: Duration = Duration::from_millis(100);

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/act")
}

fn http_request(url: String, max_turns: u32, deadline_ms: u64) -> MatchRequest {
    MatchRequest {
        match_id: Some("m-http".to_string()),
        gateway: GatewayMode::Http {
            agent_urls: vec![url],
        },
        gateway_config: GatewayConfig {
            default_deadline_ms: deadline_ms,
            max_response_bytes: 4096,
        },
        transcript: true,
        ..MatchRequest::new("numberGuess", vec!["noop".to_string()], 17, max_turns)
    }
}

fn timeout_causes(events: &[hashmatch_core::MatchEvent]) -> Vec<TimeoutCause> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::AgentTimedOut { cause, .. } => Some(*cause),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn responsive_agent_plays_without_timeouts() {
    let app = Router::new().route(
        "/act",
        post(|Json(body): Json<Value>| async move {
            let turn = body["turn"].as_i64().unwrap_or(0);
            Json(json!({ "action": { "guess": turn * 10 } }))
        }),
    );
    let url = serve(app).await;
    let outcome = run_match_request(&http_request(url, 4, 2_000), &RuntimeConfig::default())
        .await
        .unwrap();
    assert!(timeout_causes(&outcome.result.events).is_empty());
    let guesses: Vec<Value> = outcome
        .result
        .events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::ActionAdjudicated { chosen_action, .. } => Some(chosen_action.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(guesses.first(), Some(&json!({ "guess": 10 })));
}

fn hanging() -> Router {
    Router::new().route(
        "/act",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Json(json!({ "guess": 1 }))
        }),
    )
}

#[tokio::test]
async fn hanging_agent_is_bounded_by_deadline() {
    let url = serve(hanging()).await;
    let scratch = tempfile::tempdir().unwrap();
    let request = MatchRequest {
        out_dir: Some(scratch.path().to_path_buf()),
        ..http_request(url, 3, 150)
    };
    let started = Instant::now();
    let outcome = run_match_request(&request, &RuntimeConfig::default()).await.unwrap();
    assert!(started.elapsed() < (Duration::from_millis(150) + DEADLINE_SLACK) * 3 + Duration::from_millis(500));
    assert_eq!(timeout_causes(&outcome.result.events), vec![TimeoutCause::Deadline; 3]);
    assert_eq!(outcome.result.timeouts_per_agent.values().sum::<u32>(), 3);
    // The match still ran to its turn limit with default actions.
    assert_eq!(outcome.result.turns, 3);

    let transcript = std::fs::read_to_string(scratch.path().join(TRANSCRIPT_FILE)).unwrap();
    let entries: Vec<TranscriptEntry> = transcript
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(entries.len(), 3);
    for entry in &entries {
        assert_eq!(entry.outcome, "deadline");
        assert!(entry.latency_ms >= 150, "turn {} returned early", entry.turn);
        assert!(
            entry.latency_ms <= 150 + DEADLINE_SLACK.as_millis() as u64,
            "turn {} took {}ms",
            entry.turn,
            entry.latency_ms
        );
    }
}

#[tokio::test]
async fn each_delivery_resolves_within_its_deadline() {
    let url = serve(hanging()).await;
    let agent = AgentId::new("remote-0");
    let config = GatewayConfig {
        default_deadline_ms: 150,
        max_response_bytes: 4096,
    };
    let mut transport = HttpTransport::new(BTreeMap::from([(agent.clone(), url)]), config).unwrap();
    let observation = json!({ "turn": 0 });
    for turn in 1..=3 {
        let started = Instant::now();
        let delivery = <HttpTransport as Transport<Value, Value>>::deliver(
            &mut transport,
            DeliveryRequest {
                match_id: "m-bound",
                agent_id: &agent,
                turn,
                observation: &observation,
                deadline: config.deadline(),
            },
        )
        .await;
        let elapsed = started.elapsed();
        assert_eq!(delivery, Delivery::TimedOut(TimeoutCause::Deadline));
        assert!(elapsed >= config.deadline(), "turn {turn} returned after {elapsed:?}");
        assert!(elapsed < config.deadline() + DEADLINE_SLACK, "turn {turn} took {elapsed:?}");
    }
}

#[tokio::test]
async fn status_reads_running_while_agents_play() {
    let scratch = tempfile::tempdir().unwrap();
    let status_path = scratch.path().join(MATCH_STATUS_FILE);
    let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
    let app = {
        let seen = Arc::clone(&seen);
        Router::new().route(
            "/act",
            post(move || {
                let status_path = status_path.clone();
                let seen = Arc::clone(&seen);
                async move {
                    let status = std::fs::read(&status_path)
                        .ok()
                        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
                        .unwrap_or(Value::Null);
                    seen.lock().unwrap().push(status);
                    Json(json!({ "action": { "guess": 1 } }))
                }
            }),
        )
    };
    let url = serve(app).await;
    let request = MatchRequest {
        out_dir: Some(scratch.path().to_path_buf()),
        ..http_request(url, 2, 2_000)
    };
    run_match_request(&request, &RuntimeConfig::default()).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert!(!seen.is_empty());
    for status in &seen {
        assert_eq!(status["status"], "running");
        assert_eq!(status["matchId"], "m-http");
        assert!(status.get("endedAt").is_none());
    }
    let last: MatchStatus = read_json(&scratch.path().join(MATCH_STATUS_FILE)).unwrap();
    assert_eq!(last.status, MatchStatusKind::Complete);
    assert_eq!(Some(last.started_at.as_str()), seen[0]["startedAt"].as_str());
    assert!(last.ended_at.is_some());
}

#[tokio::test]
async fn oversized_and_malformed_bodies_are_timeouts() {
    let big = Router::new().route("/act", post(|| async { "x".repeat(64 * 1024) }));
    let url = serve(big).await;
    let outcome = run_match_request(&http_request(url, 2, 2_000), &RuntimeConfig::default())
        .await
        .unwrap();
    assert_eq!(
        timeout_causes(&outcome.result.events),
        vec![TimeoutCause::ResponseTooLarge; 2]
    );

    let junk = Router::new().route("/act", post(|| async { "not json at all" }));
    let url = serve(junk).await;
    let outcome = run_match_request(&http_request(url, 2, 2_000), &RuntimeConfig::default())
        .await
        .unwrap();
    assert_eq!(timeout_causes(&outcome.result.events), vec![TimeoutCause::Malformed; 2]);
}

#[tokio::test]
async fn unreachable_agent_is_a_network_timeout() {
    let outcome = run_match_request(
        &http_request("http://127.0.0.1:9/act".to_string(), 1, 2_000),
        &RuntimeConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(timeout_causes(&outcome.result.events), vec![TimeoutCause::Network]);
}

#[tokio::test]
async fn url_count_must_match_agents() {
    let mut request = http_request("http://127.0.0.1:9/act".to_string(), 1, 100);
    request.agent_keys.push("noop".to_string());
    assert!(run_match_request(&request, &RuntimeConfig::default()).await.is_err());
}
