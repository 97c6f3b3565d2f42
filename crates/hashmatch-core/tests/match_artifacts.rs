//! What lands on disk for a single match, including when the source tree
//! used for provenance hashing is not where the runtime expects it.

use hashmatch_core::artifacts::{
    read_json, MatchStatus, MatchStatusKind, MATCH_LOG_FILE, MATCH_MANIFEST_FILE, MATCH_STATUS_FILE,
    MATCH_SUMMARY_FILE,
};
use hashmatch_core::provenance::HASH_UNAVAILABLE;
use hashmatch_core::{run_match_request, MatchManifest, MatchRequest, RuntimeConfig, TerminationReason};

fn number_guess(out: &std::path::Path) -> MatchRequest {
    MatchRequest {
        match_id: Some("m-artifacts".to_string()),
        out_dir: Some(out.to_path_buf()),
        ..MatchRequest::new("numberGuess", vec!["baseline".to_string()], 11, 30)
    }
}

#[tokio::test]
async fn missing_source_root_still_persists_the_match() {
    let scratch = tempfile::tempdir().unwrap();
    let runtime = RuntimeConfig {
        source_root: scratch.path().join("no-such-src"),
        ..RuntimeConfig::default()
    };
    let out = scratch.path().join("m-artifacts");
    let outcome = run_match_request(&number_guess(&out), &runtime).await.unwrap();
    assert_ne!(outcome.reason(), TerminationReason::SetupFailed);
    assert!(outcome.summary.is_some());

    for file in [MATCH_LOG_FILE, MATCH_MANIFEST_FILE, MATCH_SUMMARY_FILE, MATCH_STATUS_FILE] {
        assert!(out.join(file).is_file(), "{file} missing");
    }
    let status: MatchStatus = read_json(&out.join(MATCH_STATUS_FILE)).unwrap();
    assert_eq!(status.status, MatchStatusKind::Complete);
    assert!(status.ended_at.is_some());

    let manifest: MatchManifest = read_json(&out.join(MATCH_MANIFEST_FILE)).unwrap();
    assert_eq!(manifest.scenario.content_hash, HASH_UNAVAILABLE);
    assert_eq!(manifest.agents[0].content_hash, HASH_UNAVAILABLE);
    assert!(!manifest.provenance_errors.is_empty());
}

#[tokio::test]
async fn readable_sources_give_real_hashes() {
    let scratch = tempfile::tempdir().unwrap();
    let out = scratch.path().join("m-artifacts");
    run_match_request(&number_guess(&out), &RuntimeConfig::default())
        .await
        .unwrap();
    let manifest: MatchManifest = read_json(&out.join(MATCH_MANIFEST_FILE)).unwrap();
    assert!(manifest.scenario.content_hash.starts_with("sha256:"));
    assert!(manifest.provenance_errors.is_empty());
    let raw = std::fs::read_to_string(out.join(MATCH_MANIFEST_FILE)).unwrap();
    assert!(!raw.contains("provenanceErrors"));
}
