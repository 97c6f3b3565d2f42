//! Signing and verifying match and tournament directories.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use ed25519_dalek::SigningKey;
use hashmatch_core::artifacts::{
    BroadcastClass, BroadcastManifest, BROADCAST_MANIFEST_FILE, MATCH_LOG_FILE, RECEIPT_FILE,
    TOURNAMENT_MANIFEST_FILE, TOURNAMENT_RECEIPT_FILE,
};
use hashmatch_core::receipt::{MatchReceiptPayload, Receipt, VerifyStatus};
use hashmatch_core::{
    hash_file, run_match_request, run_tournament, sign_match_dir, sign_tournament_dir,
    verify_match_dir, verify_tournament_dir, MatchRequest, RuntimeConfig, TournamentConfig,
};

fn key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

async fn match_dir(out: &Path) {
    let request = MatchRequest {
        match_id: Some("m-receipt".to_string()),
        out_dir: Some(out.to_path_buf()),
        ..MatchRequest::new("numberGuess", vec!["baseline".into(), "random".into()], 3010, 10)
    };
    run_match_request(&request, &RuntimeConfig::default()).await.unwrap();
}

async fn tournament_dir(out: &Path) {
    let config = TournamentConfig::new(
        "numberGuess",
        vec!["random".into(), "baseline".into()],
        3010,
        2,
        10,
    );
    run_tournament(&config, &RuntimeConfig::default(), Some(out)).await.unwrap();
}

fn append_byte(path: &Path) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(b" ").unwrap();
}

#[tokio::test]
async fn signed_match_verifies() {
    let dir = tempfile::tempdir().unwrap();
    match_dir(dir.path()).await;
    let receipt = sign_match_dir(dir.path(), &key(), "unit-test").unwrap();
    assert_eq!(receipt.payload.match_id, "m-receipt");
    assert_eq!(receipt.payload.log_hash, hash_file(&dir.path().join(MATCH_LOG_FILE)).unwrap());

    let report = verify_match_dir(dir.path());
    assert_eq!(report.status, VerifyStatus::Pass, "{:?}", report.errors);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn tampered_log_fails_freshness_but_signature_holds() {
    let dir = tempfile::tempdir().unwrap();
    match_dir(dir.path()).await;
    sign_match_dir(dir.path(), &key(), "unit-test").unwrap();
    append_byte(&dir.path().join(MATCH_LOG_FILE));

    let report = verify_match_dir(dir.path());
    assert_eq!(report.status, VerifyStatus::Fail);
    assert!(report.check("signature").unwrap().passed);
    assert!(!report.check("logHash").unwrap().passed);
    assert!(report.check("manifestHash").unwrap().passed);

    let text = std::fs::read_to_string(dir.path().join(RECEIPT_FILE)).unwrap();
    let receipt: Receipt<MatchReceiptPayload> = serde_json::from_str(&text).unwrap();
    receipt.verify_signature().unwrap();
}

#[tokio::test]
async fn missing_receipt_is_a_failed_report() {
    let dir = tempfile::tempdir().unwrap();
    match_dir(dir.path()).await;
    let report = verify_match_dir(dir.path());
    assert_eq!(report.status, VerifyStatus::Fail);
    assert!(!report.errors.is_empty());
}

#[tokio::test]
async fn tournament_signing_patches_broadcast_and_verifies() {
    let dir = tempfile::tempdir().unwrap();
    tournament_dir(dir.path()).await;
    let receipt = sign_tournament_dir(dir.path(), &key(), "unit-test").unwrap();
    assert_eq!(receipt.payload.match_count, 2);
    assert_eq!(receipt.payload.matches[0].match_key, "r1-m1");

    let manifest = BroadcastManifest::read(&dir.path().join(BROADCAST_MANIFEST_FILE)).unwrap();
    for path in ["matches/r1-m1/receipt.json", "matches/r2-m1/receipt.json", TOURNAMENT_RECEIPT_FILE] {
        let entry = manifest.files.iter().find(|f| f.path == path).unwrap();
        assert_eq!(entry.class, BroadcastClass::Telemetry, "{path}");
    }
    let paths: Vec<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
    let mut sorted = paths.clone();
    sorted.sort_by(|a, b| hashmatch_core::artifacts::locale_compare(a, b));
    assert_eq!(paths, sorted);

    let report = verify_tournament_dir(dir.path());
    assert_eq!(report.status, VerifyStatus::Pass, "{:?}", report.errors);
}

#[tokio::test]
async fn tournament_signing_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    tournament_dir(dir.path()).await;
    sign_tournament_dir(dir.path(), &key(), "unit-test").unwrap();
    let first_receipt = std::fs::read(dir.path().join(TOURNAMENT_RECEIPT_FILE)).unwrap();
    let first_broadcast = std::fs::read(dir.path().join(BROADCAST_MANIFEST_FILE)).unwrap();

    sign_tournament_dir(dir.path(), &key(), "unit-test").unwrap();
    assert_eq!(std::fs::read(dir.path().join(TOURNAMENT_RECEIPT_FILE)).unwrap(), first_receipt);
    assert_eq!(std::fs::read(dir.path().join(BROADCAST_MANIFEST_FILE)).unwrap(), first_broadcast);
}

#[tokio::test]
async fn tampered_tournament_match_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    tournament_dir(dir.path()).await;
    sign_tournament_dir(dir.path(), &key(), "unit-test").unwrap();
    append_byte(&dir.path().join("matches/r2-m1").join(MATCH_LOG_FILE));

    let report = verify_tournament_dir(dir.path());
    assert_eq!(report.status, VerifyStatus::Fail);
    assert!(report.check("signature").unwrap().passed);
    assert!(!report.check("truthBundleHash").unwrap().passed);
    assert!(!report.check("r2-m1/logHash").unwrap().passed);
    assert!(report.check("r1-m1/logHash").unwrap().passed);
}

#[tokio::test]
async fn schedule_growing_after_signing_fails_match_count() {
    let dir = tempfile::tempdir().unwrap();
    tournament_dir(dir.path()).await;
    sign_tournament_dir(dir.path(), &key(), "unit-test").unwrap();
    assert!(verify_tournament_dir(dir.path()).check("matchCount").unwrap().passed);

    let path = dir.path().join(TOURNAMENT_MANIFEST_FILE);
    let mut manifest: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let matches = manifest["matches"].as_array_mut().unwrap();
    let mut extra = matches[0].clone();
    extra["matchKey"] = "r3-m1".into();
    matches.push(extra);
    std::fs::write(&path, serde_json::to_string(&manifest).unwrap()).unwrap();

    let report = verify_tournament_dir(dir.path());
    assert_eq!(report.status, VerifyStatus::Fail);
    assert!(report.check("signature").unwrap().passed);
    let count = report.check("matchCount").unwrap();
    assert!(!count.passed);
    assert_eq!(count.detail.as_deref(), Some("expected 2, found 3"));
}

#[tokio::test]
async fn missing_tournament_manifest_fails_match_count() {
    let dir = tempfile::tempdir().unwrap();
    tournament_dir(dir.path()).await;
    sign_tournament_dir(dir.path(), &key(), "unit-test").unwrap();
    std::fs::remove_file(dir.path().join(TOURNAMENT_MANIFEST_FILE)).unwrap();

    let report = verify_tournament_dir(dir.path());
    assert!(!report.check("matchCount").unwrap().passed);
}
