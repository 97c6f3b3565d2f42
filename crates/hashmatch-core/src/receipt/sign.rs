use std::path::Path;

use ed25519_dalek::SigningKey;
use tracing::debug;

use super::{MatchReceiptPayload, Receipt, TournamentReceiptMatch, TournamentReceiptPayload};
use crate::artifacts::{
    read_json, write_json, BroadcastClass, BroadcastManifest, BROADCAST_MANIFEST_FILE, MATCH_LOG_FILE,
    MATCH_MANIFEST_FILE, RECEIPT_FILE, TOURNAMENT_MANIFEST_FILE, TOURNAMENT_RECEIPT_FILE,
};
use crate::domain::{hash_bytes, hash_file, HashmatchError, Result};
use crate::metrics::METRICS;
use crate::obs;
use crate::provenance::MatchManifest;
use crate::tournament::{TournamentManifest, MATCHES_DIR};

fn require(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(HashmatchError::Receipt(format!("missing {}", path.display())))
    }
}

/// Hash the match log and manifest as they are on disk.
pub(crate) fn match_payload(dir: &Path) -> Result<MatchReceiptPayload> {
    let log = dir.join(MATCH_LOG_FILE);
    let manifest_path = dir.join(MATCH_MANIFEST_FILE);
    require(&log)?;
    require(&manifest_path)?;
    let manifest: MatchManifest = read_json(&manifest_path)?;
    Ok(MatchReceiptPayload {
        match_id: manifest.match_id,
        log_hash: hash_file(&log)?,
        manifest_hash: hash_file(&manifest_path)?,
    })
}

/// Sign one match directory, writing `receipt.json`.
pub fn sign_match_dir(dir: &Path, key: &SigningKey, issuer: &str) -> Result<Receipt<MatchReceiptPayload>> {
    let payload = match_payload(dir)?;
    let receipt = Receipt::sign(payload, key, issuer)?;
    let path = dir.join(RECEIPT_FILE);
    write_json(&path, &receipt)?;
    METRICS.inc_receipts_signed();
    obs::emit_receipt_signed(&receipt.payload.match_id, &path.display().to_string());
    Ok(receipt)
}

/// Hash over every truth-class file in the broadcast manifest:
/// `sha256("<path>\0<sha256:hex>\n" ...)` in manifest order.
pub fn truth_bundle_hash(dir: &Path, manifest: &BroadcastManifest) -> Result<String> {
    let mut combined = String::new();
    for rel in manifest.truth_paths() {
        let hash = hash_file(&dir.join(rel))?;
        combined.push_str(rel);
        combined.push('\0');
        combined.push_str(&hash);
        combined.push('\n');
    }
    Ok(hash_bytes(combined.as_bytes()))
}

/// Sign every match, then the tournament, then list the receipts in the
/// broadcast manifest. Running it twice produces identical files.
pub fn sign_tournament_dir(
    dir: &Path,
    key: &SigningKey,
    issuer: &str,
) -> Result<Receipt<TournamentReceiptPayload>> {
    let manifest_path = dir.join(TOURNAMENT_MANIFEST_FILE);
    let broadcast_path = dir.join(BROADCAST_MANIFEST_FILE);
    require(&manifest_path)?;
    require(&broadcast_path)?;
    let manifest: TournamentManifest = read_json(&manifest_path)?;

    let mut matches = Vec::with_capacity(manifest.matches.len());
    let mut receipt_paths = Vec::with_capacity(manifest.matches.len() + 1);
    for scheduled in &manifest.matches {
        let match_dir = dir.join(MATCHES_DIR).join(&scheduled.match_key);
        let receipt = sign_match_dir(&match_dir, key, issuer)?;
        debug!(match_key = %scheduled.match_key, "match signed");
        receipt_paths.push(format!("{MATCHES_DIR}/{}/{RECEIPT_FILE}", scheduled.match_key));
        matches.push(TournamentReceiptMatch {
            match_key: scheduled.match_key.clone(),
            match_id: receipt.payload.match_id,
            log_hash: receipt.payload.log_hash,
            manifest_hash: receipt.payload.manifest_hash,
        });
    }

    let mut broadcast = BroadcastManifest::read(&broadcast_path)?;
    let payload = TournamentReceiptPayload {
        tournament_id: manifest.tournament_id.clone(),
        match_count: matches.len(),
        truth_bundle_hash: truth_bundle_hash(dir, &broadcast)?,
        matches,
    };
    let receipt = Receipt::sign(payload, key, issuer)?;
    let path = dir.join(TOURNAMENT_RECEIPT_FILE);
    write_json(&path, &receipt)?;

    receipt_paths.push(TOURNAMENT_RECEIPT_FILE.to_string());
    broadcast.add_paths(receipt_paths, Some(BroadcastClass::Telemetry));
    broadcast.write(&broadcast_path)?;

    METRICS.inc_receipts_signed();
    obs::emit_receipt_signed(&manifest.tournament_id, &path.display().to_string());
    Ok(receipt)
}
