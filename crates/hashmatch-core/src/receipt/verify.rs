//! Read-only verification of signed directories.

use std::path::Path;

use serde::Serialize;

use super::sign::{match_payload, truth_bundle_hash};
use super::{MatchReceiptPayload, Receipt, TournamentReceiptPayload};
use crate::artifacts::{
    read_json, BroadcastManifest, BROADCAST_MANIFEST_FILE, RECEIPT_FILE, TOURNAMENT_MANIFEST_FILE,
    TOURNAMENT_RECEIPT_FILE,
};
use crate::obs;
use crate::tournament::{TournamentManifest, MATCHES_DIR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VerifyStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCheck {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub status: VerifyStatus,
    pub subject: String,
    pub checks: Vec<VerificationCheck>,
    pub errors: Vec<String>,
}

impl VerificationReport {
    fn new(subject: impl Into<String>) -> Self {
        Self {
            status: VerifyStatus::Pass,
            subject: subject.into(),
            checks: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == VerifyStatus::Pass
    }

    pub fn check(&self, name: &str) -> Option<&VerificationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    fn record(&mut self, name: impl Into<String>, outcome: std::result::Result<(), String>) {
        let name = name.into();
        match outcome {
            Ok(()) => self.checks.push(VerificationCheck {
                name,
                passed: true,
                detail: None,
            }),
            Err(detail) => {
                self.errors.push(format!("{name}: {detail}"));
                self.status = VerifyStatus::Fail;
                self.checks.push(VerificationCheck {
                    name,
                    passed: false,
                    detail: Some(detail),
                });
            }
        }
    }

    fn absorb(&mut self, prefix: &str, other: VerificationReport) {
        for check in other.checks {
            let outcome = if check.passed {
                Ok(())
            } else {
                Err(check.detail.unwrap_or_default())
            };
            self.record(format!("{prefix}/{}", check.name), outcome);
        }
    }

    fn finish(self) -> Self {
        obs::emit_receipt_verified(&self.subject, self.passed(), self.errors.len());
        self
    }
}

fn compare(expected: &str, actual: &str) -> std::result::Result<(), String> {
    if expected == actual {
        Ok(())
    } else {
        Err(format!("expected {expected}, found {actual}"))
    }
}

fn verify_match_inner(dir: &Path) -> VerificationReport {
    let receipt_path = dir.join(RECEIPT_FILE);
    let receipt: Receipt<MatchReceiptPayload> = match read_json(&receipt_path) {
        Ok(r) => r,
        Err(e) => {
            let mut report = VerificationReport::new(dir.display().to_string());
            report.record("receipt", Err(e.to_string()));
            return report;
        }
    };
    let mut report = VerificationReport::new(receipt.payload.match_id.clone());
    report.record("signature", receipt.verify_signature().map_err(|e| e.to_string()));

    match match_payload(dir) {
        Ok(actual) => {
            report.record("matchId", compare(&receipt.payload.match_id, &actual.match_id));
            report.record("logHash", compare(&receipt.payload.log_hash, &actual.log_hash));
            report.record(
                "manifestHash",
                compare(&receipt.payload.manifest_hash, &actual.manifest_hash),
            );
        }
        Err(e) => report.record("artifacts", Err(e.to_string())),
    }
    report
}

/// Verify `receipt.json` in a match directory. Writes nothing.
pub fn verify_match_dir(dir: &Path) -> VerificationReport {
    verify_match_inner(dir).finish()
}

/// Verify the tournament receipt, every match receipt it names, and the
/// truth bundle. Writes nothing.
pub fn verify_tournament_dir(dir: &Path) -> VerificationReport {
    let receipt_path = dir.join(TOURNAMENT_RECEIPT_FILE);
    let receipt: Receipt<TournamentReceiptPayload> = match read_json(&receipt_path) {
        Ok(r) => r,
        Err(e) => {
            let mut report = VerificationReport::new(dir.display().to_string());
            report.record("receipt", Err(e.to_string()));
            return report.finish();
        }
    };
    let payload = &receipt.payload;
    let mut report = VerificationReport::new(payload.tournament_id.clone());
    report.record("signature", receipt.verify_signature().map_err(|e| e.to_string()));
    // The receipt's count and entries must both agree with the schedule on disk.
    let scheduled = read_json::<TournamentManifest>(&dir.join(TOURNAMENT_MANIFEST_FILE))
        .map(|manifest| manifest.matches.len())
        .map_err(|e| e.to_string());
    report.record(
        "matchCount",
        scheduled.and_then(|count| {
            compare(&payload.match_count.to_string(), &count.to_string())?;
            compare(&payload.matches.len().to_string(), &count.to_string())
        }),
    );

    match BroadcastManifest::read(&dir.join(BROADCAST_MANIFEST_FILE)) {
        Ok(broadcast) => {
            let outcome = truth_bundle_hash(dir, &broadcast)
                .map_err(|e| e.to_string())
                .and_then(|actual| compare(&payload.truth_bundle_hash, &actual));
            report.record("truthBundleHash", outcome);
        }
        Err(e) => report.record("truthBundleHash", Err(e.to_string())),
    }

    for entry in &payload.matches {
        let match_dir = dir.join(MATCHES_DIR).join(&entry.match_key);
        let key = &entry.match_key;
        match match_payload(&match_dir) {
            Ok(actual) => {
                report.record(format!("{key}/logHash"), compare(&entry.log_hash, &actual.log_hash));
                report.record(
                    format!("{key}/manifestHash"),
                    compare(&entry.manifest_hash, &actual.manifest_hash),
                );
            }
            Err(e) => report.record(format!("{key}/artifacts"), Err(e.to_string())),
        }
        report.absorb(&format!("{key}/receipt"), verify_match_inner(&match_dir));
    }
    report.finish()
}
