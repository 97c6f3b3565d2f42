//! Ed25519 receipts over match and tournament artifacts.
//!
//! A receipt signs the canonical JSON of its payload. Verification checks
//! two things independently: the signature over the payload as recorded,
//! and the freshness of every hash in the payload against the files on
//! disk. A tampered log fails the second check while the first still holds.

pub mod keys;
pub mod sign;
pub mod verify;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use serde::{Deserialize, Serialize};

use crate::domain::{to_canonical_string, HashmatchError};

pub use keys::{
    generate_signing_key, load_signing_key, parse_public_key_ref, parse_signing_key,
    public_key_ref, write_key_pair, PUBLIC_KEY_PREFIX,
};
pub use sign::{sign_match_dir, sign_tournament_dir, truth_bundle_hash};
pub use verify::{verify_match_dir, verify_tournament_dir, VerificationCheck, VerificationReport, VerifyStatus};

/// Issuer recorded when none is given.
pub const DEFAULT_ISSUER: &str = "hashmatch";

#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    #[error("invalid public key reference: {0}")]
    InvalidPublicKeyRef(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("signature does not match payload")]
    SignatureMismatch,

    #[error("key file error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ReceiptError> for HashmatchError {
    fn from(err: ReceiptError) -> Self {
        HashmatchError::Receipt(err.to_string())
    }
}

/// `receipt.json` / `tournament_receipt.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt<T> {
    pub payload: T,
    /// Hex-encoded 64-byte Ed25519 signature.
    pub signature: String,
    pub issuer: String,
    /// `ed25519:<hex>` of the verifying key.
    pub public_key_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReceiptPayload {
    pub match_id: String,
    pub log_hash: String,
    pub manifest_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentReceiptMatch {
    pub match_key: String,
    pub match_id: String,
    pub log_hash: String,
    pub manifest_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentReceiptPayload {
    pub tournament_id: String,
    pub match_count: usize,
    pub truth_bundle_hash: String,
    pub matches: Vec<TournamentReceiptMatch>,
}

impl<T: Serialize> Receipt<T> {
    /// Sign the canonical JSON of `payload`.
    pub fn sign(payload: T, key: &SigningKey, issuer: &str) -> crate::domain::Result<Self> {
        let bytes = to_canonical_string(&payload)?;
        let signature: Signature = key.sign(bytes.as_bytes());
        Ok(Self {
            payload,
            signature: hex::encode(signature.to_bytes()),
            issuer: issuer.to_string(),
            public_key_ref: public_key_ref(&key.verifying_key()),
        })
    }

    /// Check the signature against the declared public key. Says nothing
    /// about whether the payload hashes still match any files.
    pub fn verify_signature(&self) -> crate::domain::Result<()> {
        let key = parse_public_key_ref(&self.public_key_ref)?;
        let raw = hex::decode(self.signature.trim())
            .map_err(|e| ReceiptError::InvalidSignature(e.to_string()))?;
        let raw: [u8; 64] = raw
            .try_into()
            .map_err(|v: Vec<u8>| ReceiptError::InvalidSignature(format!("expected 64 bytes, got {}", v.len())))?;
        let signature = Signature::from_bytes(&raw);
        let bytes = to_canonical_string(&self.payload)?;
        key.verify(bytes.as_bytes(), &signature)
            .map_err(|_| ReceiptError::SignatureMismatch)?;
        Ok(())
    }
}
