//! Key material. The private key file holds the hex-encoded 32-byte Ed25519
//! seed; public identities travel as `ed25519:<hex>`.

use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use super::ReceiptError;

pub const PUBLIC_KEY_PREFIX: &str = "ed25519:";

pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

pub fn public_key_ref(key: &VerifyingKey) -> String {
    format!("{PUBLIC_KEY_PREFIX}{}", hex::encode(key.to_bytes()))
}

fn decode_32(text: &str, what: &str) -> Result<[u8; 32], String> {
    let raw = hex::decode(text.trim()).map_err(|e| format!("{what} is not hex: {e}"))?;
    raw.try_into()
        .map_err(|v: Vec<u8>| format!("{what} must be 32 bytes, got {}", v.len()))
}

pub fn parse_signing_key(text: &str) -> Result<SigningKey, ReceiptError> {
    let seed = decode_32(text, "private key").map_err(ReceiptError::InvalidKey)?;
    Ok(SigningKey::from_bytes(&seed))
}

pub fn parse_public_key_ref(text: &str) -> Result<VerifyingKey, ReceiptError> {
    let hex_part = text
        .strip_prefix(PUBLIC_KEY_PREFIX)
        .ok_or_else(|| ReceiptError::InvalidPublicKeyRef(format!("missing '{PUBLIC_KEY_PREFIX}' prefix")))?;
    let bytes = decode_32(hex_part, "public key").map_err(ReceiptError::InvalidPublicKeyRef)?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| ReceiptError::InvalidPublicKeyRef(e.to_string()))
}

pub fn load_signing_key(path: &Path) -> Result<SigningKey, ReceiptError> {
    let text = std::fs::read_to_string(path)?;
    parse_signing_key(&text)
}

/// Write `<path>` (private seed) and `<path>.pub` (public key ref). Returns
/// the public key ref. Refuses to overwrite an existing private key.
pub fn write_key_pair(path: &Path) -> Result<String, ReceiptError> {
    if path.exists() {
        return Err(ReceiptError::InvalidKey(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let key = generate_signing_key();
    std::fs::write(path, format!("{}\n", hex::encode(key.to_bytes())))?;
    let public = public_key_ref(&key.verifying_key());
    std::fs::write(public_key_path(path), format!("{public}\n"))?;
    Ok(public)
}

fn public_key_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pair_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/organizer.key");
        let public = write_key_pair(&path).unwrap();
        let key = load_signing_key(&path).unwrap();
        assert_eq!(public_key_ref(&key.verifying_key()), public);
        let on_disk = std::fs::read_to_string(dir.path().join("keys/organizer.key.pub")).unwrap();
        assert_eq!(on_disk.trim(), public);
        assert!(write_key_pair(&path).is_err());
    }

    #[test]
    fn rejects_bad_material() {
        assert!(parse_signing_key("nothex").is_err());
        assert!(parse_signing_key("abcd").is_err());
        assert!(parse_public_key_ref("rsa:00").is_err());
        assert!(parse_public_key_ref("ed25519:00").is_err());
    }
}
