//! Canonical JSON normalization and digest computation (RFC 8785-class).
//!
//! Every JSON artifact Hashmatch writes goes through [`canonical_json`]:
//! - UTF-16 code unit ordering for object keys (§3.2.3)
//! - Number normalization (integer-valued floats → integers; reject NaN/Infinity)
//! - Compact output, no insignificant whitespace
//!
//! Hashes are rendered as `sha256:<hex>`.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::error::{HashmatchError, Result};

/// Prefix carried by every rendered digest.
pub const HASH_PREFIX: &str = "sha256:";

/// Write `value` compactly with object keys in UTF-16 code unit order
/// (RFC 8785 §3.2.3). `serde_json::Map` keeps keys in UTF-8 byte order, which
/// differs for keys outside the BMP, so objects are emitted here rather than
/// rebuilt as a map.
fn write_sorted(value: &serde_json::Value, out: &mut String) -> Result<()> {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));
            out.push('{');
            for (i, (key, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_sorted(v, out)?;
            }
            out.push('}');
        }
        serde_json::Value::Array(arr) => {
            out.push('[');
            for (i, v) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_sorted(v, out)?;
            }
            out.push(']');
        }
        other => out.push_str(&serde_json::to_string(other)?),
    }
    Ok(())
}

/// Normalize numbers: integer-valued floats → integer repr; reject NaN/Infinity.
fn normalize_value(value: &serde_json::Value) -> Result<serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (k, v) in map {
                normalized.insert(k.clone(), normalize_value(v)?);
            }
            Ok(serde_json::Value::Object(normalized))
        }
        serde_json::Value::Array(arr) => Ok(serde_json::Value::Array(
            arr.iter().map(normalize_value).collect::<Result<Vec<_>>>()?,
        )),
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return Ok(serde_json::Value::Number(n.clone()));
            }
            let Some(f) = n.as_f64() else {
                return Ok(serde_json::Value::Number(n.clone()));
            };
            if !f.is_finite() {
                return Err(HashmatchError::NonCanonical(
                    "NaN/Infinity not permitted in canonical JSON".to_string(),
                ));
            }
            if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(serde_json::Value::Number(serde_json::Number::from(f as i64)))
            } else {
                Ok(serde_json::Value::Number(n.clone()))
            }
        }
        other => Ok(other.clone()),
    }
}

/// Convert a JSON value to canonical form: normalize numbers → sort keys → compact JSON.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    let normalized = normalize_value(value)?;
    let mut out = String::new();
    write_sorted(&normalized, &mut out)?;
    Ok(out)
}

/// Serialize any value through [`canonical_json`].
pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    canonical_json(&serde_json::to_value(value)?)
}

/// Canonical JSON plus a trailing newline, the on-disk form of JSON artifacts.
pub fn to_canonical_file_contents<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut out = to_canonical_string(value)?;
    out.push('\n');
    Ok(out)
}

/// SHA-256 of raw bytes, rendered as `sha256:<hex>`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{HASH_PREFIX}{}", hex::encode(Sha256::digest(bytes)))
}

/// SHA-256 of the canonical JSON form of `value`.
pub fn compute_digest<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(hash_bytes(to_canonical_string(value)?.as_bytes()))
}

/// Read a file and hash its exact bytes.
pub fn hash_file(path: &std::path::Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json_integer_float() {
        let input = serde_json::json!({ "value": 1.0 });
        assert_eq!(canonical_json(&input).unwrap(), r#"{"value":1}"#);
    }

    #[test]
    fn test_canonical_json_fractional_float() {
        let input = serde_json::json!({ "value": 1.5 });
        assert_eq!(canonical_json(&input).unwrap(), r#"{"value":1.5}"#);
    }

    #[test]
    fn test_canonical_json_field_order_invariant() {
        let a = serde_json::json!({ "b": 2, "a": 1, "c": { "z": 1, "y": 2 } });
        let b = serde_json::json!({ "c": { "y": 2, "z": 1 }, "a": 1, "b": 2 });
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(
            canonical_json(&a).unwrap(),
            r#"{"a":1,"b":2,"c":{"y":2,"z":1}}"#
        );
    }

    #[test]
    fn test_canonical_json_array_order_preserved() {
        let a = serde_json::json!({ "array": [3, 1, 2] });
        assert_eq!(canonical_json(&a).unwrap(), r#"{"array":[3,1,2]}"#);
    }

    #[test]
    fn test_canonical_json_uppercase_sorts_before_lowercase() {
        let input = serde_json::json!({ "b": 1, "B": 2, "a": 3 });
        assert_eq!(canonical_json(&input).unwrap(), r#"{"B":2,"a":3,"b":1}"#);
    }

    #[test]
    fn test_canonical_json_astral_keys_sort_by_utf16_units() {
        // U+1F600 encodes as a surrogate pair (0xD83D..), which sorts before U+E000.
        let input = serde_json::json!({ "\u{E000}": 2, "\u{1F600}": 1, "z": [{ "\u{E000}": 0, "\u{1F600}": 0 }] });
        assert_eq!(
            canonical_json(&input).unwrap(),
            "{\"z\":[{\"\u{1F600}\":0,\"\u{E000}\":0}],\"\u{1F600}\":1,\"\u{E000}\":2}"
        );
    }

    #[test]
    fn test_hash_bytes_format() {
        let digest = hash_bytes(b"hello");
        assert!(digest.starts_with(HASH_PREFIX));
        let hex_part = &digest[HASH_PREFIX.len()..];
        assert_eq!(hex_part.len(), 64);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_compute_digest_single_field_delta() {
        let a = compute_digest(&serde_json::json!({ "matchId": "m1" })).unwrap();
        let b = compute_digest(&serde_json::json!({ "matchId": "m2" })).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_contents_end_with_newline() {
        let out = to_canonical_file_contents(&serde_json::json!({ "x": 1 })).unwrap();
        assert_eq!(out, "{\"x\":1}\n");
    }
}
