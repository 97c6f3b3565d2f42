//! Deterministic seed derivation.
//!
//! Seeds are the first 8 bytes of a SHA-256 over a labelled tuple, shifted
//! down to 53 bits so they survive a round trip through any JSON parser.

use sha2::{Digest, Sha256};

fn derive(label: &str) -> u64 {
    let digest = Sha256::digest(label.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head) >> 11
}

/// Seed for match `match_index` of round `round_index`.
pub fn derive_match_seed(tournament_seed: u64, round_index: u32, match_index: u32) -> u64 {
    derive(&format!(
        "hashmatch:match-seed:{tournament_seed}:{round_index}:{match_index}"
    ))
}

/// Seed handed to the agent in slot `slot` of a match.
pub fn derive_agent_seed(match_seed: u64, slot: usize) -> u64 {
    derive(&format!("hashmatch:agent-seed:{match_seed}:{slot}"))
}
