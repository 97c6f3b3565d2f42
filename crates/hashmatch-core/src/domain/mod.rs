//! Domain primitives shared by every Hashmatch module.
//!
//! - `AgentId`: stable agent slot identifier
//! - `digest`: canonical JSON and `sha256:` hashing
//! - `HashmatchError`: the crate error type

pub mod digest;
pub mod error;
pub mod ids;

pub use digest::{
    canonical_json, compute_digest, hash_bytes, hash_file, to_canonical_file_contents,
    to_canonical_string, HASH_PREFIX,
};
pub use error::{HashmatchError, Result};
pub use ids::AgentId;
