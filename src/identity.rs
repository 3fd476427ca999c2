//! Stable meeting identifiers.
//!
//! A meeting is identified by the triple (participant email, start timestamp,
//! title). The identifier is embedded verbatim in every emitted line-item
//! description and scanned for on later runs, so it must be a pure function
//! of the triple: same inputs, same output, forever.

use sha2::{Digest, Sha256};

/// Default truncation length in hex characters. Configurable via
/// `Config::identity_length`; changing it orphans previously emitted tags.
pub const DEFAULT_IDENTITY_LENGTH: usize = 12;

/// Derive the identifier for a meeting.
///
/// SHA-256 over `email|start|title`, hex-encoded, truncated to `length`
/// characters. Collision resistance at 12 hex chars (48 bits) is ample for
/// one operator's meeting history; the goal is stable uniqueness across
/// runs, not security.
pub fn meeting_identity(email: &str, start: &str, title: &str, length: usize) -> String {
    let digest = Sha256::digest(format!("{email}|{start}|{title}").as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(length);
    encoded
}
