//! Content-addressed cache keys for embedding results.
//!
//! The key is a SHA-256 digest over the adapter identity and the input
//! bytes, rendered as lowercase hex. Because the identity participates in
//! the digest, switching models invalidates cached vectors without any
//! explicit eviction. The digest is stable across processes and languages
//! for equal byte inputs, which is what makes a shared store useful.

use sha2::{Digest, Sha256};

/// Compute the cache key for one `(adapter identity, input)` pair.
///
/// Pure and deterministic; no normalization is applied to `text` — callers
/// own whitespace and casing. The result is 64 lowercase hex chars and is
/// used as the store key verbatim, with no namespace prefix.
pub fn fingerprint(name: &str, version: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(version.as_bytes());
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
