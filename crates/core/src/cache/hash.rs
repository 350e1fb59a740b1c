//! Stable content hashing for listing ids.

use sha2::{Digest, Sha256};

/// Hex characters kept from the digest for listing ids.
pub const LISTING_HASH_LEN: usize = 16;

/// Deterministic identifier for a listing.
///
/// Hashes the portal id and the identity basis (external id, else URL), so
/// re-scraping the same ad always yields the same id.
pub fn listing_hash(portal_id: &str, basis: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(portal_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(basis.trim().as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(LISTING_HASH_LEN);
    digest
}
