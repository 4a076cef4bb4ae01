//! Helpers for backend test suites

use nostr::{Keys, PublicKey};

/// Generate `count` random public keys
pub fn random_public_keys(count: usize) -> Vec<PublicKey> {
    (0..count).map(|_| Keys::generate().public_key()).collect()
}
