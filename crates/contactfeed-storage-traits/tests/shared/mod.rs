//! Shared test functions for every graph storage backend

#![allow(dead_code)]

use nostr::{Keys, PublicKey};

pub mod graph_tests;

/// Generate `N` random public keys
pub fn keys<const N: usize>() -> [PublicKey; N] {
    std::array::from_fn(|_| Keys::generate().public_key())
}
