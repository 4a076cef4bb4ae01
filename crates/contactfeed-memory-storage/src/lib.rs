//! Memory-based storage implementation for the contactfeed social graph.
//!
//! Implements [`GraphStorage`] over plain maps guarded by a single `RwLock`. The graph is
//! non-persistent and is dropped with the storage; it is meant for tests and one-shot runs.
//!
//! ## Memory Exhaustion Protection
//!
//! A contact-list event is attacker-controlled input. [`ValidationLimits`] caps the number of
//! edges a single user may own ([`DEFAULT_MAX_CONTACTS_PER_USER`] by default):
//!
//! ```rust
//! use contactfeed_memory_storage::{ContactfeedMemoryStorage, ValidationLimits};
//!
//! let limits = ValidationLimits::default().with_max_contacts_per_user(500);
//! let storage = ContactfeedMemoryStorage::with_limits(limits);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::collections::{BTreeSet, HashMap};
use std::fmt;

pub use contactfeed_storage_traits::DEFAULT_MAX_CONTACTS_PER_USER;
use contactfeed_storage_traits::UserRecord;
use nostr::PublicKey;
use parking_lot::RwLock;

mod graph;

/// Configurable validation limits for memory storage.
#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    /// Maximum number of contact edges per user
    pub max_contacts_per_user: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_contacts_per_user: DEFAULT_MAX_CONTACTS_PER_USER,
        }
    }
}

impl ValidationLimits {
    /// Creates a new `ValidationLimits` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of contact edges per user.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0.
    pub fn with_max_contacts_per_user(mut self, limit: usize) -> Self {
        assert!(limit > 0, "max_contacts_per_user must be greater than 0");
        self.max_contacts_per_user = limit;
        self
    }
}

/// Graph state behind the lock
#[derive(Debug, Default)]
struct Inner {
    users: HashMap<PublicKey, UserRecord>,
}

/// A memory-based implementation of [`GraphStorage`](contactfeed_storage_traits::GraphStorage).
///
/// Every trait method takes the lock once, so a delta is applied atomically with respect
/// to concurrent readers and writers.
pub struct ContactfeedMemoryStorage {
    inner: RwLock<Inner>,
    limits: ValidationLimits,
}

impl Default for ContactfeedMemoryStorage {
    fn default() -> Self {
        Self::with_limits(ValidationLimits::default())
    }
}

impl fmt::Debug for ContactfeedMemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactfeedMemoryStorage")
            .field("users", &self.inner.read().users.len())
            .field("limits", &self.limits)
            .finish()
    }
}

impl ContactfeedMemoryStorage {
    /// Creates a new empty storage with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty storage with the given limits.
    pub fn with_limits(limits: ValidationLimits) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            limits,
        }
    }

    /// Returns the configured validation limits.
    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// All stored public keys, sorted.
    pub fn public_keys(&self) -> BTreeSet<PublicKey> {
        self.inner.read().users.keys().copied().collect()
    }
}
