//! Contactfeed storage - storage provider traits and types for the locally persisted social graph.
//!
//! The graph is a set of [`UserRecord`]s keyed by public key, each owning a set of directed
//! contact edges. Backends implement [`GraphStorage`]; the reconciler in `contactfeed-core`
//! computes a [`ContactDelta`] per contact-list event and commits it through
//! [`GraphStorage::apply_contact_delta`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::collections::BTreeSet;

use nostr::PublicKey;

pub mod error;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod types;

pub use error::GraphStorageError;
pub use types::{ContactDelta, UserRecord};

/// Default maximum number of contact edges a single user may own.
///
/// A contact-list event is attacker-controlled input; every backend caps the edges per owner.
pub const DEFAULT_MAX_CONTACTS_PER_USER: usize = 10_000;

/// Backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Memory
    Memory,
    /// SQLite
    SQLite,
}

impl Backend {
    /// Check if it's a persistent backend
    ///
    /// All values different from [`Backend::Memory`] are considered persistent
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// Storage provider for the social graph.
///
/// Implementations must uphold two invariants:
/// - a public key maps to at most one [`UserRecord`]
/// - every contact edge references an existing user
///
/// [`apply_contact_delta`](GraphStorage::apply_contact_delta) is the unit of persistence:
/// either the whole delta is committed or nothing changes.
pub trait GraphStorage {
    /// Returns the backend type.
    fn backend(&self) -> Backend;

    /// Find a user by public key, with its contact edges eagerly loaded.
    fn find_user(&self, public_key: &PublicKey) -> Result<Option<UserRecord>, GraphStorageError>;

    /// Insert a user if absent.
    ///
    /// Returns `true` if the user was created, `false` if it already existed.
    fn add_user(&self, public_key: &PublicKey) -> Result<bool, GraphStorageError>;

    /// Public keys the given user has contact edges to.
    ///
    /// Returns an empty set for an unknown user.
    fn contacts_of(&self, public_key: &PublicKey)
    -> Result<BTreeSet<PublicKey>, GraphStorageError>;

    /// Atomically apply a contact delta.
    ///
    /// Creates the owner and every contact in [`ContactDelta::to_add`] if absent, adds the
    /// edges in `to_add`, removes the edges in `to_remove` and records
    /// [`ContactDelta::updated_at`] on the owner when present.
    ///
    /// # Errors
    ///
    /// Returns [`GraphStorageError::InvalidParameters`] if a key appears in both `to_add`
    /// and `to_remove` or if the owner would end up with more edges than the backend's
    /// limit ([`DEFAULT_MAX_CONTACTS_PER_USER`] unless configured), and
    /// [`GraphStorageError::Database`] if the commit fails. On error the stored graph is
    /// unchanged.
    fn apply_contact_delta(&self, delta: &ContactDelta) -> Result<(), GraphStorageError>;

    /// Number of stored users.
    fn user_count(&self) -> Result<usize, GraphStorageError>;
}
