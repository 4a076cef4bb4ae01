//! Types for the social graph

use std::collections::BTreeSet;

use nostr::{PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::GraphStorageError;

/// A user of the social graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Public key, unique across the graph
    pub public_key: PublicKey,
    /// Public keys this user has contact edges to
    pub contacts: BTreeSet<PublicKey>,
    /// `created_at` of the contact-list event the edges were last replaced from
    ///
    /// `None` for users that were only ever referenced as a contact.
    pub contacts_updated_at: Option<Timestamp>,
}

impl UserRecord {
    /// Create a user with no contacts
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            contacts: BTreeSet::new(),
            contacts_updated_at: None,
        }
    }

    /// Whether this user has a contact edge to `public_key`
    pub fn has_contact(&self, public_key: &PublicKey) -> bool {
        self.contacts.contains(public_key)
    }
}

/// Change set for one owner's contact edges, committed atomically
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDelta {
    /// Owner of the edges
    pub owner: PublicKey,
    /// Contacts to add an edge to
    pub to_add: BTreeSet<PublicKey>,
    /// Contacts to remove the edge to
    pub to_remove: BTreeSet<PublicKey>,
    /// Timestamp of the contact-list event this delta was derived from
    pub updated_at: Option<Timestamp>,
}

impl ContactDelta {
    /// Create an empty delta for `owner`
    pub fn new(owner: PublicKey) -> Self {
        Self {
            owner,
            to_add: BTreeSet::new(),
            to_remove: BTreeSet::new(),
            updated_at: None,
        }
    }

    /// Set the contacts to add
    pub fn with_added<I>(mut self, contacts: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        self.to_add.extend(contacts);
        self
    }

    /// Set the contacts to remove
    pub fn with_removed<I>(mut self, contacts: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        self.to_remove.extend(contacts);
        self
    }

    /// Set the source event timestamp
    pub fn with_updated_at(mut self, updated_at: Timestamp) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Whether the delta changes no edge
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Check that no key is both added and removed
    pub fn validate(&self) -> Result<(), GraphStorageError> {
        if let Some(key) = self.to_add.intersection(&self.to_remove).next() {
            return Err(GraphStorageError::InvalidParameters(format!(
                "contact {} is both added and removed",
                key.to_hex()
            )));
        }
        Ok(())
    }
}
