//! Contact-list reconciliation
//!
//! A kind 3 event is a full snapshot of its author's contacts. [`GraphReconciler`] diffs the
//! snapshot against the stored edges and writes the difference as a single
//! [`ContactDelta`], so every event is persisted in one storage call or not at all.

use std::collections::BTreeSet;
use std::sync::Arc;

use contactfeed_storage_traits::{ContactDelta, GraphStorage};
use nostr::{Event, PublicKey, Timestamp};

use crate::error::ReconcileError;

/// How a new contact list is merged with the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactListPolicy {
    /// The newest list replaces the stored edges wholesale
    #[default]
    Replace,
    /// Contacts are only ever added
    AddOnly,
}

/// What happened to the stored graph for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The author was not known before
    Created {
        /// Edges created
        contacts: usize,
    },
    /// Edges changed
    Updated {
        /// Edges added
        added: usize,
        /// Edges removed
        removed: usize,
    },
    /// The stored edges already matched
    Unchanged,
    /// The event is older than the stored list and was ignored
    Stale,
}

/// Applies contact lists to a [`GraphStorage`]
#[derive(Debug)]
pub struct GraphReconciler<S> {
    storage: Arc<S>,
    policy: ContactListPolicy,
}

impl<S> Clone for GraphReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            policy: self.policy,
        }
    }
}

impl<S> GraphReconciler<S>
where
    S: GraphStorage,
{
    /// Creates a reconciler over `storage`
    pub fn new(storage: Arc<S>, policy: ContactListPolicy) -> Self {
        Self { storage, policy }
    }

    /// Configured policy
    pub fn policy(&self) -> ContactListPolicy {
        self.policy
    }

    /// Reconciles a contact-list event using its `p` tags
    pub fn reconcile(&self, event: &Event) -> Result<ReconcileOutcome, ReconcileError> {
        let contacts: BTreeSet<PublicKey> = event.tags.public_keys().copied().collect();
        self.reconcile_contacts(event.pubkey, contacts, event.created_at)
    }

    /// Reconciles `owner`'s full contact set as of `created_at`
    pub fn reconcile_contacts(
        &self,
        owner: PublicKey,
        contacts: BTreeSet<PublicKey>,
        created_at: Timestamp,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let storage_err = |source| ReconcileError::Storage { owner, source };

        let existing = self.storage.find_user(&owner).map_err(storage_err)?;

        if let Some(updated_at) = existing.as_ref().and_then(|user| user.contacts_updated_at)
            && created_at < updated_at
        {
            tracing::debug!(
                owner = %owner,
                created_at = %created_at,
                stored = %updated_at,
                "Ignoring stale contact list"
            );
            return Ok(ReconcileOutcome::Stale);
        }

        let current = existing
            .as_ref()
            .map(|user| user.contacts.clone())
            .unwrap_or_default();

        let to_add: BTreeSet<PublicKey> = contacts.difference(&current).copied().collect();
        let to_remove: BTreeSet<PublicKey> = match self.policy {
            ContactListPolicy::Replace => current.difference(&contacts).copied().collect(),
            ContactListPolicy::AddOnly => BTreeSet::new(),
        };

        let outcome = match (&existing, to_add.len(), to_remove.len()) {
            (None, added, _) => ReconcileOutcome::Created { contacts: added },
            (Some(_), 0, 0) => ReconcileOutcome::Unchanged,
            (Some(_), added, removed) => ReconcileOutcome::Updated { added, removed },
        };

        let delta = ContactDelta::new(owner)
            .with_added(to_add)
            .with_removed(to_remove)
            .with_updated_at(created_at);
        self.storage.apply_contact_delta(&delta).map_err(storage_err)?;

        tracing::debug!(owner = %owner, outcome = ?outcome, "Reconciled contact list");

        Ok(outcome)
    }
}
