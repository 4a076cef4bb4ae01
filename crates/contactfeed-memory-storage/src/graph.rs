//! Memory-based implementation of the GraphStorage trait

use std::collections::BTreeSet;

use contactfeed_storage_traits::{
    Backend, ContactDelta, GraphStorage, GraphStorageError, UserRecord,
};
use nostr::PublicKey;

use crate::ContactfeedMemoryStorage;

impl GraphStorage for ContactfeedMemoryStorage {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    fn find_user(&self, public_key: &PublicKey) -> Result<Option<UserRecord>, GraphStorageError> {
        let inner = self.inner.read();
        Ok(inner.users.get(public_key).cloned())
    }

    fn add_user(&self, public_key: &PublicKey) -> Result<bool, GraphStorageError> {
        let mut inner = self.inner.write();
        if inner.users.contains_key(public_key) {
            return Ok(false);
        }
        inner
            .users
            .insert(*public_key, UserRecord::new(*public_key));
        Ok(true)
    }

    fn contacts_of(
        &self,
        public_key: &PublicKey,
    ) -> Result<BTreeSet<PublicKey>, GraphStorageError> {
        let inner = self.inner.read();
        Ok(inner
            .users
            .get(public_key)
            .map(|user| user.contacts.clone())
            .unwrap_or_default())
    }

    fn apply_contact_delta(&self, delta: &ContactDelta) -> Result<(), GraphStorageError> {
        delta.validate()?;

        let mut inner = self.inner.write();

        // Validate the resulting edge count before touching anything
        let current = inner
            .users
            .get(&delta.owner)
            .map(|user| &user.contacts);
        let resulting = match current {
            Some(contacts) => {
                let added = delta.to_add.difference(contacts).count();
                let removed = delta.to_remove.intersection(contacts).count();
                contacts.len() + added - removed
            }
            None => delta.to_add.len(),
        };
        if resulting > self.limits.max_contacts_per_user {
            return Err(GraphStorageError::InvalidParameters(format!(
                "Contact count exceeds maximum of {} (got {})",
                self.limits.max_contacts_per_user, resulting
            )));
        }

        for contact in &delta.to_add {
            inner
                .users
                .entry(*contact)
                .or_insert_with(|| UserRecord::new(*contact));
        }

        let owner = inner
            .users
            .entry(delta.owner)
            .or_insert_with(|| UserRecord::new(delta.owner));
        owner.contacts.extend(delta.to_add.iter().copied());
        owner
            .contacts
            .retain(|contact| !delta.to_remove.contains(contact));
        if let Some(updated_at) = delta.updated_at {
            owner.contacts_updated_at = Some(updated_at);
        }

        Ok(())
    }

    fn user_count(&self) -> Result<usize, GraphStorageError> {
        Ok(self.inner.read().users.len())
    }
}

#[cfg(test)]
mod tests {
    use contactfeed_storage_traits::test_utils::random_public_keys;

    use super::*;
    use crate::ValidationLimits;

    #[test]
    fn test_contact_limit_rejects_oversized_delta() {
        let storage =
            ContactfeedMemoryStorage::with_limits(ValidationLimits::new().with_max_contacts_per_user(2));
        let keys = random_public_keys(4);

        let delta = ContactDelta::new(keys[0]).with_added(keys[1..].iter().copied());
        let result = storage.apply_contact_delta(&delta);
        assert!(matches!(
            result,
            Err(GraphStorageError::InvalidParameters(_))
        ));
        assert_eq!(storage.user_count().unwrap(), 0);
    }

    #[test]
    fn test_contact_limit_counts_removals() {
        let storage =
            ContactfeedMemoryStorage::with_limits(ValidationLimits::new().with_max_contacts_per_user(2));
        let keys = random_public_keys(4);

        storage
            .apply_contact_delta(&ContactDelta::new(keys[0]).with_added([keys[1], keys[2]]))
            .unwrap();

        // Swapping one contact for another stays within the limit
        storage
            .apply_contact_delta(
                &ContactDelta::new(keys[0])
                    .with_added([keys[3]])
                    .with_removed([keys[1]]),
            )
            .unwrap();
        assert_eq!(
            storage.contacts_of(&keys[0]).unwrap(),
            BTreeSet::from([keys[2], keys[3]])
        );
    }

    #[test]
    fn test_backend_is_memory() {
        let storage = ContactfeedMemoryStorage::new();
        assert_eq!(storage.backend(), Backend::Memory);
        assert!(storage.public_keys().is_empty());
    }
}
