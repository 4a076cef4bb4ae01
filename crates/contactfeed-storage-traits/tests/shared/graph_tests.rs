//! Graph storage test functions

use std::collections::BTreeSet;

use contactfeed_storage_traits::{ContactDelta, GraphStorage, GraphStorageError};
use nostr::Timestamp;

use super::keys;

/// Test that adding a user is insert-if-absent
pub fn test_add_and_find_user<S>(storage: S)
where
    S: GraphStorage,
{
    let [alice] = keys::<1>();

    assert!(storage.find_user(&alice).unwrap().is_none());
    assert!(storage.add_user(&alice).unwrap());
    assert!(!storage.add_user(&alice).unwrap());

    let found = storage.find_user(&alice).unwrap().unwrap();
    assert_eq!(found.public_key, alice);
    assert!(found.contacts.is_empty());
    assert_eq!(found.contacts_updated_at, None);
    assert_eq!(storage.user_count().unwrap(), 1);
}

/// Test that a delta for an unknown owner creates the owner and every contact
pub fn test_delta_creates_users<S>(storage: S)
where
    S: GraphStorage,
{
    let [alice, bob, carol] = keys::<3>();

    let delta = ContactDelta::new(alice)
        .with_added([bob, carol])
        .with_updated_at(Timestamp::from(100));
    storage.apply_contact_delta(&delta).unwrap();

    assert_eq!(storage.user_count().unwrap(), 3);
    let found = storage.find_user(&alice).unwrap().unwrap();
    assert_eq!(found.contacts, BTreeSet::from([bob, carol]));
    assert_eq!(found.contacts_updated_at, Some(Timestamp::from(100)));

    // Contacts exist as users without edges of their own
    let bob_record = storage.find_user(&bob).unwrap().unwrap();
    assert!(bob_record.contacts.is_empty());
    assert_eq!(storage.contacts_of(&alice).unwrap(), BTreeSet::from([bob, carol]));
}

/// Test adding and removing edges in a single delta
pub fn test_delta_adds_and_removes<S>(storage: S)
where
    S: GraphStorage,
{
    let [alice, bob, carol, dave] = keys::<4>();

    storage
        .apply_contact_delta(&ContactDelta::new(alice).with_added([bob, dave]))
        .unwrap();
    storage
        .apply_contact_delta(
            &ContactDelta::new(alice)
                .with_added([carol])
                .with_removed([dave])
                .with_updated_at(Timestamp::from(5)),
        )
        .unwrap();

    assert_eq!(storage.contacts_of(&alice).unwrap(), BTreeSet::from([bob, carol]));
    // Removing an edge never deletes the user
    assert!(storage.find_user(&dave).unwrap().is_some());
    assert_eq!(storage.user_count().unwrap(), 4);
}

/// Test that removing every edge leaves the owner with no contacts
pub fn test_delta_clears_contacts<S>(storage: S)
where
    S: GraphStorage,
{
    let [alice, bob, carol] = keys::<3>();

    storage
        .apply_contact_delta(&ContactDelta::new(alice).with_added([bob, carol]))
        .unwrap();
    storage
        .apply_contact_delta(
            &ContactDelta::new(alice)
                .with_removed([bob, carol])
                .with_updated_at(Timestamp::from(9)),
        )
        .unwrap();

    let found = storage.find_user(&alice).unwrap().unwrap();
    assert!(found.contacts.is_empty());
    assert_eq!(found.contacts_updated_at, Some(Timestamp::from(9)));
}

/// Test that an invalid delta is rejected and leaves the graph unchanged
pub fn test_invalid_delta_is_atomic<S>(storage: S)
where
    S: GraphStorage,
{
    let [alice, bob, carol] = keys::<3>();

    storage
        .apply_contact_delta(&ContactDelta::new(alice).with_added([bob]))
        .unwrap();

    let bad = ContactDelta::new(alice)
        .with_added([carol, bob])
        .with_removed([bob]);
    let result = storage.apply_contact_delta(&bad);
    assert!(matches!(result, Err(GraphStorageError::InvalidParameters(_))));

    assert_eq!(storage.contacts_of(&alice).unwrap(), BTreeSet::from([bob]));
    assert!(storage.find_user(&carol).unwrap().is_none());
}

/// Test that duplicate edges cannot be created
pub fn test_edges_are_unique<S>(storage: S)
where
    S: GraphStorage,
{
    let [alice, bob] = keys::<2>();

    storage
        .apply_contact_delta(&ContactDelta::new(alice).with_added([bob]))
        .unwrap();
    storage
        .apply_contact_delta(&ContactDelta::new(alice).with_added([bob]))
        .unwrap();

    let found = storage.find_user(&alice).unwrap().unwrap();
    assert_eq!(found.contacts.len(), 1);
}

/// Test that unknown users have no contacts
pub fn test_contacts_of_unknown_user<S>(storage: S)
where
    S: GraphStorage,
{
    let [alice] = keys::<1>();
    assert!(storage.contacts_of(&alice).unwrap().is_empty());
    assert_eq!(storage.user_count().unwrap(), 0);
}

/// Test that edges are directed
pub fn test_edges_are_directed<S>(storage: S)
where
    S: GraphStorage,
{
    let [alice, bob] = keys::<2>();

    storage
        .apply_contact_delta(&ContactDelta::new(alice).with_added([bob]))
        .unwrap();

    assert!(storage.find_user(&alice).unwrap().unwrap().has_contact(&bob));
    assert!(!storage.find_user(&bob).unwrap().unwrap().has_contact(&alice));
}

/// Test that a backend limited to two contacts per user rejects a third edge atomically
pub fn test_contact_limit_is_enforced<S>(storage: S)
where
    S: GraphStorage,
{
    let [alice, bob, carol, dave] = keys::<4>();

    let oversized = ContactDelta::new(alice)
        .with_added([bob, carol, dave])
        .with_updated_at(Timestamp::from(1));
    let result = storage.apply_contact_delta(&oversized);
    assert!(matches!(result, Err(GraphStorageError::InvalidParameters(_))));
    assert!(storage.find_user(&alice).unwrap().is_none());
    assert!(storage.find_user(&dave).unwrap().is_none());

    storage
        .apply_contact_delta(&ContactDelta::new(alice).with_added([bob, carol]))
        .unwrap();

    let grows = ContactDelta::new(alice)
        .with_added([dave])
        .with_updated_at(Timestamp::from(2));
    assert!(matches!(
        storage.apply_contact_delta(&grows),
        Err(GraphStorageError::InvalidParameters(_))
    ));
    let found = storage.find_user(&alice).unwrap().unwrap();
    assert_eq!(found.contacts, BTreeSet::from([bob, carol]));
    assert_eq!(found.contacts_updated_at, None);

    // Swapping one contact for another stays within the limit
    storage
        .apply_contact_delta(&ContactDelta::new(alice).with_added([dave]).with_removed([bob]))
        .unwrap();
    assert_eq!(storage.contacts_of(&alice).unwrap(), BTreeSet::from([carol, dave]));
}
