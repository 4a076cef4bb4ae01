//! Per-subscription event deduplication

use std::collections::HashSet;

use nostr::EventId;
use parking_lot::Mutex;

/// Event ids already accepted by one subscription generation.
///
/// Ids are advisory keys: two relays may hand out different payloads under the same id, and
/// only the first one wins.
#[derive(Debug, Default)]
pub struct EventDedup {
    seen: Mutex<HashSet<EventId>>,
}

impl EventDedup {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` and returns `true` the first time it is seen, `false` afterwards.
    pub fn try_accept(&self, id: &EventId) -> bool {
        self.seen.lock().insert(*id)
    }

    /// Number of accepted ids
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Whether nothing has been accepted yet
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}
