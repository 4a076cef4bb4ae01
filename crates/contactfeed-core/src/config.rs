//! Coordinator configuration

use std::time::Duration;

use crate::reconcile::ContactListPolicy;

/// Relays used when none are given
pub const DEFAULT_RELAYS: [&str; 3] = [
    "wss://relay.damus.io",
    "wss://relay.nostr.band",
    "wss://relayable.org",
];

/// Default time a relay gets to connect
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the shared update channel
pub const DEFAULT_UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// Coordinator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Time a relay gets to reach the connected state
    pub connect_timeout: Duration,
    /// How contact lists are merged into the graph
    pub contact_list_policy: ContactListPolicy,
    /// Capacity of the channel shared by all relay receive loops
    pub update_channel_capacity: usize,
    /// Upper bound for the high-level flows' drain wait; `None` waits forever
    pub drain_timeout: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            contact_list_policy: ContactListPolicy::default(),
            update_channel_capacity: DEFAULT_UPDATE_CHANNEL_CAPACITY,
            drain_timeout: None,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the contact-list policy
    pub fn with_contact_list_policy(mut self, policy: ContactListPolicy) -> Self {
        self.contact_list_policy = policy;
        self
    }

    /// Sets the update channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_update_channel_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "update_channel_capacity must be greater than 0");
        self.update_channel_capacity = capacity;
        self
    }

    /// Bounds the drain wait of the high-level flows
    pub fn with_drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }
}
