//! Relay connections and the pool that fans requests out to them
//!
//! Every connection forwards what its relay pushes as [`RelayUpdate`]s onto one shared
//! channel. The coordinator owns the receiving end and is the only consumer.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use nostr::{Event, RelayUrl};
use tokio::sync::mpsc;

use crate::error::{ConnectionError, SubscriptionError};
use crate::subscription::SubscriptionFilter;

mod client;
mod pool;

pub use self::client::NostrRelayConnection;
pub use self::pool::{FanOutReport, RelayPool};

/// Connectivity of one relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Usable
    Connected,
    /// The last connect attempt failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Something a relay pushed for a named subscription
#[derive(Debug, Clone)]
pub enum RelayUpdate {
    /// Stored or live events
    Events {
        /// Delivering relay
        relay: RelayUrl,
        /// Subscription name
        subscription: String,
        /// Events in relay order
        events: Vec<Event>,
    },
    /// The relay has no more stored events for the subscription
    EndOfStoredEvents {
        /// Delivering relay
        relay: RelayUrl,
        /// Subscription name
        subscription: String,
    },
}

impl RelayUpdate {
    /// Delivering relay
    pub fn relay(&self) -> &RelayUrl {
        match self {
            Self::Events { relay, .. } | Self::EndOfStoredEvents { relay, .. } => relay,
        }
    }

    /// Subscription the update belongs to
    pub fn subscription(&self) -> &str {
        match self {
            Self::Events { subscription, .. } | Self::EndOfStoredEvents { subscription, .. } => {
                subscription
            }
        }
    }
}

/// One long-lived session to one relay
#[async_trait]
pub trait RelayConnection: Send + Sync {
    /// Relay address
    fn url(&self) -> &RelayUrl;

    /// Current connectivity
    fn state(&self) -> ConnectionState;

    /// Names of the subscriptions currently open on this relay
    fn open_subscriptions(&self) -> BTreeSet<String>;

    /// Connects and starts forwarding updates to `updates`.
    ///
    /// Fails if the relay is not connected within `timeout`.
    async fn connect(
        &self,
        updates: mpsc::Sender<RelayUpdate>,
        timeout: Duration,
    ) -> Result<(), ConnectionError>;

    /// Opens subscription `name` with `filter`
    async fn open_subscription(
        &self,
        name: &str,
        filter: &SubscriptionFilter,
    ) -> Result<(), SubscriptionError>;

    /// Closes subscription `name`
    async fn close_subscription(&self, name: &str) -> Result<(), SubscriptionError>;

    /// Drops the session and stops forwarding
    async fn disconnect(&self);
}
