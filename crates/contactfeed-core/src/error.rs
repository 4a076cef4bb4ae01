//! Contactfeed errors

use std::time::Duration;

use contactfeed_storage_traits::GraphStorageError;
use nostr::{PublicKey, RelayUrl};

/// A relay could not be brought into the pool
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The client refused the relay address
    #[error("failed to add relay {relay}: {reason}")]
    Add {
        /// Relay address
        relay: RelayUrl,
        /// Client error message
        reason: String,
    },
    /// The websocket never reached the connected state
    #[error("timed out after {timeout:?} connecting to {relay}")]
    Timeout {
        /// Relay address
        relay: RelayUrl,
        /// Configured connect timeout
        timeout: Duration,
    },
    /// The same address was supplied twice
    #[error("relay {relay} is already part of the pool")]
    Duplicate {
        /// Relay address
        relay: RelayUrl,
    },
}

impl ConnectionError {
    /// Address of the relay that failed
    pub fn relay(&self) -> &RelayUrl {
        match self {
            Self::Add { relay, .. } | Self::Timeout { relay, .. } | Self::Duplicate { relay } => {
                relay
            }
        }
    }
}

/// A subscription could not be opened or closed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// A live subscription already uses this name
    #[error("subscription {name} is already open")]
    AlreadyOpen {
        /// Subscription name
        name: String,
    },
    /// No subscription was ever opened under this name
    #[error("subscription {name} was never opened")]
    NotOpen {
        /// Subscription name
        name: String,
    },
    /// A relay refused the request
    #[error("relay {relay} rejected subscription {name}: {reason}")]
    Rejected {
        /// Relay address
        relay: RelayUrl,
        /// Subscription name
        name: String,
        /// Relay or client message
        reason: String,
    },
    /// The relay connection is not usable
    #[error("relay {relay} is not connected")]
    NotConnected {
        /// Relay address
        relay: RelayUrl,
    },
    /// The coordinator has been shut down
    #[error("coordinator is shut down")]
    ShutDown,
}

/// Persisting a contact list failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// Storage rejected the delta; nothing was written for this owner
    #[error("failed to apply contact list of {owner}: {source}")]
    Storage {
        /// Author of the contact list
        owner: PublicKey,
        /// Storage error
        #[source]
        source: GraphStorageError,
    },
}

/// The text-completion service failed
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Transport failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// Non-success status from the service
    #[error("completion service returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
    /// The response carried no choices
    #[error("completion service returned no output")]
    EmptyResponse,
    /// Classification output was neither "yes" nor "no"
    #[error("unexpected classification output: {0:?}")]
    UnexpectedOutput(String),
}

/// Contactfeed error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// Subscription error
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    /// Reconcile error
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    /// Storage error
    #[error(transparent)]
    Storage(#[from] GraphStorageError),
    /// Completion error
    #[error(transparent)]
    Completion(#[from] CompletionError),
    /// The user has no stored contact list
    #[error("no contact list found for user {0}")]
    NoContactList(PublicKey),
}
