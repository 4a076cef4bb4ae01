//! Contactfeed Public Prelude
//!
//! The types needed to connect relays, run the contact-list and feed flows and analyze the
//! result. Storage backends and `nostr` types should be imported directly.
//!
//! ```rust
//! use contactfeed_core::prelude::*;
//!
//! let config = CoordinatorConfig::default().with_contact_list_policy(ContactListPolicy::Replace);
//! ```

// === Coordinator ===
/// Contactfeed error type
pub use crate::Error;
/// Multi-relay subscription coordinator
pub use crate::coordinator::{ContactSync, Coordinator, FeedFetch, SubscriptionReport};
/// Configuration
pub use crate::config::{CoordinatorConfig, DEFAULT_RELAYS};
/// Drain results
pub use crate::drain::DrainOutcome;

// === Relays ===
/// Relay connection seam and the nostr-sdk implementation
pub use crate::relay::{
    ConnectionState, FanOutReport, NostrRelayConnection, RelayConnection, RelayUpdate,
};

// === Subscriptions ===
/// Subscription descriptions
pub use crate::subscription::{
    CONTACT_LISTS, MESSAGES, SubscriptionFilter, SubscriptionKind, SubscriptionState,
};

// === Graph ===
/// Contact-list reconciliation
pub use crate::reconcile::{ContactListPolicy, GraphReconciler, ReconcileOutcome};

// === Feed ===
/// Feed types
pub use crate::feed::{Feed, FeedEntry};
/// Text-completion seam and analyzer
pub use crate::llm::{
    Classification, FeedAnalyzer, OpenAiCompletion, OpenAiConfig, TextCompletion, TopicMatches,
};
