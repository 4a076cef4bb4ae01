//! Logical subscription types

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use nostr::{Filter, Kind, PublicKey, Timestamp};

/// Subscription name used for contact-list sync
pub const CONTACT_LISTS: &str = "contact-lists";
/// Subscription name used for feed fetches
pub const MESSAGES: &str = "messages";

/// What a subscription's accepted events feed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    /// Kind 3 events, reconciled into the graph
    ContactLists,
    /// Kind 1 events, appended to the feed
    Messages,
}

impl SubscriptionKind {
    /// Nostr event kind routed by this subscription
    pub fn event_kind(&self) -> Kind {
        match self {
            Self::ContactLists => Kind::ContactList,
            Self::Messages => Kind::TextNote,
        }
    }

    /// Conventional subscription name
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::ContactLists => CONTACT_LISTS,
            Self::Messages => MESSAGES,
        }
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

/// Lifecycle of one logical subscription.
///
/// States only move forward; the ordering of the variants is the lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriptionState {
    /// Never opened
    NotOpened,
    /// Open request is being fanned out
    Opening,
    /// Every relay answered the open request
    Open,
    /// Updates are arriving
    Draining,
    /// Every relay signaled end of stored events
    Drained,
    /// Closed; late deliveries are dropped
    Closed,
}

impl SubscriptionState {
    /// Whether updates for this subscription are still routed
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            Self::Opening | Self::Open | Self::Draining | Self::Drained
        )
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotOpened => "not-opened",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Draining => "draining",
            Self::Drained => "drained",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Immutable description of the wanted events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    kinds: BTreeSet<Kind>,
    since: Timestamp,
    authors: Option<BTreeSet<PublicKey>>,
}

impl SubscriptionFilter {
    /// Events of `kind` created at or after `since`
    pub fn new(kind: Kind, since: Timestamp) -> Self {
        Self {
            kinds: BTreeSet::from([kind]),
            since,
            authors: None,
        }
    }

    /// Events of `kind` created within `lookback` of now
    pub fn with_lookback(kind: Kind, lookback: Duration) -> Self {
        Self::new(kind, Timestamp::now() - lookback)
    }

    /// Also match `kind`
    pub fn kind(mut self, kind: Kind) -> Self {
        self.kinds.insert(kind);
        self
    }

    /// Restrict to the given authors
    pub fn authors<I>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        self.authors
            .get_or_insert_with(BTreeSet::new)
            .extend(authors);
        self
    }

    /// Requested kinds
    pub fn kinds(&self) -> &BTreeSet<Kind> {
        &self.kinds
    }

    /// Inclusive lower time bound
    pub fn since(&self) -> Timestamp {
        self.since
    }

    /// Author restriction, if any
    pub fn author_set(&self) -> Option<&BTreeSet<PublicKey>> {
        self.authors.as_ref()
    }

    /// Whether `kind` is requested
    pub fn matches_kind(&self, kind: &Kind) -> bool {
        self.kinds.contains(kind)
    }

    /// Wire filter sent to relays
    pub fn to_filter(&self) -> Filter {
        let filter = Filter::new()
            .kinds(self.kinds.iter().copied())
            .since(self.since);
        match &self.authors {
            Some(authors) => filter.authors(authors.iter().copied()),
            None => filter,
        }
    }
}
