//! Contactfeed core
//!
//! Builds a user's contact graph from nostr relays and fetches the recent notes of those
//! contacts.
//!
//! A [`Coordinator`] connects a pool of [`RelayConnection`]s, fans each named subscription out
//! to every relay, deduplicates what comes back and counts end-of-stored-events signals until
//! the subscription is drained. Contact lists (kind 3) are reconciled into a
//! [`GraphStorage`](contactfeed_storage_traits::GraphStorage); text notes (kind 1) accumulate
//! in a [`Feed`]. A [`FeedAnalyzer`] can then filter or summarize the feed through a
//! [`TextCompletion`] service.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use contactfeed_core::prelude::*;
//! use contactfeed_memory_storage::ContactfeedMemoryStorage;
//! use nostr::{PublicKey, RelayUrl};
//!
//! # async fn run(user: PublicKey) -> Result<(), contactfeed_core::Error> {
//! let relays: Vec<Arc<dyn RelayConnection>> = DEFAULT_RELAYS
//!     .iter()
//!     .filter_map(|url| RelayUrl::parse(url).ok())
//!     .map(|url| Arc::new(NostrRelayConnection::new(url)) as Arc<dyn RelayConnection>)
//!     .collect();
//! let storage = Arc::new(ContactfeedMemoryStorage::default());
//! let coordinator = Coordinator::connect(relays, storage, CoordinatorConfig::default()).await;
//!
//! coordinator
//!     .sync_contact_list(user, Duration::from_secs(7 * 24 * 3600))
//!     .await?;
//! let feed = coordinator.fetch_feed(user, Duration::from_secs(3600)).await?;
//! for entry in feed.entries() {
//!     println!("{entry}");
//! }
//! coordinator.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod drain;
pub mod error;
pub mod feed;
pub mod llm;
pub mod prelude;
pub mod reconcile;
pub mod relay;
pub mod subscription;

pub use self::config::{CoordinatorConfig, DEFAULT_RELAYS};
pub use self::coordinator::{ContactSync, Coordinator, FeedFetch, SubscriptionReport};
pub use self::drain::DrainOutcome;
pub use self::error::Error;
pub use self::feed::{Feed, FeedEntry};
pub use self::llm::{FeedAnalyzer, TextCompletion};
pub use self::relay::{NostrRelayConnection, RelayConnection};
