//! Multi-relay subscription coordinator
//!
//! The [`Coordinator`] owns the relay pool and a single aggregation task. Relay receive loops
//! push [`RelayUpdate`]s onto one channel; the aggregation task routes each update to the live
//! session for its subscription name, where events are deduplicated and then either
//! reconciled into the graph or appended to the feed, and end-of-stored-events signals count
//! down the session's [`CompletionCounter`].
//!
//! Every open creates a new session with its own dedup set and counter. A name can only be
//! reopened after its previous session was closed.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use contactfeed_storage_traits::GraphStorage;
use nostr::{Event, Kind, PublicKey, RelayUrl};
use parking_lot::Mutex;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::CoordinatorConfig;
use crate::dedup::EventDedup;
use crate::drain::{CompletionCounter, CounterState, DrainOutcome};
use crate::error::{ConnectionError, Error, ReconcileError, SubscriptionError};
use crate::feed::{Feed, FeedEntry};
use crate::reconcile::{GraphReconciler, ReconcileOutcome};
use crate::relay::{FanOutReport, RelayConnection, RelayPool, RelayUpdate};
use crate::subscription::{
    CONTACT_LISTS, MESSAGES, SubscriptionFilter, SubscriptionKind, SubscriptionState,
};

/// Summary of one subscription generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReport {
    /// Subscription name
    pub name: String,
    /// Generation id, unique per coordinator
    pub generation: u64,
    /// Where accepted events went
    pub kind: SubscriptionKind,
    /// State when the report was taken
    pub state: SubscriptionState,
    /// Relays the open request was sent to
    pub relays: usize,
    /// Relays that rejected the open request
    pub open_failures: usize,
    /// Relays that signaled end of stored events
    pub drained_relays: usize,
    /// Events accepted after deduplication
    pub accepted: usize,
    /// Events dropped as already seen
    pub duplicates: usize,
    /// Events dropped because their kind was not requested
    pub ignored: usize,
    /// Per-event reconciliation results
    pub outcomes: Vec<(PublicKey, ReconcileOutcome)>,
    /// Contact lists that could not be persisted
    pub failures: Vec<ReconcileError>,
    /// Accumulated feed
    pub feed: Vec<FeedEntry>,
}

/// Result of [`Coordinator::sync_contact_list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSync {
    /// How the drain wait ended
    pub drain: DrainOutcome,
    /// Subscription summary
    pub report: SubscriptionReport,
}

/// Result of [`Coordinator::fetch_feed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFetch {
    /// Contacts the feed was scoped to
    pub contacts: usize,
    /// How the drain wait ended; `None` when no subscription was needed
    pub drain: Option<DrainOutcome>,
    /// Subscription summary; `None` when no subscription was needed
    pub report: Option<SubscriptionReport>,
}

impl FeedFetch {
    /// Feed entries in arrival order
    pub fn entries(&self) -> &[FeedEntry] {
        self.report
            .as_ref()
            .map(|report| report.feed.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct SessionStats {
    open_failures: usize,
    drained_relays: usize,
    accepted: usize,
    duplicates: usize,
    ignored: usize,
    outcomes: Vec<(PublicKey, ReconcileOutcome)>,
    failures: Vec<ReconcileError>,
}

/// One open/drain/close cycle of a named subscription
#[derive(Debug)]
struct Session {
    name: String,
    generation: u64,
    kind: SubscriptionKind,
    kinds: BTreeSet<Kind>,
    relays: usize,
    state: Mutex<SubscriptionState>,
    dedup: EventDedup,
    counter: CompletionCounter,
    pending: Mutex<HashSet<RelayUrl>>,
    feed: Arc<Feed>,
    stats: Mutex<SessionStats>,
}

impl Session {
    fn new(
        name: &str,
        generation: u64,
        kind: SubscriptionKind,
        filter: &SubscriptionFilter,
        relays: Vec<RelayUrl>,
    ) -> Self {
        Self {
            name: name.to_string(),
            generation,
            kind,
            kinds: filter.kinds().clone(),
            relays: relays.len(),
            state: Mutex::new(SubscriptionState::Opening),
            dedup: EventDedup::new(),
            counter: CompletionCounter::new(relays.len()),
            pending: Mutex::new(relays.into_iter().collect()),
            feed: Arc::new(Feed::new()),
            stats: Mutex::new(SessionStats::default()),
        }
    }

    fn state(&self) -> SubscriptionState {
        *self.state.lock()
    }

    fn is_live(&self) -> bool {
        self.state().is_live()
    }

    /// Moves the state forward; returns `false` if `next` is not ahead of the current state
    fn advance(&self, next: SubscriptionState) -> bool {
        let mut state = self.state.lock();
        if next <= *state {
            return false;
        }
        *state = next;
        true
    }

    /// Stops expecting end of stored events from `relay`.
    ///
    /// Returns `false` if the relay was not pending (unknown or already settled).
    fn settle_relay(&self, relay: &RelayUrl) -> bool {
        if !self.pending.lock().remove(relay) {
            return false;
        }
        if self.counter.signal() {
            self.advance(SubscriptionState::Drained);
            tracing::info!(
                subscription = %self.name,
                generation = self.generation,
                "Subscription drained"
            );
        }
        true
    }

    fn report(&self) -> SubscriptionReport {
        let stats = self.stats.lock();
        SubscriptionReport {
            name: self.name.clone(),
            generation: self.generation,
            kind: self.kind,
            state: self.state(),
            relays: self.relays,
            open_failures: stats.open_failures,
            drained_relays: stats.drained_relays,
            accepted: stats.accepted,
            duplicates: stats.duplicates,
            ignored: stats.ignored,
            outcomes: stats.outcomes.clone(),
            failures: stats.failures.clone(),
            feed: self.feed.snapshot(),
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    generations: AtomicU64,
}

impl Registry {
    fn get(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.lock().get(name).cloned()
    }

    fn live(&self, name: &str) -> Option<Arc<Session>> {
        self.get(name).filter(|session| session.is_live())
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Closes every session and releases its waiters
    fn close_all(&self) {
        for session in self.sessions.lock().values() {
            session.advance(SubscriptionState::Closed);
            if session.counter.abort() {
                tracing::debug!(
                    subscription = %session.name,
                    generation = session.generation,
                    "Released drain waiters"
                );
            }
        }
    }
}

/// Runs a synchronous storage call without stalling the other tasks on a multi-thread runtime.
///
/// The call stays inline so deltas are applied in arrival order.
fn run_blocking<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

/// Consumer of the shared update channel
struct Aggregator<S> {
    registry: Arc<Registry>,
    reconciler: GraphReconciler<S>,
}

impl<S> Aggregator<S>
where
    S: GraphStorage,
{
    async fn run(self, mut updates: mpsc::Receiver<RelayUpdate>) {
        while let Some(update) = updates.recv().await {
            self.handle(update);
        }
        tracing::debug!("Update channel closed, aggregator stopped");
    }

    fn handle(&self, update: RelayUpdate) {
        match update {
            RelayUpdate::Events {
                relay,
                subscription,
                events,
            } => self.handle_events(&relay, &subscription, events),
            RelayUpdate::EndOfStoredEvents {
                relay,
                subscription,
            } => self.handle_end_of_stored_events(&relay, &subscription),
        }
    }

    fn handle_events(&self, relay: &RelayUrl, name: &str, events: Vec<Event>) {
        let Some(session) = self.registry.live(name) else {
            tracing::debug!(
                relay = %relay,
                subscription = name,
                events = events.len(),
                "Dropping events for inactive subscription"
            );
            return;
        };
        session.advance(SubscriptionState::Draining);

        for event in events {
            // A close may land while a batch is being applied
            if !session.is_live() {
                break;
            }

            if !session.kinds.contains(&event.kind) {
                session.stats.lock().ignored += 1;
                continue;
            }

            if !session.dedup.try_accept(&event.id) {
                session.stats.lock().duplicates += 1;
                continue;
            }

            session.stats.lock().accepted += 1;
            tracing::debug!(
                relay = %relay,
                subscription = name,
                event_id = %event.id,
                "Accepted event"
            );

            match session.kind {
                SubscriptionKind::ContactLists => {
                    match run_blocking(|| self.reconciler.reconcile(&event)) {
                        Ok(outcome) => session.stats.lock().outcomes.push((event.pubkey, outcome)),
                        Err(e) => {
                            tracing::error!(
                                relay = %relay,
                                subscription = name,
                                event_id = %event.id,
                                error = %e,
                                "Failed to reconcile contact list"
                            );
                            session.stats.lock().failures.push(e);
                        }
                    }
                }
                SubscriptionKind::Messages => session.feed.append(FeedEntry::from(&event)),
            }
        }
    }

    fn handle_end_of_stored_events(&self, relay: &RelayUrl, name: &str) {
        let Some(session) = self.registry.live(name) else {
            tracing::debug!(
                relay = %relay,
                subscription = name,
                "Dropping end of stored events for inactive subscription"
            );
            return;
        };
        session.advance(SubscriptionState::Draining);

        if session.settle_relay(relay) {
            session.stats.lock().drained_relays += 1;
            tracing::info!(
                relay = %relay,
                subscription = name,
                remaining = session.counter.remaining(),
                "Received end of stored events"
            );
        } else {
            tracing::warn!(
                relay = %relay,
                subscription = name,
                "Ignoring end of stored events from relay that is not pending"
            );
        }
    }
}

/// Fans subscriptions out over the relay pool and aggregates what comes back
pub struct Coordinator<S> {
    pool: RelayPool,
    storage: Arc<S>,
    registry: Arc<Registry>,
    config: CoordinatorConfig,
    connect_failures: Vec<ConnectionError>,
    aggregator: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl<S> std::fmt::Debug for Coordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<S> Coordinator<S>
where
    S: GraphStorage + Send + Sync + 'static,
{
    /// Connects every relay concurrently and starts the aggregation task.
    ///
    /// Relays that fail to connect are logged and left out; see
    /// [`connect_failures`](Self::connect_failures). With no connected relay every
    /// subscription drains immediately.
    pub async fn connect(
        relays: Vec<Arc<dyn RelayConnection>>,
        storage: Arc<S>,
        config: CoordinatorConfig,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel(config.update_channel_capacity);
        let registry = Arc::new(Registry::default());

        let aggregator = Aggregator {
            registry: Arc::clone(&registry),
            reconciler: GraphReconciler::new(Arc::clone(&storage), config.contact_list_policy),
        };
        let handle = tokio::spawn(aggregator.run(updates_rx));

        let (pool, connect_failures) =
            RelayPool::connect_all(relays, &updates_tx, config.connect_timeout).await;
        if pool.is_empty() {
            tracing::warn!("No relay connected");
        }

        Self {
            pool,
            storage,
            registry,
            config,
            connect_failures,
            aggregator: Mutex::new(Some(handle)),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Connected relays
    pub fn relays(&self) -> Vec<RelayUrl> {
        self.pool.urls()
    }

    /// Relays that were excluded while connecting
    pub fn connect_failures(&self) -> &[ConnectionError] {
        &self.connect_failures
    }

    /// Graph storage
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Lifecycle state of the latest session named `name`
    pub fn state(&self, name: &str) -> SubscriptionState {
        self.registry
            .get(name)
            .map(|session| session.state())
            .unwrap_or(SubscriptionState::NotOpened)
    }

    /// Live view of the feed of the latest session named `name`
    pub fn feed(&self, name: &str) -> Option<Arc<Feed>> {
        self.registry
            .get(name)
            .map(|session| Arc::clone(&session.feed))
    }

    /// Summary of the latest session named `name`
    pub fn report(&self, name: &str) -> Option<SubscriptionReport> {
        self.registry.get(name).map(|session| session.report())
    }

    /// Opens `name` on every connected relay.
    ///
    /// Relays that reject the request are reported in the returned [`FanOutReport`] and are not
    /// waited on. Fails if a live session already uses `name`.
    pub async fn open_subscription(
        &self,
        name: &str,
        kind: SubscriptionKind,
        filter: SubscriptionFilter,
    ) -> Result<FanOutReport, SubscriptionError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SubscriptionError::ShutDown);
        }

        let session = {
            let mut sessions = self.registry.sessions.lock();
            if let Some(existing) = sessions.get(name)
                && existing.state() != SubscriptionState::Closed
            {
                return Err(SubscriptionError::AlreadyOpen {
                    name: name.to_string(),
                });
            }
            let generation = self.registry.next_generation();
            let session = Arc::new(Session::new(
                name,
                generation,
                kind,
                &filter,
                self.pool.urls(),
            ));
            sessions.insert(name.to_string(), Arc::clone(&session));
            session
        };

        tracing::info!(
            subscription = name,
            generation = session.generation,
            relays = session.relays,
            "Opening subscription"
        );

        let fan_out = self.pool.open_subscription(name, &filter).await;
        for (relay, e) in &fan_out.failed {
            tracing::warn!(relay = %relay, subscription = name, error = %e, "Relay rejected subscription");
            session.stats.lock().open_failures += 1;
            session.settle_relay(relay);
        }

        session.advance(SubscriptionState::Open);
        if session.counter.state() == CounterState::Drained {
            session.advance(SubscriptionState::Drained);
        }

        Ok(fan_out)
    }

    /// Waits until every relay signaled end of stored events for `name`.
    ///
    /// Returns immediately with [`DrainOutcome::NotOpened`] if `name` was never opened, and
    /// with [`DrainOutcome::Aborted`] once the session is closed or the coordinator shuts down.
    pub async fn wait_for_drain(&self, name: &str) -> DrainOutcome {
        let Some(session) = self.registry.get(name) else {
            return DrainOutcome::NotOpened;
        };
        match session.counter.wait().await {
            CounterState::Drained => DrainOutcome::Drained,
            CounterState::Aborted | CounterState::Pending(_) => DrainOutcome::Aborted,
        }
    }

    /// Like [`wait_for_drain`](Self::wait_for_drain) but gives up after `timeout`
    pub async fn wait_for_drain_timeout(&self, name: &str, timeout: Duration) -> DrainOutcome {
        tokio::time::timeout(timeout, self.wait_for_drain(name))
            .await
            .unwrap_or(DrainOutcome::TimedOut)
    }

    /// Closes `name` on every relay and returns the session summary.
    ///
    /// Updates that arrive afterwards are dropped. Closing an already closed session returns
    /// its summary again without another fan-out.
    pub async fn close_subscription(
        &self,
        name: &str,
    ) -> Result<SubscriptionReport, SubscriptionError> {
        let session = self
            .registry
            .get(name)
            .ok_or_else(|| SubscriptionError::NotOpen {
                name: name.to_string(),
            })?;

        if !session.advance(SubscriptionState::Closed) {
            return Ok(session.report());
        }
        if session.counter.abort() {
            tracing::debug!(subscription = name, "Closed before drained");
        }

        let fan_out = self.pool.close_subscription(name).await;
        for (relay, e) in &fan_out.failed {
            tracing::warn!(relay = %relay, subscription = name, error = %e, "Failed to close subscription");
        }

        tracing::info!(
            subscription = name,
            generation = session.generation,
            "Closed subscription"
        );

        Ok(session.report())
    }

    /// Fetches the contact list of `user` published within `lookback` and reconciles it
    pub async fn sync_contact_list(
        &self,
        user: PublicKey,
        lookback: Duration,
    ) -> Result<ContactSync, Error> {
        let filter = SubscriptionFilter::with_lookback(Kind::ContactList, lookback).authors([user]);
        self.open_subscription(CONTACT_LISTS, SubscriptionKind::ContactLists, filter)
            .await?;
        let drain = self.wait_bounded(CONTACT_LISTS).await;
        let report = self.close_subscription(CONTACT_LISTS).await?;

        tracing::info!(
            user = %user,
            drain = ?drain,
            accepted = report.accepted,
            failures = report.failures.len(),
            "Synced contact list"
        );

        Ok(ContactSync { drain, report })
    }

    /// Fetches notes published within `lookback` by the stored contacts of `user`
    pub async fn fetch_feed(&self, user: PublicKey, lookback: Duration) -> Result<FeedFetch, Error> {
        let contacts = self
            .storage
            .find_user(&user)?
            .ok_or(Error::NoContactList(user))?
            .contacts;

        // A filter without authors would match every author
        if contacts.is_empty() {
            tracing::info!(user = %user, "User follows nobody, feed is empty");
            return Ok(FeedFetch {
                contacts: 0,
                drain: None,
                report: None,
            });
        }

        let filter = SubscriptionFilter::with_lookback(Kind::TextNote, lookback)
            .authors(contacts.iter().copied());
        self.open_subscription(MESSAGES, SubscriptionKind::Messages, filter)
            .await?;
        let drain = self.wait_bounded(MESSAGES).await;
        let report = self.close_subscription(MESSAGES).await?;

        tracing::info!(
            user = %user,
            contacts = contacts.len(),
            drain = ?drain,
            entries = report.feed.len(),
            "Fetched feed"
        );

        Ok(FeedFetch {
            contacts: contacts.len(),
            drain: Some(drain),
            report: Some(report),
        })
    }

    /// Closes every session, releases drain waiters and disconnects all relays
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry.close_all();
        self.pool.disconnect_all().await;
        if let Some(handle) = self.aggregator.lock().take() {
            handle.abort();
        }
        tracing::info!("Coordinator shut down");
    }

    async fn wait_bounded(&self, name: &str) -> DrainOutcome {
        let outcome = match self.config.drain_timeout {
            Some(timeout) => self.wait_for_drain_timeout(name, timeout).await,
            None => self.wait_for_drain(name).await,
        };
        if outcome == DrainOutcome::TimedOut {
            tracing::warn!(subscription = name, "Gave up waiting for end of stored events");
        }
        outcome
    }
}

impl<S> Drop for Coordinator<S> {
    fn drop(&mut self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.registry.close_all();
        if let Some(handle) = self.aggregator.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use contactfeed_memory_storage::ContactfeedMemoryStorage;
    use nostr::{EventBuilder, Keys, Tag, Timestamp};

    use super::*;
    use crate::reconcile::ContactListPolicy;

    fn relay(n: usize) -> RelayUrl {
        RelayUrl::parse(&format!("wss://relay{n}.example.com")).unwrap()
    }

    fn aggregator() -> (Aggregator<ContactfeedMemoryStorage>, Arc<ContactfeedMemoryStorage>) {
        let storage = Arc::new(ContactfeedMemoryStorage::new());
        let aggregator = Aggregator {
            registry: Arc::new(Registry::default()),
            reconciler: GraphReconciler::new(Arc::clone(&storage), ContactListPolicy::Replace),
        };
        (aggregator, storage)
    }

    fn register(
        aggregator: &Aggregator<ContactfeedMemoryStorage>,
        name: &str,
        kind: SubscriptionKind,
        relays: Vec<RelayUrl>,
    ) -> Arc<Session> {
        let filter = SubscriptionFilter::new(kind.event_kind(), Timestamp::from(0));
        let generation = aggregator.registry.next_generation();
        let session = Arc::new(Session::new(name, generation, kind, &filter, relays));
        aggregator
            .registry
            .sessions
            .lock()
            .insert(name.to_string(), Arc::clone(&session));
        session.advance(SubscriptionState::Open);
        session
    }

    fn note(keys: &Keys, content: &str) -> Event {
        EventBuilder::new(Kind::TextNote, content)
            .sign_with_keys(keys)
            .unwrap()
    }

    #[test]
    fn test_duplicate_across_relays_accepted_once() {
        let (aggregator, _) = aggregator();
        let session = register(
            &aggregator,
            MESSAGES,
            SubscriptionKind::Messages,
            vec![relay(1), relay(2)],
        );
        let event = note(&Keys::generate(), "hello");

        for n in [1, 2, 1] {
            aggregator.handle(RelayUpdate::Events {
                relay: relay(n),
                subscription: MESSAGES.to_string(),
                events: vec![event.clone()],
            });
        }

        let report = session.report();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.duplicates, 2);
        assert_eq!(report.feed.len(), 1);
        assert_eq!(report.state, SubscriptionState::Draining);
    }

    #[test]
    fn test_eose_accounting_per_relay() {
        let (aggregator, _) = aggregator();
        let session = register(
            &aggregator,
            MESSAGES,
            SubscriptionKind::Messages,
            vec![relay(1), relay(2)],
        );
        let eose = |n| RelayUpdate::EndOfStoredEvents {
            relay: relay(n),
            subscription: MESSAGES.to_string(),
        };

        aggregator.handle(eose(1));
        // Duplicate and unknown relays do not count
        aggregator.handle(eose(1));
        aggregator.handle(eose(3));
        assert_eq!(session.counter.remaining(), 1);
        assert_eq!(session.state(), SubscriptionState::Draining);

        aggregator.handle(eose(2));
        assert_eq!(session.counter.state(), CounterState::Drained);
        assert_eq!(session.state(), SubscriptionState::Drained);
        assert_eq!(session.report().drained_relays, 2);
    }

    #[test]
    fn test_updates_for_other_names_are_dropped() {
        let (aggregator, _) = aggregator();
        let session = register(
            &aggregator,
            MESSAGES,
            SubscriptionKind::Messages,
            vec![relay(1)],
        );

        aggregator.handle(RelayUpdate::Events {
            relay: relay(1),
            subscription: CONTACT_LISTS.to_string(),
            events: vec![note(&Keys::generate(), "elsewhere")],
        });

        assert_eq!(session.report().accepted, 0);
        assert_eq!(session.state(), SubscriptionState::Open);
    }

    #[test]
    fn test_wrong_kind_is_ignored() {
        let (aggregator, storage) = aggregator();
        let session = register(
            &aggregator,
            CONTACT_LISTS,
            SubscriptionKind::ContactLists,
            vec![relay(1)],
        );

        aggregator.handle(RelayUpdate::Events {
            relay: relay(1),
            subscription: CONTACT_LISTS.to_string(),
            events: vec![note(&Keys::generate(), "not a contact list")],
        });

        assert_eq!(session.report().ignored, 1);
        assert_eq!(storage.user_count().unwrap(), 0);
    }

    #[test]
    fn test_contact_lists_reach_storage() {
        let (aggregator, storage) = aggregator();
        let session = register(
            &aggregator,
            CONTACT_LISTS,
            SubscriptionKind::ContactLists,
            vec![relay(1)],
        );
        let author = Keys::generate();
        let contact = Keys::generate().public_key();
        let event = EventBuilder::new(Kind::ContactList, "")
            .tags([Tag::public_key(contact)])
            .sign_with_keys(&author)
            .unwrap();

        aggregator.handle(RelayUpdate::Events {
            relay: relay(1),
            subscription: CONTACT_LISTS.to_string(),
            events: vec![event],
        });

        let report = session.report();
        assert_eq!(
            report.outcomes,
            vec![(author.public_key(), ReconcileOutcome::Created { contacts: 1 })]
        );
        assert_eq!(
            storage.contacts_of(&author.public_key()).unwrap(),
            BTreeSet::from([contact])
        );
    }

    #[test]
    fn test_closed_session_drops_late_updates() {
        let (aggregator, _) = aggregator();
        let session = register(
            &aggregator,
            MESSAGES,
            SubscriptionKind::Messages,
            vec![relay(1)],
        );
        session.advance(SubscriptionState::Closed);

        aggregator.handle(RelayUpdate::Events {
            relay: relay(1),
            subscription: MESSAGES.to_string(),
            events: vec![note(&Keys::generate(), "late")],
        });
        aggregator.handle(RelayUpdate::EndOfStoredEvents {
            relay: relay(1),
            subscription: MESSAGES.to_string(),
        });

        assert!(session.feed.is_empty());
        assert_eq!(session.counter.remaining(), 1);
    }

    #[test]
    fn test_state_never_moves_backward() {
        let filter = SubscriptionFilter::new(Kind::TextNote, Timestamp::from(0));
        let session = Session::new(
            MESSAGES,
            1,
            SubscriptionKind::Messages,
            &filter,
            vec![relay(1)],
        );
        assert!(session.advance(SubscriptionState::Drained));
        assert!(!session.advance(SubscriptionState::Open));
        assert_eq!(session.state(), SubscriptionState::Drained);
    }

    #[test]
    fn test_generations_are_unique() {
        let registry = Registry::default();
        let first = registry.next_generation();
        let second = registry.next_generation();
        assert!(second > first);
    }

    #[test]
    fn test_run_blocking_outside_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[tokio::test]
    async fn test_run_blocking_on_current_thread_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_contact_lists_reconcile_on_multi_thread_runtime() {
        let (aggregator, storage) = aggregator();
        let session = register(
            &aggregator,
            CONTACT_LISTS,
            SubscriptionKind::ContactLists,
            vec![relay(1)],
        );
        let author = Keys::generate();
        let contact = Keys::generate().public_key();
        let event = EventBuilder::new(Kind::ContactList, "")
            .tag(Tag::public_key(contact))
            .sign_with_keys(&author)
            .unwrap();

        aggregator.handle(RelayUpdate::Events {
            relay: relay(1),
            subscription: CONTACT_LISTS.to_string(),
            events: vec![event],
        });

        assert_eq!(session.report().outcomes.len(), 1);
        assert_eq!(
            storage.contacts_of(&author.public_key()).unwrap(),
            BTreeSet::from([contact])
        );
    }
}
