//! Scripted relay used by the integration tests

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use contactfeed_core::error::{ConnectionError, SubscriptionError};
use contactfeed_core::relay::{ConnectionState, RelayConnection, RelayUpdate};
use contactfeed_core::subscription::SubscriptionFilter;
use nostr::{Event, EventBuilder, Keys, Kind, PublicKey, RelayUrl, Tag, Timestamp};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Relay whose behavior is driven by the test
pub struct FakeRelay {
    url: RelayUrl,
    fail_connect: bool,
    reject_open: bool,
    state: Mutex<ConnectionState>,
    subscriptions: Mutex<BTreeSet<String>>,
    updates: Mutex<Option<mpsc::Sender<RelayUpdate>>>,
    opened: Mutex<Vec<(String, SubscriptionFilter)>>,
    closed: Mutex<Vec<String>>,
    disconnected: AtomicBool,
}

impl FakeRelay {
    fn build(n: usize, fail_connect: bool, reject_open: bool) -> Arc<Self> {
        Arc::new(Self {
            url: relay_url(n),
            fail_connect,
            reject_open,
            state: Mutex::new(ConnectionState::Disconnected),
            subscriptions: Mutex::new(BTreeSet::new()),
            updates: Mutex::new(None),
            opened: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        })
    }

    /// Relay that connects and accepts everything
    pub fn new(n: usize) -> Arc<Self> {
        Self::build(n, false, false)
    }

    /// Relay that never connects
    pub fn unreachable(n: usize) -> Arc<Self> {
        Self::build(n, true, false)
    }

    /// Relay that connects but rejects every subscription
    pub fn rejecting(n: usize) -> Arc<Self> {
        Self::build(n, false, true)
    }

    pub fn url(&self) -> &RelayUrl {
        &self.url
    }

    pub fn opened(&self) -> Vec<(String, SubscriptionFilter)> {
        self.opened.lock().clone()
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().clone()
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.subscriptions.lock().contains(name)
    }

    pub fn was_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Waits until `name` has been opened on this relay
    pub async fn wait_until_open(&self, name: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.is_open(name) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscription was never opened");
    }

    fn sender(&self) -> mpsc::Sender<RelayUpdate> {
        self.updates
            .lock()
            .clone()
            .expect("relay is not connected")
    }

    /// Pushes a batch of events for `name`
    pub async fn send_events(&self, name: &str, events: Vec<Event>) {
        self.sender()
            .send(RelayUpdate::Events {
                relay: self.url.clone(),
                subscription: name.to_string(),
                events,
            })
            .await
            .unwrap();
    }

    /// Pushes end of stored events for `name`
    pub async fn send_eose(&self, name: &str) {
        self.sender()
            .send(RelayUpdate::EndOfStoredEvents {
                relay: self.url.clone(),
                subscription: name.to_string(),
            })
            .await
            .unwrap();
    }
}

#[async_trait]
impl RelayConnection for FakeRelay {
    fn url(&self) -> &RelayUrl {
        &self.url
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn open_subscriptions(&self) -> BTreeSet<String> {
        self.subscriptions.lock().clone()
    }

    async fn connect(
        &self,
        updates: mpsc::Sender<RelayUpdate>,
        timeout: Duration,
    ) -> Result<(), ConnectionError> {
        if self.fail_connect {
            *self.state.lock() = ConnectionState::Failed;
            return Err(ConnectionError::Timeout {
                relay: self.url.clone(),
                timeout,
            });
        }
        *self.updates.lock() = Some(updates);
        *self.state.lock() = ConnectionState::Connected;
        Ok(())
    }

    async fn open_subscription(
        &self,
        name: &str,
        filter: &SubscriptionFilter,
    ) -> Result<(), SubscriptionError> {
        if self.reject_open {
            return Err(SubscriptionError::Rejected {
                relay: self.url.clone(),
                name: name.to_string(),
                reason: "blocked".to_string(),
            });
        }
        self.opened.lock().push((name.to_string(), filter.clone()));
        self.subscriptions.lock().insert(name.to_string());
        Ok(())
    }

    async fn close_subscription(&self, name: &str) -> Result<(), SubscriptionError> {
        self.closed.lock().push(name.to_string());
        if !self.subscriptions.lock().remove(name) {
            return Err(SubscriptionError::NotOpen {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.updates.lock().take();
        self.subscriptions.lock().clear();
        *self.state.lock() = ConnectionState::Disconnected;
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

pub fn relay_url(n: usize) -> RelayUrl {
    RelayUrl::parse(&format!("wss://relay{n}.example.com")).unwrap()
}

pub fn as_connections(relays: &[Arc<FakeRelay>]) -> Vec<Arc<dyn RelayConnection>> {
    relays
        .iter()
        .map(|relay| Arc::clone(relay) as Arc<dyn RelayConnection>)
        .collect()
}

pub fn contact_list(author: &Keys, contacts: &[PublicKey], created_at: u64) -> Event {
    EventBuilder::new(Kind::ContactList, "")
        .tags(contacts.iter().map(|pk| Tag::public_key(*pk)))
        .custom_created_at(Timestamp::from(created_at))
        .sign_with_keys(author)
        .unwrap()
}

pub fn note(author: &Keys, content: &str) -> Event {
    EventBuilder::new(Kind::TextNote, content)
        .sign_with_keys(author)
        .unwrap()
}
