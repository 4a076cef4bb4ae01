//! [`RelayConnection`] backed by a single-relay nostr-sdk client

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use nostr_sdk::prelude::*;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{ConnectionState, RelayConnection, RelayUpdate};
use crate::error::{ConnectionError, SubscriptionError};
use crate::subscription::SubscriptionFilter;

const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A relay session driven by its own [`Client`].
///
/// One client per relay keeps end-of-stored-events signals attributable to a single relay.
pub struct NostrRelayConnection {
    url: RelayUrl,
    client: Client,
    state: Mutex<ConnectionState>,
    subscriptions: Mutex<BTreeSet<String>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for NostrRelayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NostrRelayConnection")
            .field("url", &self.url)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl NostrRelayConnection {
    /// Creates a disconnected session for `url`
    pub fn new(url: RelayUrl) -> Self {
        Self {
            url,
            client: Client::builder().build(),
            state: Mutex::new(ConnectionState::Disconnected),
            subscriptions: Mutex::new(BTreeSet::new()),
            forwarder: Mutex::new(None),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    fn stop_forwarding(&self) {
        if let Some(handle) = self.forwarder.lock().take() {
            handle.abort();
        }
    }

    async fn is_relay_connected(&self) -> bool {
        match self.client.relay(self.url.clone()).await {
            Ok(relay) => relay.is_connected(),
            Err(_) => false,
        }
    }
}

impl Drop for NostrRelayConnection {
    fn drop(&mut self) {
        self.stop_forwarding();
    }
}

#[async_trait]
impl RelayConnection for NostrRelayConnection {
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
        self.set_state(ConnectionState::Connecting);
        tracing::info!(relay = %self.url, "Connecting to relay");

        if let Err(e) = self.client.add_relay(self.url.clone()).await {
            self.set_state(ConnectionState::Failed);
            return Err(ConnectionError::Add {
                relay: self.url.clone(),
                reason: e.to_string(),
            });
        }

        // Subscribe to notifications before connecting so no EOSE is missed
        let notifications = self.client.notifications();
        let handle = tokio::spawn(forward_notifications(
            self.url.clone(),
            notifications,
            updates,
        ));
        if let Some(previous) = self.forwarder.lock().replace(handle) {
            previous.abort();
        }

        self.client.connect().await;

        let deadline = Instant::now() + timeout;
        loop {
            if self.is_relay_connected().await {
                self.set_state(ConnectionState::Connected);
                tracing::info!(relay = %self.url, "Connected to relay");
                return Ok(());
            }
            if Instant::now() >= deadline {
                self.stop_forwarding();
                self.client.shutdown().await;
                self.set_state(ConnectionState::Failed);
                return Err(ConnectionError::Timeout {
                    relay: self.url.clone(),
                    timeout,
                });
            }
            tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
        }
    }

    async fn open_subscription(
        &self,
        name: &str,
        filter: &SubscriptionFilter,
    ) -> Result<(), SubscriptionError> {
        if self.state() != ConnectionState::Connected {
            return Err(SubscriptionError::NotConnected {
                relay: self.url.clone(),
            });
        }

        let rejected = |reason: String| SubscriptionError::Rejected {
            relay: self.url.clone(),
            name: name.to_string(),
            reason,
        };

        let output = self
            .client
            .subscribe_with_id(SubscriptionId::new(name), filter.to_filter(), None)
            .await
            .map_err(|e| rejected(e.to_string()))?;
        if let Some(reason) = output.failed.values().next() {
            return Err(rejected(reason.clone()));
        }

        self.subscriptions.lock().insert(name.to_string());
        tracing::debug!(relay = %self.url, subscription = name, "Opened subscription");
        Ok(())
    }

    async fn close_subscription(&self, name: &str) -> Result<(), SubscriptionError> {
        if !self.subscriptions.lock().remove(name) {
            return Err(SubscriptionError::NotOpen {
                name: name.to_string(),
            });
        }
        self.client.unsubscribe(&SubscriptionId::new(name)).await;
        tracing::debug!(relay = %self.url, subscription = name, "Closed subscription");
        Ok(())
    }

    async fn disconnect(&self) {
        self.stop_forwarding();
        self.client.shutdown().await;
        self.subscriptions.lock().clear();
        self.set_state(ConnectionState::Disconnected);
        tracing::info!(relay = %self.url, "Disconnected from relay");
    }
}

/// Receive loop for one relay: maps relay messages to [`RelayUpdate`]s
async fn forward_notifications(
    relay: RelayUrl,
    mut notifications: broadcast::Receiver<RelayPoolNotification>,
    updates: mpsc::Sender<RelayUpdate>,
) {
    loop {
        let update = match notifications.recv().await {
            // `Event` notifications fire only for ids the client database has not seen yet,
            // so a reopened subscription would miss events delivered to an earlier one
            Ok(RelayPoolNotification::Message { message, .. }) => match message {
                RelayMessage::Event {
                    subscription_id,
                    event,
                } => RelayUpdate::Events {
                    relay: relay.clone(),
                    subscription: subscription_id.to_string(),
                    events: vec![event.into_owned()],
                },
                RelayMessage::EndOfStoredEvents(id) => RelayUpdate::EndOfStoredEvents {
                    relay: relay.clone(),
                    subscription: id.to_string(),
                },
                RelayMessage::Closed {
                    subscription_id,
                    message,
                } => {
                    tracing::warn!(
                        relay = %relay,
                        subscription = %subscription_id,
                        reason = %message,
                        "Relay closed subscription"
                    );
                    continue;
                }
                _ => continue,
            },
            Ok(RelayPoolNotification::Shutdown) => break,
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(relay = %relay, skipped, "Notification receiver lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if updates.send(update).await.is_err() {
            break;
        }
    }
    tracing::debug!(relay = %relay, "Notification forwarder stopped");
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    fn relay_url() -> RelayUrl {
        RelayUrl::parse("wss://relay1.example.com").unwrap()
    }

    fn message(message: RelayMessage<'static>) -> RelayPoolNotification {
        RelayPoolNotification::Message {
            relay_url: relay_url(),
            message,
        }
    }

    fn event_message(name: &str, event: &Event) -> RelayPoolNotification {
        message(RelayMessage::Event {
            subscription_id: Cow::Owned(SubscriptionId::new(name)),
            event: Cow::Owned(event.clone()),
        })
    }

    async fn forward(notifications: Vec<RelayPoolNotification>) -> Vec<RelayUpdate> {
        let (notify_tx, notify_rx) = broadcast::channel(16);
        let (updates_tx, mut updates_rx) = mpsc::channel(16);
        for notification in notifications {
            notify_tx.send(notification).unwrap();
        }

        let forwarder = tokio::spawn(forward_notifications(relay_url(), notify_rx, updates_tx));
        tokio::time::timeout(Duration::from_secs(5), forwarder)
            .await
            .unwrap()
            .unwrap();

        let mut updates = Vec::new();
        while let Some(update) = updates_rx.recv().await {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn test_every_receipt_is_forwarded() {
        let event = EventBuilder::new(Kind::TextNote, "hello")
            .sign_with_keys(&Keys::generate())
            .unwrap();

        let updates = forward(vec![
            event_message("messages", &event),
            event_message("messages", &event),
            message(RelayMessage::EndOfStoredEvents(Cow::Owned(
                SubscriptionId::new("messages"),
            ))),
            message(RelayMessage::Closed {
                subscription_id: Cow::Owned(SubscriptionId::new("messages")),
                message: Cow::Borrowed("rate-limited"),
            }),
            RelayPoolNotification::Shutdown,
            // Never reached
            event_message("messages", &event),
        ])
        .await;

        assert_eq!(updates.len(), 3);
        for update in &updates[..2] {
            match update {
                RelayUpdate::Events {
                    relay,
                    subscription,
                    events,
                } => {
                    assert_eq!(relay, &relay_url());
                    assert_eq!(subscription, "messages");
                    assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), [event.id]);
                }
                other => panic!("unexpected update: {other:?}"),
            }
        }
        assert!(matches!(
            &updates[2],
            RelayUpdate::EndOfStoredEvents { subscription, .. } if subscription == "messages"
        ));
    }

    #[tokio::test]
    async fn test_first_seen_notification_is_not_forwarded_twice() {
        let event = EventBuilder::new(Kind::TextNote, "hello")
            .sign_with_keys(&Keys::generate())
            .unwrap();

        let updates = forward(vec![
            RelayPoolNotification::Event {
                relay_url: relay_url(),
                subscription_id: SubscriptionId::new("messages"),
                event: Box::new(event.clone()),
            },
            event_message("messages", &event),
            RelayPoolNotification::Shutdown,
        ])
        .await;

        assert_eq!(updates.len(), 1);
        assert!(matches!(&updates[0], RelayUpdate::Events { events, .. } if events.len() == 1));
    }
}
