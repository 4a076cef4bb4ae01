//! Fan-out over the connected relays

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use nostr::RelayUrl;
use tokio::sync::mpsc;

use super::{RelayConnection, RelayUpdate};
use crate::error::{ConnectionError, SubscriptionError};
use crate::subscription::SubscriptionFilter;

/// Per-member result of a fanned-out request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Members that acknowledged
    pub succeeded: Vec<RelayUrl>,
    /// Members that failed, with the reason
    pub failed: Vec<(RelayUrl, SubscriptionError)>,
}

impl FanOutReport {
    /// Whether every member acknowledged
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The relays that connected successfully.
///
/// Failed relays never become members, so later fan-outs address only live sessions.
pub struct RelayPool {
    members: Vec<Arc<dyn RelayConnection>>,
}

impl std::fmt::Debug for RelayPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayPool")
            .field("members", &self.urls())
            .finish()
    }
}

impl RelayPool {
    /// Connects every candidate concurrently and keeps the ones that succeed.
    ///
    /// Returns once every attempt has settled, together with the failures.
    pub async fn connect_all(
        candidates: Vec<Arc<dyn RelayConnection>>,
        updates: &mpsc::Sender<RelayUpdate>,
        timeout: Duration,
    ) -> (Self, Vec<ConnectionError>) {
        let mut failures = Vec::new();
        let mut seen: HashSet<RelayUrl> = HashSet::new();
        let mut unique = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if seen.insert(candidate.url().clone()) {
                unique.push(candidate);
            } else {
                failures.push(ConnectionError::Duplicate {
                    relay: candidate.url().clone(),
                });
            }
        }

        let attempts = unique.iter().map(|candidate| {
            let updates = updates.clone();
            async move { candidate.connect(updates, timeout).await }
        });
        let results = join_all(attempts).await;

        let mut members = Vec::with_capacity(unique.len());
        for (candidate, result) in unique.into_iter().zip(results) {
            match result {
                Ok(()) => members.push(candidate),
                Err(e) => {
                    tracing::warn!(relay = %candidate.url(), error = %e, "Relay excluded from pool");
                    failures.push(e);
                }
            }
        }

        tracing::info!(
            connected = members.len(),
            failed = failures.len(),
            "Finished connecting to relays"
        );

        (Self { members }, failures)
    }

    /// Addresses of the members
    pub fn urls(&self) -> Vec<RelayUrl> {
        self.members.iter().map(|m| m.url().clone()).collect()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no relay connected
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Opens `name` on every member concurrently
    pub async fn open_subscription(&self, name: &str, filter: &SubscriptionFilter) -> FanOutReport {
        let results = join_all(
            self.members
                .iter()
                .map(|member| member.open_subscription(name, filter)),
        )
        .await;
        self.report(results)
    }

    /// Closes `name` on every member concurrently
    pub async fn close_subscription(&self, name: &str) -> FanOutReport {
        let results = join_all(
            self.members
                .iter()
                .map(|member| member.close_subscription(name)),
        )
        .await;
        self.report(results)
    }

    /// Disconnects every member
    pub async fn disconnect_all(&self) {
        join_all(self.members.iter().map(|member| member.disconnect())).await;
    }

    fn report(&self, results: Vec<Result<(), SubscriptionError>>) -> FanOutReport {
        let mut report = FanOutReport::default();
        for (member, result) in self.members.iter().zip(results) {
            match result {
                Ok(()) => report.succeeded.push(member.url().clone()),
                Err(e) => report.failed.push((member.url().clone(), e)),
            }
        }
        report
    }
}
