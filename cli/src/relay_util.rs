use std::sync::Arc;

use anyhow::{Context, Result};
use contactfeed_core::{DEFAULT_RELAYS, NostrRelayConnection, RelayConnection};
use nostr::RelayUrl;

/// Relays from the command line, or the default profile when none were given
pub fn parse_relay_urls(urls: &[String]) -> Result<Vec<RelayUrl>> {
    if urls.is_empty() {
        return DEFAULT_RELAYS
            .iter()
            .map(|u| RelayUrl::parse(u).with_context(|| format!("parse default relay url: {u}")))
            .collect();
    }
    urls.iter()
        .map(|u| RelayUrl::parse(u.as_str()).with_context(|| format!("parse relay url: {u}")))
        .collect()
}

pub fn connections(urls: Vec<RelayUrl>) -> Vec<Arc<dyn RelayConnection>> {
    urls.into_iter()
        .map(|url| Arc::new(NostrRelayConnection::new(url)) as Arc<dyn RelayConnection>)
        .collect()
}
