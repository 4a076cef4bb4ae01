//! Message feed accumulated by a messages subscription

use std::fmt;

use nostr::{Event, EventId, PublicKey, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One accepted text note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Note author
    pub author: PublicKey,
    /// Creation time reported by the author
    pub created_at: Timestamp,
    /// Note id
    pub event_id: EventId,
    /// Plain-text content
    pub content: String,
}

impl FeedEntry {
    /// Text block handed to the completion service
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl From<&Event> for FeedEntry {
    fn from(event: &Event) -> Self {
        Self {
            author: event.pubkey,
            created_at: event.created_at,
            event_id: event.id,
            content: event.content.clone(),
        }
    }
}

impl fmt::Display for FeedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Author: {}", self.author.to_hex())?;
        writeln!(f, "Date: {}", self.created_at.as_secs())?;
        writeln!(f, "PostId: {}", self.event_id.to_hex())?;
        writeln!(f, "Content:")?;
        writeln!(f, "{}", self.content)
    }
}

/// Append-only list of entries, safe to read while it is being filled
#[derive(Debug, Default)]
pub struct Feed {
    entries: Mutex<Vec<FeedEntry>>,
}

impl Feed {
    /// Creates an empty feed
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry
    pub fn append(&self, entry: FeedEntry) {
        self.entries.lock().push(entry);
    }

    /// Number of entries so far
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the feed is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy of the entries in arrival order
    pub fn snapshot(&self) -> Vec<FeedEntry> {
        self.entries.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use nostr::{EventBuilder, Keys, Kind};

    use super::*;

    #[test]
    fn test_render_format() {
        let keys = Keys::generate();
        let event = EventBuilder::new(Kind::TextNote, "gm")
            .custom_created_at(Timestamp::from(1_700_000_000))
            .sign_with_keys(&keys)
            .unwrap();

        let rendered = FeedEntry::from(&event).render();
        let expected = format!(
            "Author: {}\nDate: 1700000000\nPostId: {}\nContent:\ngm\n",
            keys.public_key().to_hex(),
            event.id.to_hex()
        );
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_feed_keeps_arrival_order() {
        let keys = Keys::generate();
        let feed = Feed::new();
        for content in ["one", "two", "three"] {
            let event = EventBuilder::new(Kind::TextNote, content)
                .sign_with_keys(&keys)
                .unwrap();
            feed.append(FeedEntry::from(&event));
        }

        let contents: Vec<_> = feed.snapshot().into_iter().map(|e| e.content).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert_eq!(feed.len(), 3);
    }
}
