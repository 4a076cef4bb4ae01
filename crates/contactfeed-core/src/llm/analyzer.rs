use super::TextCompletion;
use crate::error::CompletionError;
use crate::feed::FeedEntry;

/// Result of filtering a feed by topic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicMatches {
    /// Entries classified as about the topic, in feed order
    pub matches: Vec<FeedEntry>,
    /// Entries the service could not classify
    pub failures: usize,
    /// Entries processed
    pub processed: usize,
}

/// Runs feed entries through a [`TextCompletion`] service
#[derive(Debug, Clone)]
pub struct FeedAnalyzer<C> {
    completion: C,
}

impl<C> FeedAnalyzer<C>
where
    C: TextCompletion,
{
    /// Wraps `completion`
    pub fn new(completion: C) -> Self {
        Self { completion }
    }

    /// Keeps the entries the service classifies as about `topic`.
    ///
    /// A failed classification is logged with the entry and skipped; it never aborts the batch.
    pub async fn posts_about_topic(&self, entries: &[FeedEntry], topic: &str) -> TopicMatches {
        let mut result = TopicMatches::default();
        let total = entries.len();

        for entry in entries {
            match self.completion.classify(&entry.render(), topic).await {
                Ok(answer) if answer.is_yes() => {
                    tracing::info!(topic, event_id = %entry.event_id, "Found a post about the topic");
                    result.matches.push(entry.clone());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        topic,
                        event_id = %entry.event_id,
                        author = %entry.author,
                        content = %entry.content,
                        error = %e,
                        "Failed to classify post, skipping"
                    );
                    result.failures += 1;
                }
            }
            result.processed += 1;
            tracing::debug!(processed = result.processed, total, "Classified post");
        }

        result
    }

    /// Summarizes `entries`; an empty feed yields an empty summary without a request
    pub async fn summarize(&self, entries: &[FeedEntry]) -> Result<String, CompletionError> {
        if entries.is_empty() {
            return Ok(String::new());
        }
        let texts: Vec<String> = entries.iter().map(FeedEntry::render).collect();
        self.completion.summarize(&texts).await
    }
}
