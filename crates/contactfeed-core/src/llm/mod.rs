//! Text-completion service used to filter and summarize a feed

use async_trait::async_trait;

use crate::error::CompletionError;

mod analyzer;
mod openai;

pub use self::analyzer::{FeedAnalyzer, TopicMatches};
pub use self::openai::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, OpenAiCompletion, OpenAiConfig};

/// Answer to "is this post about the topic?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The post is about the topic
    Yes,
    /// The post is not about the topic
    No,
}

impl Classification {
    /// Parses a bounded model answer.
    ///
    /// Case and surrounding whitespace or punctuation are ignored; anything other than
    /// "yes" or "no" is an error.
    pub fn parse(output: &str) -> Result<Self, CompletionError> {
        let answer = output
            .trim()
            .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
            .to_ascii_lowercase();
        match answer.as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            _ => Err(CompletionError::UnexpectedOutput(output.to_string())),
        }
    }

    /// Whether the answer is [`Classification::Yes`]
    pub fn is_yes(&self) -> bool {
        matches!(self, Self::Yes)
    }
}

/// Asynchronous text-in/text-out completion service
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Decides whether `text` is about `topic`
    async fn classify(&self, text: &str, topic: &str) -> Result<Classification, CompletionError>;

    /// Summarizes `texts`
    async fn summarize(&self, texts: &[String]) -> Result<String, CompletionError>;
}
