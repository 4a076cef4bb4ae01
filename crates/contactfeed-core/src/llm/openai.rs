//! OpenAI chat-completions client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Classification, TextCompletion};
use crate::error::CompletionError;

/// Model used when `OPENAI_MODEL` is unset
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
/// API root used when `OPENAI_BASE_URL` is unset
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);
const CLASSIFY_MAX_TOKENS: u32 = 5;
const SUMMARY_MAX_TOKENS: u32 = 1000;

const POST_FORMAT: &str = "Author: <a string identifying the author of the post>\n\
     Date: <unix timestamp>\n\
     PostId: <a unique identifier of the post>\n\
     Content:\n<the post's content (plain text)>\n\n";

/// Connection settings for the OpenAI API
#[derive(Clone)]
pub struct OpenAiConfig {
    /// Bearer token
    pub api_key: String,
    /// Chat model
    pub model: String,
    /// API root without trailing slash
    pub base_url: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiConfig {
    /// Default model and API root with `api_key`
    pub fn new<S>(api_key: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    ///
    /// Returns `None` when no API key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?.trim().to_string();
        if api_key.is_empty() {
            return None;
        }
        let mut config = Self::new(api_key);
        if let Some(model) = non_empty_env("OPENAI_MODEL") {
            config = config.with_model(model);
        }
        if let Some(base_url) = non_empty_env("OPENAI_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        Some(config)
    }

    /// Sets the model
    pub fn with_model<S>(mut self, model: S) -> Self
    where
        S: Into<String>,
    {
        self.model = model.into();
        self
    }

    /// Sets the API root
    pub fn with_base_url<S>(mut self, base_url: S) -> Self
    where
        S: Into<String>,
    {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, CompletionError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}

/// Instructions, the primed answer, then the post
fn classification_messages(text: &str, topic: &str) -> Vec<ChatMessage> {
    let instructions = format!(
        "You're an assistant helping me browse my social media feed by checking whether posts \
         are about a given topic. I'll send requests in the following format:\n\n\
         Topic: <topic name>\nPost:\n<a social media post>\n\n\
         Posts are formatted like this:\n{POST_FORMAT}\
         Answer \"yes\" if the post contains information about the topic and \"no\" otherwise."
    );
    vec![
        ChatMessage::user(instructions),
        ChatMessage::assistant(
            "Understood. I will answer \"yes\" if the post contains information about the topic \
             and \"no\" otherwise.",
        ),
        ChatMessage::user(format!("Topic: {topic}\nPost:\n{text}")),
    ]
}

/// Instructions, the primed answer, then the posts separated by blank lines
fn summary_messages(texts: &[String]) -> Vec<ChatMessage> {
    let instructions = format!(
        "You're an assistant helping me browse my social media feed by summarizing posts from a \
         given time period. I'll paste posts in the following format:\n\n{POST_FORMAT}\
         Write a short summary of everything you've learned from those posts. Skip posts that \
         carry no new information and only express attitudes such as excitement or \
         condemnation. When you mention a piece of information, cite the PostId it came from."
    );
    vec![
        ChatMessage::user(instructions),
        ChatMessage::assistant(
            "Understood. I will write a short summary of the posts you provide, sticking to \
             informative posts only.",
        ),
        ChatMessage::user(texts.join("\n\n")),
    ]
}

/// [`TextCompletion`] over the OpenAI chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    client: Client,
    config: OpenAiConfig,
    chat_url: String,
}

impl OpenAiCompletion {
    /// Builds the HTTP client
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            chat_url: config.chat_url(),
            config,
        })
    }

    /// Settings in use
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn chat(
        &self,
        max_tokens: u32,
        messages: Vec<ChatMessage>,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.config.model,
            max_tokens,
            messages,
        };

        let response = self
            .client
            .post(&self.chat_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        response.json::<ChatResponse>().await?.into_text()
    }
}

#[async_trait]
impl TextCompletion for OpenAiCompletion {
    async fn classify(&self, text: &str, topic: &str) -> Result<Classification, CompletionError> {
        let output = self
            .chat(CLASSIFY_MAX_TOKENS, classification_messages(text, topic))
            .await?;
        Classification::parse(&output)
    }

    async fn summarize(&self, texts: &[String]) -> Result<String, CompletionError> {
        self.chat(SUMMARY_MAX_TOKENS, summary_messages(texts)).await
    }
}
