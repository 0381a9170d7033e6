use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use super::types::{StreamEvent, ToolDefinition};
use crate::core::transcript::Turn;

/// Errors that can occur during provider operations.
/// None of them are retried; the session surfaces them as a notice.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Provider misconfigured (missing API key, bad URL).
    Config(String),
    /// Network-level failure (DNS, connection refused, reset mid-stream).
    Network(String),
    /// API returned an error response or an in-band error event.
    Api { status: u16, message: String },
    /// Failed to parse the provider's response.
    Parse(String),
    /// The response did not finish within the allowed duration.
    Timeout(Duration),
    /// The event channel was closed (consumer dropped the receiver).
    ChannelClosed,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Config(msg) => write!(f, "config error: {msg}"),
            ProviderError::Network(msg) => write!(f, "network error: {msg}"),
            ProviderError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ProviderError::Parse(msg) => write!(f, "parse error: {msg}"),
            ProviderError::Timeout(limit) => {
                write!(f, "response timed out after {}s", limit.as_secs())
            }
            ProviderError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Everything a provider needs to fulfill a completion request.
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    /// Full ordered history, including the turn being answered.
    pub turns: &'a [Turn],
    pub model: &'a str,
    pub tools: &'a [ToolDefinition],
    pub max_output_tokens: Option<u32>,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Streams a completion for the given request, sending decoded events to the channel.
    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamEvent>,
    ) -> Result<(), ProviderError>;
}

/// Sends one event, mapping a dropped receiver to `ChannelClosed`.
pub(crate) async fn emit(
    sender: &Sender<StreamEvent>,
    event: StreamEvent,
) -> Result<(), ProviderError> {
    sender.send(event).await.map_err(|_| {
        log::warn!("Event send failed: receiver dropped");
        ProviderError::ChannelClosed
    })
}
