//! Chat route provider speaking the line-framed "data stream" protocol.
//!
//! The conversation is POSTed as `{ "messages": [...] }` to a chat route that
//! owns the system instruction and tools, and answers with one frame per line:
//!
//! ```text
//! 0:"Hel"                                                  text delta
//! 9:{"toolCallId":"c1","toolName":"displayWeather","args":{...}}   tool call
//! a:{"toolCallId":"c1","result":{...}}                     tool result
//! 3:"rate limited"                                         error
//! d:{"finishReason":"stop"}                                finish
//! ```
//!
//! Malformed or unknown frames are logged and dropped; they never end the stream.

use std::fmt;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::core::tools::ToolName;
use crate::core::transcript::{InvocationState, Role, Turn};
use super::lines::LineBuffer;
use crate::inference::provider::emit;
use crate::inference::{CompletionProvider, CompletionRequest, ProviderError, StreamEvent};

// ============================================================================
// Frame decoding
// ============================================================================

/// A decoded line of the data stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(StreamEvent),
    /// In-band error reported by the route.
    Error(String),
    /// A known frame type this client has no use for (step markers, annotations, ...).
    Ignored(char),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Line has no `<type>:` prefix.
    MissingPrefix(String),
    UnknownType(String),
    Json { frame_type: char, message: String },
    UnknownTool(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::MissingPrefix(line) => write!(f, "frame without type prefix: {line}"),
            FrameError::UnknownType(t) => write!(f, "unknown frame type '{t}'"),
            FrameError::Json {
                frame_type,
                message,
            } => write!(f, "malformed '{frame_type}' frame: {message}"),
            FrameError::UnknownTool(name) => write!(f, "frame names unknown tool '{name}'"),
        }
    }
}

impl std::error::Error for FrameError {}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallFrame {
    tool_call_id: String,
    tool_name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultFrame {
    tool_call_id: String,
    #[serde(default)]
    result: serde_json::Value,
}

fn parse_json<T: serde::de::DeserializeOwned>(frame_type: char, body: &str) -> Result<T, FrameError> {
    serde_json::from_str(body).map_err(|e| FrameError::Json {
        frame_type,
        message: e.to_string(),
    })
}

fn parse_tool(name: &str) -> Result<ToolName, FrameError> {
    name.parse()
        .map_err(|_| FrameError::UnknownTool(name.to_string()))
}

/// Decodes one line of the data stream.
pub fn decode_frame(line: &str) -> Result<Frame, FrameError> {
    let (prefix, body) = line
        .split_once(':')
        .ok_or_else(|| FrameError::MissingPrefix(line.to_string()))?;
    let mut chars = prefix.chars();
    let frame_type = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(FrameError::UnknownType(prefix.to_string())),
    };

    match frame_type {
        '0' => parse_json::<String>(frame_type, body).map(|t| Frame::Event(StreamEvent::TextDelta(t))),
        '9' | 'b' => {
            let call: ToolCallFrame = parse_json(frame_type, body)?;
            Ok(Frame::Event(StreamEvent::ToolCall {
                call_id: call.tool_call_id,
                tool_name: parse_tool(&call.tool_name)?,
                arguments: call.args,
            }))
        }
        'a' => {
            let result: ToolResultFrame = parse_json(frame_type, body)?;
            Ok(Frame::Event(StreamEvent::ToolResult {
                call_id: result.tool_call_id,
                tool_name: None,
                payload: result.result,
            }))
        }
        'd' => Ok(Frame::Event(StreamEvent::End)),
        '3' => parse_json::<String>(frame_type, body).map(Frame::Error),
        '2' | '8' | 'c' | 'e' | 'f' | 'g' | 'h' | 'i' | 'j' | 'k' => Ok(Frame::Ignored(frame_type)),
        other => Err(FrameError::UnknownType(other.to_string())),
    }
}

// ============================================================================
// Request encoding
// ============================================================================

#[derive(Serialize, Debug)]
struct RouteRequest {
    messages: Vec<RouteMessage>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct RouteMessage {
    id: String,
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_invocations: Vec<RouteToolInvocation>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct RouteToolInvocation {
    state: &'static str,
    tool_call_id: String,
    tool_name: &'static str,
    args: serde_json::Value,
    result: serde_json::Value,
}

/// Converts turns into the route's message list. Only resolved invocations are sent.
fn turns_to_messages(turns: &[Turn]) -> Vec<RouteMessage> {
    turns
        .iter()
        .map(|turn| RouteMessage {
            id: turn.id.to_string(),
            role: match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: turn.text.clone(),
            tool_invocations: turn
                .tool_invocations
                .iter()
                .filter_map(|inv| match &inv.state {
                    InvocationState::Result(payload) => Some(RouteToolInvocation {
                        state: "result",
                        tool_call_id: inv.call_id.clone(),
                        tool_name: inv.tool_name.as_str(),
                        args: inv.arguments.clone(),
                        result: payload.clone(),
                    }),
                    InvocationState::Pending => None,
                })
                .collect(),
        })
        .collect()
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Client of a remote chat route. The route owns persona and tools, so the
/// request's system prompt and tool list are not sent.
pub struct DataStreamProvider {
    url: String,
    client: reqwest::Client,
}

impl DataStreamProvider {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionProvider for DataStreamProvider {
    fn name(&self) -> &str {
        "route"
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let body = RouteRequest {
            messages: turns_to_messages(request.turns),
        };
        info!("Chat route request: url={}, messages={}", self.url, body.messages.len());

        let mut response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Chat route error: {} - {}", status, message);
            return Err(ProviderError::Api { status, message });
        }

        let mut lines = LineBuffer::new();
        let mut frame_count = 0usize;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?
        {
            lines.push(&chunk);

            while let Some(line) = lines.next_line() {
                if line.is_empty() {
                    continue;
                }

                match decode_frame(&line) {
                    Ok(Frame::Event(event)) => {
                        frame_count += 1;
                        let done = event.is_end();
                        emit(&sender, event).await?;
                        if done {
                            info!("Chat route stream finished after {} frames", frame_count);
                            return Ok(());
                        }
                    }
                    Ok(Frame::Error(message)) => {
                        warn!("Chat route reported error: {}", message);
                        return Err(ProviderError::Api { status, message });
                    }
                    Ok(Frame::Ignored(t)) => debug!("Ignoring '{}' frame", t),
                    Err(e) => warn!("Dropping frame: {}", e),
                }
            }
        }

        if lines.pending() > 0 {
            debug!("Discarding {} bytes of unterminated trailing data", lines.pending());
        }
        info!("Chat route stream closed without finish frame after {} frames", frame_count);
        Ok(())
    }
}
