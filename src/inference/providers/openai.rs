//! OpenAI provider implementation using the Responses API.
//!
//! This module uses OpenAI Responses API terminology:
//! - "input" (polymorphic array of messages, function calls, function call outputs)
//! - "role" (not "source")
//! - SSE events: response.output_text.delta, response.output_item.added,
//!   response.function_call_arguments.done, response.completed
//!
//! The model only *requests* tools here; resolving them is the job of
//! [`ChatRoute`](crate::inference::ChatRoute).

use std::collections::HashMap;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::core::tools::ToolName;
use crate::core::transcript::{InvocationState, Role as TurnRole, Turn};
use super::lines::LineBuffer;
use crate::inference::provider::emit;
use crate::inference::{
    CompletionProvider, CompletionRequest, ProviderError, StreamEvent, ToolDefinition,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// ============================================================================
// Responses API Types
// ============================================================================

/// Role in an input message (OpenAI terminology)
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
    Assistant,
}

/// Polymorphic input item for the Responses API input array.
/// Messages, function calls, and function call outputs are peers at the same level.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
enum InputItem {
    #[serde(rename = "message")]
    Message { role: Role, content: String },
    #[serde(rename = "function_call")]
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

/// Tool definition for the API request
#[derive(Serialize, Debug)]
struct ApiToolDefinition {
    #[serde(rename = "type")]
    tool_type: &'static str, // always "function"
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// The request body for the Responses API
#[derive(Serialize, Debug)]
struct ResponsesRequest {
    model: String,
    input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// Generic SSE event wrapper to extract the type field.
/// The event type is embedded in the JSON as well as in `event:` lines.
#[derive(Deserialize, Debug)]
struct SseEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: String,
}

/// SSE event for response.output_item.added (detects function_call output items)
#[derive(Deserialize, Debug)]
struct OutputItemAddedEvent {
    item: OutputItemData,
}

#[derive(Deserialize, Debug)]
struct OutputItemData {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    call_id: String,
    #[serde(default)]
    name: String,
}

/// SSE event for response.function_call_arguments.done.
/// The `item_id` correlates back to the `output_item.added` event's `item.id`.
#[derive(Deserialize, Debug)]
struct FunctionCallArgsDoneEvent {
    item_id: String,
    arguments: String,
}

/// SSE payload of response.failed and error events.
#[derive(Deserialize, Debug, Default)]
struct ErrorEvent {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<FailedResponse>,
}

#[derive(Deserialize, Debug)]
struct FailedResponse {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: String,
}

impl ErrorEvent {
    fn message(self) -> String {
        self.message
            .or_else(|| self.response.and_then(|r| r.error).map(|e| e.message))
            .unwrap_or_else(|| "response failed".to_string())
    }
}

/// Tracks a tool call across multiple SSE events (added → delta* → done).
struct PendingToolCall {
    call_id: String,
    name: String,
}

// ============================================================================
// Translation Layer
// ============================================================================

/// Converts the system instruction and turn history into Responses API input format.
///
/// Resolved tool invocations become `function_call` + `function_call_output` pairs.
/// Pending invocations are skipped: the API rejects a call without an output.
fn turns_to_input(system_prompt: &str, turns: &[Turn]) -> Vec<InputItem> {
    let mut input = vec![InputItem::Message {
        role: Role::System,
        content: system_prompt.to_string(),
    }];

    for turn in turns {
        match turn.role {
            TurnRole::User => input.push(InputItem::Message {
                role: Role::User,
                content: turn.text.clone(),
            }),
            TurnRole::Assistant => {
                if !turn.text.trim().is_empty() {
                    input.push(InputItem::Message {
                        role: Role::Assistant,
                        content: turn.text.clone(),
                    });
                }
                for inv in &turn.tool_invocations {
                    let InvocationState::Result(payload) = &inv.state else {
                        continue;
                    };
                    let arguments = if inv.arguments.is_null() {
                        "{}".to_string()
                    } else {
                        inv.arguments.to_string()
                    };
                    input.push(InputItem::FunctionCall {
                        call_id: inv.call_id.clone(),
                        name: inv.tool_name.as_str().to_string(),
                        arguments,
                    });
                    input.push(InputItem::FunctionCallOutput {
                        call_id: inv.call_id.clone(),
                        output: payload.to_string(),
                    });
                }
            }
        }
    }
    input
}

/// Converts tool definitions to API format. Returns None if empty (omitted from JSON).
fn tools_to_api(tools: &[ToolDefinition]) -> Option<Vec<ApiToolDefinition>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                tool_type: "function",
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect(),
    )
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// OpenAI API provider using the Responses API
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a new OpenAI provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `base_url` - Optional custom base URL (defaults to OpenAI's API)
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            client: reqwest::Client::new(),
        }
    }

    /// Sends a request to the Responses endpoint and returns the response.
    async fn send_request(
        &self,
        request: &ResponsesRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let json_body = serde_json::to_string(request)
            .map_err(|e| ProviderError::Parse(format!("Request serialization failed: {e}")))?;
        debug!("Raw OpenAI Request: {}", json_body);

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .body(json_body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        debug!("OpenAI response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("OpenAI API error: {} - {}", status, err_body);
            return Err(ProviderError::Api {
                status,
                message: err_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        // The Responses API is used statelessly: the full history goes out every time.
        let responses_request = ResponsesRequest {
            model: request.model.to_string(),
            input: turns_to_input(request.system_prompt, request.turns),
            stream: Some(true),
            tools: tools_to_api(request.tools),
            max_output_tokens: request.max_output_tokens,
        };

        info!(
            "OpenAI Responses API request: model={}, input_count={}",
            request.model,
            responses_request.input.len(),
        );

        let mut response = self.send_request(&responses_request).await?;
        let status = response.status().as_u16();

        let mut lines = LineBuffer::new();
        let mut current_event_type: Option<String> = None;
        let mut event_count = 0usize;

        // Tool call state: tracks concurrent tool calls by item_id
        let mut pending_tools: HashMap<String, PendingToolCall> = HashMap::new();

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?
        {
            debug!("Raw chunk received: {} bytes", chunk.len());
            lines.push(&chunk);

            // Process complete lines from buffer
            while let Some(line) = lines.next_line() {

                if let Some(event_type) = line.strip_prefix("event: ") {
                    current_event_type = Some(event_type.to_string());
                    continue;
                }

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    debug!("Received [DONE] marker");
                    continue;
                }

                let event_type = current_event_type.take().or_else(|| {
                    serde_json::from_str::<SseEvent>(data)
                        .ok()
                        .map(|e| e.event_type)
                });

                match event_type.as_deref() {
                    Some("response.output_text.delta") => {
                        match serde_json::from_str::<SseEvent>(data) {
                            Ok(event) if !event.delta.is_empty() => {
                                event_count += 1;
                                emit(&sender, StreamEvent::TextDelta(event.delta)).await?;
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Malformed text delta dropped: {}", e),
                        }
                    }
                    Some("response.output_item.added") => {
                        if let Ok(event) = serde_json::from_str::<OutputItemAddedEvent>(data)
                            && event.item.item_type == "function_call"
                        {
                            debug!(
                                "Tool call started: {} (item_id={}, call_id={})",
                                event.item.name, event.item.id, event.item.call_id
                            );
                            pending_tools.insert(
                                event.item.id,
                                PendingToolCall {
                                    call_id: event.item.call_id,
                                    name: event.item.name,
                                },
                            );
                        }
                    }
                    Some("response.function_call_arguments.done") => {
                        let event = match serde_json::from_str::<FunctionCallArgsDoneEvent>(data)
                        {
                            Ok(event) => event,
                            Err(e) => {
                                warn!("Malformed arguments.done dropped: {}", e);
                                continue;
                            }
                        };
                        let Some(pending) = pending_tools.remove(&event.item_id) else {
                            warn!("arguments.done for unknown item_id: {}, skipping", event.item_id);
                            continue;
                        };
                        let tool_name = match pending.name.parse::<ToolName>() {
                            Ok(name) => name,
                            Err(e) => {
                                warn!("Dropping call {}: {}", pending.call_id, e);
                                continue;
                            }
                        };
                        let arguments = match serde_json::from_str(&event.arguments) {
                            Ok(args) => args,
                            Err(e) => {
                                warn!("Dropping call {}: bad arguments JSON: {}", pending.call_id, e);
                                continue;
                            }
                        };
                        debug!("Tool call complete: {} (call_id={})", tool_name, pending.call_id);
                        event_count += 1;
                        emit(
                            &sender,
                            StreamEvent::ToolCall {
                                call_id: pending.call_id,
                                tool_name,
                                arguments,
                            },
                        )
                        .await?;
                    }
                    Some("response.completed") => {
                        info!("Stream complete: {} events", event_count);
                        emit(&sender, StreamEvent::End).await?;
                        return Ok(());
                    }
                    Some("response.failed") | Some("error") => {
                        let message = serde_json::from_str::<ErrorEvent>(data)
                            .unwrap_or_default()
                            .message();
                        warn!("OpenAI stream failed: {}", message);
                        return Err(ProviderError::Api { status, message });
                    }
                    Some(other) => {
                        // response.created, response.in_progress, argument deltas, ...
                        debug!("Ignoring event type '{}': {} bytes", other, data.len());
                    }
                    None => {
                        warn!("Could not parse event type from data: {}", data);
                    }
                }
            }
        }

        if lines.pending() > 0 {
            debug!("Discarding {} bytes of unterminated trailing data", lines.pending());
        }
        if !pending_tools.is_empty() {
            warn!(
                "Stream ended with {} unresolved tool call(s): {:?}",
                pending_tools.len(),
                pending_tools.keys().collect::<Vec<_>>()
            );
        }
        info!("Stream ended without response.completed after {} events", event_count);
        Ok(())
    }
}
