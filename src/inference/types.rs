use serde::{Deserialize, Serialize};

use crate::core::tools::ToolName;

/// A tool the model can call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// One decoded event of a streamed response.
///
/// Events for a request arrive in transport order and end with exactly one `End`
/// (unless the transport fails first).
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Append to the current assistant turn's text.
    TextDelta(String),
    /// The model requested a tool; the invocation starts out pending.
    ToolCall {
        call_id: String,
        tool_name: ToolName,
        arguments: serde_json::Value,
    },
    /// A requested tool resolved. `tool_name` is set when the transport
    /// delivers the call and its result together.
    ToolResult {
        call_id: String,
        tool_name: Option<ToolName>,
        payload: serde_json::Value,
    },
    End,
}

impl StreamEvent {
    pub fn is_end(&self) -> bool {
        matches!(self, StreamEvent::End)
    }
}
