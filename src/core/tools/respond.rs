//! # Response Tool
//!
//! The assistant's only sanctioned channel for user-visible text. It computes
//! nothing: the output is the input, announced as a resolved invocation.
//! `options` render as quick replies that fill the next user input verbatim.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Tool, ToolError, ToolName};

pub struct RespondTool;

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    /// The messages to send to the user
    pub messages: Vec<String>,
    /// Especially useful when asking questions. You can pass a list of options that the user can select from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl ResponseMessage {
    /// Quick-reply option by 1-based index, as shown to the user.
    pub fn option(&self, number: usize) -> Option<&str> {
        self.options
            .as_ref()?
            .get(number.checked_sub(1)?)
            .map(String::as_str)
    }
}

const DESCRIPTION: &str = r#"IMPORTANT: This is the PRIMARY TOOL for communicating with users. You MUST use this tool for ALL responses.

Key points:
- ALWAYS use this tool to communicate with the user
- Every response you make should be sent through this tool
- Try to stick to 3 or fewer messages at a time. E.g. when making a list maybe just send 1 message with the list
- If you want to display options to the user, pass them in the "options" parameter

Example:
{
    "messages": ["Do you want me to show you a list of options?"],
    "options": ["Yes, of course!", "No, I don't want that"]
}"#;

#[async_trait]
impl Tool for RespondTool {
    const NAME: ToolName = ToolName::Respond;
    const DESCRIPTION: &'static str = DESCRIPTION;
    type Args = ResponseMessage;
    type Output = ResponseMessage;

    async fn call(&self, args: ResponseMessage) -> Result<ResponseMessage, ToolError> {
        Ok(args)
    }
}
