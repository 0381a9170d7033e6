//! # Tool Registry
//!
//! Tools the assistant may invoke mid-response. Each tool is a unit struct
//! implementing [`Tool`] with typed, schema-described arguments and output.
//! The registry erases those types so the route can dispatch by [`ToolName`]
//! and the stream consumer only ever sees the generic pending → result lifecycle.

mod respond;
mod weather;

pub use respond::{RespondTool, ResponseMessage};
pub use weather::{DEFAULT_WEATHER_DELAY, WeatherReport, WeatherRequest, WeatherTool};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::inference::ToolDefinition;

// ============================================================================
// Tool identity
// ============================================================================

/// Stable identity of every capability the assistant can call.
///
/// The wire name is fixed here once; renderers branch on the variant, never on strings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    #[serde(rename = "displayWeather")]
    DisplayWeather,
    #[serde(rename = "responseTool", alias = "textMessage")]
    Respond,
}

impl ToolName {
    pub const ALL: [ToolName; 2] = [ToolName::DisplayWeather, ToolName::Respond];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::DisplayWeather => "displayWeather",
            ToolName::Respond => "responseTool",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "displayWeather" => Ok(ToolName::DisplayWeather),
            "responseTool" | "textMessage" => Ok(ToolName::Respond),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ToolError {
    UnknownTool(String),
    InvalidArguments(String),
    Failed(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::UnknownTool(name) => write!(f, "unknown tool: {name}"),
            ToolError::InvalidArguments(msg) => write!(f, "invalid arguments: {msg}"),
            ToolError::Failed(msg) => write!(f, "tool failed: {msg}"),
        }
    }
}

impl std::error::Error for ToolError {}

// ============================================================================
// Tool trait
// ============================================================================

#[async_trait]
pub trait Tool: Send + Sync + 'static {
    const NAME: ToolName;
    const DESCRIPTION: &'static str;
    type Args: DeserializeOwned + JsonSchema + Send;
    type Output: Serialize + JsonSchema + Send;

    async fn call(&self, args: Self::Args) -> Result<Self::Output, ToolError>;
}

/// Object-safe view of a [`Tool`] used by the registry.
#[async_trait]
trait ErasedTool: Send + Sync {
    fn name(&self) -> ToolName;
    fn definition(&self) -> ToolDefinition;
    fn output_schema(&self) -> serde_json::Value;
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

#[async_trait]
impl<T: Tool> ErasedTool for T {
    fn name(&self) -> ToolName {
        T::NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: T::NAME.as_str().to_string(),
            description: T::DESCRIPTION.to_string(),
            parameters: schema_of::<T::Args>(),
        }
    }

    fn output_schema(&self) -> serde_json::Value {
        schema_of::<T::Output>()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: T::Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let output = self.call(args).await?;
        serde_json::to_value(output).map_err(|e| ToolError::Failed(e.to_string()))
    }
}

/// JSON Schema for `S`, without the root-level `$schema`/`title` noise providers reject.
fn schema_of<S: JsonSchema>() -> serde_json::Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(S))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn ErasedTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any earlier tool with the same name.
    pub fn register<T: Tool>(&mut self, tool: T) {
        self.tools.retain(|t| t.name() != T::NAME);
        self.tools.push(Box::new(tool));
    }

    pub fn names(&self) -> Vec<ToolName> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn output_schema(&self, name: ToolName) -> Option<serde_json::Value> {
        self.find(name).map(|t| t.output_schema())
    }

    fn find(&self, name: ToolName) -> Option<&dyn ErasedTool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// Resolves one invocation. Arguments are validated against the tool's typed input.
    pub async fn execute(
        &self,
        name: ToolName,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let tool = self
            .find(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        debug!("Executing tool {} with {}", name, arguments);
        let result = tool.execute(arguments).await;
        if let Err(ref e) = result {
            warn!("Tool {} failed: {}", name, e);
        }
        result
    }
}

/// The registry the assistant is offered by default: weather lookup and the response channel.
pub fn default_registry(weather_delay: Duration) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(WeatherTool::new(weather_delay));
    registry.register(RespondTool);
    registry
}

// ============================================================================
// Typed payload views
// ============================================================================

/// A resolved tool payload decoded into its output type, for renderers.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Weather(WeatherReport),
    Response(ResponseMessage),
}

impl ToolPayload {
    pub fn parse(name: ToolName, payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        match name {
            ToolName::DisplayWeather => {
                serde_json::from_value(payload.clone()).map(ToolPayload::Weather)
            }
            ToolName::Respond => serde_json::from_value(payload.clone()).map(ToolPayload::Response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        default_registry(Duration::ZERO)
    }

    #[test]
    fn test_tool_name_round_trip() {
        for name in ToolName::ALL {
            assert_eq!(name.as_str().parse::<ToolName>(), Ok(name));
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, format!("\"{}\"", name.as_str()));
        }
    }

    #[test]
    fn test_legacy_text_message_alias() {
        assert_eq!("textMessage".parse::<ToolName>(), Ok(ToolName::Respond));
        let parsed: ToolName = serde_json::from_str("\"textMessage\"").unwrap();
        assert_eq!(parsed, ToolName::Respond);
    }

    #[test]
    fn test_unknown_tool_name() {
        assert_eq!(
            "launchRocket".parse::<ToolName>(),
            Err(ToolError::UnknownTool("launchRocket".into()))
        );
    }

    #[test]
    fn test_definitions_describe_both_tools() {
        let defs = registry().definitions();
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["displayWeather", "responseTool"]);

        let weather = &defs[0];
        assert_eq!(weather.parameters["type"], "object");
        assert!(weather.parameters["properties"]["location"].is_object());
        assert_eq!(weather.parameters["required"], json!(["location"]));
        assert!(weather.parameters.get("$schema").is_none());

        let respond = &defs[1];
        assert!(respond.parameters["properties"]["messages"].is_object());
        assert!(respond.parameters["properties"]["options"].is_object());
        assert_eq!(respond.parameters["required"], json!(["messages"]));
    }

    #[test]
    fn test_output_schema_for_weather() {
        let schema = registry().output_schema(ToolName::DisplayWeather).unwrap();
        let props = &schema["properties"];
        assert!(props["weather"].is_object());
        assert!(props["temperature"].is_object());
        assert!(props["location"].is_object());
    }

    #[tokio::test]
    async fn test_execute_validates_arguments() {
        let err = registry()
            .execute(ToolName::DisplayWeather, json!({ "city": "Boston" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_execute_weather_returns_exact_payload() {
        let payload = registry()
            .execute(ToolName::DisplayWeather, json!({ "location": "Boston" }))
            .await
            .unwrap();
        assert_eq!(
            payload,
            json!({ "weather": "Sunny", "temperature": 75, "location": "Boston" })
        );
    }

    #[tokio::test]
    async fn test_execute_unregistered_tool() {
        let err = ToolRegistry::new()
            .execute(ToolName::Respond, json!({ "messages": [] }))
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("responseTool".into()));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = registry();
        registry.register(RespondTool);
        assert_eq!(registry.names(), vec![ToolName::DisplayWeather, ToolName::Respond]);
    }

    #[test]
    fn test_payload_parse() {
        let weather = ToolPayload::parse(
            ToolName::DisplayWeather,
            &json!({ "weather": "Sunny", "temperature": 75, "location": "Boston" }),
        )
        .unwrap();
        assert_eq!(
            weather,
            ToolPayload::Weather(WeatherReport {
                weather: "Sunny".into(),
                temperature: 75,
                location: "Boston".into(),
            })
        );

        let response =
            ToolPayload::parse(ToolName::Respond, &json!({ "messages": ["a", "b"] })).unwrap();
        assert_eq!(
            response,
            ToolPayload::Response(ResponseMessage {
                messages: vec!["a".into(), "b".into()],
                options: None,
            })
        );

        assert!(ToolPayload::parse(ToolName::Respond, &json!({ "nope": 1 })).is_err());
    }
}
