//! # Weather Tool
//!
//! Echoes the requested location back with a fixed synthetic forecast after
//! a delay. It exists to exercise the pending → result path end to end.

use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Tool, ToolError, ToolName};

pub const DEFAULT_WEATHER_DELAY: Duration = Duration::from_millis(2000);

pub struct WeatherTool {
    delay: Duration,
}

impl WeatherTool {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new(DEFAULT_WEATHER_DELAY)
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct WeatherRequest {
    /// The location to get the weather for
    pub location: String,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub weather: String,
    /// Degrees Fahrenheit.
    pub temperature: i64,
    pub location: String,
}

#[async_trait]
impl Tool for WeatherTool {
    const NAME: ToolName = ToolName::DisplayWeather;
    const DESCRIPTION: &'static str = "Display the weather for a location";
    type Args = WeatherRequest;
    type Output = WeatherReport;

    async fn call(&self, args: WeatherRequest) -> Result<WeatherReport, ToolError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(WeatherReport {
            weather: "Sunny".into(),
            temperature: 75,
            location: args.location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_weather_echoes_location() {
        let report = WeatherTool::new(Duration::ZERO)
            .call(WeatherRequest {
                location: "Boston".into(),
            })
            .await
            .unwrap();
        assert_eq!(report.location, "Boston");
        assert_eq!(report.weather, "Sunny");
        assert_eq!(report.temperature, 75);
    }

    #[tokio::test]
    async fn test_weather_waits_for_delay() {
        let start = std::time::Instant::now();
        WeatherTool::new(Duration::from_millis(20))
            .call(WeatherRequest {
                location: "Oslo".into(),
            })
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_report_serializes_all_fields() {
        let report = WeatherReport {
            weather: "Sunny".into(),
            temperature: 75,
            location: "Boston".into(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "weather": "Sunny", "temperature": 75, "location": "Boston" })
        );
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"weather":"Sunny","temperature":75,"location":"Boston"}"#
        );
    }
}
