//! Current local time for a city or timezone identifier.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::Result;
use crate::location::TimezoneCatalog;
use crate::tool::{required_str, Tool, ToolResult};

pub const TIME_TOOL_NAME: &str = "get_current_time";

/// Look up the wall-clock time in `city_or_zone` right now.
pub fn current_time(catalog: &TimezoneCatalog, city_or_zone: &str) -> ToolResult {
    current_time_at(catalog, city_or_zone, Utc::now())
}

/// Same as [`current_time`], evaluated at a fixed instant.
pub fn current_time_at(
    catalog: &TimezoneCatalog,
    city_or_zone: &str,
    now: DateTime<Utc>,
) -> ToolResult {
    match catalog.resolve_tz(city_or_zone) {
        Some(tz) => {
            let local = now.with_timezone(&tz);
            ToolResult::success(format!(
                "The current time in {city_or_zone} is {}.",
                local.format("%H:%M")
            ))
        }
        None => ToolResult::error(format!(
            "Sorry, I don't have timezone information for {city_or_zone}."
        )),
    }
}

pub struct CurrentTimeTool {
    catalog: Arc<TimezoneCatalog>,
}

impl CurrentTimeTool {
    pub fn new(catalog: Arc<TimezoneCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        TIME_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the current local time (24-hour HH:MM) in a city or timezone. Expects {\"city_or_zone\": string}."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "city_or_zone": {
                    "type": "string",
                    "description": "The name of the city or zone id (e.g., 'London', 'New York', 'Europe/Paris', 'UTC') for which to retrieve the current time"
                }
            },
            "required": ["city_or_zone"]
        }))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let city_or_zone = required_str(&input, "city_or_zone", TIME_TOOL_NAME)?;
        Ok(current_time(&self.catalog, city_or_zone).to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::error::AgentError;
    use crate::tool::ToolStatus;

    fn noon_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn formats_time_in_resolved_zone() {
        let catalog = TimezoneCatalog::system();
        let result = current_time_at(&catalog, "Tokyo", noon_utc());
        assert_eq!(result.status(), ToolStatus::Success);
        assert_eq!(result.report(), "The current time in Tokyo is 21:00.");

        let result = current_time_at(&catalog, "Europe/Paris", noon_utc());
        assert_eq!(result.report(), "The current time in Europe/Paris is 13:00.");
    }

    #[test]
    fn echoes_original_input_on_success() {
        let catalog = TimezoneCatalog::system();
        let result = current_time_at(&catalog, "  New York ", noon_utc());
        assert!(result.is_success());
        assert_eq!(result.report(), "The current time in   New York  is 07:00.");
    }

    #[test]
    fn unknown_city_reports_original_input() {
        let catalog = TimezoneCatalog::system();
        let result = current_time(&catalog, "Atlantis, Océan");
        assert_eq!(result.status(), ToolStatus::Error);
        assert!(result.report().contains("Atlantis, Océan"));
    }

    #[tokio::test]
    async fn tool_wraps_result_as_json() {
        let tool = CurrentTimeTool::new(Arc::new(TimezoneCatalog::system()));
        let value = tool.call(json!({"city_or_zone": "UTC"})).await.unwrap();
        assert_eq!(value["status"], "success");
        assert!(value["report"]
            .as_str()
            .unwrap()
            .starts_with("The current time in UTC is "));
    }

    #[tokio::test]
    async fn tool_rejects_missing_argument() {
        let tool = CurrentTimeTool::new(Arc::new(TimezoneCatalog::system()));
        let err = tool.call(json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
    }
}
