//! The tools the agent can call.
//!
//! - Time: current local time for a city or timezone identifier
//! - Weather: current conditions from an OpenWeatherMap-compatible API

pub mod time;
pub mod weather;

use std::sync::Arc;

use crate::location::TimezoneCatalog;
use crate::tool::ToolRegistry;

pub use time::{current_time, current_time_at, CurrentTimeTool, TIME_TOOL_NAME};
pub use weather::{WeatherClient, WeatherError, WeatherReading, WeatherTool, WEATHER_TOOL_NAME};

/// Registry holding both the time and the weather tool.
pub fn time_weather_toolkit(
    catalog: Arc<TimezoneCatalog>,
    weather: Arc<WeatherClient>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CurrentTimeTool::new(catalog));
    registry.register(WeatherTool::new(weather));
    registry
}
