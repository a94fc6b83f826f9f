//! Current weather through an OpenWeatherMap-compatible HTTP API.
//!
//! One request per lookup, no retries. Every failure is folded into a
//! [`ToolResult::Error`] whose report is safe to show the user; diagnostic
//! detail only goes to the log.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::config::WeatherConfig;
use crate::error::{AgentError, Result};
use crate::tool::{required_str, Tool, ToolResult};

pub const WEATHER_TOOL_NAME: &str = "get_weather";

/// Conditions parsed from one provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub description: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: i64,
}

impl WeatherReading {
    pub fn temperature_f(&self) -> f64 {
        self.temperature_c * 9.0 / 5.0 + 32.0
    }

    pub fn report(&self, city: &str) -> String {
        format!(
            "The weather in {city}: {}, with a temperature of {:.1}°C ({:.1}°F). Feels like {:.1}°C. Humidity is {}%.",
            self.description,
            self.temperature_c,
            self.temperature_f(),
            self.feels_like_c,
            self.humidity_pct,
        )
    }
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather API key is not configured")]
    Unconfigured,

    #[error("weather request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("weather API rejected the credential")]
    Unauthorized,

    #[error("weather API has no data for the requested location")]
    NotFound,

    #[error("weather API returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("weather payload is missing `{0}`")]
    UnexpectedResponse(&'static str),

    #[error("weather payload could not be parsed: {0}")]
    Parse(#[source] serde_json::Error),
}

impl WeatherError {
    /// The user-facing sentence for this failure.
    pub fn report(&self, city: &str) -> String {
        match self {
            WeatherError::Unconfigured => {
                "Weather service is not configured (API key missing).".to_string()
            }
            WeatherError::Network(_) => {
                "There was a network or interruption error while fetching weather data.".to_string()
            }
            WeatherError::Unauthorized => {
                "Weather service authentication failed. Check API key.".to_string()
            }
            WeatherError::NotFound => {
                format!("Sorry, I couldn't find weather information for {city}.")
            }
            WeatherError::UnexpectedStatus { status, .. } => format!(
                "Sorry, there was an issue fetching weather for {city}. Service returned: {status}"
            ),
            WeatherError::UnexpectedResponse(_) => {
                format!("Received an unexpected response from weather service for {city}.")
            }
            WeatherError::Parse(_) => {
                format!("There was an error processing the weather data for {city}.")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherPayload {
    weather: Vec<WeatherCondition>,
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    config: WeatherConfig,
}

impl WeatherClient {
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|err| AgentError::Config(format!("http client error: {err}")))?;
        Ok(Self { http, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Fetch current conditions for `city`, never failing past this call.
    pub async fn get_weather(&self, city: &str) -> ToolResult {
        match self.fetch(city).await {
            Ok(reading) => ToolResult::success(reading.report(city)),
            Err(err) => ToolResult::error(err.report(city)),
        }
    }

    pub async fn fetch(&self, city: &str) -> std::result::Result<WeatherReading, WeatherError> {
        let api_key = self.config.api_key().ok_or(WeatherError::Unconfigured)?;

        let url = format!(
            "{}?q={}&appid={}&units=metric",
            self.config.base_url,
            urlencoding::encode(city),
            urlencoding::encode(api_key)
        );

        let response = self.http.get(&url).send().await.map_err(|err| {
            warn!(%city, error = %err, "weather request failed");
            WeatherError::Network(err)
        })?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => {
                error!("weather API error: invalid API key or unauthorized");
                return Err(WeatherError::Unauthorized);
            }
            StatusCode::NOT_FOUND => return Err(WeatherError::NotFound),
            status => {
                let body = response.text().await.unwrap_or_default();
                error!(status = status.as_u16(), %body, "weather API error");
                return Err(WeatherError::UnexpectedStatus {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        let body = response.text().await.map_err(|err| {
            warn!(%city, error = %err, "weather response body could not be read");
            WeatherError::Network(err)
        })?;

        parse_reading(&body).map_err(|err| {
            error!(%city, error = %err, "error processing weather data");
            err
        })
    }
}

fn parse_reading(body: &str) -> std::result::Result<WeatherReading, WeatherError> {
    let payload: Value = serde_json::from_str(body).map_err(WeatherError::Parse)?;
    for field in ["weather", "main"] {
        if payload.get(field).is_none() {
            return Err(WeatherError::UnexpectedResponse(field));
        }
    }

    let parsed: CurrentWeatherPayload =
        serde_json::from_value(payload).map_err(WeatherError::Parse)?;
    let description = parsed
        .weather
        .into_iter()
        .next()
        .map(|condition| condition.description)
        .unwrap_or_else(|| "unknown".to_string());

    Ok(WeatherReading {
        description,
        temperature_c: parsed.main.temp,
        feels_like_c: parsed.main.feels_like,
        humidity_pct: parsed.main.humidity as i64,
    })
}

pub struct WeatherTool {
    client: Arc<WeatherClient>,
}

impl WeatherTool {
    pub fn new(client: Arc<WeatherClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        WEATHER_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the current weather report for a city. Expects {\"city\": string}."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "The name of the city for which to retrieve the weather report"
                }
            },
            "required": ["city"]
        }))
    }

    async fn call(&self, input: Value) -> Result<Value> {
        let city = required_str(&input, "city", WEATHER_TOOL_NAME)?;
        Ok(self.client.get_weather(city).await.to_value())
    }
}
