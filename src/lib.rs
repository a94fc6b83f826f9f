//! A conversational agent that answers time and weather questions for one or
//! more cities.
//!
//! The crate provides:
//! - City/timezone normalization against the IANA catalog (`normalize`, `TimezoneCatalog`).
//! - Two tools with a shared `ToolResult` contract: current time and current weather.
//! - A small agent runtime (`Agent`, `Runner`, sessions, event streams) over a
//!   `LanguageModel` abstraction.
//! - The interactive console loop (`ConversationLoop`).

mod agent;
mod config;
mod console;
mod error;
mod event;
mod llm;
mod location;
mod message;
mod runner;
mod session;
mod tool;
pub mod tools;

pub use agent::{
    build_time_weather_agent, Agent, AGENT_DESCRIPTION, AGENT_INSTRUCTION, AGENT_NAME,
};
pub use config::{AppConfig, ModelConfig, SessionConfig, WeatherConfig, DEFAULT_WEATHER_URL};
pub use console::{clean_response, collect_reply, ConversationLoop, LoopState, NO_RESPONSE};
pub use error::{AgentError, Result};
pub use event::{Event, EventContent};
pub use llm::{model_from_config, GeminiClient, LanguageModel, ModelCompletion, OpenAIClient, StubModel};
pub use location::{normalize, TimezoneCatalog};
pub use message::{Message, Role, ToolCall, ToolOutput};
pub use runner::{EventStream, Runner};
pub use session::{ConversationMemory, InMemorySessionService, Session};
pub use tool::{Tool, ToolDescription, ToolRegistry, ToolResult, ToolStatus};
