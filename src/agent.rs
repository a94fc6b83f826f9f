use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::{AgentError, Result};
use crate::event::Event;
use crate::llm::LanguageModel;
use crate::location::TimezoneCatalog;
use crate::message::{Message, ToolOutput};
use crate::tool::{ToolRegistry, ToolResult};
use crate::tools::{time_weather_toolkit, WeatherClient};

pub const AGENT_NAME: &str = "multi_tool_agent";

pub const AGENT_DESCRIPTION: &str =
    "Agent to answer questions about the time and weather in multiple cities.";

pub const AGENT_INSTRUCTION: &str = "You are a helpful agent who can answer user questions about the time and weather \
in one or multiple cities. When asked about multiple cities, provide information for each city separately. \
When reporting time or weather, use the city name as provided in the query.";

/// An agent that alternates between the model and registered tools until the
/// model produces a plain-text reply.
pub struct Agent {
    name: String,
    description: String,
    instruction: String,
    model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    max_steps: usize,
}

impl Agent {
    pub fn new(name: impl Into<String>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: "You are a helpful agent.".to_string(),
            model,
            tools: ToolRegistry::new(),
            max_steps: 6,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one user turn on top of `history`.
    ///
    /// Every event is handed to `emit` as soon as it happens. Returns the
    /// messages this turn added, starting with the user message.
    pub async fn run_turn<F>(
        &self,
        history: &[Message],
        user_input: impl Into<String>,
        mut emit: F,
    ) -> Result<Vec<Message>>
    where
        F: FnMut(Event) + Send,
    {
        let mut turn = vec![Message::user(user_input)];
        let tools = self.tools.describe();

        for _ in 0..self.max_steps {
            let mut messages = Vec::with_capacity(history.len() + turn.len() + 1);
            messages.push(Message::system(&self.instruction));
            messages.extend(history.iter().cloned());
            messages.extend(turn.iter().cloned());

            let completion = self.model.complete_chat(&messages, &tools).await?;

            if completion.tool_calls.is_empty() {
                // Empty replies stay out of the history.
                if let Some(content) = completion.content.filter(|text| !text.trim().is_empty()) {
                    emit(Event::text(&self.name, content.clone()));
                    turn.push(Message::assistant(content));
                }
                return Ok(turn);
            }

            if let Some(text) = completion.content.filter(|text| !text.trim().is_empty()) {
                emit(Event::text(&self.name, text.clone()));
                turn.push(Message::assistant(text));
            }

            for call in completion.tool_calls {
                debug!(agent = %self.name, tool = %call.name, arguments = %call.arguments, "dispatching tool call");
                emit(Event::function_call(&self.name, call.clone()));
                turn.push(Message::tool_call(call.clone()));

                let output = match self.tools.call(&call.name, call.arguments.clone()).await {
                    Ok(value) => value,
                    Err(err) => {
                        warn!(tool = %call.name, error = %err, "tool call failed");
                        ToolResult::error(format!("Tool `{}` could not run: {err}", call.name))
                            .to_value()
                    }
                };
                let output = ToolOutput {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    output,
                };
                emit(Event::function_response(&self.name, output.clone()));
                turn.push(Message::tool(output));
            }
        }

        Err(AgentError::Protocol(
            "Agent reached the step limit without returning a response".into(),
        ))
    }
}

/// Build the time-and-weather agent around `model`.
pub fn build_time_weather_agent(config: &AppConfig, model: Arc<dyn LanguageModel>) -> Result<Agent> {
    let catalog = Arc::new(TimezoneCatalog::system());
    let weather = Arc::new(WeatherClient::new(config.weather.clone())?);
    Ok(Agent::new(AGENT_NAME, model)
        .with_description(AGENT_DESCRIPTION)
        .with_instruction(AGENT_INSTRUCTION)
        .with_tools(time_weather_toolkit(catalog, weather)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::ModelConfig;
    use crate::event::EventContent;
    use crate::llm::GeminiClient;
    use crate::message::Role;
    use crate::StubModel;

    fn agent_with(responses: Vec<&str>) -> (Arc<StubModel>, Agent) {
        let model = StubModel::new(responses.into_iter().map(String::from).collect());
        let agent = build_time_weather_agent(&AppConfig::default(), model.clone()).unwrap();
        (model, agent)
    }

    #[tokio::test]
    async fn returns_llm_response_without_tools() {
        let (model, agent) = agent_with(vec![r#"{"action":"respond","content":"Hello!"}"#]);
        let mut events = Vec::new();

        let turn = agent.run_turn(&[], "hi", |e| events.push(e)).await.unwrap();

        assert_eq!(turn.len(), 2);
        assert_eq!(turn[1].content, "Hello!");
        assert_eq!(events, vec![Event::text(AGENT_NAME, "Hello!")]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn empty_gemini_reply_is_not_replayed_on_the_next_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let model = GeminiClient::from_config(&ModelConfig {
            provider: "gemini".into(),
            model: "gemini-2.0-flash".into(),
            api_key: Some("g-key".into()),
            base_url: Some(server.uri()),
            timeout_secs: 5,
        })
        .unwrap();
        let agent = build_time_weather_agent(&AppConfig::default(), Arc::new(model)).unwrap();

        let mut events = Vec::new();
        let first = agent.run_turn(&[], "hi", |e| events.push(e)).await.unwrap();
        assert_eq!(first, vec![Message::user("hi")]);
        assert!(events.is_empty());

        let second = agent.run_turn(&first, "again", |_| {}).await.unwrap();
        assert_eq!(second, vec![Message::user("again")]);

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(
            body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "hi"}]},
                {"role": "user", "parts": [{"text": "again"}]}
            ])
        );
    }

    #[tokio::test]
    async fn executes_time_tool_then_replies() {
        let (_, agent) = agent_with(vec![
            r#"{"action":"call_tool","name":"get_current_time","arguments":{"city_or_zone":"UTC"}}"#,
            r#"{"action":"respond","content":"Done."}"#,
        ]);
        let mut events = Vec::new();

        let turn = agent
            .run_turn(&[], "what time is it in UTC?", |e| events.push(e))
            .await
            .unwrap();

        assert_eq!(turn.len(), 4);
        assert_eq!(turn[2].role, Role::Tool);
        assert_eq!(events.len(), 3);
        match &events[1].content {
            EventContent::FunctionResponse { output } => {
                assert_eq!(output.output["status"], "success");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(events[2].is_final_response());
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_back_to_the_model() {
        let (_, agent) = agent_with(vec![
            r#"{"action":"call_tool","name":"get_tides","arguments":{}}"#,
            r#"{"action":"respond","content":"I can't do tides."}"#,
        ]);

        let turn = agent.run_turn(&[], "tides?", |_| {}).await.unwrap();

        let output = turn[2].tool_output.as_ref().unwrap();
        assert_eq!(output.output["status"], "error");
        assert_eq!(turn.last().unwrap().content, "I can't do tides.");
    }

    #[tokio::test]
    async fn stops_at_step_limit() {
        let call = r#"{"action":"call_tool","name":"get_current_time","arguments":{"city_or_zone":"UTC"}}"#;
        let model = StubModel::new(vec![call.into(), call.into()]);
        let agent = build_time_weather_agent(&AppConfig::default(), model)
            .unwrap()
            .with_max_steps(2);

        let err = agent.run_turn(&[], "loop", |_| {}).await.unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
    }

    #[test]
    fn registers_both_tools() {
        let (_, agent) = agent_with(vec![]);
        assert_eq!(agent.tools().names(), vec!["get_current_time", "get_weather"]);
        assert_eq!(agent.name(), AGENT_NAME);
        assert_eq!(agent.description(), AGENT_DESCRIPTION);
    }
}
