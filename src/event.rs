use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{ToolCall, ToolOutput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventContent {
    Text { text: String },
    FunctionCall { call: ToolCall },
    FunctionResponse { output: ToolOutput },
}

/// One incremental fragment of an agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub author: String,
    pub content: EventContent,
}

impl Event {
    pub fn text(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: EventContent::Text { text: text.into() },
        }
    }

    pub fn function_call(author: impl Into<String>, call: ToolCall) -> Self {
        Self {
            author: author.into(),
            content: EventContent::FunctionCall { call },
        }
    }

    pub fn function_response(author: impl Into<String>, output: ToolOutput) -> Self {
        Self {
            author: author.into(),
            content: EventContent::FunctionResponse { output },
        }
    }

    /// True for the natural-language reply that closes a turn.
    pub fn is_final_response(&self) -> bool {
        matches!(self.content, EventContent::Text { .. })
    }

    /// Renderable text for this event.
    ///
    /// Function calls render as `Function Call: FunctionCall{name=.., args={..}}`
    /// and function responses render as nothing.
    pub fn stringify_content(&self) -> String {
        match &self.content {
            EventContent::Text { text } => text.clone(),
            EventContent::FunctionCall { call } => format!(
                "Function Call: FunctionCall{{name={}, args={}}}",
                call.name,
                render_value(&call.arguments)
            ),
            EventContent::FunctionResponse { .. } => String::new(),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{key}={}", render_value(value)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", items.join(", "))
        }
        other => other.to_string(),
    }
}
