use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Success => f.write_str("success"),
            ToolStatus::Error => f.write_str("error"),
        }
    }
}

/// Outcome of a single time or weather lookup.
///
/// Serializes as `{"status": "success" | "error", "report": "..."}`, which is
/// the shape the model sees. Callers decide success from the variant, never
/// from the report text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Success { report: String },
    Error { report: String },
}

impl ToolResult {
    pub fn success(report: impl Into<String>) -> Self {
        ToolResult::Success {
            report: report.into(),
        }
    }

    pub fn error(report: impl Into<String>) -> Self {
        ToolResult::Error {
            report: report.into(),
        }
    }

    pub fn status(&self) -> ToolStatus {
        match self {
            ToolResult::Success { .. } => ToolStatus::Success,
            ToolResult::Error { .. } => ToolStatus::Error,
        }
    }

    pub fn report(&self) -> &str {
        match self {
            ToolResult::Success { report } | ToolResult::Error { report } => report,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == ToolStatus::Success
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "status": self.status().to_string(),
            "report": self.report(),
        })
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Optionally return a JSON Schema-like object describing the expected arguments.
    fn parameters(&self) -> Option<Value> {
        None
    }

    async fn call(&self, input: Value) -> Result<Value>;
}

/// Static description of a tool that can be handed to a model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Option<Value>,
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn describe(&self) -> Vec<ToolDescription> {
        let mut descriptions: Vec<ToolDescription> = self
            .tools
            .values()
            .map(|tool| ToolDescription {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();

        descriptions.sort_by(|a, b| a.name.cmp(&b.name));
        descriptions
    }

    pub async fn call(&self, name: &str, input: Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        tool.call(input)
            .await
            .map_err(|source| AgentError::ToolInvocation {
                name: name.to_string(),
                source: Box::new(source),
            })
    }
}

/// Pull a required string argument out of a tool's JSON input.
pub(crate) fn required_str<'a>(input: &'a Value, field: &str, tool: &str) -> Result<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::Protocol(format!("missing `{field}` for {tool}")))
}
