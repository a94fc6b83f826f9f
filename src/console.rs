//! Interactive `You > ` / `Agent > ` loop on top of a [`Runner`].

use std::sync::OnceLock;

use futures::StreamExt;
use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::runner::{EventStream, Runner};
use crate::session::Session;

pub const USER_PROMPT: &str = "You > ";
pub const AGENT_PROMPT: &str = "Agent > ";
pub const NO_RESPONSE: &str = "No response from agent.";
pub const SESSION_ENDED: &str = "Session ended.";

static FUNCTION_CALL_MARKER: OnceLock<Regex> = OnceLock::new();
static TRAILING_CALL_FRAGMENT: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("static pattern compiles"))
}

/// Scrub tool-call markup that leaked into the rendered reply.
///
/// Best effort only; returns `None` when nothing readable is left.
pub fn clean_response(raw: &str) -> Option<String> {
    let text = pattern(&FUNCTION_CALL_MARKER, r"Function Call:.*?\}\}").replace_all(raw, "");
    let text = pattern(&TRAILING_CALL_FRAGMENT, r"FunctionCall:.*?\]\}").replace_all(&text, "");
    let text = text
        .replace("report=", "")
        .replace("{status=success, ", "")
        .replace('}', "");

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Drain a turn's events into the text shown to the user.
pub async fn collect_reply(mut events: EventStream) -> Result<String> {
    let mut raw = String::new();
    while let Some(event) = events.next().await {
        raw.push_str(&event?.stringify_content());
    }
    Ok(clean_response(&raw).unwrap_or_else(|| NO_RESPONSE.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Processing,
    Stopped,
}

pub struct ConversationLoop<'a, R, W> {
    runner: &'a Runner,
    user_id: String,
    session_id: String,
    input: R,
    output: W,
    state: LoopState,
}

impl<'a, R, W> ConversationLoop<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(runner: &'a Runner, session: &Session, input: R, output: W) -> Self {
        Self {
            runner,
            user_id: session.user_id.clone(),
            session_id: session.id.clone(),
            input,
            output,
            state: LoopState::AwaitingInput,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Serve turns until `quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        while self.state != LoopState::Stopped {
            self.write(&format!("\n{USER_PROMPT}")).await?;

            let mut line = String::new();
            if self.input.read_line(&mut line).await? == 0 {
                self.state = LoopState::Stopped;
                break;
            }
            let line = line.trim_end_matches(['\n', '\r']);

            if line.eq_ignore_ascii_case("quit") {
                self.state = LoopState::Stopped;
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            self.state = LoopState::Processing;
            self.write(&format!("\n{AGENT_PROMPT}")).await?;
            let events = self.runner.run(&self.user_id, &self.session_id, line);
            let reply = collect_reply(events).await?;
            self.write(&format!("{reply}\n")).await?;
            self.state = LoopState::AwaitingInput;
        }

        self.write(&format!("{SESSION_ENDED}\n")).await
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::agent::build_time_weather_agent;
    use crate::config::AppConfig;
    use crate::StubModel;

    async fn run_script(model: Arc<StubModel>, script: &str) -> (Result<()>, String, LoopState) {
        let agent = build_time_weather_agent(&AppConfig::default(), model).unwrap();
        let runner = Runner::new(agent);
        let session = runner.create_session("student").await;

        let mut console = ConversationLoop::new(&runner, &session, script.as_bytes(), Vec::new());
        let outcome = console.run().await;
        let state = console.state();
        let output = String::from_utf8(console.into_output()).unwrap();
        (outcome, output, state)
    }

    #[test]
    fn strips_function_call_markers() {
        let raw = "Function Call: FunctionCall{name=get_weather, args={city=Paris}}The weather in Paris is sunny.";
        assert_eq!(
            clean_response(raw).as_deref(),
            Some("The weather in Paris is sunny.")
        );
    }

    #[test]
    fn strips_leaked_result_fields() {
        let raw = "{status=success, report=The current time in Oslo is 10:00.}";
        assert_eq!(
            clean_response(raw).as_deref(),
            Some("The current time in Oslo is 10:00.")
        );
        let raw = "Sure. FunctionCall: {name=get_weather, args=[Paris]} Done";
        assert_eq!(clean_response(raw).as_deref(), Some("Sure.  Done"));
    }

    #[test]
    fn nothing_left_means_none() {
        assert_eq!(clean_response("   "), None);
        assert_eq!(
            clean_response("Function Call: FunctionCall{name=x, args={}}}"),
            None
        );
    }

    #[tokio::test]
    async fn blank_lines_and_quit_never_reach_the_agent() {
        let model = StubModel::new(Vec::new());
        let (outcome, output, state) =
            run_script(model.clone(), "   \n\t\n\nQuIt\nignored\n").await;

        assert!(outcome.is_ok());
        assert_eq!(state, LoopState::Stopped);
        assert_eq!(model.calls(), 0);
        assert!(output.ends_with("Session ended.\n"));
        assert!(!output.contains(AGENT_PROMPT));
    }

    #[tokio::test]
    async fn end_of_input_stops_the_loop() {
        let model = StubModel::new(Vec::new());
        let (outcome, output, state) = run_script(model.clone(), "").await;

        assert!(outcome.is_ok());
        assert_eq!(state, LoopState::Stopped);
        assert_eq!(model.calls(), 0);
        assert!(output.contains(SESSION_ENDED));
    }

    #[tokio::test]
    async fn renders_cleaned_agent_reply() {
        let model = StubModel::new(vec![
            r#"{"action":"call_tool","name":"get_current_time","arguments":{"city_or_zone":"UTC"}}"#.into(),
            r#"{"action":"respond","content":"It is noon somewhere."}"#.into(),
        ]);
        let (outcome, output, _) = run_script(model.clone(), "time in UTC?\nquit\n").await;

        assert!(outcome.is_ok());
        assert_eq!(model.calls(), 2);
        assert!(output.contains("Agent > It is noon somewhere.\n"));
        assert!(!output.contains("Function Call"));
    }

    #[tokio::test]
    async fn empty_reply_shows_notice() {
        let model = StubModel::new(vec![r#"{"action":"respond","content":""}"#.into()]);
        let (outcome, output, _) = run_script(model, "hello\nquit\n").await;

        assert!(outcome.is_ok());
        assert!(output.contains(&format!("{AGENT_PROMPT}{NO_RESPONSE}")));
    }

    #[tokio::test]
    async fn runtime_failure_ends_the_loop_with_an_error() {
        let model = StubModel::new(Vec::new());
        let (outcome, _, state) = run_script(model, "hello\n").await;
        assert!(outcome.is_err());
        assert_eq!(state, LoopState::Processing);
    }
}
