use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::agent::Agent;
use crate::error::Result;
use crate::event::Event;
use crate::session::{InMemorySessionService, Session};

/// Events of one turn, in the order the agent produced them. A failed turn
/// ends with a single `Err`.
pub type EventStream = UnboundedReceiverStream<Result<Event>>;

/// Drives an [`Agent`] against sessions held in memory.
pub struct Runner {
    agent: Arc<Agent>,
    app_name: String,
    sessions: Arc<InMemorySessionService>,
}

impl Runner {
    pub fn new(agent: Agent) -> Self {
        let app_name = agent.name().to_string();
        Self {
            agent: Arc::new(agent),
            app_name,
            sessions: Arc::new(InMemorySessionService::new()),
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn session_service(&self) -> &InMemorySessionService {
        &self.sessions
    }

    pub async fn create_session(&self, user_id: impl Into<String>) -> Session {
        self.sessions
            .create_session(self.app_name.clone(), user_id)
            .await
    }

    /// Start a turn for `message` and return its event stream.
    ///
    /// The turn runs on a spawned task; its messages are appended to the
    /// session once the agent has replied.
    pub fn run(&self, user_id: &str, session_id: &str, message: impl Into<String>) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let agent = Arc::clone(&self.agent);
        let sessions = Arc::clone(&self.sessions);
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        let message = message.into();

        tokio::spawn(async move {
            debug!(%session_id, "starting turn");
            let outcome = async {
                let session = sessions.get_session(&user_id, &session_id).await?;
                let turn = agent
                    .run_turn(session.memory.as_slice(), message, |event| {
                        let _ = tx.send(Ok(event));
                    })
                    .await?;
                sessions.append(&session_id, turn).await
            }
            .await;

            if let Err(err) = outcome {
                let _ = tx.send(Err(err));
            }
        });

        UnboundedReceiverStream::new(rx)
    }
}
