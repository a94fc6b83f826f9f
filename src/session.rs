use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::Message;

/// In-memory transcript storage.
#[derive(Default, Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
}

impl ConversationMemory {
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// One conversation: an id plus the turns exchanged so far.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub memory: ConversationMemory,
}

#[derive(Default)]
pub struct InMemorySessionService {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_session(
        &self,
        app_name: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Session {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            app_name: app_name.into(),
            user_id: user_id.into(),
            memory: ConversationMemory::default(),
        };
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        session
    }

    /// Snapshot of a session owned by `user_id`.
    pub async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Session> {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(session) if session.user_id == user_id => Ok(session.clone()),
            Some(_) => Err(AgentError::Session(format!(
                "session `{session_id}` does not belong to user `{user_id}`"
            ))),
            None => Err(AgentError::Session(format!(
                "session `{session_id}` not found"
            ))),
        }
    }

    pub async fn append(&self, session_id: &str, messages: Vec<Message>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AgentError::Session(format!("session `{session_id}` not found")))?;
        session.memory.extend(messages);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
