use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Agent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-conversation state. Lives independently of any agent definition version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub app_id: String,
    pub user_id: String,
    pub history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(
        session_id: impl Into<String>,
        app_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            app_id: app_id.into(),
            user_id: user_id.into(),
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::new(MessageRole::User, content));
    }

    pub fn push_agent(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::new(MessageRole::Agent, content));
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.history.last()
    }
}
