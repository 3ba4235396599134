//! Chat history types: sessions, messages and title derivation.
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Every new session opens with this assistant turn.
pub const GREETING_MESSAGE: &str =
    "Hello! I'm the KAL assistant. How can I help you today?";

const TITLE_PREFIX_CHARS: usize = 20;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

/// What a message keeps of an attachment after the send: the name and,
/// for images, the preview data URI. Never the raw payload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AttachmentSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentSummary>,
    #[serde(default = "current_timestamp")]
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, attachments: Vec<AttachmentSummary>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments,
            timestamp: current_timestamp(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
            timestamp: current_timestamp(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(default = "current_timestamp")]
    pub created_at: u64,
    #[serde(default = "current_timestamp")]
    pub updated_at: u64,
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// A fresh session: unique id, default title, one assistant greeting.
    pub fn new() -> Self {
        let now = current_timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            created_at: now,
            updated_at: now,
            messages: vec![ChatMessage::assistant(GREETING_MESSAGE)],
        }
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Derives a session title from the first user message: a fixed-length
/// character prefix, or the default title when the text is empty
/// (attachment-only sends).
pub fn derive_session_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DEFAULT_SESSION_TITLE.to_string();
    }
    let mut title: String = trimmed.chars().take(TITLE_PREFIX_CHARS).collect();
    if trimmed.chars().count() > TITLE_PREFIX_CHARS {
        title.push_str("...");
    }
    title
}
