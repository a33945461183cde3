use serde::{Deserialize, Serialize};

use crate::db::{Message as StoredMessage, Sender};

/// Chat message in the OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

impl From<&StoredMessage> for Message {
    fn from(m: &StoredMessage) -> Self {
        let role = match m.sender {
            Sender::System => "system",
            Sender::User => "user",
            Sender::Bot => "assistant",
        };
        Message::new(role, m.body.clone())
    }
}

/// One turn handed to a completion backend.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub turn: &'a str,
    /// Caller's bearer credential, forwarded to the backend.
    pub token: &'a str,
    /// Running conversation context, re-supplied every turn.
    pub context: &'a str,
    /// Messages already persisted for this conversation, oldest first.
    pub history: &'a [StoredMessage],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub reply: String,
    /// Replacement for the running context, when the backend produced one.
    pub context: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}
