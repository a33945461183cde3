use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::proto;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    System,
    User,
    Bot,
}

#[derive(Debug, Error)]
#[error("unknown message sender '{0}'")]
pub struct UnknownSender(pub String);

impl Sender {
    /// Name stored in the `sender` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::System => "SYSTEM",
            Sender::User => "USER",
            Sender::Bot => "BOT",
        }
    }
}

impl FromStr for Sender {
    type Err = UnknownSender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM" => Ok(Sender::System),
            "USER" => Ok(Sender::User),
            "BOT" => Ok(Sender::Bot),
            other => Err(UnknownSender(other.to_string())),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Sender> for proto::MessageSender {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::System => proto::MessageSender::System,
            Sender::User => proto::MessageSender::User,
            Sender::Bot => proto::MessageSender::Bot,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    pub context: String,
    pub completion_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `None` when no messages were loaded or none exist yet.
    pub messages: Option<Vec<Message>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub body: String,
    pub sender: Sender,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for proto::Message {
    fn from(m: &Message) -> Self {
        proto::Message {
            id: m.id,
            body: m.body.clone(),
            sender: proto::MessageSender::from(m.sender) as i32,
            created_at: Some(proto::timestamp(m.created_at)),
        }
    }
}

impl From<&Conversation> for proto::Conversation {
    fn from(c: &Conversation) -> Self {
        proto::Conversation {
            id: c.id,
            completion_id: c.completion_id.clone().unwrap_or_default(),
            title: c.title.clone(),
            context: c.context.clone(),
            created_at: Some(proto::timestamp(c.created_at)),
            messages: c
                .messages
                .iter()
                .flatten()
                .map(proto::Message::from)
                .collect(),
        }
    }
}
