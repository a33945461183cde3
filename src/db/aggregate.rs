//! Rebuilds conversation aggregates from flat result rows.
//!
//! Every read path goes through here so nullability and sender decoding are
//! reconciled in exactly one place. Columns are carried exactly as the
//! database returned them: optional, with timestamps as text.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::db::models::{Conversation, Message, Sender};

#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error("conversation not found")]
    NotFound,
    #[error("inconsistent conversation data: {0}")]
    Consistency(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationColumns {
    pub id: Option<i64>,
    pub completion_id: Option<String>,
    pub title: Option<String>,
    pub context: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageColumns {
    pub id: Option<i64>,
    pub body: Option<String>,
    pub sender: Option<String>,
    pub created_at: Option<String>,
}

/// One row of the conversation ⟕ messages join.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedRow {
    pub conversation: ConversationColumns,
    pub message: MessageColumns,
}

/// A standalone message row, including its owning conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageRow {
    pub conversation_id: Option<i64>,
    pub message: MessageColumns,
}

/// Builds a single conversation from join rows ordered by conversation id,
/// then message creation time.
pub fn aggregate<I>(rows: I) -> Result<Conversation, AggregateError>
where
    I: IntoIterator<Item = JoinedRow>,
{
    let mut conversation: Option<Conversation> = None;
    let mut messages = Vec::new();

    for row in rows {
        let pinned = match conversation.as_ref().map(|c| c.id) {
            Some(pinned) => {
                let id = required(row.conversation.id, "conversation id")?;
                if id != pinned {
                    return Err(AggregateError::Consistency(format!(
                        "expected conversation with id [{pinned}], got conversation with id [{id}]"
                    )));
                }
                pinned
            }
            None => {
                let c = conversation_from_columns(row.conversation)?;
                let id = c.id;
                conversation = Some(c);
                id
            }
        };

        if let Some(message) = message_from_columns(row.message, pinned)? {
            messages.push(message);
        }
    }

    let mut conversation = conversation.ok_or(AggregateError::NotFound)?;
    if !messages.is_empty() {
        conversation.messages = Some(messages);
    }
    Ok(conversation)
}

/// Maps one row per conversation, without messages. A row missing a required
/// column rejects the whole list.
pub fn aggregate_list<I>(rows: I) -> Result<Vec<Conversation>, AggregateError>
where
    I: IntoIterator<Item = ConversationColumns>,
{
    rows.into_iter().map(conversation_from_columns).collect()
}

pub fn aggregate_message(row: MessageRow) -> Result<Message, AggregateError> {
    let conversation_id = required(row.conversation_id, "message conversation id")?;
    message_from_columns(row.message, conversation_id)?
        .ok_or_else(|| AggregateError::Consistency("message row has no message columns".into()))
}

fn conversation_from_columns(cols: ConversationColumns) -> Result<Conversation, AggregateError> {
    let id = required(cols.id, "conversation id")?;
    let title = required(cols.title, "conversation title")?;
    let created_at = parse_timestamp(&required(cols.created_at, "conversation created_at")?)?;

    Ok(Conversation {
        id,
        title,
        context: cols.context.unwrap_or_default(),
        completion_id: cols.completion_id,
        created_at,
        messages: None,
    })
}

/// `Ok(None)` when the join produced no message for this row.
fn message_from_columns(
    cols: MessageColumns,
    conversation_id: i64,
) -> Result<Option<Message>, AggregateError> {
    match (cols.id, cols.body, cols.sender, cols.created_at) {
        (None, None, None, None) => Ok(None),
        (Some(id), Some(body), Some(sender), Some(created_at)) => {
            let sender = sender.parse::<Sender>().map_err(|e| {
                AggregateError::Consistency(format!("unable to parse sender on message {id}: {e}"))
            })?;
            Ok(Some(Message {
                id,
                conversation_id,
                body,
                sender,
                created_at: parse_timestamp(&created_at)?,
            }))
        }
        (id, ..) => Err(AggregateError::Consistency(format!(
            "message {} in conversation {} has missing columns",
            id.map_or_else(|| "?".to_string(), |id| id.to_string()),
            conversation_id
        ))),
    }
}

fn required<T>(value: Option<T>, column: &str) -> Result<T, AggregateError> {
    value.ok_or_else(|| AggregateError::Consistency(format!("missing required column {column}")))
}

/// Accepts DuckDB's `CAST(ts AS VARCHAR)` output, with or without fractional
/// seconds, as well as RFC 3339.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AggregateError> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ts.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AggregateError::Consistency(format!("invalid timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: i64) -> ConversationColumns {
        ConversationColumns {
            id: Some(id),
            completion_id: None,
            title: Some(format!("conversation {id}")),
            context: Some("ctx".into()),
            created_at: Some("2024-03-01 09:00:00".into()),
        }
    }

    fn message(id: i64, sender: &str, at: &str) -> MessageColumns {
        MessageColumns {
            id: Some(id),
            body: Some(format!("body {id}")),
            sender: Some(sender.into()),
            created_at: Some(at.into()),
        }
    }

    fn row(conversation_id: i64, message: MessageColumns) -> JoinedRow {
        JoinedRow {
            conversation: conversation(conversation_id),
            message,
        }
    }

    #[test]
    fn collects_messages_in_row_order() {
        let rows = vec![
            row(7, message(1, "USER", "2024-03-01 09:00:01.000100")),
            row(7, message(2, "BOT", "2024-03-01 09:00:02")),
            row(7, message(3, "SYSTEM", "2024-03-01 09:00:03.5")),
        ];

        let c = aggregate(rows).unwrap();

        assert_eq!(c.id, 7);
        assert_eq!(c.title, "conversation 7");
        assert_eq!(c.context, "ctx");
        let messages = c.messages.expect("messages present");
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(messages[1].sender, Sender::Bot);
        assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert!(messages.iter().all(|m| m.conversation_id == 7));
    }

    #[test]
    fn null_message_columns_are_skipped() {
        let rows = vec![
            row(7, MessageColumns::default()),
            row(7, message(4, "USER", "2024-03-01 09:00:01")),
        ];

        let messages = aggregate(rows).unwrap().messages.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, 4);
    }

    #[test]
    fn no_message_rows_leaves_messages_absent() {
        let c = aggregate(vec![row(3, MessageColumns::default())]).unwrap();
        assert!(c.messages.is_none());
    }

    #[test]
    fn empty_result_is_not_found() {
        assert_eq!(aggregate(Vec::<JoinedRow>::new()), Err(AggregateError::NotFound));
    }

    #[test]
    fn mixed_conversation_ids_are_inconsistent() {
        let rows = vec![
            row(1, message(1, "USER", "2024-03-01 09:00:01")),
            row(2, message(2, "BOT", "2024-03-01 09:00:02")),
        ];
        assert!(matches!(aggregate(rows), Err(AggregateError::Consistency(_))));
    }

    #[test]
    fn unknown_sender_is_inconsistent() {
        let rows = vec![row(1, message(1, "ASSISTANT", "2024-03-01 09:00:01"))];
        let err = aggregate(rows).unwrap_err();
        assert!(matches!(err, AggregateError::Consistency(ref m) if m.contains("ASSISTANT")));
    }

    #[test]
    fn partially_null_message_is_inconsistent() {
        let mut partial = message(1, "USER", "2024-03-01 09:00:01");
        partial.body = None;
        assert!(matches!(
            aggregate(vec![row(1, partial)]),
            Err(AggregateError::Consistency(_))
        ));
    }

    #[test]
    fn list_rejects_rows_missing_required_columns() {
        let mut broken = conversation(2);
        broken.title = None;

        let list = aggregate_list(vec![conversation(1), conversation(3)]).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|c| c.messages.is_none()));

        assert!(matches!(
            aggregate_list(vec![conversation(1), broken]),
            Err(AggregateError::Consistency(_))
        ));
    }

    #[test]
    fn optional_conversation_columns_default() {
        let mut cols = conversation(5);
        cols.context = None;
        cols.completion_id = Some("thread-1".into());

        let c = aggregate_list(vec![cols]).unwrap().remove(0);
        assert_eq!(c.context, "");
        assert_eq!(c.completion_id.as_deref(), Some("thread-1"));
    }

    #[test]
    fn single_message_row() {
        let m = aggregate_message(MessageRow {
            conversation_id: Some(9),
            message: message(11, "BOT", "2024-03-01T09:00:00Z"),
        })
        .unwrap();
        assert_eq!(m.conversation_id, 9);
        assert_eq!(m.sender, Sender::Bot);

        assert!(aggregate_message(MessageRow {
            conversation_id: Some(9),
            message: MessageColumns::default(),
        })
        .is_err());
    }
}
