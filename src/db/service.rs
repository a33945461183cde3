use duckdb::{params, Connection, Params, Row};

use crate::db::aggregate::{
    aggregate, aggregate_list, aggregate_message, ConversationColumns, JoinedRow, MessageColumns,
    MessageRow,
};
use crate::db::error::DbError;
use crate::db::models::{Conversation, Message, Sender};
use crate::db::queries::{self, Query};

pub struct DbService;

impl DbService {
    // Column order follows queries/get_conversation.sql and list_conversations.sql.
    fn conversation_columns(row: &Row) -> duckdb::Result<ConversationColumns> {
        Ok(ConversationColumns {
            id: row.get(0)?,
            completion_id: row.get(1)?,
            title: row.get(2)?,
            context: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn message_columns(row: &Row, offset: usize) -> duckdb::Result<MessageColumns> {
        Ok(MessageColumns {
            id: row.get(offset)?,
            body: row.get(offset + 1)?,
            sender: row.get(offset + 2)?,
            created_at: row.get(offset + 3)?,
        })
    }

    fn row_to_joined(row: &Row) -> duckdb::Result<JoinedRow> {
        Ok(JoinedRow {
            conversation: Self::conversation_columns(row)?,
            message: Self::message_columns(row, 5)?,
        })
    }

    fn row_to_message(row: &Row) -> duckdb::Result<MessageRow> {
        Ok(MessageRow {
            conversation_id: row.get(0)?,
            message: Self::message_columns(row, 1)?,
        })
    }

    fn query_conversation<P: Params>(
        conn: &Connection,
        query: Query,
        params: P,
    ) -> Result<Conversation, DbError> {
        let sql = queries::global().get(query)?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, Self::row_to_joined)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(aggregate(rows)?)
    }

    // --- Conversation Operations ---

    pub fn insert_conversation(conn: &Connection, title: &str) -> Result<Conversation, DbError> {
        let sql = queries::global().get(Query::CreateConversation)?;
        let id: i64 = conn.query_row(&sql, params![title], |row| row.get(0))?;
        Self::get_conversation(conn, id)
    }

    pub fn get_conversation(conn: &Connection, id: i64) -> Result<Conversation, DbError> {
        Self::query_conversation(conn, Query::GetConversation, params![id]).map_err(|e| match e {
            DbError::NotFound(_) => DbError::NotFound(format!("conversation {id}")),
            other => other,
        })
    }

    pub fn get_conversation_by_title(conn: &Connection, title: &str) -> Result<Conversation, DbError> {
        Self::query_conversation(conn, Query::GetConversationByTitle, params![title]).map_err(|e| {
            match e {
                DbError::NotFound(_) => DbError::NotFound(format!("conversation '{title}'")),
                other => other,
            }
        })
    }

    pub fn list_conversations(conn: &Connection) -> Result<Vec<Conversation>, DbError> {
        let sql = queries::global().get(Query::ListConversations)?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::conversation_columns)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(aggregate_list(rows)?)
    }

    pub fn update_conversation(
        conn: &Connection,
        conversation: &Conversation,
    ) -> Result<Conversation, DbError> {
        let sql = queries::global().get(Query::UpdateConversation)?;
        let affected = conn.execute(
            &sql,
            params![
                conversation.completion_id,
                conversation.title,
                conversation.context,
                conversation.id
            ],
        )?;
        match affected {
            0 => Err(DbError::NotFound(format!("conversation {}", conversation.id))),
            1 => Self::get_conversation(conn, conversation.id),
            actual => Err(DbError::UnexpectedRowCount { expected: 1, actual }),
        }
    }

    // --- Message Operations ---

    pub fn insert_message(
        conn: &Connection,
        body: &str,
        sender: Sender,
        conversation_id: i64,
    ) -> Result<Message, DbError> {
        let sql = queries::global().get(Query::CreateMessage)?;
        let id: i64 = conn.query_row(&sql, params![body, sender.as_str(), conversation_id], |row| {
            row.get(0)
        })?;
        Self::get_message(conn, id)
    }

    pub fn get_message(conn: &Connection, id: i64) -> Result<Message, DbError> {
        let sql = queries::global().get(Query::GetMessage)?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map(params![id], Self::row_to_message)?
            .collect::<duckdb::Result<Vec<_>>>()?;

        match rows.len() {
            0 => Err(DbError::NotFound(format!("message {id}"))),
            1 => Ok(aggregate_message(rows.remove(0))?),
            n => Err(DbError::Consistency(format!(
                "expected only one message with id {id}, got {n}"
            ))),
        }
    }
}
