use std::sync::MutexGuard;

use duckdb::Connection;

use crate::config::DatabaseConfig;
use crate::db::connection::{get_connection, DbPool};
use crate::db::error::DbError;
use crate::db::models::{Conversation, Message, Sender};
use crate::db::service::DbService;

/// Persistence gateway shared by every session and request handler.
///
/// Implementations serialize their own access; callers may use one instance
/// from many sessions at once.
pub trait ConversationStore: Send + Sync {
    fn create_conversation(&self, title: &str) -> Result<Conversation, DbError>;

    /// Loads the conversation with its messages.
    fn get_conversation(&self, id: i64) -> Result<Conversation, DbError>;

    fn get_conversation_by_title(&self, title: &str) -> Result<Conversation, DbError>;

    /// Conversations without their messages.
    fn list_conversations(&self) -> Result<Vec<Conversation>, DbError>;

    /// Writes title, context and completion id. The id itself never changes.
    fn update_conversation(&self, conversation: &Conversation) -> Result<Conversation, DbError>;

    fn create_message(
        &self,
        body: &str,
        sender: Sender,
        conversation_id: i64,
    ) -> Result<Message, DbError>;

    fn get_message(&self, id: i64) -> Result<Message, DbError>;
}

/// DuckDB-backed store over a single locked connection.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn open(config: &DatabaseConfig) -> Result<Self, DbError> {
        Ok(Self::new(get_connection(config)?))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.pool.lock().map_err(|_| DbError::LockPoisoned)
    }
}

impl ConversationStore for Database {
    fn create_conversation(&self, title: &str) -> Result<Conversation, DbError> {
        DbService::insert_conversation(&*self.conn()?, title)
    }

    fn get_conversation(&self, id: i64) -> Result<Conversation, DbError> {
        DbService::get_conversation(&*self.conn()?, id)
    }

    fn get_conversation_by_title(&self, title: &str) -> Result<Conversation, DbError> {
        DbService::get_conversation_by_title(&*self.conn()?, title)
    }

    fn list_conversations(&self) -> Result<Vec<Conversation>, DbError> {
        DbService::list_conversations(&*self.conn()?)
    }

    fn update_conversation(&self, conversation: &Conversation) -> Result<Conversation, DbError> {
        DbService::update_conversation(&*self.conn()?, conversation)
    }

    fn create_message(
        &self,
        body: &str,
        sender: Sender,
        conversation_id: i64,
    ) -> Result<Message, DbError> {
        DbService::insert_message(&*self.conn()?, body, sender, conversation_id)
    }

    fn get_message(&self, id: i64) -> Result<Message, DbError> {
        DbService::get_message(&*self.conn()?, id)
    }
}
