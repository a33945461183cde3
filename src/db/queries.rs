//! Process-wide SQL template cache.
//!
//! Templates are compiled into the binary and can be overridden from a
//! directory of `<name>.sql` files. The cache is initialized once; each
//! template is loaded on first use under the cache lock, so a key is never
//! populated twice.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Init,
    CreateConversation,
    GetConversation,
    GetConversationByTitle,
    ListConversations,
    UpdateConversation,
    CreateMessage,
    GetMessage,
}

impl Query {
    pub fn name(&self) -> &'static str {
        match self {
            Query::Init => "init",
            Query::CreateConversation => "create_conversation",
            Query::GetConversation => "get_conversation",
            Query::GetConversationByTitle => "get_conversation_by_title",
            Query::ListConversations => "list_conversations",
            Query::UpdateConversation => "update_conversation",
            Query::CreateMessage => "create_message",
            Query::GetMessage => "get_message",
        }
    }

    fn embedded(&self) -> &'static str {
        match self {
            Query::Init => include_str!("../../queries/init.sql"),
            Query::CreateConversation => include_str!("../../queries/create_conversation.sql"),
            Query::GetConversation => include_str!("../../queries/get_conversation.sql"),
            Query::GetConversationByTitle => {
                include_str!("../../queries/get_conversation_by_title.sql")
            }
            Query::ListConversations => include_str!("../../queries/list_conversations.sql"),
            Query::UpdateConversation => include_str!("../../queries/update_conversation.sql"),
            Query::CreateMessage => include_str!("../../queries/create_message.sql"),
            Query::GetMessage => include_str!("../../queries/get_message.sql"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    Embedded,
    /// Files in this directory take precedence; missing files fall back to
    /// the embedded template.
    Directory(PathBuf),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unable to read script file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("query cache already initialized")]
    AlreadyInitialized,
    #[error("query cache lock poisoned")]
    Poisoned,
}

pub struct QueryCache {
    source: QuerySource,
    queries: Mutex<HashMap<Query, Arc<str>>>,
}

impl QueryCache {
    pub fn new(source: QuerySource) -> Self {
        Self {
            source,
            queries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, query: Query) -> Result<Arc<str>, QueryError> {
        let mut queries = self.queries.lock().map_err(|_| QueryError::Poisoned)?;
        if let Some(sql) = queries.get(&query) {
            return Ok(sql.clone());
        }

        let sql: Arc<str> = self.load(query)?.into();
        queries.insert(query, sql.clone());
        Ok(sql)
    }

    fn load(&self, query: Query) -> Result<String, QueryError> {
        match &self.source {
            QuerySource::Embedded => Ok(query.embedded().to_string()),
            QuerySource::Directory(dir) => {
                let path = dir.join(format!("{}.sql", query.name()));
                match std::fs::read_to_string(&path) {
                    Ok(sql) => {
                        debug!("Loaded query {} from {}", query.name(), path.display());
                        Ok(sql)
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        Ok(query.embedded().to_string())
                    }
                    Err(source) => Err(QueryError::Read { path, source }),
                }
            }
        }
    }
}

static CACHE: OnceLock<QueryCache> = OnceLock::new();

/// Installs the process-wide cache. Must run before the first query; later
/// calls fail with `AlreadyInitialized`.
pub fn init(source: QuerySource) -> Result<(), QueryError> {
    CACHE
        .set(QueryCache::new(source))
        .map_err(|_| QueryError::AlreadyInitialized)
}

/// The process-wide cache, defaulting to embedded templates when `init` was
/// never called.
pub fn global() -> &'static QueryCache {
    CACHE.get_or_init(|| QueryCache::new(QuerySource::Embedded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_templates_are_cached() {
        let cache = QueryCache::new(QuerySource::Embedded);
        let first = cache.get(Query::GetConversation).unwrap();
        let second = cache.get(Query::GetConversation).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.contains("LEFT JOIN messages"));
    }

    #[test]
    fn directory_overrides_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("list_conversations.sql"), "SELECT 1").unwrap();

        let cache = QueryCache::new(QuerySource::Directory(dir.path().to_path_buf()));
        assert_eq!(&*cache.get(Query::ListConversations).unwrap(), "SELECT 1");
        assert_eq!(
            &*cache.get(Query::GetMessage).unwrap(),
            Query::GetMessage.embedded()
        );
    }

    #[test]
    fn cached_template_survives_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("get_message.sql");
        std::fs::write(&path, "SELECT 1").unwrap();

        let cache = QueryCache::new(QuerySource::Directory(dir.path().to_path_buf()));
        cache.get(Query::GetMessage).unwrap();
        std::fs::write(&path, "SELECT 2").unwrap();
        assert_eq!(&*cache.get(Query::GetMessage).unwrap(), "SELECT 1");
    }
}
