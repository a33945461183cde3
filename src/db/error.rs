use thiserror::Error;

use crate::db::aggregate::AggregateError;
use crate::db::queries::QueryError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Duckdb(#[from] duckdb::Error),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("{0} not found")]
    NotFound(String),
    /// Stored data that cannot be reconstructed. Never a synonym for absence.
    #[error("inconsistent data: {0}")]
    Consistency(String),
    #[error("expected {expected} row(s) to be affected, got {actual}")]
    UnexpectedRowCount { expected: usize, actual: usize },
    #[error("unable to prepare database path: {0}")]
    Io(#[from] std::io::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
}

impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }
}

impl From<AggregateError> for DbError {
    fn from(e: AggregateError) -> Self {
        match e {
            AggregateError::NotFound => DbError::NotFound("conversation".to_string()),
            AggregateError::Consistency(msg) => DbError::Consistency(msg),
        }
    }
}
