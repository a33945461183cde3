pub mod aggregate;
pub mod connection;
pub mod error;
pub mod models;
pub mod queries;
pub mod service;
pub mod store;

pub use connection::{get_connection, DbPool};
pub use error::DbError;
pub use models::*;
pub use store::{ConversationStore, Database};
