use std::path::Path;
use std::sync::{Arc, Mutex};

use duckdb::Connection;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::db::error::DbError;
use crate::db::queries::{self, Query};

pub type DbPool = Arc<Mutex<Connection>>;

pub const IN_MEMORY: &str = ":memory:";

pub fn get_connection(config: &DatabaseConfig) -> Result<DbPool, DbError> {
    info!("Connecting to DuckDB at {}", config.path);
    let conn = if config.path == IN_MEMORY {
        Connection::open_in_memory()?
    } else {
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Connection::open(&config.path)?
    };

    init_schema(&conn)?;

    Ok(Arc::new(Mutex::new(conn)))
}

pub fn init_schema(conn: &Connection) -> Result<(), DbError> {
    info!("Initializing database schema");
    let sql = queries::global().get(Query::Init)?;
    conn.execute_batch(&sql)?;
    Ok(())
}
