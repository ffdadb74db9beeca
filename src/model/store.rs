use std::path::Path;

use tokio_rusqlite::Connection;

use crate::tools::log::{log_info, LogServiceType};

use self::sql::migrate_database;

use super::error::{Result, Error};


pub mod sql;


pub struct SqliteStore {
	connection: Connection,
}

// Constructor
impl SqliteStore {
	pub async fn new(connection: Connection) -> Result<Self> {
        connection.call(|conn| {
            conn.pragma_update(None, "foreign_keys", true)?;
            Ok(())
        }).await?;
        let version = migrate_database(&connection).await?;
        log_info(LogServiceType::Database, format!("Current Database version: {}", version));

		Ok(Self { connection })
	}

    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| Error::CannotOpenDatabase)?;
        }
        let connection = Connection::open(path).await?;
        Self::new(connection).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().await?;
        Self::new(connection).await
    }
}
