pub mod models;
pub mod queries;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error("Unknown view: {0}")]
    UnknownView(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.create_schema()?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(schema::CREATE_TABLES)?;
        self.conn.execute_batch(schema::CREATE_VIEWS)?;
        Ok(())
    }

    /// Drop every table and view, then recreate them empty.
    pub fn reset(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for view in schema::VIEWS {
            tx.execute_batch(&format!("DROP VIEW IF EXISTS {view}"))?;
        }
        for table in schema::TABLES {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))?;
        }
        tx.execute_batch(schema::CREATE_TABLES)?;
        tx.execute_batch(schema::CREATE_VIEWS)?;
        tx.commit()?;
        log::info!(
            "Schema reset: {} tables, {} views",
            schema::TABLES.len(),
            schema::VIEWS.len()
        );
        Ok(())
    }
}
