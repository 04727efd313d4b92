//! SQLite connection management for the disk tier.
//!
//! Opening a database applies the WAL pragmas and brings the `blobs` schema
//! up to date. The applied schema version lives in `PRAGMA user_version`.

use crate::Error;
use std::path::Path;
use tokio_rusqlite::{Connection, rusqlite};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Schema batches in order. Entry `n` upgrades `user_version` from `n` to `n + 1`.
const SCHEMA: &[&str] = &[include_str!("../../migrations/001_blobs.sql")];

/// SQLite-backed disk tier.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct SqliteDiskTier {
    pub(crate) conn: Connection,
}

impl SqliteDiskTier {
    /// Open a database at the specified path.
    ///
    /// Creates the file (and its parent directory) if it doesn't exist,
    /// applies pragmas, and upgrades the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(path).await.map_err(|e| Error::Storage(e.to_string()))?;
        Self::prepare(conn).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::from)?;

        let (from, to) = conn.call(upgrade_schema).await?;
        if from != to {
            tracing::debug!(from, to, "disk tier schema upgraded");
        }

        Ok(Self { conn })
    }
}

/// Apply every batch past the stored `user_version`, each in its own transaction.
fn upgrade_schema(conn: &mut rusqlite::Connection) -> Result<(usize, usize), Error> {
    let stored: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let from = usize::try_from(stored)
        .ok()
        .filter(|v| *v <= SCHEMA.len())
        .ok_or_else(|| Error::MigrationFailed(format!("unknown schema version {stored}")))?;

    for (version, batch) in SCHEMA.iter().enumerate().skip(from) {
        let next = version + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(batch)
            .map_err(|e| Error::MigrationFailed(format!("version {next}: {e}")))?;
        tx.pragma_update(None, "user_version", next as i64)?;
        tx.commit()?;
    }

    Ok((from, SCHEMA.len()))
}
