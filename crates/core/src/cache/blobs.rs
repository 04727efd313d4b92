//! Blob CRUD for the SQLite disk tier.
//!
//! Rows are keyed by the reversible key encoding and carry a SHA-256 digest
//! that is checked on every read.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::{params, rusqlite};

use super::connection::SqliteDiskTier;
use super::disk::DiskTier;
use super::key::{content_digest, decode_key, encode_key};
use crate::Error;

#[async_trait]
impl DiskTier for SqliteDiskTier {
    /// A row whose digest no longer matches its bytes is deleted and reported
    /// as a miss.
    async fn read(&self, key: &str) -> Result<Option<Bytes>, Error> {
        let encoded = encode_key(key);
        self.conn
            .call(move |conn| -> Result<Option<Bytes>, Error> {
                let mut stmt = conn.prepare("SELECT bytes, digest FROM blobs WHERE key = ?1")?;
                let result =
                    stmt.query_row(params![encoded], |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?)));

                match result {
                    Ok((bytes, digest)) if content_digest(&bytes) == digest => Ok(Some(Bytes::from(bytes))),
                    Ok(_) => {
                        tracing::warn!(key = %encoded, "disk tier digest mismatch, dropping entry");
                        conn.execute("DELETE FROM blobs WHERE key = ?1", params![encoded])?;
                        Ok(None)
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Uses UPSERT semantics: inserts if the key doesn't exist, replaces all
    /// fields if it does.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<(), Error> {
        let encoded = encode_key(key);
        let bytes = bytes.to_vec();
        let digest = content_digest(&bytes);
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO blobs (key, bytes, size, digest, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(key) DO UPDATE SET
                        bytes = excluded.bytes,
                        size = excluded.size,
                        digest = excluded.digest,
                        stored_at = excluded.stored_at",
                    params![encoded, bytes, bytes.len() as i64, digest, stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        let encoded = encode_key(key);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM blobs WHERE key = ?1", params![encoded])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn purge(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM blobs", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let encoded: Vec<String> = self
            .conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM blobs")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut keys = Vec::new();
                for row in rows {
                    keys.push(row?);
                }
                Ok(keys)
            })
            .await
            .map_err(Error::from)?;

        let mut keys = encoded.iter().map(|e| decode_key(e)).collect::<Result<Vec<_>, _>>()?;
        keys.sort();
        Ok(keys)
    }
}

impl SqliteDiskTier {
    /// Total payload bytes currently stored.
    pub async fn total_bytes(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let total: i64 = conn.query_row("SELECT COALESCE(SUM(size), 0) FROM blobs", [], |row| row.get(0))?;
                Ok(total as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let db = SqliteDiskTier::open_in_memory().await.unwrap();
        db.write("https://cdn.example.com/a.png", b"png").await.unwrap();

        let bytes = db.read("https://cdn.example.com/a.png").await.unwrap().unwrap();
        assert_eq!(bytes, Bytes::from_static(b"png"));
        assert_eq!(db.total_bytes().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_read_missing() {
        let db = SqliteDiskTier::open_in_memory().await.unwrap();
        assert!(db.read("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert() {
        let db = SqliteDiskTier::open_in_memory().await.unwrap();
        db.write("k", b"old").await.unwrap();
        db.write("k", b"newer").await.unwrap();

        assert_eq!(db.read("k").await.unwrap().unwrap(), Bytes::from_static(b"newer"));
        assert_eq!(db.keys().await.unwrap(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn test_digest_mismatch_is_a_miss() {
        let db = SqliteDiskTier::open_in_memory().await.unwrap();
        db.write("k", b"original").await.unwrap();

        let encoded = encode_key("k");
        db.conn
            .call(move |conn| conn.execute("UPDATE blobs SET bytes = ?1 WHERE key = ?2", params![b"tampered".to_vec(), encoded]))
            .await
            .unwrap();

        assert!(db.read("k").await.unwrap().is_none());
        assert!(db.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_purge() {
        let db = SqliteDiskTier::open_in_memory().await.unwrap();
        db.write("a", b"a").await.unwrap();
        db.write("b", b"b").await.unwrap();
        db.write("c", b"c").await.unwrap();

        assert!(db.remove("a").await.unwrap());
        assert!(!db.remove("a").await.unwrap());
        assert_eq!(db.purge().await.unwrap(), 2);
        assert!(db.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobs.sqlite");
        {
            let db = SqliteDiskTier::open(&path).await.unwrap();
            db.write("cats/mochi.jpg", b"mochi").await.unwrap();
        }
        let db = SqliteDiskTier::open(&path).await.unwrap();
        assert_eq!(db.read("cats/mochi.jpg").await.unwrap().unwrap(), Bytes::from_static(b"mochi"));
    }
}
