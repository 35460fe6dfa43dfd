//! SQLite implementation of the ContentStore trait.
//!
//! This is the durable backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use netobject_core::{decode_fragment, encode_fragment, Blake3Hash, ContentName, Fragment};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{ContentStore, SaveOutcome};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Worker(format!("mutex poisoned: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Worker(format!("spawn_blocking failed: {}", e)))?
    }
}

/// Length-prefixed component encoding.
///
/// The key of a prefix is a byte prefix of the key of every name under it.
fn name_key(name: &ContentName) -> Vec<u8> {
    let mut key = Vec::new();
    for component in name.components() {
        key.extend_from_slice(&(component.len() as u32).to_be_bytes());
        key.extend_from_slice(component.as_bytes());
    }
    key
}

fn decode_rows(rows: Vec<Vec<u8>>) -> Result<Vec<Fragment>> {
    let mut fragments = rows
        .iter()
        .map(|encoded| decode_fragment(encoded).map_err(StoreError::from))
        .collect::<Result<Vec<_>>>()?;
    fragments.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(fragments)
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn save_fragment(&self, fragment: &Fragment) -> Result<SaveOutcome> {
        let key = name_key(&fragment.name);
        let uri = fragment.name.to_string();
        let depth = fragment.name.len() as i64;
        let publisher = fragment.signed_info.publisher.0;
        let content_type = fragment.signed_info.content_type.to_u8() as i64;
        let encoded = encode_fragment(fragment);
        let digest = Blake3Hash::hash(&encoded);

        self.run(move |conn| {
            let existing: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT digest FROM fragments WHERE name_key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing) = existing {
                let existing: [u8; 32] = existing
                    .try_into()
                    .map_err(|_| StoreError::InvalidData("digest is not 32 bytes".into()))?;
                return Ok(if existing == digest.0 {
                    SaveOutcome::AlreadyExists
                } else {
                    SaveOutcome::Conflict {
                        existing: Blake3Hash(existing),
                    }
                });
            }

            conn.execute(
                "INSERT INTO fragments (
                    name_key, name_uri, depth, publisher, content_type, digest, encoded, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    key,
                    uri,
                    depth,
                    publisher.as_slice(),
                    content_type,
                    digest.0.as_slice(),
                    encoded,
                    now_millis(),
                ],
            )?;

            Ok(SaveOutcome::Inserted)
        })
        .await
    }

    async fn get_fragment(&self, name: &ContentName) -> Result<Option<Fragment>> {
        let key = name_key(name);

        let encoded: Option<Vec<u8>> = self
            .run(move |conn| {
                conn.query_row(
                    "SELECT encoded FROM fragments WHERE name_key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StoreError::from)
            })
            .await?;

        encoded
            .map(|bytes| decode_fragment(&bytes).map_err(StoreError::from))
            .transpose()
    }

    async fn has_fragment(&self, name: &ContentName) -> Result<bool> {
        let key = name_key(name);

        self.run(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM fragments WHERE name_key = ?1)",
                params![key],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn fragments_under(&self, prefix: &ContentName) -> Result<Vec<Fragment>> {
        let key = name_key(prefix);

        let rows = self
            .run(move |conn| {
                let rows = if key.is_empty() {
                    let mut stmt = conn.prepare("SELECT encoded FROM fragments")?;
                    let rows = stmt
                        .query_map([], |row| row.get(0))?
                        .collect::<rusqlite::Result<Vec<Vec<u8>>>>()?;
                    rows
                } else {
                    let mut stmt = conn.prepare(
                        "SELECT encoded FROM fragments WHERE substr(name_key, 1, ?2) = ?1",
                    )?;
                    let rows = stmt
                        .query_map(params![key, key.len() as i64], |row| row.get(0))?
                        .collect::<rusqlite::Result<Vec<Vec<u8>>>>()?;
                    rows
                };
                Ok(rows)
            })
            .await?;

        decode_rows(rows)
    }

    async fn add_namespace(&self, prefix: &ContentName) -> Result<()> {
        let key = name_key(prefix);
        let uri = prefix.to_string();

        self.run(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO namespaces (prefix_key, prefix_uri, added_at)
                 VALUES (?1, ?2, ?3)",
                params![key, uri, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn namespaces(&self) -> Result<Vec<ContentName>> {
        let uris: Vec<String> = self
            .run(|conn| {
                let mut stmt = conn.prepare("SELECT prefix_uri FROM namespaces")?;
                let uris = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(uris)
            })
            .await?;

        let mut prefixes = uris
            .iter()
            .map(|uri| ContentName::parse(uri).map_err(StoreError::from))
            .collect::<Result<Vec<_>>>()?;
        prefixes.sort();
        Ok(prefixes)
    }
}
