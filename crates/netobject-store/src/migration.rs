//! SQLite schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`. `MIGRATIONS[i]` takes
//! the schema from version `i` to `i + 1`, and pending steps run in one
//! transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

const MIGRATIONS: &[&str] = &[
    // v1: fragments by name, and served namespaces.
    r#"
    CREATE TABLE fragments (
        name_key BLOB PRIMARY KEY,        -- length-prefixed components, prefix-comparable
        name_uri TEXT NOT NULL,
        depth INTEGER NOT NULL,
        publisher BLOB NOT NULL,
        content_type INTEGER NOT NULL,
        digest BLOB NOT NULL,             -- Blake3 of encoded
        encoded BLOB NOT NULL,
        stored_at INTEGER NOT NULL
    );

    CREATE TABLE namespaces (
        prefix_key BLOB PRIMARY KEY,
        prefix_uri TEXT NOT NULL,
        added_at INTEGER NOT NULL
    );

    CREATE INDEX idx_fragments_publisher ON fragments(publisher);
    "#,
];

/// Schema version after all migrations.
pub const CURRENT_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`CURRENT_VERSION`]. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let from: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if from > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema version {from} is newer than supported version {CURRENT_VERSION}"
        )));
    }
    if from == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for sql in &MIGRATIONS[from as usize..] {
        tx.execute_batch(sql)?;
    }
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
    tx.commit()?;

    tracing::debug!(from, to = CURRENT_VERSION, "migrated content store schema");
    Ok(())
}

/// Wall-clock milliseconds, for bookkeeping columns.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
