//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, strftime('%s', 'now') * 1000)",
                rusqlite::params![version],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Single-row registry settings
        CREATE TABLE registry_meta (
            key TEXT PRIMARY KEY,
            value BLOB NOT NULL
        );

        -- Proofs: append-only, only is_active ever changes
        CREATE TABLE proofs (
            id INTEGER PRIMARY KEY,           -- dense, first proof is 0
            submitter BLOB NOT NULL,          -- 32 bytes, Ed25519 public key
            data_hash BLOB NOT NULL UNIQUE,   -- 32 bytes
            subject TEXT NOT NULL,
            context TEXT NOT NULL,
            created_at INTEGER NOT NULL,      -- Unix ms, from the caller context
            is_active INTEGER NOT NULL DEFAULT 1
        );

        -- Append-only event log
        CREATE TABLE events (
            seq INTEGER PRIMARY KEY,          -- first event is 1
            kind INTEGER NOT NULL,            -- EventKind as u16
            proof_id INTEGER,                 -- null for admin transfers
            actor BLOB NOT NULL,
            timestamp INTEGER NOT NULL,
            body BLOB NOT NULL,               -- canonical CBOR
            digest BLOB NOT NULL              -- Blake3 of body
        );

        CREATE INDEX idx_proofs_submitter ON proofs(submitter, id);
        CREATE INDEX idx_events_proof ON events(proof_id);
        "#,
    )?;

    Ok(())
}
