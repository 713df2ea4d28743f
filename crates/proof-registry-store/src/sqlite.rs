//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for the proof registry. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use proof_registry_core::{
    DataHash, Effect, EventRecord, Identity, Proof, ProofId, RegistryEvent, RegistrySnapshot,
    Transition,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Store;

/// `registry_meta` key holding the admin identity.
const ADMIN_KEY: &str = "admin";

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

    /// Run `f` against the connection on the blocking thread pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Read a 32-byte blob column.
fn blob32(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(idx, "blob32".into(), Type::Blob))
}

/// Columns: id, submitter, data_hash, subject, context, created_at, is_active
fn row_to_proof(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u64, Proof)> {
    let id: i64 = row.get(0)?;
    let proof = Proof {
        submitter: Identity(blob32(row, 1)?),
        data_hash: DataHash(blob32(row, 2)?),
        subject: row.get(3)?,
        context: row.get(4)?,
        created_at: row.get(5)?,
        is_active: row.get(6)?,
    };
    Ok((id as u64, proof))
}

const PROOF_COLUMNS: &str = "id, submitter, data_hash, subject, context, created_at, is_active";

fn read_admin(conn: &Connection) -> Result<Option<Identity>> {
    let value: Option<Vec<u8>> = conn
        .query_row(
            "SELECT value FROM registry_meta WHERE key = ?1",
            params![ADMIN_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value
        .map(|bytes| {
            <[u8; 32]>::try_from(bytes.as_slice())
                .map(Identity)
                .map_err(|_| StoreError::InvalidData("admin is not 32 bytes".into()))
        })
        .transpose()
}

fn decode_event_row(seq: i64, body: &[u8]) -> Result<EventRecord> {
    let event = RegistryEvent::decode(body)
        .map_err(|e| StoreError::Serialization(format!("event {}: {}", seq, e)))?;
    Ok(EventRecord {
        seq: seq as u64,
        event,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn initialize(&self, admin: &Identity) -> Result<()> {
        let admin = *admin;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if read_admin(&tx)?.is_some() {
                return Err(StoreError::AlreadyInitialized);
            }
            tx.execute(
                "INSERT INTO registry_meta (key, value) VALUES (?1, ?2)",
                params![ADMIN_KEY, admin.as_bytes().as_slice()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn load_snapshot(&self) -> Result<Option<RegistrySnapshot>> {
        self.with_conn(|conn| {
            let Some(admin) = read_admin(conn)? else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM proofs ORDER BY id",
                PROOF_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], row_to_proof)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut proofs = Vec::with_capacity(rows.len());
            for (expected, (id, proof)) in rows.into_iter().enumerate() {
                if id != expected as u64 {
                    return Err(StoreError::InvalidData(format!(
                        "proof ids are not dense: expected {}, found {}",
                        expected, id
                    )));
                }
                proofs.push(proof);
            }

            Ok(Some(RegistrySnapshot { admin, proofs }))
        })
        .await
    }

    async fn commit(&self, transition: &Transition) -> Result<u64> {
        let effect = transition.effect().clone();
        let event = transition.event();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if read_admin(&tx)?.is_none() {
                return Err(StoreError::NotInitialized);
            }

            match &effect {
                Effect::Register { id, proof } => {
                    let count: i64 =
                        tx.query_row("SELECT COUNT(*) FROM proofs", [], |row| row.get(0))?;
                    let expected = ProofId(count as u64);
                    if *id != expected {
                        return Err(StoreError::Conflict { expected, got: *id });
                    }

                    tx.execute(
                        "INSERT INTO proofs (
                            id, submitter, data_hash, subject, context, created_at, is_active
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            id.0 as i64,
                            proof.submitter.as_bytes().as_slice(),
                            proof.data_hash.as_bytes().as_slice(),
                            proof.subject,
                            proof.context,
                            proof.created_at,
                            proof.is_active,
                        ],
                    )?;
                }
                Effect::Deactivate { id, .. } => {
                    let changed = tx.execute(
                        "UPDATE proofs SET is_active = 0 WHERE id = ?1 AND is_active = 1",
                        params![id.0 as i64],
                    )?;
                    if changed != 1 {
                        return Err(StoreError::InvalidData(format!(
                            "cannot deactivate proof {}",
                            id
                        )));
                    }
                }
                Effect::TransferAdmin { new_admin, .. } => {
                    tx.execute(
                        "UPDATE registry_meta SET value = ?2 WHERE key = ?1",
                        params![ADMIN_KEY, new_admin.as_bytes().as_slice()],
                    )?;
                }
            }

            let seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM events",
                [],
                |row| row.get(0),
            )?;
            let body = event.canonical_bytes();
            let digest = event.digest();

            tx.execute(
                "INSERT INTO events (seq, kind, proof_id, actor, timestamp, body, digest)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    seq,
                    event.kind().to_u16(),
                    event.proof_id().map(|id| id.0 as i64),
                    event.actor().as_bytes().as_slice(),
                    event.timestamp(),
                    body,
                    digest.as_bytes().as_slice(),
                ],
            )?;

            tx.commit()?;
            Ok(seq as u64)
        })
        .await
    }

    async fn get_proof(&self, id: ProofId) -> Result<Option<Proof>> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM proofs WHERE id = ?1", PROOF_COLUMNS),
                    params![id.0 as i64],
                    row_to_proof,
                )
                .optional()?;
            Ok(row.map(|(_, proof)| proof))
        })
        .await
    }

    async fn events_since(&self, after_seq: u64) -> Result<Vec<EventRecord>> {
        let after = i64::try_from(after_seq).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare("SELECT seq, body FROM events WHERE seq > ?1 ORDER BY seq")?;
            let rows = stmt
                .query_map(params![after], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.iter()
                .map(|(seq, body)| decode_event_row(*seq, body))
                .collect()
        })
        .await
    }

    async fn event_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}
