//! Durable single-file backend using [`redb`](https://docs.rs/redb).
//!
//! Pure Rust, no C dependencies. One redb database file per store
//! location; every [`WriteBatch`] is applied in a single redb write
//! transaction, so a migration stage commits atomically together with its
//! recorded-version bump.
//!
//! Enabled by the `redb` feature (on by default).

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};
use strata_migrate::{RecordId, SchemaVersion};

use crate::backend::{StoreBackend, WriteBatch};
use crate::codec;

// ── Table definitions ───────────────────────────────────────────────

const RECORD_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("strata_records");
const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("strata_meta");

const META_VERSION: &str = "schema_version";
const META_NEXT_ID: &str = "next_record_id";

// ── Error type ──────────────────────────────────────────────────────

/// Errors returned by [`RedbBackend`] operations.
#[derive(Debug)]
pub struct RedbError(String);

impl std::fmt::Display for RedbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for RedbError {}

fn err(e: impl std::fmt::Display) -> RedbError {
    RedbError(e.to_string())
}

// ── Backend ─────────────────────────────────────────────────────────

/// A durable store backend built on [`redb`].
///
/// Records live in one table keyed `entity \0 id_be8`; the recorded schema
/// version and the id-allocation counter live in a metadata table.
#[derive(Debug)]
pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    /// Open or create a redb database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RedbError> {
        let db = Database::create(path).map_err(err)?;
        Self::with_db(db)
    }

    /// Create an in-memory redb database (for testing).
    pub fn open_in_memory() -> Result<Self, RedbError> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(err)?;
        Self::with_db(db)
    }

    fn with_db(db: Database) -> Result<Self, RedbError> {
        // Ensure tables exist by opening a write txn.
        let txn = db.begin_write().map_err(err)?;
        txn.open_table(RECORD_TABLE).map_err(err)?;
        txn.open_table(META_TABLE).map_err(err)?;
        txn.commit().map_err(err)?;
        Ok(Self { db })
    }
}

impl StoreBackend for RedbBackend {
    type Error = RedbError;

    fn recorded_version(&self) -> Result<Option<SchemaVersion>, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let meta = txn.open_table(META_TABLE).map_err(err)?;
        match meta.get(META_VERSION).map_err(err)? {
            Some(guard) => codec::decode_version(guard.value()).map(Some).map_err(err),
            None => Ok(None),
        }
    }

    fn next_record_id(&self) -> Result<u64, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let meta = txn.open_table(META_TABLE).map_err(err)?;
        match meta.get(META_NEXT_ID).map_err(err)? {
            Some(guard) => {
                let bytes: [u8; 8] = guard
                    .value()
                    .try_into()
                    .map_err(|_| RedbError("invalid id counter".into()))?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(1),
        }
    }

    fn get(&self, entity: &str, id: RecordId) -> Result<Option<Vec<u8>>, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(RECORD_TABLE).map_err(err)?;
        match table.get(record_key(entity, id).as_slice()).map_err(err)? {
            Some(guard) => Ok(Some(guard.value().to_vec())),
            None => Ok(None),
        }
    }

    fn scan(&self, entity: &str) -> Result<Vec<(RecordId, Vec<u8>)>, RedbError> {
        let txn = self.db.begin_read().map_err(err)?;
        let table = txn.open_table(RECORD_TABLE).map_err(err)?;

        let lower = key_prefix(entity);
        let upper = key_prefix_upper(entity);
        let range = table
            .range(lower.as_slice()..upper.as_slice())
            .map_err(err)?;

        let mut records = Vec::new();
        for item in range {
            let (key_guard, val_guard) = item.map_err(err)?;
            if let Some(id) = parse_record_key(key_guard.value(), entity) {
                records.push((id, val_guard.value().to_vec()));
            }
        }
        Ok(records)
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<(), RedbError> {
        let txn = self.db.begin_write().map_err(err)?;
        {
            let mut table = txn.open_table(RECORD_TABLE).map_err(err)?;
            for (entity, id, bytes) in &batch.puts {
                table
                    .insert(record_key(entity, *id).as_slice(), bytes.as_slice())
                    .map_err(err)?;
            }
            for (entity, id) in &batch.deletes {
                table
                    .remove(record_key(entity, *id).as_slice())
                    .map_err(err)?;
            }

            let mut meta = txn.open_table(META_TABLE).map_err(err)?;
            if let Some(version) = &batch.set_version {
                let bytes = codec::encode_version(version).map_err(err)?;
                meta.insert(META_VERSION, bytes.as_slice()).map_err(err)?;
            }
            if let Some(next_id) = batch.set_next_id {
                meta.insert(META_NEXT_ID, next_id.to_be_bytes().as_slice())
                    .map_err(err)?;
            }
        }
        txn.commit().map_err(err)?;
        Ok(())
    }
}

// ── Key encoding helpers ────────────────────────────────────────────

/// Record key: `entity \0 id_be(8)`.
fn record_key(entity: &str, id: RecordId) -> Vec<u8> {
    let mut k = Vec::with_capacity(entity.len() + 1 + 8);
    k.extend_from_slice(entity.as_bytes());
    k.push(0);
    k.extend_from_slice(&id.0.to_be_bytes());
    k
}

/// Lower bound for all record keys of an entity.
fn key_prefix(entity: &str) -> Vec<u8> {
    let mut k = Vec::with_capacity(entity.len() + 1);
    k.extend_from_slice(entity.as_bytes());
    k.push(0);
    k
}

/// Upper bound (exclusive) for all record keys of an entity.
fn key_prefix_upper(entity: &str) -> Vec<u8> {
    let mut k = Vec::with_capacity(entity.len() + 1);
    k.extend_from_slice(entity.as_bytes());
    k.push(1); // \x01 > \x00, captures everything in range
    k
}

/// Parse a record key back into its id, if it belongs to `entity`.
fn parse_record_key(key: &[u8], entity: &str) -> Option<RecordId> {
    let prefix = key_prefix(entity);
    let tail = key.strip_prefix(prefix.as_slice())?;
    let bytes: [u8; 8] = tail.try_into().ok()?;
    Some(RecordId(u64::from_be_bytes(bytes)))
}

// ── Tests ───────────────────────────────────────────────────────────
