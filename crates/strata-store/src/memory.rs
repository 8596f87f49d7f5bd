//! In-memory backend for testing and prototyping.

use std::collections::BTreeMap;
use std::convert::Infallible;

use strata_migrate::{RecordId, SchemaVersion};

use crate::backend::{StoreBackend, WriteBatch};

/// A non-durable backend holding everything in nested `BTreeMap`s.
///
/// Always available; its operations cannot fail.
#[derive(Debug)]
pub struct MemoryBackend {
    records: BTreeMap<String, BTreeMap<RecordId, Vec<u8>>>,
    version: Option<SchemaVersion>,
    next_id: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            version: None,
            next_id: 1,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemoryBackend {
    type Error = Infallible;

    fn recorded_version(&self) -> Result<Option<SchemaVersion>, Infallible> {
        Ok(self.version)
    }

    fn next_record_id(&self) -> Result<u64, Infallible> {
        Ok(self.next_id)
    }

    fn get(&self, entity: &str, id: RecordId) -> Result<Option<Vec<u8>>, Infallible> {
        Ok(self
            .records
            .get(entity)
            .and_then(|table| table.get(&id))
            .cloned())
    }

    fn scan(&self, entity: &str) -> Result<Vec<(RecordId, Vec<u8>)>, Infallible> {
        Ok(self
            .records
            .get(entity)
            .map(|table| table.iter().map(|(id, v)| (*id, v.clone())).collect())
            .unwrap_or_default())
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<(), Infallible> {
        for (entity, id, bytes) in batch.puts {
            self.records.entry(entity).or_default().insert(id, bytes);
        }
        for (entity, id) in batch.deletes {
            if let Some(table) = self.records.get_mut(&entity) {
                table.remove(&id);
            }
        }
        if let Some(version) = batch.set_version {
            self.version = Some(version);
        }
        if let Some(next_id) = batch.set_next_id {
            self.next_id = next_id;
        }
        Ok(())
    }
}
