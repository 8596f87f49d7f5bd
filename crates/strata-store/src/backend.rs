use strata_migrate::{RecordId, SchemaVersion};

/// A batched set of mutations, applied atomically by a backend.
///
/// One batch is one transaction: all of it commits or none of it does.
/// Carrying the recorded-version bump in the same batch is what makes a
/// migration stage all-or-nothing — the version only advances if every
/// record change of that stage lands with it.
#[derive(Debug, Default)]
pub struct WriteBatch {
    /// `(entity, id, encoded record)` upserts.
    pub puts: Vec<(String, RecordId, Vec<u8>)>,
    /// `(entity, id)` removals.
    pub deletes: Vec<(String, RecordId)>,
    /// New recorded schema version, if this batch moves it.
    pub set_version: Option<SchemaVersion>,
    /// New value for the record-id allocation counter.
    pub set_next_id: Option<u64>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
            && self.deletes.is_empty()
            && self.set_version.is_none()
            && self.set_next_id.is_none()
    }
}

/// A durable (or in-memory) store holding opaque record bytes plus two
/// pieces of metadata: the recorded schema version and the id counter.
///
/// Backends do not interpret records; shaping and validation belong to the
/// data context and the migration engine.
pub trait StoreBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The schema version this store was last committed at.
    /// `None` means a fresh store with no data.
    fn recorded_version(&self) -> Result<Option<SchemaVersion>, Self::Error>;

    /// The next unused record id (peek only; advanced via [`WriteBatch`]).
    fn next_record_id(&self) -> Result<u64, Self::Error>;

    /// Fetch one record's bytes.
    fn get(&self, entity: &str, id: RecordId) -> Result<Option<Vec<u8>>, Self::Error>;

    /// All records of an entity type, ascending by id.
    fn scan(&self, entity: &str) -> Result<Vec<(RecordId, Vec<u8>)>, Self::Error>;

    /// Apply a batch atomically.
    fn apply(&mut self, batch: WriteBatch) -> Result<(), Self::Error>;
}
