//! The transactional data context.
//!
//! A [`DataContext`] is the handle migration hooks and application code use
//! to query, insert, mutate, and persist records. It owns its backend —
//! one active context per store location, which is the whole concurrency
//! model — and stages every change in memory until [`DataContext::save`]
//! flushes them as one atomic batch.
//!
//! Staged changes are visible to fetches within the same context
//! (read-your-writes) but never durable before `save`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use strata_migrate::{
    DeleteRule, EntityDescriptor, HookError, Record, RecordId, SchemaDescriptor, SchemaVersion,
    StageContext, Value,
};

use crate::backend::{StoreBackend, WriteBatch};
use crate::codec;
use crate::error::StoreError;

/// Sort direction for [`FetchRequest::sort_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A query against one entity type: optional predicate, optional sort.
///
/// Fetches are restartable — running the same request again re-queries the
/// context's current view.
pub struct FetchRequest {
    entity: String,
    predicate: Option<Box<dyn Fn(&Record) -> bool>>,
    sort: Option<(String, SortOrder)>,
}

impl FetchRequest {
    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            entity: name.into(),
            predicate: None,
            sort: None,
        }
    }

    /// Keep only records matching the predicate.
    pub fn filter(mut self, predicate: impl Fn(&Record) -> bool + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Sort results by a field. Records missing the field sort as `Null`.
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }
}

#[derive(Debug, Clone)]
enum Staged {
    Put(Record),
    Delete,
}

/// Transactional handle over one store, shaped by one schema version.
#[derive(Debug)]
pub struct DataContext<B: StoreBackend> {
    backend: B,
    schema: SchemaDescriptor,
    staged: BTreeMap<(String, RecordId), Staged>,
    staged_version: Option<SchemaVersion>,
    next_id: u64,
}

impl<B: StoreBackend> DataContext<B> {
    /// Wrap a backend in a context shaped by the given schema descriptor.
    pub fn new(backend: B, schema: SchemaDescriptor) -> Result<Self, StoreError> {
        let next_id = backend.next_record_id().map_err(backend_err)?;
        Ok(Self {
            backend,
            schema,
            staged: BTreeMap::new(),
            staged_version: None,
            next_id,
        })
    }

    /// The schema descriptor this context validates against.
    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// The schema version this context is positioned at.
    pub fn version(&self) -> SchemaVersion {
        self.schema.version
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Release the context, recovering the backend. Staged, unsaved work is
    /// abandoned.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Whether any staged changes await [`DataContext::save`].
    pub fn has_pending(&self) -> bool {
        !self.staged.is_empty() || self.staged_version.is_some()
    }

    /// Drop all staged changes without persisting them.
    pub fn discard(&mut self) {
        self.staged.clear();
        self.staged_version = None;
    }

    /// Record that the next `save` moves the store to `version`. Used by
    /// the opener so a stage's data and version bump commit together.
    pub(crate) fn stage_version(&mut self, version: SchemaVersion) {
        self.staged_version = Some(version);
    }

    /// Run a query. Returns matching records, staged changes included.
    pub fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>, StoreError> {
        if self.schema.entity_named(&request.entity).is_none() {
            return Err(StoreError::UnknownEntity(
                request.entity.clone(),
                self.schema.version,
            ));
        }
        let mut records = self.scan_merged(&request.entity)?;
        if let Some(predicate) = &request.predicate {
            records.retain(|r| predicate(r));
        }
        if let Some((field, order)) = &request.sort {
            records.sort_by(|a, b| {
                let av = a.get(field).unwrap_or(&Value::Null);
                let bv = b.get(field).unwrap_or(&Value::Null);
                let ord = compare_values(av, bv);
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }
        Ok(records)
    }

    /// Stage a new record for persistence; returns its assigned id.
    ///
    /// The record is normalized against the schema: declared defaults fill
    /// absent fields, absent optionals become `Null`, unknown or missing
    /// required fields are rejected.
    pub fn insert(&mut self, mut record: Record) -> Result<RecordId, StoreError> {
        let descriptor = self.descriptor(&record.entity)?;
        normalize_record(descriptor, &mut record)?;
        record.id = RecordId(self.next_id);
        self.next_id += 1;
        let key = (record.entity.clone(), record.id);
        self.staged.insert(key, Staged::Put(record.clone()));
        Ok(record.id)
    }

    /// Stage an updated version of an already-persisted record.
    pub fn update(&mut self, mut record: Record) -> Result<(), StoreError> {
        if record.id == RecordId(0) {
            return Err(StoreError::UnassignedId);
        }
        let descriptor = self.descriptor(&record.entity)?;
        normalize_record(descriptor, &mut record)?;
        let key = (record.entity.clone(), record.id);
        self.staged.insert(key, Staged::Put(record));
        Ok(())
    }

    /// Stage removal of a record, cascading per the schema's delete rules.
    ///
    /// Deleting an owner enumerates its owned records (those whose inverse
    /// reference field points at it) and deletes them too, transitively.
    pub fn delete(&mut self, entity: &str, id: RecordId) -> Result<(), StoreError> {
        let mut worklist = vec![(entity.to_string(), id)];
        while let Some((entity, id)) = worklist.pop() {
            let key = (entity.clone(), id);
            if matches!(self.staged.get(&key), Some(Staged::Delete)) {
                continue; // already going; guards against reference cycles
            }

            if let Some(descriptor) = self.schema.entity_named(&entity) {
                let cascades: Vec<_> = descriptor
                    .relationships
                    .iter()
                    .filter(|r| r.on_delete == DeleteRule::Cascade)
                    .cloned()
                    .collect();
                for relationship in cascades {
                    for owned in self.scan_merged(&relationship.target)? {
                        if owned.get(&relationship.inverse_field) == Some(&Value::Ref(id)) {
                            worklist.push((relationship.target.clone(), owned.id));
                        }
                    }
                }
            }

            self.staged.insert(key, Staged::Delete);
        }
        Ok(())
    }

    /// Flush all staged changes (and any staged version bump) durably and
    /// atomically. On success the context is clean; on failure nothing was
    /// applied and the staged work is kept, safe to retry.
    pub fn save(&mut self) -> Result<(), StoreError> {
        self.validate_unique()?;

        let mut batch = WriteBatch::default();
        for ((entity, id), staged) in &self.staged {
            match staged {
                Staged::Put(record) => {
                    batch
                        .puts
                        .push((entity.clone(), *id, codec::encode_record(record)?));
                }
                Staged::Delete => batch.deletes.push((entity.clone(), *id)),
            }
        }
        batch.set_next_id = Some(self.next_id);
        batch.set_version = self.staged_version;

        debug!(
            puts = batch.puts.len(),
            deletes = batch.deletes.len(),
            version = ?batch.set_version,
            "committing data context"
        );

        self.backend
            .apply(batch)
            .map_err(|e| StoreError::TransactionCommitFailed(Box::new(e)))?;

        self.staged.clear();
        self.staged_version = None;
        Ok(())
    }

    fn descriptor(&self, entity: &str) -> Result<&EntityDescriptor, StoreError> {
        self.schema
            .entity_named(entity)
            .ok_or_else(|| StoreError::UnknownEntity(entity.to_string(), self.schema.version))
    }

    /// Backend records overlaid with staged changes, ascending by id.
    /// Unknown entity names simply yield nothing; the structural remap
    /// relies on this to enumerate entities the current schema dropped.
    fn scan_merged(&self, entity: &str) -> Result<Vec<Record>, StoreError> {
        let mut merged: BTreeMap<RecordId, Record> = BTreeMap::new();
        for (id, bytes) in self.backend.scan(entity).map_err(backend_err)? {
            merged.insert(id, codec::decode_record(entity, &bytes)?);
        }
        for ((staged_entity, id), staged) in &self.staged {
            if staged_entity != entity {
                continue;
            }
            match staged {
                Staged::Put(record) => {
                    merged.insert(*id, record.clone());
                }
                Staged::Delete => {
                    merged.remove(id);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    fn validate_unique(&self) -> Result<(), StoreError> {
        // Only entities with staged puts can introduce a violation.
        let mut touched: BTreeSet<&str> = BTreeSet::new();
        for ((entity, _), staged) in &self.staged {
            if matches!(staged, Staged::Put(_)) {
                touched.insert(entity);
            }
        }

        for entity in touched {
            let Some(descriptor) = self.schema.entity_named(entity) else {
                continue;
            };
            for field in descriptor.fields.iter().filter(|f| f.unique) {
                let mut seen = BTreeSet::new();
                for record in self.scan_merged(entity)? {
                    let Some(value) = record.get(&field.name) else {
                        continue;
                    };
                    if value.is_null() {
                        continue;
                    }
                    if !seen.insert(format!("{value:?}")) {
                        return Err(StoreError::UniqueViolation {
                            entity: entity.to_string(),
                            field: field.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Hook-facing view of the context during migration stages.
impl<B: StoreBackend> StageContext for DataContext<B> {
    fn fetch_all(&self, entity: &str) -> Result<Vec<Record>, HookError> {
        self.scan_merged(entity).map_err(into_hook)
    }

    fn insert(&mut self, record: Record) -> Result<RecordId, HookError> {
        DataContext::insert(self, record).map_err(into_hook)
    }

    fn update(&mut self, record: Record) -> Result<(), HookError> {
        DataContext::update(self, record).map_err(into_hook)
    }

    fn delete(&mut self, entity: &str, id: RecordId) -> Result<(), HookError> {
        DataContext::delete(self, entity, id).map_err(into_hook)
    }
}

fn into_hook(e: StoreError) -> HookError {
    Box::new(e)
}

fn backend_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> StoreError {
    StoreError::Backend(Box::new(e))
}

fn normalize_record(descriptor: &EntityDescriptor, record: &mut Record) -> Result<(), StoreError> {
    for name in record.fields.keys() {
        if descriptor.field_named(name).is_none() {
            return Err(StoreError::UnknownField {
                entity: descriptor.name.clone(),
                field: name.clone(),
            });
        }
    }
    for field in &descriptor.fields {
        if record.fields.contains_key(&field.name) {
            continue;
        }
        let value = match &field.default {
            Some(default) => default.clone(),
            None if field.optional => Value::Null,
            None => {
                return Err(StoreError::MissingField {
                    entity: descriptor.name.clone(),
                    field: field.name.clone(),
                })
            }
        };
        record.fields.insert(field.name.clone(), value);
    }
    Ok(())
}

/// Total order over values for sorting: `Null` first, then by value within
/// a kind; mixed kinds compare as equal.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Ref(x), Value::Ref(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
