//! Migration stages: directional transformations between adjacent schema
//! versions, with pre/post hooks around an explicit structural remap.

use core::fmt;
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{HookError, StageError};
use crate::record::{Record, RecordId, Value};
use crate::registry::SchemaDescriptor;
use crate::version::SchemaVersion;

/// The slice of the data context visible to migration hooks.
///
/// Object-safe so hooks can be plain boxed closures. Reads are unvalidated
/// against the context's schema: the structural remap must be able to
/// enumerate entity types that exist only in the source schema, and an
/// entity type with nothing stored simply yields no records.
pub trait StageContext {
    /// Every record of an entity type, staged changes included.
    fn fetch_all(&self, entity: &str) -> Result<Vec<Record>, HookError>;
    /// Stage a new record; returns the assigned id.
    fn insert(&mut self, record: Record) -> Result<RecordId, HookError>;
    /// Stage an updated version of an existing record.
    fn update(&mut self, record: Record) -> Result<(), HookError>;
    /// Stage removal of a record (cascading per the schema's delete rules).
    fn delete(&mut self, entity: &str, id: RecordId) -> Result<(), HookError>;
}

type Hook = Box<dyn Fn(&mut dyn StageContext) -> Result<(), HookError> + Send + Sync>;

/// A single transformation step between two adjacent schema versions.
///
/// Stages are directional: a stage for v1→v2 is distinct from one for
/// v2→v1. Hooks run at most once per migration run per stage.
pub struct MigrationStage {
    from: SchemaVersion,
    to: SchemaVersion,
    pre: Option<Hook>,
    post: Option<Hook>,
}

impl fmt::Debug for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStage")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .finish()
    }
}

impl MigrationStage {
    /// A stage with no hooks; only the structural remap runs.
    pub fn lightweight(from: SchemaVersion, to: SchemaVersion) -> Self {
        Self {
            from,
            to,
            pre: None,
            post: None,
        }
    }

    /// A stage with custom pre/post hooks around the structural remap.
    pub fn custom<Pre, Post>(from: SchemaVersion, to: SchemaVersion, pre: Pre, post: Post) -> Self
    where
        Pre: Fn(&mut dyn StageContext) -> Result<(), HookError> + Send + Sync + 'static,
        Post: Fn(&mut dyn StageContext) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Self {
            from,
            to,
            pre: Some(Box::new(pre)),
            post: Some(Box::new(post)),
        }
    }

    pub fn from_version(&self) -> SchemaVersion {
        self.from
    }

    pub fn to_version(&self) -> SchemaVersion {
        self.to
    }

    /// Execute the stage against a transaction-scoped context:
    /// pre-hook, then structural remap, then post-hook.
    ///
    /// The caller owns the transaction boundary; nothing staged here is
    /// durable until the caller commits.
    pub fn run(
        &self,
        from_desc: &SchemaDescriptor,
        to_desc: &SchemaDescriptor,
        ctx: &mut dyn StageContext,
    ) -> Result<(), StageError> {
        debug!(from = %self.from, to = %self.to, "running migration stage");

        if let Some(pre) = &self.pre {
            pre(ctx).map_err(|cause| StageError::PreHook {
                from: self.from,
                to: self.to,
                cause,
            })?;
        }

        remap_records(from_desc, to_desc, ctx)?;

        if let Some(post) = &self.post {
            post(ctx).map_err(|cause| StageError::PostHook {
                from: self.from,
                to: self.to,
                cause,
            })?;
        }

        Ok(())
    }
}

/// Structural remap: reshape every record of the source schema into the
/// target schema's shape.
///
/// For each entity present in both schemas, each record keeps the fields
/// the target declares, fills newly introduced fields from their declared
/// default (`Null` for optionals without one), and drops removed fields.
/// Entities absent from the target schema are deleted wholesale. Entities
/// only in the target have no records yet and are left alone.
pub fn remap_records(
    from_desc: &SchemaDescriptor,
    to_desc: &SchemaDescriptor,
    ctx: &mut dyn StageContext,
) -> Result<(), StageError> {
    for entity in &from_desc.entities {
        let records = ctx.fetch_all(&entity.name).map_err(StageError::Context)?;

        let Some(target) = to_desc.entity_named(&entity.name) else {
            for record in records {
                ctx.delete(&entity.name, record.id)
                    .map_err(StageError::Context)?;
            }
            continue;
        };

        for mut record in records {
            let mut fields = BTreeMap::new();
            for field in &target.fields {
                let value = match record.fields.remove(&field.name) {
                    Some(value) => value,
                    None => match &field.default {
                        Some(default) => default.clone(),
                        None if field.optional => Value::Null,
                        None => {
                            return Err(StageError::MissingDefault {
                                entity: target.name.clone(),
                                field: field.name.clone(),
                            })
                        }
                    },
                };
                fields.insert(field.name.clone(), value);
            }
            record.fields = fields;
            ctx.update(record).map_err(StageError::Context)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EntityDescriptor, FieldDescriptor, FieldKind};

    /// Minimal in-memory context for exercising stages without a store.
    #[derive(Default)]
    struct FakeContext {
        records: BTreeMap<(String, RecordId), Record>,
        next_id: u64,
    }

    impl FakeContext {
        fn put(&mut self, mut record: Record) -> RecordId {
            self.next_id += 1;
            record.id = RecordId(self.next_id);
            let key = (record.entity.clone(), record.id);
            self.records.insert(key, record);
            RecordId(self.next_id)
        }
    }

    impl StageContext for FakeContext {
        fn fetch_all(&self, entity: &str) -> Result<Vec<Record>, HookError> {
            Ok(self
                .records
                .values()
                .filter(|r| r.entity == entity)
                .cloned()
                .collect())
        }

        fn insert(&mut self, record: Record) -> Result<RecordId, HookError> {
            Ok(self.put(record))
        }

        fn update(&mut self, record: Record) -> Result<(), HookError> {
            let key = (record.entity.clone(), record.id);
            self.records.insert(key, record);
            Ok(())
        }

        fn delete(&mut self, entity: &str, id: RecordId) -> Result<(), HookError> {
            self.records.remove(&(entity.to_string(), id));
            Ok(())
        }
    }

    fn v1() -> SchemaVersion {
        SchemaVersion::new(1, 0, 0)
    }

    fn v2() -> SchemaVersion {
        SchemaVersion::new(2, 0, 0)
    }

    fn schema_v1() -> SchemaDescriptor {
        SchemaDescriptor::new(v1()).entity(
            EntityDescriptor::new("widget")
                .field(FieldDescriptor::required("name", FieldKind::Text)),
        )
    }

    fn schema_v2() -> SchemaDescriptor {
        SchemaDescriptor::new(v2()).entity(
            EntityDescriptor::new("widget")
                .field(FieldDescriptor::required("name", FieldKind::Text))
                .field(
                    FieldDescriptor::optional("retired", FieldKind::Bool)
                        .with_default(Value::Bool(false)),
                ),
        )
    }

    #[test]
    fn remap_fills_declared_default() {
        let mut ctx = FakeContext::default();
        ctx.put(Record::new("widget").with_field("name", Value::Text("a".into())));
        ctx.put(Record::new("widget").with_field("name", Value::Text("b".into())));

        remap_records(&schema_v1(), &schema_v2(), &mut ctx).unwrap();

        let widgets = ctx.fetch_all("widget").unwrap();
        assert_eq!(widgets.len(), 2);
        for w in widgets {
            assert_eq!(w.get("retired"), Some(&Value::Bool(false)));
        }
    }

    #[test]
    fn remap_drops_removed_fields() {
        let mut ctx = FakeContext::default();
        ctx.put(
            Record::new("widget")
                .with_field("name", Value::Text("a".into()))
                .with_field("retired", Value::Bool(true)),
        );

        // Rollback direction: v2 shape back to v1 shape.
        remap_records(&schema_v2(), &schema_v1(), &mut ctx).unwrap();

        let widgets = ctx.fetch_all("widget").unwrap();
        assert_eq!(widgets.len(), 1);
        assert!(widgets[0].get("retired").is_none());
        assert_eq!(widgets[0].get("name"), Some(&Value::Text("a".into())));
    }

    #[test]
    fn remap_nulls_absent_optionals_without_default() {
        let target = SchemaDescriptor::new(v2()).entity(
            EntityDescriptor::new("widget")
                .field(FieldDescriptor::required("name", FieldKind::Text))
                .field(FieldDescriptor::optional("note", FieldKind::Text)),
        );

        let mut ctx = FakeContext::default();
        ctx.put(Record::new("widget").with_field("name", Value::Text("a".into())));

        remap_records(&schema_v1(), &target, &mut ctx).unwrap();

        let widgets = ctx.fetch_all("widget").unwrap();
        assert_eq!(widgets[0].get("note"), Some(&Value::Null));
    }

    #[test]
    fn remap_fails_on_required_field_without_default() {
        let target = SchemaDescriptor::new(v2()).entity(
            EntityDescriptor::new("widget")
                .field(FieldDescriptor::required("name", FieldKind::Text))
                .field(FieldDescriptor::required("serial", FieldKind::Int)),
        );

        let mut ctx = FakeContext::default();
        ctx.put(Record::new("widget").with_field("name", Value::Text("a".into())));

        let err = remap_records(&schema_v1(), &target, &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            StageError::MissingDefault { ref entity, ref field }
                if entity == "widget" && field == "serial"
        ));
    }

    #[test]
    fn remap_deletes_entities_absent_from_target() {
        let target = SchemaDescriptor::new(v2());

        let mut ctx = FakeContext::default();
        ctx.put(Record::new("widget").with_field("name", Value::Text("a".into())));

        remap_records(&schema_v1(), &target, &mut ctx).unwrap();
        assert!(ctx.fetch_all("widget").unwrap().is_empty());
    }

    #[test]
    fn run_executes_pre_remap_post_in_order() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let order = Arc::new(AtomicUsize::new(0));
        let pre_seen = Arc::new(AtomicUsize::new(0));
        let post_seen = Arc::new(AtomicUsize::new(0));

        let stage = {
            let order_pre = Arc::clone(&order);
            let order_post = Arc::clone(&order);
            let pre_seen = Arc::clone(&pre_seen);
            let post_seen = Arc::clone(&post_seen);
            MigrationStage::custom(
                v1(),
                v2(),
                move |_ctx| {
                    pre_seen.store(order_pre.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
                    Ok(())
                },
                move |ctx| {
                    post_seen
                        .store(order_post.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst);
                    // Remap already ran: the new field is visible here.
                    let widgets = ctx.fetch_all("widget")?;
                    assert!(widgets
                        .iter()
                        .all(|w| w.get("retired") == Some(&Value::Bool(false))));
                    Ok(())
                },
            )
        };

        let mut ctx = FakeContext::default();
        ctx.put(Record::new("widget").with_field("name", Value::Text("a".into())));

        stage.run(&schema_v1(), &schema_v2(), &mut ctx).unwrap();
        assert_eq!(pre_seen.load(Ordering::SeqCst), 1);
        assert_eq!(post_seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failing_pre_hook_is_reported_with_stage_identity() {
        let stage = MigrationStage::custom(
            v1(),
            v2(),
            |_ctx| Err("boom".into()),
            |_ctx| Ok(()),
        );

        let mut ctx = FakeContext::default();
        let err = stage.run(&schema_v1(), &schema_v2(), &mut ctx).unwrap_err();
        assert!(matches!(err, StageError::PreHook { from, to, .. }
            if from == v1() && to == v2()));
    }

    #[test]
    fn lightweight_stage_runs_only_the_remap() {
        let stage = MigrationStage::lightweight(v1(), v2());
        let mut ctx = FakeContext::default();
        ctx.put(Record::new("widget").with_field("name", Value::Text("a".into())));

        stage.run(&schema_v1(), &schema_v2(), &mut ctx).unwrap();

        let widgets = ctx.fetch_all("widget").unwrap();
        assert_eq!(widgets[0].get("retired"), Some(&Value::Bool(false)));
    }
}
