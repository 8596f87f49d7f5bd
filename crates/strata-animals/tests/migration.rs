//! End-to-end catalog scenarios against a durable store.

use std::path::Path;

use strata_animals::{
    catalog_opener, seed_sample_data, Diet, ANIMAL, ANIMAL_CATEGORY, SCHEMA_V1, SCHEMA_V2,
};
use strata_migrate::{Direction, Record, RecordId, Value};
use strata_store::{DataContext, FetchRequest, RedbBackend, SortOrder, StoreOpener};

fn seeded_store(opener: &StoreOpener, path: &Path) {
    let mut ctx = opener
        .open_path(path, SCHEMA_V1, Direction::Forward)
        .unwrap();
    seed_sample_data(&mut ctx).unwrap();
}

fn fetch_all(ctx: &DataContext<RedbBackend>, entity: &str) -> Vec<Record> {
    ctx.fetch(&FetchRequest::entity(entity)).unwrap()
}

fn category_id(ctx: &DataContext<RedbBackend>, name: &str) -> RecordId {
    fetch_all(ctx, ANIMAL_CATEGORY)
        .into_iter()
        .find(|r| r.get("name") == Some(&Value::Text(name.into())))
        .unwrap()
        .id
}

#[test]
fn six_animals_survive_forward_migration_and_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.redb");
    let opener = catalog_opener().unwrap();
    seeded_store(&opener, &path);

    // Forward: every v1 animal picks up extinct == false.
    let ctx = opener
        .open_path(&path, SCHEMA_V2, Direction::Forward)
        .unwrap();
    let animals = fetch_all(&ctx, ANIMAL);
    assert_eq!(animals.len(), 6);
    for animal in &animals {
        assert_eq!(animal.get("extinct"), Some(&Value::Bool(false)));
    }
    assert_eq!(fetch_all(&ctx, ANIMAL_CATEGORY).len(), 6);
    drop(ctx);

    // Rollback: count preserved, the v2-only field is gone.
    let ctx = opener
        .open_path(&path, SCHEMA_V1, Direction::Rollback)
        .unwrap();
    let animals = fetch_all(&ctx, ANIMAL);
    assert_eq!(animals.len(), 6);
    for animal in &animals {
        assert_eq!(animal.get("extinct"), None);
        assert!(animal.get("name").is_some());
        assert!(animal.get("diet").is_some());
    }
    assert_eq!(fetch_all(&ctx, ANIMAL_CATEGORY).len(), 6);
}

#[test]
fn category_references_survive_migration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.redb");
    let opener = catalog_opener().unwrap();
    seeded_store(&opener, &path);

    let ctx = opener
        .open_path(&path, SCHEMA_V2, Direction::Forward)
        .unwrap();
    let mammal = category_id(&ctx, "Mammal");
    let dog = fetch_all(&ctx, ANIMAL)
        .into_iter()
        .find(|r| r.get("name") == Some(&Value::Text("Dog".into())))
        .unwrap();
    assert_eq!(dog.get("category"), Some(&Value::Ref(mammal)));
}

#[test]
fn deleting_a_category_cascades_to_its_animals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.redb");
    let opener = catalog_opener().unwrap();
    seeded_store(&opener, &path);

    let mut ctx = opener
        .open_path(&path, SCHEMA_V1, Direction::Forward)
        .unwrap();
    let mammal = category_id(&ctx, "Mammal");
    ctx.delete(ANIMAL_CATEGORY, mammal).unwrap();
    ctx.save().unwrap();

    // All four mammals go with their category; the sparrow and the newt
    // stay.
    let animals = fetch_all(&ctx, ANIMAL);
    let mut names: Vec<_> = animals
        .iter()
        .map(|a| a.get("name").and_then(Value::as_text).unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["House sparrow", "Newt"]);
    assert_eq!(fetch_all(&ctx, ANIMAL_CATEGORY).len(), 5);
}

#[test]
fn duplicate_category_name_is_rejected_on_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.redb");
    let opener = catalog_opener().unwrap();
    seeded_store(&opener, &path);

    let mut ctx = opener
        .open_path(&path, SCHEMA_V1, Direction::Forward)
        .unwrap();
    ctx.insert(strata_animals::category("Mammal")).unwrap();
    assert!(ctx.save().is_err());

    // Nothing leaked through the failed commit.
    ctx.discard();
    assert_eq!(fetch_all(&ctx, ANIMAL_CATEGORY).len(), 6);
}

#[test]
fn herbivores_query_filters_and_sorts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.redb");
    let opener = catalog_opener().unwrap();
    seeded_store(&opener, &path);

    let ctx = opener
        .open_path(&path, SCHEMA_V1, Direction::Forward)
        .unwrap();
    let herbivores = ctx
        .fetch(
            &FetchRequest::entity(ANIMAL)
                .filter(|r| r.get("diet") == Some(&Diet::Herbivorous.value()))
                .sort_by("name", SortOrder::Ascending),
        )
        .unwrap();
    let names: Vec<_> = herbivores
        .iter()
        .map(|r| r.get("name").and_then(Value::as_text).unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Red kangaroo", "Southern gibbon"]);
}

#[test]
fn reopening_keeps_ids_stable_across_the_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.redb");
    let opener = catalog_opener().unwrap();
    seeded_store(&opener, &path);

    let ctx = opener
        .open_path(&path, SCHEMA_V1, Direction::Forward)
        .unwrap();
    let mut ids: Vec<_> = fetch_all(&ctx, ANIMAL).iter().map(|r| r.id).collect();
    ids.sort();
    drop(ctx);

    let ctx = opener
        .open_path(&path, SCHEMA_V2, Direction::Forward)
        .unwrap();
    drop(ctx);
    let ctx = opener
        .open_path(&path, SCHEMA_V1, Direction::Rollback)
        .unwrap();

    let mut after: Vec<_> = fetch_all(&ctx, ANIMAL).iter().map(|r| r.id).collect();
    after.sort();
    assert_eq!(after, ids);

    // New inserts never reuse an id from before the round trip.
    let mut ctx = ctx;
    let fresh = ctx
        .insert(strata_animals::animal("Dodo", Diet::Herbivorous, None))
        .unwrap();
    assert!(fresh > *after.last().unwrap());
}
