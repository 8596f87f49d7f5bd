//! Demo: seed the catalog at v1, migrate it to v2, then roll back.
//!
//! Works against a redb file in the system temp directory; each run
//! starts from a fresh store.

use std::error::Error;

use tracing::info;

use strata_animals::{catalog_opener, seed_sample_data, ANIMAL, SCHEMA_V1, SCHEMA_V2};
use strata_migrate::{Direction, Value};
use strata_store::{FetchRequest, SortOrder};

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let path = std::env::temp_dir().join("strata-animals-demo.redb");
    let _ = std::fs::remove_file(&path);

    let opener = catalog_opener()?;

    let mut ctx = opener.open_path(&path, SCHEMA_V1, Direction::Forward)?;
    seed_sample_data(&mut ctx)?;
    let animals = ctx.fetch(&FetchRequest::entity(ANIMAL))?;
    info!(count = animals.len(), version = %ctx.version(), "catalog ready");
    drop(ctx);

    let ctx = opener.open_path(&path, SCHEMA_V2, Direction::Forward)?;
    let animals = ctx.fetch(&FetchRequest::entity(ANIMAL).sort_by("name", SortOrder::Ascending))?;
    for record in &animals {
        let name = record.get("name").and_then(Value::as_text).unwrap_or("?");
        let extinct = record
            .get("extinct")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        info!(name, extinct, "animal after forward migration");
    }
    drop(ctx);

    let ctx = opener.open_path(&path, SCHEMA_V1, Direction::Rollback)?;
    let animals = ctx.fetch(&FetchRequest::entity(ANIMAL))?;
    info!(count = animals.len(), version = %ctx.version(), "rolled back");

    Ok(())
}
