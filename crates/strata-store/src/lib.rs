//! # strata-store
//!
//! Persistence for the strata migration engine: storage backends, the
//! transactional [`DataContext`], and the [`StoreOpener`] that brings a
//! store to a target schema version before handing it to the application.
//!
//! ## Quick start
//!
//! ```
//! use strata_migrate::{
//!     EntityDescriptor, FieldDescriptor, FieldKind, Record, SchemaDescriptor,
//!     SchemaRegistry, SchemaVersion, Value,
//! };
//! use strata_store::{DataContext, FetchRequest, MemoryBackend};
//!
//! let v1 = SchemaVersion::new(1, 0, 0);
//! let schema = SchemaDescriptor::new(v1).entity(
//!     EntityDescriptor::new("widget")
//!         .field(FieldDescriptor::required("name", FieldKind::Text)),
//! );
//!
//! let mut ctx = DataContext::new(MemoryBackend::new(), schema).unwrap();
//! ctx.insert(Record::new("widget").with_field("name", Value::Text("gear".into())))
//!     .unwrap();
//! ctx.save().unwrap();
//!
//! let widgets = ctx.fetch(&FetchRequest::entity("widget")).unwrap();
//! assert_eq!(widgets.len(), 1);
//! ```
//!
//! ## Backends
//!
//! | Backend | Feature flag | Use case |
//! |---------|--------------|----------|
//! | [`MemoryBackend`] | *(always available)* | Testing, prototyping |
//! | `RedbBackend` | `redb` *(default)* | Durable single-file store, pure Rust |
//!
//! A store location is one file path; opening a path with no store present
//! creates a fresh store at the requested version.

mod backend;
mod codec;
mod context;
mod error;
mod memory;
mod opener;
#[cfg(feature = "redb")]
mod redb;

pub use backend::{StoreBackend, WriteBatch};
pub use context::{DataContext, FetchRequest, SortOrder};
pub use error::{OpenError, StoreError};
pub use memory::MemoryBackend;
pub use opener::{StoreConfig, StoreOpener};
#[cfg(feature = "redb")]
pub use redb::{RedbBackend, RedbError};
