//! Postcard codec for records and version metadata.

use strata_migrate::{Record, SchemaVersion};

use crate::error::StoreError;

pub(crate) fn encode_record(record: &Record) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(record).map_err(|e| StoreError::Encode {
        entity: record.entity.clone(),
        reason: e.to_string(),
    })
}

pub(crate) fn decode_record(entity: &str, bytes: &[u8]) -> Result<Record, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::Decode {
        entity: entity.to_string(),
        reason: e.to_string(),
    })
}

/// Version metadata codec, shared by backends so stores stay readable
/// across backend implementations.
pub(crate) fn encode_version(version: &SchemaVersion) -> Result<Vec<u8>, postcard::Error> {
    postcard::to_allocvec(version)
}

pub(crate) fn decode_version(bytes: &[u8]) -> Result<SchemaVersion, postcard::Error> {
    postcard::from_bytes(bytes)
}
