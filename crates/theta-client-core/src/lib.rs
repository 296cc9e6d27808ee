#![forbid(unsafe_code)]

//! Data model shared by the ingestion pipeline: the logical query, the
//! deterministic object-key format, the schema-tag enumeration, and a
//! reference schema table.

mod error;
mod object_key;
mod query;
pub mod schema;

pub use error::{Error, Result};
pub use object_key::object_key;
pub use query::{
    AssetClass, DataType, Endpoint, FileGranularity, Interval, LogicalQuery, SchemaTag,
    schema_tag_for,
};
