//! Schema registry module
//!
//! Stream schemas are JSON Schema documents compiled once at catalog load
//! into typed field trees, then used to validate and coerce every record.
//!
//! # Features
//!
//! - **Fail-fast compilation**: unsupported types are rejected up front
//! - **Coercion**: numeric strings, `"true"`/`"false"`, empty strings as null
//! - **Unknown fields**: dropped and reported, never an error
//! - **Primary keys**: missing or null key fields flag a key violation

mod compile;
mod registry;
mod types;
mod validate;

pub use compile::{Field, FieldType, StreamSchema};
pub use registry::SchemaRegistry;
pub use types::{JsonSchema, JsonType, JsonTypeOrArray, SchemaProperty};
pub use validate::{coerce, parse_datetime, ValidatedRecord, ValidationError};
