//! Record extraction from decoded response bodies
//!
//! A stream's `records_path` points at the array of entities inside the JSON
//! payload. Plain dot paths (`data.publisherCommissions.records`) are walked
//! directly; paths with wildcards go through JSONPath.

mod extractor;

pub use extractor::{graphql_errors, RecordExtractor};
