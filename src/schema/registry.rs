//! Schema registry
//!
//! Holds every selected stream's compiled schema. Filled once at catalog
//! load, read-only afterwards.

use super::compile::StreamSchema;
use super::validate::{ValidatedRecord, ValidationError};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use std::collections::HashMap;

/// Compiled schemas keyed by stream name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, StreamSchema>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled schema; a stream can only be registered once
    pub fn register(&mut self, schema: StreamSchema) -> Result<()> {
        let stream = schema.stream().to_string();
        if self.schemas.contains_key(&stream) {
            return Err(Error::catalog(format!(
                "Schema for stream '{stream}' registered twice"
            )));
        }
        self.schemas.insert(stream, schema);
        Ok(())
    }

    /// Look up a stream's schema
    pub fn get(&self, stream: &str) -> Option<&StreamSchema> {
        self.schemas.get(stream)
    }

    /// Validate a raw record for a stream.
    ///
    /// Unknown streams are a configuration defect and fail loudly.
    pub fn validate(
        &self,
        stream: &str,
        raw: &JsonValue,
    ) -> Result<std::result::Result<ValidatedRecord, ValidationError>> {
        let schema = self.get(stream).ok_or_else(|| Error::StreamNotFound {
            stream: stream.to_string(),
        })?;
        Ok(schema.validate(raw))
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
