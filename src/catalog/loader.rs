//! Catalog loading and validation
//!
//! Catalogs start from the built-in CJ definitions and can be extended or
//! adjusted by a YAML or JSON file. Every definition is validated up front so
//! a bad catalog fails before any request is made.

use super::types::{CatalogFile, StreamDefinition, StreamOverride};
use crate::error::{Error, Result};
use crate::pagination::PaginationConfig;
use crate::schema::{SchemaRegistry, StreamSchema};
use crate::template;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// An ordered, validated set of stream definitions
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    base_url: Option<String>,
    streams: Vec<StreamDefinition>,
}

impl Catalog {
    /// Build a catalog from definitions, validating each one
    pub fn new(base_url: Option<String>, streams: Vec<StreamDefinition>) -> Result<Self> {
        let catalog = Self { base_url, streams };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog document (YAML, which also accepts JSON)
    pub fn parse(content: &str) -> Result<Self> {
        let file = parse_file(content)?;
        Self::new(None, Vec::new())?.merge(file)
    }

    /// Load a catalog file from disk
    pub fn read_file(path: impl AsRef<Path>) -> Result<CatalogFile> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::catalog(format!(
                "Failed to read catalog file '{}': {e}",
                path.display()
            ))
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| {
                Error::catalog(format!("Failed to parse catalog '{}': {e}", path.display()))
            })
        } else {
            parse_file(&content)
        }
    }

    /// Apply a catalog file: known names adjust existing streams, new names
    /// append full definitions
    pub fn merge(mut self, file: CatalogFile) -> Result<Self> {
        if file.base_url.is_some() {
            self.base_url = file.base_url;
        }

        for entry in file.streams {
            let name = entry
                .get("name")
                .or_else(|| entry.get("tap_stream_id"))
                .and_then(Value::as_str)
                .ok_or_else(|| Error::catalog("Catalog entry without a name"))?
                .to_string();

            match self.streams.iter_mut().find(|s| s.name == name) {
                Some(existing) => {
                    let adjust: StreamOverride = serde_json::from_value(entry).map_err(|e| {
                        Error::catalog(format!("Invalid entry for stream '{name}': {e}"))
                    })?;
                    if let Some(selected) = adjust.selected {
                        existing.selected = selected;
                    }
                    if let Some(schema) = adjust.schema {
                        existing.schema = schema;
                    }
                    debug!(stream = %name, "Applied catalog override");
                }
                None => {
                    let definition: StreamDefinition =
                        serde_json::from_value(entry).map_err(|e| {
                            Error::catalog(format!("Invalid definition for stream '{name}': {e}"))
                        })?;
                    self.streams.push(definition);
                }
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Base URL for relative stream paths
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// All streams in catalog order
    pub fn streams(&self) -> &[StreamDefinition] {
        &self.streams
    }

    /// Selected streams in catalog order
    pub fn selected(&self) -> impl Iterator<Item = &StreamDefinition> {
        self.streams.iter().filter(|s| s.selected)
    }

    /// Look up a stream by name
    pub fn get(&self, name: &str) -> Option<&StreamDefinition> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Stream names in catalog order
    pub fn names(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.name.as_str()).collect()
    }

    /// Restrict selection to the named streams
    pub fn select_only(mut self, names: &[String]) -> Result<Self> {
        for name in names {
            if self.get(name).is_none() {
                return Err(Error::StreamNotFound {
                    stream: name.clone(),
                });
            }
        }
        for stream in &mut self.streams {
            stream.selected = names.contains(&stream.name);
        }
        Ok(self)
    }

    /// Set the page size of every offset-paginated stream
    pub fn with_page_size(mut self, size: u64) -> Result<Self> {
        for stream in &mut self.streams {
            if let PaginationConfig::Offset { limit, .. } = &mut stream.pagination {
                *limit = size;
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Compile the schemas of every selected stream
    pub fn schema_registry(&self) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        for stream in self.selected() {
            registry.register(StreamSchema::compile(
                &stream.name,
                &stream.schema,
                &stream.primary_key,
            )?)?;
        }
        Ok(registry)
    }

    /// Catalog document printed by `discover`
    pub fn to_discovery_json(&self) -> Value {
        let streams: Vec<Value> = self
            .streams
            .iter()
            .map(|s| {
                json!({
                    "tap_stream_id": s.name,
                    "stream": s.name,
                    "selected": s.selected,
                    "key_properties": s.primary_key,
                    "replication_method": s.replication_method,
                    "replication_key": s.replication_key,
                    "schema": s.schema,
                })
            })
            .collect();
        json!({ "streams": streams })
    }

    /// Validate every definition
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for stream in &self.streams {
            if !seen.insert(stream.name.as_str()) {
                return Err(Error::catalog(format!(
                    "Duplicate stream name '{}'",
                    stream.name
                )));
            }
            validate_stream(stream)?;
        }
        Ok(())
    }
}

fn parse_file(content: &str) -> Result<CatalogFile> {
    serde_yaml::from_str(content)
        .map_err(|e| Error::catalog(format!("Failed to parse catalog: {e}")))
}

/// Validate a single stream definition
fn validate_stream(stream: &StreamDefinition) -> Result<()> {
    let name = &stream.name;
    if name.is_empty() {
        return Err(Error::catalog("Stream name cannot be empty"));
    }
    if stream.path.is_empty() {
        return Err(Error::schema(name.as_str(), "path cannot be empty"));
    }

    let schema = StreamSchema::compile(name, &stream.schema, &stream.primary_key)?;

    match (&stream.replication_key, stream.is_incremental()) {
        (Some(key), _) => {
            let field = schema.field(key).ok_or_else(|| {
                Error::schema(
                    name.as_str(),
                    format!("replication key '{key}' is not declared in the schema"),
                )
            })?;
            if stream.is_incremental() && !field.ty.is_orderable() {
                return Err(Error::schema(
                    name.as_str(),
                    format!(
                        "replication key '{key}' has type {}, which cannot be ordered",
                        field.ty.name()
                    ),
                ));
            }
        }
        (None, true) => {
            return Err(Error::schema(
                name.as_str(),
                "incremental streams need a replication_key",
            ));
        }
        (None, false) => {}
    }

    match &stream.pagination {
        PaginationConfig::Offset { limit: 0, .. } => {
            return Err(Error::schema(
                name.as_str(),
                "offset pagination limit must be greater than zero",
            ));
        }
        PaginationConfig::DateWindow { window_days: 0 } => {
            return Err(Error::schema(
                name.as_str(),
                "date window must span at least one day",
            ));
        }
        PaginationConfig::Token { token_path, .. } if token_path.is_empty() => {
            return Err(Error::schema(name.as_str(), "token_path cannot be empty"));
        }
        _ => {}
    }

    let body = stream.body.as_ref().map(Value::to_string);
    let templates = std::iter::once(stream.path.as_str())
        .chain(stream.params.values().map(String::as_str))
        .chain(stream.headers.values().map(String::as_str))
        .chain(body.as_deref());
    for text in templates {
        for variable in template::extract_variables(text) {
            let root = variable.split('.').next().unwrap_or_default();
            if !template::ROOTS.contains(&root) {
                return Err(Error::schema(
                    name.as_str(),
                    format!("unknown template variable '{variable}'"),
                ));
            }
        }
    }

    if let Some(router) = &stream.partitions {
        if router.field().is_empty() {
            return Err(Error::schema(
                name.as_str(),
                "partition field cannot be empty",
            ));
        }
    }

    Ok(())
}
