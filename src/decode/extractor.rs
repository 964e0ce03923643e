//! Records-path extractor

use crate::error::{Error, Result};
use crate::types::lookup_path;
use serde_json::Value;
use tracing::warn;

/// Pulls the record array out of a page payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordExtractor {
    /// Path to the records; `None` means the whole body
    records_path: Option<String>,
}

impl RecordExtractor {
    /// Extract the whole body
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract from a path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            records_path: Some(path.into()),
        }
    }

    /// The configured path
    pub fn records_path(&self) -> Option<&str> {
        self.records_path.as_deref()
    }

    /// Extract records from a payload.
    ///
    /// A path that resolves to nothing yields zero records and a warning.
    /// GraphQL-style `errors` with no data are a decode error.
    pub fn extract(&self, body: &Value) -> Result<Vec<Value>> {
        let Some(path) = self.records_path.as_deref() else {
            return Ok(into_records(body.clone()));
        };

        if path.contains('*') || path.contains('[') {
            return extract_with_jsonpath(body, path);
        }

        match lookup_path(body, path) {
            Some(Value::Null) | None => {
                if let Some(messages) = graphql_errors(body) {
                    return Err(Error::decode(format!(
                        "API returned errors: {}",
                        messages.join("; ")
                    )));
                }
                warn!(records_path = %path, "Records path not found in response, treating page as empty");
                Ok(Vec::new())
            }
            Some(found) => Ok(into_records(found.clone())),
        }
    }
}

fn into_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Collect the `message` of every entry in a GraphQL `errors` array
pub fn graphql_errors(body: &Value) -> Option<Vec<String>> {
    let errors = body.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|e| {
                e.get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| e.to_string(), str::to_string)
            })
            .collect(),
    )
}

fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::json_path(format!("Invalid JSONPath '{path}': {e}")))?;

    Ok(into_records(jp.find(value)))
}
