//! Stream partitions
//!
//! A partitioned stream is synced once per partition, each with its own
//! bookmark. The CJ commissions stream has one partition per publisher id.

use crate::error::{Error, Result};
use crate::types::{lookup_path, JsonObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a stream's partitions are produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionConfig {
    /// One partition per element of a config array
    Config {
        /// Config key holding the array (e.g. `publisher_ids`)
        key: String,
        /// Name the element is exposed under as `partition.<field>`
        field: String,
    },
    /// Fixed partition values
    List {
        /// The values
        values: Vec<String>,
        /// Name the value is exposed under as `partition.<field>`
        field: String,
    },
}

/// One slice of a stream
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Partition identifier; `None` for unpartitioned streams
    pub id: Option<String>,
    /// Values exposed to templates as `partition.*`
    pub values: JsonObject,
}

impl Partition {
    /// The single partition of an unpartitioned stream
    pub fn whole() -> Self {
        Self {
            id: None,
            values: JsonObject::new(),
        }
    }

    /// A keyed partition with one value
    pub fn keyed(field: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        let mut values = JsonObject::new();
        values.insert(field.to_string(), Value::String(id.clone()));
        Self {
            id: Some(id),
            values,
        }
    }

    /// Template context value
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{id}"),
            None => write!(f, "-"),
        }
    }
}

impl PartitionConfig {
    /// The template field the partition value is exposed under
    pub fn field(&self) -> &str {
        match self {
            Self::Config { field, .. } | Self::List { field, .. } => field,
        }
    }

    /// Produce the partitions for a tap config
    pub fn resolve(&self, config: &Value) -> Result<Vec<Partition>> {
        match self {
            Self::List { values, field } => {
                Ok(values.iter().map(|v| Partition::keyed(field, v)).collect())
            }
            Self::Config { key, field } => {
                let raw = lookup_path(config, key)
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| Error::missing_field(key.as_str()))?;
                let items = raw.as_array().ok_or_else(|| {
                    Error::invalid_value(key.as_str(), "expected an array of ids")
                })?;

                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) if !s.is_empty() => Ok(Partition::keyed(field, s)),
                        Value::Number(n) => Ok(Partition::keyed(field, n.to_string())),
                        other => Err(Error::invalid_value(
                            key.as_str(),
                            format!("unusable partition id {other}"),
                        )),
                    })
                    .collect()
            }
        }
    }
}
