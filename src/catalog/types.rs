//! Catalog types
//!
//! Declarative stream definitions as they appear in YAML/JSON catalog files.

use super::partition::{Partition, PartitionConfig};
use crate::error::Result;
use crate::pagination::PaginationConfig;
use crate::schema::JsonSchema;
use crate::types::{Method, ReplicationMethod};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// Stream Definition
// ============================================================================

/// Immutable description of one extractable resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StreamDefinition {
    /// Stream name, unique within a catalog
    pub name: String,
    /// HTTP method
    #[serde(default)]
    pub method: Method,
    /// Endpoint path or absolute URL (can contain templates)
    pub path: String,
    /// Query parameters (values can contain templates)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// Stream-specific headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// JSON request body; string leaves can contain templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Path to the record array in the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_path: Option<String>,
    /// Primary key fields
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// How progress is tracked between runs
    #[serde(default)]
    pub replication_method: ReplicationMethod,
    /// Field whose maximum becomes the bookmark for incremental streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    /// Pagination policy
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Partition router
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<PartitionConfig>,
    /// Whether the stream is extracted
    #[serde(default = "default_true")]
    pub selected: bool,
    /// Record schema
    pub schema: JsonSchema,
}

fn default_true() -> bool {
    true
}

impl StreamDefinition {
    /// Check if this stream tracks a high-water mark
    pub fn is_incremental(&self) -> bool {
        self.replication_method == ReplicationMethod::Incremental
    }

    /// Check if this stream is partitioned
    pub fn is_partitioned(&self) -> bool {
        self.partitions.is_some()
    }

    /// Resolve the partitions to sync for a tap config
    pub fn resolve_partitions(&self, config: &Value) -> Result<Vec<Partition>> {
        match &self.partitions {
            Some(router) => router.resolve(config),
            None => Ok(vec![Partition::whole()]),
        }
    }
}

// ============================================================================
// Catalog File
// ============================================================================

/// A catalog document as read from disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Base URL joined onto relative stream paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Stream entries: full definitions or overrides of existing streams
    #[serde(default)]
    pub streams: Vec<Value>,
}

/// Partial entry that adjusts a stream already in the catalog
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamOverride {
    /// Name of the stream being adjusted
    #[serde(alias = "tap_stream_id")]
    pub name: String,
    /// New selection flag
    #[serde(default)]
    pub selected: Option<bool>,
    /// Replacement schema
    #[serde(default)]
    pub schema: Option<JsonSchema>,
}
