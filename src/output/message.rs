//! Output message types
//!
//! One JSON object per line: SCHEMA before a stream's records, RECORD per
//! validated record and STATE carrying the full state snapshot.

use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message written to the output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Schema of the records that follow
    Schema {
        stream: String,
        schema: JsonValue,
        key_properties: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<String>,
    },
    /// One validated record
    Record {
        stream: String,
        record: JsonObject,
        time_extracted: DateTime<Utc>,
    },
    /// Full state snapshot at a checkpoint
    State { value: JsonValue },
}

impl Message {
    /// Stream the message belongs to; `None` for STATE
    pub fn stream(&self) -> Option<&str> {
        match self {
            Self::Schema { stream, .. } | Self::Record { stream, .. } => Some(stream),
            Self::State { .. } => None,
        }
    }

    /// Short type name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "SCHEMA",
            Self::Record { .. } => "RECORD",
            Self::State { .. } => "STATE",
        }
    }
}
