//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use crate::error::{Error, Result};
use crate::pagination::PagePosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Progress marker for one stream or partition
///
/// The all-empty bookmark means "start from the beginning".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Page to fetch next when resuming mid-stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PagePosition>,

    /// Field the high-water mark was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Highest replication-key value emitted so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<Value>,

    /// High-water mark the unfinished pass started from, kept while
    /// `position` is set. Absent mid-pass means the pass had no mark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_from: Option<Value>,

    /// A full-table stream ran to completion
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exhausted: bool,
}

impl Bookmark {
    /// The start-from-the-beginning sentinel
    pub fn start() -> Self {
        Self::default()
    }

    /// Whether this is the start sentinel
    pub fn is_start(&self) -> bool {
        self == &Self::default()
    }

    /// High-water mark as a string, for templates and date arithmetic
    pub fn high_water_mark(&self) -> Option<String> {
        match self.replication_key_value.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Records at or below this value are skipped, and it is what
    /// `{{ bookmark }}` renders to. A resumed pass keeps the mark it started
    /// from so its remaining pages see the same filter.
    pub fn floor(&self) -> Option<&Value> {
        let floor = if self.position.is_some() {
            self.started_from.as_ref()
        } else {
            self.replication_key_value.as_ref()
        };
        floor.filter(|v| !v.is_null())
    }
}

/// State for a single stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Bookmark of an unpartitioned stream
    #[serde(default)]
    pub bookmark: Bookmark,

    /// Per-partition bookmarks keyed by partition id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partitions: BTreeMap<String, Bookmark>,
}

/// Complete persisted state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Per-stream state
    #[serde(default)]
    pub bookmarks: BTreeMap<String, StreamState>,

    /// When a run last completed every selected stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl SyncState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a state document
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))
    }

    /// Serialize the full snapshot
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Get state for a stream
    pub fn stream(&self, stream: &str) -> Option<&StreamState> {
        self.bookmarks.get(stream)
    }

    /// Bookmark for a stream or one of its partitions; absent means start
    pub fn bookmark(&self, stream: &str, partition: Option<&str>) -> Bookmark {
        let Some(state) = self.bookmarks.get(stream) else {
            return Bookmark::start();
        };
        match partition {
            Some(id) => state.partitions.get(id).cloned().unwrap_or_default(),
            None => state.bookmark.clone(),
        }
    }

    /// Store a bookmark for a stream or one of its partitions
    pub fn set_bookmark(&mut self, stream: &str, partition: Option<&str>, bookmark: Bookmark) {
        let state = self.bookmarks.entry(stream.to_string()).or_default();
        match partition {
            Some(id) => {
                state.partitions.insert(id.to_string(), bookmark);
            }
            None => state.bookmark = bookmark,
        }
    }

    /// Forget everything recorded for a stream
    pub fn clear_stream(&mut self, stream: &str) {
        self.bookmarks.remove(stream);
    }

    /// Record that a run finished every stream
    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.last_completed_at = Some(at);
    }
}
