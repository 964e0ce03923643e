//! Engine types
//!
//! Phases, run configuration and the run report.

use crate::pagination::DEFAULT_MAX_PAGES;
use chrono::NaiveDate;
use serde::Serialize;

// ============================================================================
// Stream Phases
// ============================================================================

/// Where a stream is in its sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    /// Not started
    Pending,
    /// Loading the bookmark and building the page cursor
    Discovering,
    /// Fetching and emitting pages
    Extracting,
    /// Persisting the bookmark
    Checkpointing,
    /// Finished every partition
    Completed,
    /// Stopped on an error; the last checkpoint stays valid
    Failed,
}

impl StreamPhase {
    /// Whether the stream can leave this phase
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` may follow this phase.
    ///
    /// `Checkpointing -> Discovering` starts the next partition and
    /// `Discovering -> Discovering` follows a skipped one.
    pub fn can_transition_to(self, next: Self) -> bool {
        use StreamPhase::*;
        matches!(
            (self, next),
            (Pending, Discovering)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Discovering, Discovering)
                | (Discovering, Extracting)
                | (Discovering, Completed)
                | (Discovering, Failed)
                | (Extracting, Checkpointing)
                | (Extracting, Failed)
                | (Checkpointing, Extracting)
                | (Checkpointing, Discovering)
                | (Checkpointing, Completed)
                | (Checkpointing, Failed)
        )
    }
}

impl std::fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Discovering => "discovering",
            Self::Extracting => "extracting",
            Self::Checkpointing => "checkpointing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// When bookmarks are persisted during extraction
///
/// A checkpoint happens at the first page boundary where either threshold
/// is reached; zero disables a threshold. The end of a partition always
/// checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    /// Pages between checkpoints
    pub every_pages: u64,
    /// Records between checkpoints
    pub every_records: u64,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            every_pages: 1,
            every_records: 0,
        }
    }
}

impl CheckpointPolicy {
    /// Checkpoint every `pages` pages
    pub fn every_pages(pages: u64) -> Self {
        Self {
            every_pages: pages,
            every_records: 0,
        }
    }

    /// Checkpoint once `records` records were emitted
    pub fn every_records(records: u64) -> Self {
        Self {
            every_pages: 0,
            every_records: records,
        }
    }

    /// Whether a checkpoint is due
    pub fn is_due(&self, pages: u64, records: u64) -> bool {
        (self.every_pages > 0 && pages >= self.every_pages)
            || (self.every_records > 0 && records >= self.every_records)
    }
}

/// Configuration for a sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Checkpoint cadence
    pub checkpoint: CheckpointPolicy,
    /// Ignore stored bookmarks of the selected streams
    pub full_refresh: bool,
    /// Page cap per partition
    pub max_pages: u64,
    /// Overrides the current date for date-window pagination
    pub today: Option<NaiveDate>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            checkpoint: CheckpointPolicy::default(),
            full_refresh: false,
            max_pages: DEFAULT_MAX_PAGES,
            today: None,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set checkpoint policy
    #[must_use]
    pub fn with_checkpoint(mut self, policy: CheckpointPolicy) -> Self {
        self.checkpoint = policy;
        self
    }

    /// Discard stored bookmarks for selected streams
    #[must_use]
    pub fn with_full_refresh(mut self, full_refresh: bool) -> Self {
        self.full_refresh = full_refresh;
        self
    }

    /// Set the page cap
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Pin "today"
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

// ============================================================================
// Run Report
// ============================================================================

/// Final status of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    /// Ran to the end
    Completed,
    /// Nothing to do (already exhausted)
    Skipped,
    /// Stopped on an error
    Failed,
    /// Stopped by cancellation
    Cancelled,
}

/// Outcome of one stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    /// Stream name
    pub stream: String,
    /// Final status
    pub status: StreamStatus,
    /// RECORD messages emitted
    pub records: u64,
    /// Pages fetched
    pub pages: u64,
    /// Records rejected by validation
    pub dropped: u64,
    /// Records at or below the starting bookmark
    pub filtered: u64,
    /// Partitions stopped by the page cap before the API ran out
    pub truncated: u64,
    /// Error that failed the stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamReport {
    /// Create a report for a stream that has not run yet
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            status: StreamStatus::Completed,
            records: 0,
            pages: 0,
            dropped: 0,
            filtered: 0,
            truncated: 0,
            error: None,
        }
    }

    /// Mark the stream failed
    pub fn fail(&mut self, error: impl std::fmt::Display) {
        self.status = StreamStatus::Failed;
        self.error = Some(error.to_string());
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Per-stream outcomes in catalog order
    pub streams: Vec<StreamReport>,
    /// The run was cancelled
    pub cancelled: bool,
}

impl RunReport {
    /// Exit code: 0 success, 1 any stream failed, 130 cancelled
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            130
        } else if self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Whether any stream failed
    pub fn has_failures(&self) -> bool {
        self.streams
            .iter()
            .any(|s| s.status == StreamStatus::Failed)
    }

    /// Report for a stream
    pub fn stream(&self, name: &str) -> Option<&StreamReport> {
        self.streams.iter().find(|s| s.stream == name)
    }

    /// Records emitted across all streams
    pub fn total_records(&self) -> u64 {
        self.streams.iter().map(|s| s.records).sum()
    }
}
