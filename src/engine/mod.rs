//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - runs every selected stream against the API
//! - `SyncConfig` - checkpoint cadence, full refresh and page caps
//! - `RunReport` - per-stream outcome and the process exit code
//!
//! Streams run one after another in catalog order. Each partition of a
//! stream goes through `Discovering -> Extracting <-> Checkpointing`; a
//! stream that fails keeps its last checkpoint and the run moves on.

mod types;

pub use types::{
    CheckpointPolicy, RunReport, StreamPhase, StreamReport, StreamStatus, SyncConfig,
};

use crate::catalog::{Catalog, Partition, StreamDefinition};
use crate::decode::RecordExtractor;
use crate::error::{Error, Result};
use crate::http::{ApiRequest, HttpClient, RateBudget};
use crate::output::{Message, MessageSink};
use crate::pagination::{build_paginator, PageCursor, PagePosition, PageRequest};
use crate::schema::{parse_datetime, SchemaRegistry, StreamSchema};
use crate::state::{Bookmark, StateStore, SyncState};
use crate::template::{self, TemplateContext};
use crate::types::{JsonObject, JsonValue};
use chrono::{NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// HTTP client
    client: HttpClient,
    /// Streams to sync
    catalog: Catalog,
    /// Compiled schemas of the selected streams
    registry: SchemaRegistry,
    /// Where bookmarks are persisted
    store: Arc<dyn StateStore>,
    /// Tap config exposed to templates and partition routers
    tap_config: JsonValue,
    /// First day for date-window streams without a bookmark
    start_date: Option<NaiveDate>,
    /// Sync configuration
    config: SyncConfig,
    /// Stops the run at the next page boundary
    cancel: CancellationToken,
}

/// How one partition ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartitionOutcome {
    Completed,
    Skipped,
    Cancelled,
}

impl SyncEngine {
    /// Create a new sync engine; compiles the schema of every selected stream
    pub fn new(client: HttpClient, catalog: Catalog, store: Arc<dyn StateStore>) -> Result<Self> {
        let registry = catalog.schema_registry()?;
        Ok(Self {
            client,
            catalog,
            registry,
            store,
            tap_config: JsonValue::Object(JsonObject::new()),
            start_date: None,
            config: SyncConfig::default(),
            cancel: CancellationToken::new(),
        })
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tap config visible as `{{ config.* }}`
    #[must_use]
    pub fn with_tap_config(mut self, tap_config: JsonValue) -> Self {
        self.tap_config = tap_config;
        self
    }

    /// Set the default start date
    #[must_use]
    pub fn with_start_date(mut self, start_date: Option<NaiveDate>) -> Self {
        self.start_date = start_date;
        self
    }

    /// Use an external cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this engine's runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get the catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Fetch the first page of the first selected stream without touching
    /// state. Returns the stream name and the number of records on the page.
    pub async fn probe(&self) -> Result<(String, usize)> {
        let stream = self
            .catalog
            .selected()
            .next()
            .ok_or_else(|| Error::catalog("No streams selected"))?;
        let partition = stream
            .resolve_partitions(&self.tap_config)?
            .into_iter()
            .next()
            .unwrap_or_else(Partition::whole);

        let start = Bookmark::start();
        let today = self.config.today.unwrap_or_else(|| Utc::now().date_naive());
        let origin = self.window_origin(&start, None);
        let cursor = PageCursor::new(build_paginator(&stream.pagination, origin, today)?);
        let page = cursor
            .next_request_position()
            .ok_or_else(|| Error::catalog(format!("Stream '{}' has no pages", stream.name)))?;

        let request = self.build_request(stream, &partition, &page, None)?;
        let response = self.client.execute(&request, &mut RateBudget::new()).await?;
        let extractor = match &stream.records_path {
            Some(path) => RecordExtractor::with_path(path.clone()),
            None => RecordExtractor::new(),
        };
        let records = extractor.extract(&response.body)?;
        Ok((stream.name.clone(), records.len()))
    }

    /// Sync every selected stream.
    ///
    /// Stream failures are recorded in the report; only state and output
    /// failures end the run with an error.
    pub async fn run(&self, sink: &mut dyn MessageSink) -> Result<RunReport> {
        let mut state = self.store.load().await?;
        let mut budget = RateBudget::new();
        let mut report = RunReport::default();

        let streams: Vec<&StreamDefinition> = self.catalog.selected().collect();
        info!(
            streams = streams.len(),
            full_refresh = self.config.full_refresh,
            "Starting sync"
        );

        for stream in streams {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if self.config.full_refresh {
                state.clear_stream(&stream.name);
            }

            let stream_report = self
                .sync_stream(stream, &mut state, &mut budget, sink)
                .await?;
            report.cancelled = stream_report.status == StreamStatus::Cancelled;
            report.streams.push(stream_report);
            if report.cancelled {
                break;
            }
        }

        if report.cancelled {
            warn!("Sync cancelled");
        } else if !report.has_failures() {
            state.mark_completed(Utc::now());
            self.persist(&state, sink).await?;
        }
        sink.flush()?;

        info!(
            records = report.total_records(),
            exit_code = report.exit_code(),
            "Sync finished"
        );
        Ok(report)
    }

    async fn sync_stream(
        &self,
        stream: &StreamDefinition,
        state: &mut SyncState,
        budget: &mut RateBudget,
        sink: &mut dyn MessageSink,
    ) -> Result<StreamReport> {
        let Some(schema) = self.registry.get(&stream.name) else {
            let mut report = StreamReport::new(&stream.name);
            report.fail(Error::StreamNotFound {
                stream: stream.name.clone(),
            });
            return Ok(report);
        };
        let mut run = StreamRun::new(stream, schema);
        info!(stream = %stream.name, method = %stream.replication_method, "Syncing stream");

        let partitions = match stream.resolve_partitions(&self.tap_config) {
            Ok(partitions) => partitions,
            Err(e) => {
                error!(stream = %stream.name, error = %e, "Cannot resolve partitions");
                run.transition(StreamPhase::Failed);
                run.report.fail(e);
                return Ok(run.report);
            }
        };
        if partitions.is_empty() {
            warn!(stream = %stream.name, "No partitions configured, nothing to sync");
        }

        let mut skipped = 0;
        for partition in &partitions {
            if self.cancel.is_cancelled() {
                run.report.status = StreamStatus::Cancelled;
                break;
            }
            run.transition(StreamPhase::Discovering);

            match self
                .sync_partition(&mut run, partition, state, budget, sink)
                .await
            {
                Ok(PartitionOutcome::Completed) => {}
                Ok(PartitionOutcome::Skipped) => skipped += 1,
                Ok(PartitionOutcome::Cancelled) => {
                    run.report.status = StreamStatus::Cancelled;
                    break;
                }
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => {
                    error!(stream = %stream.name, partition = %partition, error = %e, "Stream failed");
                    run.transition(StreamPhase::Failed);
                    run.report.fail(e);
                    break;
                }
            }
        }

        if run.report.status == StreamStatus::Completed {
            run.transition(StreamPhase::Completed);
            if !partitions.is_empty() && skipped == partitions.len() {
                run.report.status = StreamStatus::Skipped;
            }
        }

        info!(
            stream = %stream.name,
            status = ?run.report.status,
            records = run.report.records,
            pages = run.report.pages,
            dropped = run.report.dropped,
            "Stream finished"
        );
        Ok(run.report)
    }

    async fn sync_partition(
        &self,
        run: &mut StreamRun<'_>,
        partition: &Partition,
        state: &mut SyncState,
        budget: &mut RateBudget,
        sink: &mut dyn MessageSink,
    ) -> Result<PartitionOutcome> {
        let stream = run.stream;
        let partition_id = partition.id.as_deref();
        let start = state.bookmark(&stream.name, partition_id);

        if start.exhausted && !stream.is_incremental() {
            info!(stream = %stream.name, partition = %partition, "Already exhausted, skipping");
            return Ok(PartitionOutcome::Skipped);
        }

        let position = match start.position.clone() {
            Some(position) if stream.pagination.accepts(&position) => Some(position),
            Some(position) => {
                warn!(
                    stream = %stream.name,
                    position = %position,
                    pagination = stream.pagination.kind(),
                    "Bookmarked position does not match the pagination, starting over"
                );
                None
            }
            None => None,
        };

        let today = self.config.today.unwrap_or_else(|| Utc::now().date_naive());
        let origin = self.window_origin(&start, position.as_ref());
        let paginator = build_paginator(&stream.pagination, origin, today)?;
        let mut cursor =
            PageCursor::resume(paginator, position).with_max_pages(self.config.max_pages);
        if let Some(position) = cursor.position() {
            debug!(stream = %stream.name, partition = %partition, position = %position, "Resuming");
        }

        let extractor = match &stream.records_path {
            Some(path) => RecordExtractor::with_path(path.clone()),
            None => RecordExtractor::new(),
        };
        let replication_key = stream
            .replication_key
            .as_deref()
            .filter(|_| stream.is_incremental());
        // Filter against the mark this pass started from, which a resumed
        // pass inherits; the running maximum only takes over once the pass ends
        let floor = replication_key.and(start.floor().cloned());
        let mut bookmark = Bookmark {
            position: cursor.position().cloned(),
            replication_key: replication_key.map(str::to_string),
            replication_key_value: replication_key
                .and(start.replication_key_value.clone())
                .filter(|v| !v.is_null()),
            started_from: floor.clone(),
            exhausted: false,
        };

        run.send_schema(sink)?;
        run.transition(StreamPhase::Extracting);
        let (mut pages_since, mut records_since) = (0_u64, 0_u64);

        while let Some(page) = cursor.next_request_position() {
            let request = self.build_request(stream, partition, &page, floor.as_ref())?;
            debug!(
                stream = %stream.name,
                partition = %partition,
                page = cursor.pages() + 1,
                url = %request.url,
                "Fetching page"
            );
            let response = self.client.execute(&request, budget).await?;
            let raw = extractor.extract(&response.body)?;
            let records = run.validate_page(&self.registry, &raw)?;

            for record in records {
                if let Some(value) = replication_key
                    .and_then(|key| record.get(key))
                    .filter(|v| !v.is_null())
                {
                    if floor
                        .as_ref()
                        .is_some_and(|f| compare_replication_values(value, f) != Ordering::Greater)
                    {
                        run.report.filtered += 1;
                        continue;
                    }
                    let advances = bookmark
                        .replication_key_value
                        .as_ref()
                        .map_or(true, |hwm| {
                            compare_replication_values(value, hwm) == Ordering::Greater
                        });
                    if advances {
                        bookmark.replication_key_value = Some(value.clone());
                    }
                }

                sink.write(&Message::Record {
                    stream: stream.name.clone(),
                    record,
                    time_extracted: Utc::now(),
                })?;
                run.report.records += 1;
                records_since += 1;
            }

            cursor.advance(&response.body, raw.len());
            bookmark.position = cursor.position().cloned();
            run.report.pages += 1;
            pages_since += 1;

            if cursor.is_done() {
                break;
            }
            if self.cancel.is_cancelled() {
                info!(stream = %stream.name, partition = %partition, "Cancellation requested, checkpointing");
                self.checkpoint(run, partition_id, &bookmark, state, sink)
                    .await?;
                return Ok(PartitionOutcome::Cancelled);
            }
            if self.config.checkpoint.is_due(pages_since, records_since) {
                self.checkpoint(run, partition_id, &bookmark, state, sink)
                    .await?;
                run.transition(StreamPhase::Extracting);
                pages_since = 0;
                records_since = 0;
            }
        }

        if cursor.is_exhausted() {
            bookmark.position = None;
            bookmark.started_from = None;
            bookmark.exhausted = !stream.is_incremental();
        } else if cursor.is_truncated() {
            warn!(
                stream = %stream.name,
                partition = %partition,
                max_pages = self.config.max_pages,
                "Page cap reached, the next run continues from here"
            );
            run.report.truncated += 1;
        }
        self.checkpoint(run, partition_id, &bookmark, state, sink)
            .await?;
        Ok(PartitionOutcome::Completed)
    }

    /// First window for date-window pagination: the bookmarked window, the
    /// day of the high-water mark, or the configured start date
    fn window_origin(&self, start: &Bookmark, position: Option<&PagePosition>) -> Option<NaiveDate> {
        if let Some(PagePosition::Window(day)) = position {
            return Some(*day);
        }
        start
            .high_water_mark()
            .as_deref()
            .and_then(parse_datetime)
            .map(|dt| dt.date_naive())
            .or(self.start_date)
    }

    /// Render a stream's request for one page
    fn build_request(
        &self,
        stream: &StreamDefinition,
        partition: &Partition,
        page: &PageRequest,
        floor: Option<&JsonValue>,
    ) -> Result<ApiRequest> {
        let mut ctx = TemplateContext::with_config(self.tap_config.clone());
        ctx.set_partition(partition.to_value())
            .set_page(page.vars.clone())
            .set_bookmark(floor.cloned().unwrap_or(JsonValue::Null));

        let url = template::render(&stream.path, &ctx)?;
        let mut request = ApiRequest::new(stream.method, url);

        // Params referencing unset values (no bookmark yet) are left out
        for (key, value) in &stream.params {
            match template::render(value, &ctx) {
                Ok(rendered) if !rendered.is_empty() => request = request.query(key, rendered),
                Ok(_) => {}
                Err(Error::UndefinedVariable { variable }) => {
                    debug!(stream = %stream.name, param = %key, %variable, "Skipping param");
                }
                Err(e) => return Err(e),
            }
        }
        for (key, value) in &page.query {
            request = request.query(key, value);
        }
        for (key, value) in &stream.headers {
            request = request.header(key, template::render(value, &ctx)?);
        }
        if let Some(body) = &stream.body {
            request = request.json(template::render_value(body, &ctx)?);
        }
        Ok(request)
    }

    async fn checkpoint(
        &self,
        run: &mut StreamRun<'_>,
        partition_id: Option<&str>,
        bookmark: &Bookmark,
        state: &mut SyncState,
        sink: &mut dyn MessageSink,
    ) -> Result<()> {
        run.transition(StreamPhase::Checkpointing);
        state.set_bookmark(&run.stream.name, partition_id, bookmark.clone());
        self.persist(state, sink).await?;
        debug!(
            stream = %run.stream.name,
            partition = ?partition_id,
            position = ?bookmark.position,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Save the snapshot, then announce it
    async fn persist(&self, state: &SyncState, sink: &mut dyn MessageSink) -> Result<()> {
        self.store.save(state).await?;
        sink.write(&Message::State {
            value: state.to_value()?,
        })
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("streams", &self.catalog.names())
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Per-stream bookkeeping
// ============================================================================

struct StreamRun<'a> {
    stream: &'a StreamDefinition,
    schema: &'a StreamSchema,
    phase: StreamPhase,
    report: StreamReport,
    schema_sent: bool,
    warned_fields: HashSet<String>,
}

impl<'a> StreamRun<'a> {
    fn new(stream: &'a StreamDefinition, schema: &'a StreamSchema) -> Self {
        Self {
            stream,
            schema,
            phase: StreamPhase::Pending,
            report: StreamReport::new(&stream.name),
            schema_sent: false,
            warned_fields: HashSet::new(),
        }
    }

    fn transition(&mut self, next: StreamPhase) {
        if !self.phase.can_transition_to(next) {
            warn!(stream = %self.stream.name, from = %self.phase, to = %next, "Unexpected phase change");
        }
        debug!(stream = %self.stream.name, from = %self.phase, to = %next, "Phase");
        self.phase = next;
    }

    fn send_schema(&mut self, sink: &mut dyn MessageSink) -> Result<()> {
        if self.schema_sent {
            return Ok(());
        }
        let bookmark_properties = match (&self.stream.replication_key, self.stream.is_incremental()) {
            (Some(key), true) => vec![key.clone()],
            _ => Vec::new(),
        };
        sink.write(&Message::Schema {
            stream: self.stream.name.clone(),
            schema: self.schema.document().to_json(),
            key_properties: self.stream.primary_key.clone(),
            bookmark_properties,
        })?;
        self.schema_sent = true;
        Ok(())
    }

    /// Validate a whole page before anything from it is emitted.
    ///
    /// Records failing on a non-key field are dropped; a key violation
    /// rejects the page and fails the stream.
    fn validate_page(
        &mut self,
        registry: &SchemaRegistry,
        raw: &[JsonValue],
    ) -> Result<Vec<JsonObject>> {
        let mut valid = Vec::with_capacity(raw.len());
        for (index, item) in raw.iter().enumerate() {
            match registry.validate(&self.stream.name, item)? {
                Ok(validated) => {
                    for field in validated.dropped_fields {
                        if self.warned_fields.insert(field.clone()) {
                            warn!(stream = %self.stream.name, %field, "Dropping field not declared in the schema");
                        }
                    }
                    valid.push(validated.record);
                }
                Err(e) if e.is_key_violation() => {
                    return Err(Error::Validation {
                        stream: self.stream.name.clone(),
                        message: format!("record {index}: {e}"),
                    });
                }
                Err(e) => {
                    warn!(stream = %self.stream.name, error = %e, "Dropping invalid record");
                    self.report.dropped += 1;
                }
            }
        }
        Ok(valid)
    }
}

/// Order two replication-key values: as date-times when both parse, then
/// as numbers, then as strings
pub fn compare_replication_values(a: &JsonValue, b: &JsonValue) -> Ordering {
    let text = |v: &JsonValue| match v {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    };
    let (a_text, b_text) = (text(a), text(b));

    if let (Some(x), Some(y)) = (parse_datetime(&a_text), parse_datetime(&b_text)) {
        return x.cmp(&y);
    }
    if let (Ok(x), Ok(y)) = (a_text.trim().parse::<f64>(), b_text.trim().parse::<f64>()) {
        if let Some(order) = x.partial_cmp(&y) {
            return order;
        }
    }
    a_text.cmp(&b_text)
}
