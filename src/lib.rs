// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # tap-cj
//!
//! Incremental extraction of CJ (Commission Junction) commissions as a
//! stream of SCHEMA, RECORD and STATE messages.
//!
//! ## Features
//!
//! - **Resumable Sync**: bookmarks store the next page to fetch, so an
//!   interrupted run picks up where its last checkpoint left off
//! - **Schema Conformance**: every record is coerced to its stream schema
//!   before it is emitted
//! - **Polite HTTP**: bounded retries with backoff, `Retry-After` and quota
//!   headers honoured, optional client-side rate limit
//! - **Declarative Streams**: built-in CJ streams, extendable with a YAML or
//!   JSON catalog file
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tap_cj::{builtin_catalog, FileStateStore, HttpClient, JsonLinesWriter, SyncEngine, TapConfig};
//!
//! #[tokio::main]
//! async fn main() -> tap_cj::Result<()> {
//!     let config = TapConfig::from_file("config.json")?;
//!     let catalog = builtin_catalog()?;
//!     let client = HttpClient::with_auth(
//!         config.http_config(tap_cj::CJ_API_URL),
//!         config.auth(),
//!     )?;
//!
//!     let engine = SyncEngine::new(client, catalog, Arc::new(FileStateStore::new("state.json")))?
//!         .with_config(config.sync_config())
//!         .with_tap_config(config.template_value().clone())
//!         .with_start_date(config.start_date()?);
//!
//!     let report = engine.run(&mut JsonLinesWriter::stdout()).await?;
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        SyncEngine                            │
//! │   Pending → Discovering → Extracting ⇄ Checkpointing → Done  │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//! ┌───────────┬───────────┬─────┴──────┬────────────┬───────────┐
//! │  Catalog  │   HTTP    │ Pagination │   Schema   │   State   │
//! ├───────────┼───────────┼────────────┼────────────┼───────────┤
//! │ Streams   │ Retry     │ Token      │ Compile    │ Bookmarks │
//! │ Partitions│ 429       │ Offset     │ Coerce     │ File      │
//! │ Overrides │ RateBudget│ DateWindow │ Validate   │ Memory    │
//! └───────────┴───────────┴────────────┴────────────┴───────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Authentication
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Template interpolation
pub mod template;

/// Record extraction from response bodies
pub mod decode;

/// Pagination strategies and the page cursor
pub mod pagination;

/// Stream schemas: compilation, coercion and validation
pub mod schema;

/// Stream definitions and partitions
pub mod catalog;

/// Built-in CJ streams
pub mod streams;

/// Bookmarks and state stores
pub mod state;

/// SCHEMA/RECORD/STATE messages and sinks
pub mod output;

/// Sync engine
pub mod engine;

/// Tap configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use catalog::{Catalog, StreamDefinition};
pub use config::TapConfig;
pub use engine::{RunReport, StreamStatus, SyncConfig, SyncEngine};
pub use error::{Error, Result};
pub use http::HttpClient;
pub use output::{JsonLinesWriter, Message, MessageSink};
pub use state::{FileStateStore, MemoryStateStore, StateStore, SyncState};
pub use streams::{builtin_catalog, CJ_API_URL};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
