//! State management module
//!
//! Handles bookmark tracking, checkpointing, and resumability.
//! State is persisted between sync runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `SyncState` - per-stream and per-partition bookmarks
//! - `StateStore` - persistence seam, with file and in-memory stores

mod store;
mod types;

pub use store::{FileStateStore, MemoryStateStore, StateStore};
pub use types::{Bookmark, StreamState, SyncState};
