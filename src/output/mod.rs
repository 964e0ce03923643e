//! Output module
//!
//! Serializes SCHEMA, RECORD and STATE messages as JSON lines.
//!
//! # Overview
//!
//! This module provides:
//! - `Message` - the three message types
//! - `MessageSink` - where the engine sends messages
//! - `JsonLinesWriter` - one JSON object per line on any `Write`
//! - `MemorySink` - collects messages for inspection

mod message;
mod writer;

pub use message::Message;
pub use writer::{JsonLinesWriter, MemorySink, MessageSink};
