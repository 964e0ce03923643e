//! Message sinks

use super::message::Message;
use crate::error::{Error, Result};
use std::io::{self, Stdout, Write};

/// Destination for output messages
pub trait MessageSink: Send {
    /// Write one message
    fn write(&mut self, message: &Message) -> Result<()>;

    /// Make everything written so far visible downstream
    fn flush(&mut self) -> Result<()>;
}

// ============================================================================
// JSON Lines Writer
// ============================================================================

/// Writes each message as one line of JSON
#[derive(Debug)]
pub struct JsonLinesWriter<W: Write> {
    out: W,
    written: u64,
}

impl JsonLinesWriter<Stdout> {
    /// Writer on standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLinesWriter<W> {
    /// Wrap a writer
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    /// Messages written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Unwrap the inner writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> MessageSink for JsonLinesWriter<W> {
    fn write(&mut self, message: &Message) -> Result<()> {
        let line = serde_json::to_string(message)
            .map_err(|e| Error::output(format!("Failed to serialize {}: {e}", message.kind())))?;
        writeln!(self.out, "{line}")
            .map_err(|e| Error::output(format!("Failed to write {}: {e}", message.kind())))?;
        self.written += 1;

        // STATE lines must not sit in a buffer after the checkpoint is saved
        if matches!(message, Message::State { .. }) {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| Error::output(format!("Failed to flush output: {e}")))
    }
}

// ============================================================================
// Memory Sink
// ============================================================================

/// Collects messages in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    messages: Vec<Message>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written, in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Records written for a stream
    pub fn records(&self, stream: &str) -> Vec<&crate::types::JsonObject> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Record {
                    stream: s, record, ..
                } if s == stream => Some(record),
                _ => None,
            })
            .collect()
    }

    /// Payloads of every STATE message
    pub fn states(&self) -> Vec<&crate::types::JsonValue> {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::State { value } => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Drop everything collected so far
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl MessageSink for MemorySink {
    fn write(&mut self, message: &Message) -> Result<()> {
        self.messages.push(message.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
