use std::net::SocketAddr;

use chrono::{DateTime, Utc};

use crate::error_handling::types::StorageError;

/// Append-only destination for one session's transcript lines.
pub trait TranscriptSink: Send {
    /// Appends one line; the sink adds the terminator.
    fn append_line(&mut self, line: &str) -> Result<(), StorageError>;
    fn flush(&mut self) -> Result<(), StorageError>;
}

/// Opens one fresh sink per session.
pub trait TranscriptStore: Send + Sync {
    /// Fails if a sink for the same key already exists; an existing transcript
    /// is never reopened or truncated.
    fn open(
        &self,
        client_addr: SocketAddr,
        started: DateTime<Utc>,
    ) -> Result<Box<dyn TranscriptSink>, StorageError>;
}
