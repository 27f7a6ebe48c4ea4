//! In-memory transcript stores used by unit tests.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::storage::{TranscriptSink, TranscriptStore};
use crate::error_handling::types::StorageError;

/// Collects every line of every session opened through it.
#[derive(Clone, Default)]
pub struct MemoryTranscriptStore {
    lines: Arc<Mutex<Vec<String>>>,
    opened: Arc<Mutex<usize>>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        *self.opened.lock().unwrap()
    }
}

impl TranscriptStore for MemoryTranscriptStore {
    fn open(
        &self,
        _client_addr: SocketAddr,
        _started: DateTime<Utc>,
    ) -> Result<Box<dyn TranscriptSink>, StorageError> {
        *self.opened.lock().unwrap() += 1;
        Ok(Box::new(MemorySink {
            lines: Arc::clone(&self.lines),
        }))
    }
}

struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl TranscriptSink for MemorySink {
    fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Fails either when opening or on every write.
pub struct FailingTranscriptStore {
    fail_open: bool,
}

impl FailingTranscriptStore {
    pub fn on_open() -> Self {
        Self { fail_open: true }
    }

    pub fn on_write() -> Self {
        Self { fail_open: false }
    }
}

impl TranscriptStore for FailingTranscriptStore {
    fn open(
        &self,
        _client_addr: SocketAddr,
        _started: DateTime<Utc>,
    ) -> Result<Box<dyn TranscriptSink>, StorageError> {
        if self.fail_open {
            return Err(StorageError::OpenFailed(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only log directory",
            )));
        }
        Ok(Box::new(FailingSink))
    }
}

struct FailingSink;

impl TranscriptSink for FailingSink {
    fn append_line(&mut self, _line: &str) -> Result<(), StorageError> {
        Err(StorageError::WriteFailed(io::Error::new(
            io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        Err(StorageError::WriteFailed(io::Error::new(
            io::ErrorKind::Other,
            "disk full",
        )))
    }
}
