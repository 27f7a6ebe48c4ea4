//! Per-session transcript recording.
//!
//! `TranscriptRecorder` owns the single sink of one session. The sink is
//! opened as soon as the session starts, so that a storage failure refuses
//! the session before anything is written to the peer. Credentials however
//! only become known later, and the header must sit at the top of the file.
//! Lines recorded before the header is sealed are therefore kept in memory
//! and flushed right after it; from then on every line is streamed straight
//! to the sink.
//!
//! Write failures after the sink was opened are logged once and the session
//! carries on without a transcript. The peer never sees them.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use log::{debug, error, trace};
use uuid::Uuid;

use crate::error_handling::types::StorageError;

use super::storage::{TranscriptSink, TranscriptStore};
use super::types::TranscriptHeader;

pub struct TranscriptRecorder {
    session_id: Uuid,
    header: TranscriptHeader,
    sink: Box<dyn TranscriptSink>,
    /// Lines recorded before the header was sealed.
    backlog: Vec<String>,
    sealed: bool,
    finished: bool,
    /// Set after the first write failure; nothing is written afterwards.
    broken: bool,
    lines_written: usize,
}

impl TranscriptRecorder {
    /// Opens the transcript sink for a new session.
    pub fn start(
        session_id: Uuid,
        store: &dyn TranscriptStore,
        client_addr: SocketAddr,
        started: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        let sink = store.open(client_addr, started)?;
        debug!("[{}] Transcript opened", session_id);
        Ok(Self {
            session_id,
            header: TranscriptHeader::new(client_addr.to_string(), started),
            sink,
            backlog: Vec::new(),
            sealed: false,
            finished: false,
            broken: false,
            lines_written: 0,
        })
    }

    pub fn set_user(&mut self, user: &str) {
        self.header.user = user.to_string();
    }

    pub fn set_password(&mut self, password: &str) {
        self.header.password = password.to_string();
    }

    pub fn set_versions(&mut self, server_version: &str, client_version: &str) {
        self.header.server_version = server_version.to_string();
        self.header.client_version = client_version.to_string();
    }

    /// Appends one chronological line.
    pub fn record(&mut self, line: &str) {
        if self.finished {
            return;
        }
        trace!("[{}] transcript: {:?}", self.session_id, line);
        if self.sealed {
            self.write_line(line);
        } else {
            self.backlog.push(line.to_string());
        }
    }

    /// Appends multi-line output, one transcript line per output line.
    pub fn record_output(&mut self, output: &str) {
        for line in output.lines() {
            self.record(line);
        }
    }

    /// Writes the header, the blank separator and any held-back lines.
    /// Header fields changed afterwards no longer reach the sink.
    pub fn seal_header(&mut self) {
        if self.sealed {
            return;
        }
        self.sealed = true;

        for line in self.header.lines() {
            self.write_line(&line);
        }
        self.write_line("");

        let backlog = std::mem::take(&mut self.backlog);
        for line in &backlog {
            self.write_line(line);
        }
    }

    /// Seals the header if needed and flushes. Later records are dropped.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.seal_header();
        self.finished = true;

        if !self.broken {
            if let Err(e) = self.sink.flush() {
                error!("[{}] Transcript flush failed: {}", self.session_id, e);
                self.broken = true;
            }
        }
        debug!(
            "[{}] Transcript closed after {} lines",
            self.session_id, self.lines_written
        );
    }

    fn write_line(&mut self, line: &str) {
        if self.broken {
            return;
        }
        match self.sink.append_line(line) {
            Ok(()) => self.lines_written += 1,
            Err(e) => {
                error!(
                    "[{}] Transcript write failed, recording stops: {}",
                    self.session_id, e
                );
                self.broken = true;
            }
        }
    }
}
