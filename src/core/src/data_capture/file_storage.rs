use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, error};

use super::storage::{TranscriptSink, TranscriptStore};
use super::types::transcript_timestamp;
use crate::error_handling::types::StorageError;

/// Stores each transcript as `<base>/[<remote ip>/]<start time>.txt`.
pub struct FileTranscriptStore {
    base_path: PathBuf,
    nest_by_remote_host: bool,
}

impl FileTranscriptStore {
    pub fn new<P: AsRef<Path>>(base_path: P, nest_by_remote_host: bool) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            nest_by_remote_host,
        }
    }

    pub fn transcript_path(&self, client_addr: SocketAddr, started: DateTime<Utc>) -> PathBuf {
        let dir = if self.nest_by_remote_host {
            self.base_path.join(client_addr.ip().to_string())
        } else {
            self.base_path.clone()
        };
        dir.join(format!("{}.txt", transcript_timestamp(started)))
    }
}

impl TranscriptStore for FileTranscriptStore {
    fn open(
        &self,
        client_addr: SocketAddr,
        started: DateTime<Utc>,
    ) -> Result<Box<dyn TranscriptSink>, StorageError> {
        let path = self.transcript_path(client_addr, started);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                error!("Failed to create transcript dir {}: {}", parent.display(), e);
                StorageError::OpenFailed(e)
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    error!("Refusing to overwrite transcript {}", path.display());
                    StorageError::AlreadyExists(path.clone())
                } else {
                    error!("Failed to open transcript {}: {}", path.display(), e);
                    StorageError::OpenFailed(e)
                }
            })?;

        debug!("Opened transcript {}", path.display());
        Ok(Box::new(FileTranscript {
            file: BufWriter::new(file),
            path,
        }))
    }
}

/// Lines are buffered in memory and reach the disk when the buffer fills or
/// the recorder flushes at the end of the session.
struct FileTranscript {
    file: BufWriter<File>,
    path: PathBuf,
}

impl TranscriptSink for FileTranscript {
    fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        self.file.write_all(record.as_bytes()).map_err(|e| {
            error!("Write failed {}: {}", self.path.display(), e);
            StorageError::WriteFailed(e)
        })
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.file.flush().map_err(StorageError::WriteFailed)
    }
}
