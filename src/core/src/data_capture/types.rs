//! Common data types used across the data_capture subsystem.

use chrono::{DateTime, SecondsFormat, Utc};

/// Header keys, in the order they appear at the top of every transcript.
pub const HEADER_KEYS: [&str; 6] = [
    "RemoteAddr",
    "User",
    "Password",
    "ServerVersion",
    "ClientVersion",
    "Time",
];

/// Fixed metadata block written once at the top of a transcript.
///
/// Unknown values (for instance the version strings of a Telnet session) are
/// written as empty values so the layout never changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptHeader {
    pub remote_addr: String,
    pub user: String,
    pub password: String,
    pub server_version: String,
    pub client_version: String,
    /// Session start, RFC 3339 UTC with nanoseconds.
    pub time: String,
}

impl TranscriptHeader {
    pub fn new(remote_addr: impl Into<String>, started: DateTime<Utc>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            time: transcript_timestamp(started),
            ..Default::default()
        }
    }

    /// Rendered `Key:Value` lines, without line terminators.
    pub fn lines(&self) -> Vec<String> {
        let values = [
            &self.remote_addr,
            &self.user,
            &self.password,
            &self.server_version,
            &self.client_version,
            &self.time,
        ];
        HEADER_KEYS
            .iter()
            .zip(values)
            .map(|(key, value)| format!("{}:{}", key, value))
            .collect()
    }
}

/// Timestamp format shared by the header `Time` field and transcript file names.
pub fn transcript_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
