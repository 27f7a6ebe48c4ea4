use std::path::PathBuf;

use serde::Deserialize;

use crate::network::telnet_codec::{DEFAULT_NEGOTIATION_OPTIONS, DO, WILL};

/// `[listener]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5555
}

/// `[session]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Fixed session lifetime, counted from accept.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Persona names to draw from; empty means all of them.
    #[serde(default)]
    pub personas: Vec<String>,
    /// Seeds persona selection for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            personas: Vec::new(),
            seed: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Verb of the option negotiation sent when a Telnet session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationVerb {
    #[default]
    Do,
    Will,
}

impl NegotiationVerb {
    pub fn code(self) -> u8 {
        match self {
            NegotiationVerb::Do => DO,
            NegotiationVerb::Will => WILL,
        }
    }
}

/// `[telnet]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelnetConfig {
    #[serde(default)]
    pub negotiation_verb: NegotiationVerb,
    /// Option codes, in sending order. An empty list sends no preamble.
    #[serde(default = "default_negotiation_options")]
    pub negotiation_options: Vec<u8>,
    #[serde(default = "default_true")]
    pub show_issue: bool,
    #[serde(default = "default_true")]
    pub require_login: bool,
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self {
            negotiation_verb: NegotiationVerb::default(),
            negotiation_options: default_negotiation_options(),
            show_issue: true,
            require_login: true,
        }
    }
}

fn default_negotiation_options() -> Vec<u8> {
    DEFAULT_NEGOTIATION_OPTIONS.to_vec()
}
fn default_true() -> bool {
    true
}

/// `[transcript]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Nest transcripts under one directory per remote IP.
    #[serde(default = "default_true")]
    pub per_host_dirs: bool,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            per_host_dirs: true,
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./telnet-log")
}
