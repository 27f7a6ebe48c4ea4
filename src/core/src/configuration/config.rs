use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::debug;
use serde::Deserialize;

use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::network::telnet_codec::{negotiation_preamble, IAC};
use crate::shell_emulation::persona::PersonaSelector;

/// Longest accepted session lifetime, one day.
pub const MAX_SESSION_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Command line of the `antlion` binary.
///
/// Every override can also come from an `ANTLION_*` environment variable.
///
/// # Examples
///
/// ```
/// use clap::Parser;
/// use antlion::configuration::config::Args;
///
/// let args = Args::parse_from(["antlion", "honeypot.toml", "--port", "2323"]);
/// assert_eq!(args.port, Some(2323));
/// ```
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "antlion")]
#[command(version)]
#[command(about = "A Telnet and SSH shell honeypot")]
pub struct Args {
    /// Path to a TOML configuration file
    ///
    /// All sections and fields are optional; anything missing keeps its
    /// default value.
    pub config_file: Option<PathBuf>,

    /// Address to listen on
    ///
    /// # Command Line
    /// Use `--bind-address <ADDRESS>` or `ANTLION_BIND_ADDRESS`
    #[arg(long, env = "ANTLION_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// TCP port of the Telnet listener
    ///
    /// # Command Line
    /// Use `--port <PORT>` or `ANTLION_PORT`
    #[arg(long, env = "ANTLION_PORT")]
    pub port: Option<u16>,

    /// Directory receiving the session transcripts
    ///
    /// # Command Line
    /// Use `--log-dir <PATH>` or `ANTLION_LOG_DIR`
    #[arg(long, env = "ANTLION_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Session lifetime in seconds
    ///
    /// Counted from the moment the connection is accepted; activity does not
    /// extend it. Must be between 1 and 86400.
    ///
    /// # Command Line
    /// Use `--session-timeout-secs <SECONDS>` or `ANTLION_SESSION_TIMEOUT_SECS`
    #[arg(long, env = "ANTLION_SESSION_TIMEOUT_SECS")]
    pub session_timeout_secs: Option<u64>,
}

/// Application configuration.
///
/// # Fields Overview
///
/// - `listener`: bind address and port of the Telnet acceptor
/// - `session`: session lifetime, persona set and optional RNG seed
/// - `telnet`: negotiation preamble and login flow of the Telnet transport
/// - `transcript`: where and how session transcripts are written
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub telnet: TelnetConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named on the command line, if any, then applies the
    /// command line and environment overrides.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, args: &Args) {
        if let Some(bind_address) = &args.bind_address {
            self.listener.bind_address = bind_address.clone();
        }
        if let Some(port) = args.port {
            self.listener.port = port;
        }
        if let Some(log_dir) = &args.log_dir {
            self.transcript.log_dir = log_dir.clone();
        }
        if let Some(timeout) = args.session_timeout_secs {
            self.session.timeout_secs = timeout;
        }
    }

    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_address()?;

        if self.session.timeout_secs == 0 || self.session.timeout_secs > MAX_SESSION_TIMEOUT_SECS {
            return Err(ConfigError::NotInRange(format!(
                "session.timeout_secs must be between 1 and {}",
                MAX_SESSION_TIMEOUT_SECS
            )));
        }

        if self.telnet.negotiation_options.contains(&IAC) {
            return Err(ConfigError::NotInRange(format!(
                "telnet.negotiation_options cannot contain {}",
                IAC
            )));
        }

        self.personas()?;
        Ok(())
    }

    pub fn listen_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.listener.bind_address.parse().map_err(|_| {
            ConfigError::NotInRange(format!(
                "listener.bind_address {:?} is not an IP address",
                self.listener.bind_address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.listener.port))
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout_secs)
    }

    pub fn personas(&self) -> Result<PersonaSelector, ConfigError> {
        PersonaSelector::from_names(&self.session.personas)
    }

    /// Bytes sent to every Telnet peer before the first prompt.
    pub fn negotiation(&self) -> Option<Vec<u8>> {
        if self.telnet.negotiation_options.is_empty() {
            return None;
        }
        Some(negotiation_preamble(
            self.telnet.negotiation_verb.code(),
            &self.telnet.negotiation_options,
        ))
    }
}
