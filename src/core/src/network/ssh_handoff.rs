//! Hand-off point between an SSH server library and the session driver.
//!
//! Key exchange, ciphers and packet framing stay inside the SSH library. Its
//! per-connection handler delegates every decision to an
//! [`SshConnectionContext`]: password checks, channel opens and channel
//! requests. Once a `shell` or `exec` request is accepted the library hands
//! over the decrypted channel as a duplex stream and [`SshConnectionContext::launch`]
//! runs the regular session driver on it.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use tokio::io::{AsyncRead, AsyncWrite};

use super::session_request::SessionRequest;
use super::types::{Credentials, TransportFlavor};
use crate::data_capture::storage::TranscriptStore;
use crate::error_handling::types::SessionError;
use crate::session_management::profile::SessionProfile;
use crate::session_management::session_driver::{SessionDriver, SessionOutcome};

/// Channel open failure reasons, with their SSH reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AdministrativelyProhibited,
    UnknownChannelType,
}

impl RejectReason {
    pub fn code(self) -> u32 {
        match self {
            RejectReason::AdministrativelyProhibited => 1,
            RejectReason::UnknownChannelType => 3,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AdministrativelyProhibited => write!(f, "administratively prohibited"),
            RejectReason::UnknownChannelType => write!(f, "unknown channel type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    Session,
    DirectTcpip { host: String, port: u16 },
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelVerdict {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRequest {
    PtyReq { term: String },
    Env { name: String, value: String },
    Shell,
    Exec { command: String },
    Subsystem { name: String },
    Other(String),
}

/// What to run on the channel once it is handed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    Shell,
    Exec(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestVerdict {
    /// Reply with success and keep waiting for more requests.
    Ack,
    /// Reply with success and hand the channel to the session driver.
    Start(Launch),
    /// Reply with failure.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVerdict {
    Accept,
    Reject,
}

/// Credentials captured by the auth callback, read back when the session
/// starts.
#[derive(Debug, Default)]
pub struct AuthSlot {
    inner: Mutex<Option<Credentials>>,
}

impl AuthSlot {
    pub fn record(&self, credentials: Credentials) {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(credentials);
    }

    pub fn get(&self) -> Option<Credentials> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Per-connection state shared by the SSH handler callbacks.
pub struct SshConnectionContext {
    client_addr: SocketAddr,
    server_version: String,
    client_version: String,
    auth: Arc<AuthSlot>,
    rng: StdRng,
    pty_requested: bool,
    launched: bool,
}

impl SshConnectionContext {
    pub fn new(
        client_addr: SocketAddr,
        server_version: impl Into<String>,
        client_version: impl Into<String>,
        rng: StdRng,
    ) -> Self {
        Self {
            client_addr,
            server_version: server_version.into(),
            client_version: client_version.into(),
            auth: Arc::new(AuthSlot::default()),
            rng,
            pty_requested: false,
            launched: false,
        }
    }

    pub fn auth_slot(&self) -> Arc<AuthSlot> {
        Arc::clone(&self.auth)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.auth.get()
    }

    pub fn pty_requested(&self) -> bool {
        self.pty_requested
    }

    /// Every password is accepted and remembered.
    pub fn check_password(&self, username: &str, password: &str) -> AuthVerdict {
        info!(
            "SSH password from {} ({}): {:?} / {:?}",
            self.client_addr, self.client_version, username, password
        );
        self.auth.record(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        AuthVerdict::Accept
    }

    /// Keys are always refused; clients fall back to password auth.
    pub fn check_public_key(&self, username: &str, fingerprint: &str) -> AuthVerdict {
        debug!(
            "SSH public key from {} for {:?}: {}",
            self.client_addr, username, fingerprint
        );
        AuthVerdict::Reject
    }

    pub fn open_channel(&self, kind: &ChannelKind) -> ChannelVerdict {
        match kind {
            ChannelKind::Session => ChannelVerdict::Accept,
            ChannelKind::DirectTcpip { host, port } => {
                let reason = RejectReason::AdministrativelyProhibited;
                warn!(
                    "{} asked to forward to {}:{}, refused: {}",
                    self.client_addr, host, port, reason
                );
                ChannelVerdict::Reject(reason)
            }
            ChannelKind::Other(name) => {
                let reason = RejectReason::UnknownChannelType;
                debug!(
                    "{} opened channel type {:?}, refused: {}",
                    self.client_addr, name, reason
                );
                ChannelVerdict::Reject(reason)
            }
        }
    }

    pub fn dispatch_request(&mut self, request: ChannelRequest) -> RequestVerdict {
        match request {
            ChannelRequest::PtyReq { term } => {
                debug!("{} pty-req {}", self.client_addr, term);
                self.pty_requested = true;
                RequestVerdict::Ack
            }
            ChannelRequest::Env { name, value } => {
                debug!("{} env {}={}", self.client_addr, name, value);
                RequestVerdict::Ack
            }
            ChannelRequest::Shell if !self.launched => {
                self.launched = true;
                RequestVerdict::Start(Launch::Shell)
            }
            ChannelRequest::Exec { command } if !self.launched => {
                self.launched = true;
                RequestVerdict::Start(Launch::Exec(command))
            }
            ChannelRequest::Shell | ChannelRequest::Exec { .. } => RequestVerdict::Reject,
            ChannelRequest::Subsystem { name } => {
                debug!("{} subsystem {:?} refused", self.client_addr, name);
                RequestVerdict::Reject
            }
            ChannelRequest::Other(name) => {
                debug!("{} unsupported request {:?}", self.client_addr, name);
                RequestVerdict::Reject
            }
        }
    }

    /// Wraps the decrypted channel with the metadata gathered so far.
    pub fn session_request<S>(&self, stream: S) -> SessionRequest<S> {
        SessionRequest {
            stream,
            flavor: TransportFlavor::Ssh,
            client_addr: self.client_addr,
            timestamp: Utc::now(),
            server_version: self.server_version.clone(),
            client_version: self.client_version.clone(),
            credentials: self.auth.get(),
        }
    }

    /// Runs the session driver on the handed-over channel.
    pub async fn launch<S>(
        &mut self,
        launch: Launch,
        stream: S,
        profile: Arc<SessionProfile>,
        store: &dyn TranscriptStore,
    ) -> Result<SessionOutcome, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let request = self.session_request(stream);
        let driver = SessionDriver::start(request, profile, store, &mut self.rng)?;
        Ok(match launch {
            Launch::Shell => driver.run().await,
            Launch::Exec(command) => driver.run_exec(&command).await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::memory_storage::MemoryTranscriptStore;
    use crate::session_management::closer::CloseReason;
    use crate::shell_emulation::persona::PersonaSelector;
    use rand::SeedableRng;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn context() -> SshConnectionContext {
        SshConnectionContext::new(
            "203.0.113.77:52100".parse().unwrap(),
            "SSH-2.0-OpenSSH_7.4",
            "SSH-2.0-libssh_0.9.6",
            StdRng::seed_from_u64(11),
        )
    }

    fn profile() -> Arc<SessionProfile> {
        Arc::new(
            SessionProfile::ssh(Duration::from_secs(60))
                .with_personas(PersonaSelector::from_names(&["centos-7"]).unwrap()),
        )
    }

    #[test]
    fn password_is_accepted_and_kept() {
        let ctx = context();
        assert_eq!(ctx.check_password("root", "123456"), AuthVerdict::Accept);
        assert_eq!(ctx.check_password("root", "admin"), AuthVerdict::Accept);
        assert_eq!(
            ctx.credentials(),
            Some(Credentials {
                username: "root".into(),
                password: "admin".into()
            })
        );
        assert_eq!(ctx.check_public_key("root", "SHA256:abc"), AuthVerdict::Reject);
    }

    #[test]
    fn only_session_channels_open() {
        let ctx = context();
        assert_eq!(ctx.open_channel(&ChannelKind::Session), ChannelVerdict::Accept);

        let forward = ChannelKind::DirectTcpip {
            host: "10.0.0.1".into(),
            port: 25,
        };
        match ctx.open_channel(&forward) {
            ChannelVerdict::Reject(reason) => assert_eq!(reason.code(), 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            ctx.open_channel(&ChannelKind::Other("x11".into())),
            ChannelVerdict::Reject(RejectReason::UnknownChannelType)
        );
        assert_eq!(RejectReason::UnknownChannelType.code(), 3);
        assert_eq!(
            RejectReason::AdministrativelyProhibited.to_string(),
            "administratively prohibited"
        );
    }

    #[test]
    fn requests_dispatch_by_kind() {
        let mut ctx = context();
        assert_eq!(
            ctx.dispatch_request(ChannelRequest::PtyReq {
                term: "xterm".into()
            }),
            RequestVerdict::Ack
        );
        assert!(ctx.pty_requested());
        assert_eq!(
            ctx.dispatch_request(ChannelRequest::Env {
                name: "LANG".into(),
                value: "C".into()
            }),
            RequestVerdict::Ack
        );
        assert_eq!(
            ctx.dispatch_request(ChannelRequest::Subsystem {
                name: "sftp".into()
            }),
            RequestVerdict::Reject
        );
        assert_eq!(
            ctx.dispatch_request(ChannelRequest::Shell),
            RequestVerdict::Start(Launch::Shell)
        );
        // Only one launch per connection.
        assert_eq!(
            ctx.dispatch_request(ChannelRequest::Exec {
                command: "id".into()
            }),
            RequestVerdict::Reject
        );
    }

    #[test]
    fn session_request_carries_metadata() {
        let ctx = context();
        ctx.check_password("pi", "raspberry");
        let request = ctx.session_request(());

        assert_eq!(request.flavor, TransportFlavor::Ssh);
        assert_eq!(request.server_version, "SSH-2.0-OpenSSH_7.4");
        assert_eq!(request.client_version, "SSH-2.0-libssh_0.9.6");
        assert_eq!(request.credentials.unwrap().username, "pi");
    }

    #[tokio::test]
    async fn shell_launch_runs_driver() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut ctx = context();
        ctx.check_password("root", "toor");
        let store = MemoryTranscriptStore::new();

        let (mut client, server) = tokio::io::duplex(64 * 1024);
        client.write_all(b"whoami\rexit\r").await.unwrap();

        let outcome = ctx
            .launch(Launch::Shell, server, profile(), &store)
            .await
            .unwrap();
        assert_eq!(outcome.reason, CloseReason::Completed);
        assert_eq!(outcome.persona, "centos-7");
        assert_eq!(outcome.commands, vec!["whoami", "exit"]);

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("[root@db01 ~]# whoami\r\nroot\r\n"));
        assert_eq!(store.lines()[1], "User:root");
    }

    #[tokio::test]
    async fn exec_launch_returns_one_output() {
        let mut ctx = context();
        let store = MemoryTranscriptStore::new();
        let (mut client, server) = tokio::io::duplex(64 * 1024);

        let outcome = ctx
            .launch(
                Launch::Exec("cat /etc/redhat-release".into()),
                server,
                profile(),
                &store,
            )
            .await
            .unwrap();
        assert_eq!(outcome.reason, CloseReason::Completed);

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        assert_eq!(output, b"CentOS Linux release 7.9.2009 (Core)\r\n");
    }
}
