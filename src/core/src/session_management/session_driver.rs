//! The per-connection state machine.
//!
//! ```text
//! Greeting -> AwaitingUsername -> AwaitingPassword -> Shell -> Closed
//!          \___________________(no auth)____________/
//! ```
//!
//! A [`SessionDriver`] is built from an accepted [`SessionRequest`] and run to
//! completion on its own task. The read loop and a watchdog race through a
//! [`SessionCloser`]; whichever closes first decides the [`CloseReason`].
//! Every transcript line is recorded before the matching bytes go out.

use std::io;
use std::sync::Arc;

use log::{debug, info, warn};
use rand::RngCore;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::time::Instant;
use uuid::Uuid;

use super::closer::{spawn_watchdog, CloseReason, SessionCloser};
use super::line_discipline::LineEvent;
use super::profile::SessionProfile;
use super::session::Session;
use super::Stage;
use crate::data_capture::recorder::TranscriptRecorder;
use crate::data_capture::storage::TranscriptStore;
use crate::error_handling::types::SessionError;
use crate::network::session_request::SessionRequest;
use crate::network::telnet_codec::{TelnetReader, TelnetWriter};
use crate::network::types::TransportFlavor;
use crate::shell_emulation::interpreter;

const ERASE: &[u8] = b"\x08 \x08";
const NEWLINE: &[u8] = b"\r\n";

/// What a finished session leaves behind, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub persona: &'static str,
    pub reason: CloseReason,
    pub username: Option<String>,
    pub password: Option<String>,
    pub commands: Vec<String>,
}

enum Flow {
    Continue,
    Exit,
}

/// Both halves of the peer stream, decoded according to the transport.
enum Wire<S> {
    Telnet {
        reader: TelnetReader<ReadHalf<S>>,
        writer: TelnetWriter<WriteHalf<S>>,
    },
    Raw {
        reader: BufReader<ReadHalf<S>>,
        writer: WriteHalf<S>,
    },
}

impl<S: AsyncRead + AsyncWrite + Unpin> Wire<S> {
    fn new(stream: S, flavor: TransportFlavor) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        match flavor {
            TransportFlavor::Telnet => Wire::Telnet {
                reader: TelnetReader::new(read_half),
                writer: TelnetWriter::new(write_half),
            },
            TransportFlavor::Ssh => Wire::Raw {
                reader: BufReader::new(read_half),
                writer: write_half,
            },
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Wire::Telnet { reader, .. } => reader.read(buf).await,
            Wire::Raw { reader, .. } => reader.read(buf).await,
        }
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Wire::Telnet { writer, .. } => {
                // A short count means the next call reports the sink error.
                let mut rest = data;
                while !rest.is_empty() {
                    let n = writer.write(rest).await?;
                    rest = &rest[n..];
                }
                Ok(())
            }
            Wire::Raw { writer, .. } => {
                writer.write_all(data).await?;
                writer.flush().await
            }
        }
    }

    /// Control bytes only mean something on Telnet; elsewhere this is a no-op.
    async fn send_command(&mut self, raw: &[u8]) -> io::Result<()> {
        match self {
            Wire::Telnet { writer, .. } => writer.send_command(raw).await,
            Wire::Raw { .. } => Ok(()),
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Wire::Telnet { writer, .. } => writer.shutdown().await,
            Wire::Raw { writer, .. } => writer.shutdown().await,
        }
    }
}

/// Terminal output uses CRLF line ends.
fn to_terminal(text: &str) -> Vec<u8> {
    text.replace('\n', "\r\n").into_bytes()
}

/// Only the exact word closes the shell; padded input is an ordinary command.
fn is_exit(line: &str) -> bool {
    line == "exit"
}

pub struct SessionDriver<S> {
    session: Session,
    profile: Arc<SessionProfile>,
    wire: Wire<S>,
    closer: SessionCloser,
    commands: Vec<String>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SessionDriver<S> {
    /// Picks a persona and opens the transcript for `request`.
    ///
    /// Nothing is written to the peer here. A timeout too large for a
    /// deadline or a transcript that cannot be opened refuses the session
    /// before it starts; the timeout is checked first so a refused session
    /// leaves no file behind.
    pub fn start(
        request: SessionRequest<S>,
        profile: Arc<SessionProfile>,
        store: &dyn TranscriptStore,
        rng: &mut dyn RngCore,
    ) -> Result<Self, SessionError> {
        let id = Uuid::new_v4();
        let persona = profile
            .personas
            .select(rng)
            .ok_or(SessionError::NoPersonaAvailable)?;

        let deadline = Instant::now()
            .checked_add(profile.timeout)
            .ok_or(SessionError::TimeoutOutOfRange(profile.timeout))?;

        let mut transcript =
            TranscriptRecorder::start(id, store, request.client_addr, request.timestamp)?;
        transcript.set_versions(&request.server_version, &request.client_version);
        if let Some(credentials) = &request.credentials {
            transcript.set_user(&credentials.username);
            transcript.set_password(&credentials.password);
        }

        let mut session = Session::new(
            id,
            request.client_addr,
            persona,
            transcript,
            deadline,
        );
        if let Some(credentials) = request.credentials {
            session.username = Some(credentials.username);
            session.password = Some(credentials.password);
        }

        info!(
            "[{}] New {} session from {} as {}",
            id, request.flavor, request.client_addr, persona.name
        );

        Ok(Self {
            session,
            wire: Wire::new(request.stream, profile.flavor),
            profile,
            closer: SessionCloser::new(),
            commands: Vec::new(),
        })
    }

    /// Handle that closes this session from outside.
    pub fn closer(&self) -> SessionCloser {
        self.closer.clone()
    }

    /// Runs the interactive login and shell until exit, EOF, error or timeout.
    pub async fn run(mut self) -> SessionOutcome {
        let watchdog = spawn_watchdog(self.closer.clone(), self.session.deadline, self.session.id);
        let closer = self.closer.clone();

        let reason = tokio::select! {
            reason = self.drive() => reason,
            reason = closer.closed() => reason,
        };

        watchdog.abort();
        self.teardown(reason).await
    }

    /// Runs one command without prompts, then closes.
    pub async fn run_exec(mut self, command: &str) -> SessionOutcome {
        let watchdog = spawn_watchdog(self.closer.clone(), self.session.deadline, self.session.id);
        let closer = self.closer.clone();

        let reason = tokio::select! {
            reason = self.exec(command) => reason,
            reason = closer.closed() => reason,
        };

        watchdog.abort();
        self.teardown(reason).await
    }

    async fn drive(&mut self) -> CloseReason {
        if let Err(e) = self.greet().await {
            return self.transport_failed(&e);
        }

        // The Telnet decoder fills the whole buffer before returning, so input
        // is pulled one byte at a time.
        let mut byte = [0u8; 1];
        loop {
            match self.wire.read(&mut byte).await {
                Ok(0) => {
                    debug!("[{}] Peer closed the connection", self.session.id);
                    return CloseReason::PeerClosed;
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return self.transport_failed(&e),
            }

            match self.on_byte(byte[0]).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return CloseReason::Completed,
                Err(e) => return self.transport_failed(&e),
            }
        }
    }

    async fn exec(&mut self, command: &str) -> CloseReason {
        self.session.advance(Stage::Shell);
        self.session.transcript.seal_header();
        self.session.transcript.record(command);
        debug!("[{}] Exec: {:?}", self.session.id, command);
        self.commands.push(command.to_string());

        let output = interpreter::run_line(command, self.session.persona);
        match self.emit_output(&output).await {
            Ok(()) => CloseReason::Completed,
            Err(e) => self.transport_failed(&e),
        }
    }

    async fn greet(&mut self) -> io::Result<()> {
        let profile = Arc::clone(&self.profile);
        let persona = self.session.persona;

        if let Some(preamble) = profile.negotiation.as_deref() {
            self.wire.send_command(preamble).await?;
        }
        if profile.show_issue {
            self.emit_output(persona.issue).await?;
        }

        if profile.requires_auth {
            self.session.advance(Stage::AwaitingUsername);
            self.show_prompt().await
        } else {
            self.enter_shell().await
        }
    }

    async fn enter_shell(&mut self) -> io::Result<()> {
        self.session.advance(Stage::Shell);
        self.session.transcript.seal_header();
        let persona = self.session.persona;
        self.emit_output(persona.banner).await?;
        self.show_prompt().await
    }

    async fn on_byte(&mut self, byte: u8) -> io::Result<Flow> {
        let echo = self.profile.echo_input;
        let hidden = self.session.stage() == Stage::AwaitingPassword;

        match self.session.line.push(byte) {
            LineEvent::Pending => {}
            LineEvent::Typed(typed) => {
                if echo && !hidden {
                    self.wire.write(&[typed]).await?;
                }
            }
            LineEvent::Erased => {
                if echo && !hidden {
                    self.wire.write(ERASE).await?;
                }
            }
            LineEvent::Blank { reprompt } => {
                if echo {
                    self.wire.write(NEWLINE).await?;
                }
                if reprompt {
                    self.show_prompt().await?;
                }
            }
            LineEvent::Line(line) => {
                if echo {
                    self.wire.write(NEWLINE).await?;
                }
                return self.on_line(line).await;
            }
        }
        Ok(Flow::Continue)
    }

    async fn on_line(&mut self, line: String) -> io::Result<Flow> {
        match self.session.stage() {
            Stage::AwaitingUsername => {
                self.session.transcript.record(&line);
                self.session.transcript.set_user(&line);
                debug!("[{}] Username {:?}", self.session.id, line);
                self.session.username = Some(line);
                self.session.advance(Stage::AwaitingPassword);
                self.show_prompt().await?;
            }
            Stage::AwaitingPassword => {
                self.session.transcript.record(&line);
                self.session.transcript.set_password(&line);
                info!(
                    "[{}] Credentials from {}: {:?} / {:?}",
                    self.session.id,
                    self.session.client_addr,
                    self.session.username.as_deref().unwrap_or_default(),
                    line
                );
                self.session.password = Some(line);
                self.enter_shell().await?;
            }
            Stage::Shell => return self.run_command(&line).await,
            Stage::Greeting | Stage::Closed => {}
        }
        Ok(Flow::Continue)
    }

    async fn run_command(&mut self, line: &str) -> io::Result<Flow> {
        self.session.transcript.record(line);
        if !line.trim().is_empty() {
            debug!("[{}] Command {:?}", self.session.id, line);
            self.commands.push(line.to_string());
        }

        let output = interpreter::run_line(line, self.session.persona);
        self.emit_output(&output).await?;

        if is_exit(line) {
            return Ok(Flow::Exit);
        }
        self.show_prompt().await?;
        Ok(Flow::Continue)
    }

    async fn show_prompt(&mut self) -> io::Result<()> {
        if let Some(prompt) = self.session.prompt() {
            self.session.transcript.record(prompt);
            self.wire.write(prompt.as_bytes()).await?;
        }
        Ok(())
    }

    async fn emit_output(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.session.transcript.record_output(text);
        self.wire.write(&to_terminal(text)).await
    }

    fn transport_failed(&self, e: &io::Error) -> CloseReason {
        warn!("[{}] Transport error: {}", self.session.id, e);
        CloseReason::TransportError
    }

    async fn teardown(mut self, reason: CloseReason) -> SessionOutcome {
        self.closer.close(reason);
        let reason = self.closer.reason().unwrap_or(reason);

        self.session.advance(Stage::Closed);
        self.session.transcript.finish();
        if let Err(e) = self.wire.shutdown().await {
            debug!("[{}] Shutdown after close: {}", self.session.id, e);
        }

        info!(
            "[{}] Session closed ({}) after {} commands",
            self.session.id,
            reason,
            self.commands.len()
        );

        SessionOutcome {
            session_id: self.session.id,
            persona: self.session.persona.name,
            reason,
            username: self.session.username,
            password: self.session.password,
            commands: self.commands,
        }
    }
}
