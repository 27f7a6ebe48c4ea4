use std::net::SocketAddr;

use log::warn;
use tokio::time::Instant;
use uuid::Uuid;

use super::line_discipline::LineDiscipline;
use super::Stage;
use crate::data_capture::recorder::TranscriptRecorder;
use crate::shell_emulation::persona::Persona;

/// State of one connection, from accept to close.
pub struct Session {
    pub id: Uuid,
    pub client_addr: SocketAddr,
    pub persona: &'static Persona,
    stage: Stage,
    pub username: Option<String>,
    pub password: Option<String>,
    pub line: LineDiscipline,
    pub transcript: TranscriptRecorder,
    pub deadline: Instant,
}

impl Session {
    pub fn new(
        id: Uuid,
        client_addr: SocketAddr,
        persona: &'static Persona,
        transcript: TranscriptRecorder,
        deadline: Instant,
    ) -> Self {
        Self {
            id,
            client_addr,
            persona,
            stage: Stage::Greeting,
            username: None,
            password: None,
            line: LineDiscipline::new(),
            transcript,
            deadline,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves forward to `next`. Going back is refused and logged.
    pub fn advance(&mut self, next: Stage) -> bool {
        if next < self.stage {
            warn!(
                "[{}] Refusing stage change {:?} -> {:?}",
                self.id, self.stage, next
            );
            return false;
        }
        self.stage = next;
        true
    }

    /// Prompt matching the current stage, if the stage reads input.
    pub fn prompt(&self) -> Option<&'static str> {
        match self.stage {
            Stage::AwaitingUsername => Some(self.persona.login_prompt),
            Stage::AwaitingPassword => Some(self.persona.password_prompt),
            Stage::Shell => Some(self.persona.shell_prompt),
            Stage::Greeting | Stage::Closed => None,
        }
    }
}
