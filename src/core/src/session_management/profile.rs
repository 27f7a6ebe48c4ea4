use std::time::Duration;

use crate::network::telnet_codec::{negotiation_preamble, DEFAULT_NEGOTIATION_OPTIONS, DO};
use crate::network::types::TransportFlavor;
use crate::shell_emulation::persona::PersonaSelector;

/// Interaction time allowed to one session before it is cut off.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything that differs between the transports served by the one
/// session driver.
#[derive(Debug, Clone)]
pub struct SessionProfile {
    pub flavor: TransportFlavor,
    /// Ask for a username and a password before the shell.
    pub requires_auth: bool,
    pub timeout: Duration,
    pub personas: PersonaSelector,
    /// Raw control bytes sent before anything else.
    pub negotiation: Option<Vec<u8>>,
    /// Show the persona's pre-login issue text.
    pub show_issue: bool,
    /// Echo typed bytes back, for transports where the client does not.
    pub echo_input: bool,
}

impl SessionProfile {
    pub fn telnet(timeout: Duration) -> Self {
        Self {
            flavor: TransportFlavor::Telnet,
            requires_auth: true,
            timeout,
            personas: PersonaSelector::all(),
            negotiation: Some(negotiation_preamble(DO, &DEFAULT_NEGOTIATION_OPTIONS)),
            show_issue: true,
            echo_input: false,
        }
    }

    /// Credentials were already taken by the SSH password callback.
    pub fn ssh(timeout: Duration) -> Self {
        Self {
            flavor: TransportFlavor::Ssh,
            requires_auth: false,
            timeout,
            personas: PersonaSelector::all(),
            negotiation: None,
            show_issue: false,
            echo_input: true,
        }
    }

    pub fn with_personas(mut self, personas: PersonaSelector) -> Self {
        self.personas = personas;
        self
    }
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self::telnet(DEFAULT_SESSION_TIMEOUT)
    }
}
