use std::fmt;

/// Wire flavor of an accepted stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFlavor {
    /// Raw TCP carrying Telnet control bytes.
    Telnet,
    /// An already decrypted SSH channel handed over by the SSH server library.
    Ssh,
}

impl fmt::Display for TransportFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFlavor::Telnet => write!(f, "telnet"),
            TransportFlavor::Ssh => write!(f, "ssh"),
        }
    }
}

/// Username and password as typed by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
