use super::types::{Credentials, TransportFlavor};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Everything a session needs to know about one inbound connection.
pub struct SessionRequest<S = TcpStream> {
    pub stream: S,
    pub flavor: TransportFlavor,
    pub client_addr: SocketAddr,
    pub timestamp: DateTime<Utc>,
    pub server_version: String,
    pub client_version: String,
    /// Set when the transport already collected credentials (SSH password auth).
    pub credentials: Option<Credentials>,
}

impl<S> SessionRequest<S> {
    pub fn telnet(stream: S, client_addr: SocketAddr) -> Self {
        Self {
            stream,
            flavor: TransportFlavor::Telnet,
            client_addr,
            timestamp: Utc::now(),
            server_version: String::new(),
            client_version: String::new(),
            credentials: None,
        }
    }
}
