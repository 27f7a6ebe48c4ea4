//! # Network Listener Module
//!
//! Accepts Telnet connections and runs one independent session per
//! connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ Incoming        │───▶│ NetworkListener  │───▶│ SessionDriver   │
//! │ Connections     │    │                  │    │ (one task per   │
//! └─────────────────┘    │ - accept loop    │    │  connection)    │
//!                        │ - per-task RNG   │    └─────────────────┘
//!                        └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use antlion::data_capture::FileTranscriptStore;
//! use antlion::network::network_listener::NetworkListener;
//! use antlion::session_management::SessionProfile;
//! use antlion::error_handling::types::NetworkError;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), NetworkError> {
//!     let mut listener = NetworkListener::bind(
//!         "0.0.0.0:2323".parse().unwrap(),
//!         Arc::new(SessionProfile::default()),
//!         Arc::new(FileTranscriptStore::new("./telnet-log", true)),
//!         StdRng::from_entropy(),
//!     )
//!     .await?;
//!
//!     listener.start_listening().await;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::session_request::SessionRequest;
use crate::data_capture::storage::TranscriptStore;
use crate::error_handling::types::NetworkError;
use crate::session_management::profile::SessionProfile;
use crate::session_management::session_driver::{SessionDriver, SessionOutcome};

/// Pause after a failed accept, so a persistent error (for instance running
/// out of file descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A TCP listener that hands every accepted connection to its own session.
///
/// Sessions share nothing but the transcript store. Each one gets its own
/// RNG, seeded from the listener's, so a seeded listener is reproducible.
pub struct NetworkListener {
    listener: TcpListener,
    profile: Arc<SessionProfile>,
    store: Arc<dyn TranscriptStore>,
    rng: StdRng,
}

impl NetworkListener {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::BindError`] if the address is in use or the
    /// port is privileged.
    pub async fn bind(
        addr: SocketAddr,
        profile: Arc<SessionProfile>,
        store: Arc<dyn TranscriptStore>,
        rng: StdRng,
    ) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!("[!] Bind error on {}: {:?}", addr, e);
            NetworkError::BindError(e)
        })?;

        info!("Listening for {} sessions on {}", profile.flavor, addr);
        Ok(Self {
            listener,
            profile,
            store,
            rng,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        self.listener.local_addr().map_err(NetworkError::SockError)
    }

    /// Accepts connections forever. Accept errors are logged and the loop
    /// carries on.
    pub async fn start_listening(&mut self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, client_addr)) => {
                    debug!("Accepted connection from {}", client_addr);
                    self.handle_connection(stream, client_addr);
                }
                Err(e) => {
                    error!("[!] Accept error: {:?}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    fn handle_connection(
        &mut self,
        stream: TcpStream,
        client_addr: SocketAddr,
    ) -> JoinHandle<Option<SessionOutcome>> {
        let seed = self.rng.next_u64();
        let profile = Arc::clone(&self.profile);
        let store = Arc::clone(&self.store);

        tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(seed);
            let request = SessionRequest::telnet(stream, client_addr);
            match SessionDriver::start(request, profile, store.as_ref(), &mut rng) {
                Ok(driver) => Some(driver.run().await),
                Err(e) => {
                    error!("Session for {} refused: {}", client_addr, e);
                    None
                }
            }
        })
    }
}
