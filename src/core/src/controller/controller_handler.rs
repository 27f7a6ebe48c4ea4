use std::sync::Arc;

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::configuration::config::Config;
use crate::data_capture::file_storage::FileTranscriptStore;
use crate::data_capture::storage::TranscriptStore;
use crate::error_handling::types::*;
use crate::network::network_listener::NetworkListener;
use crate::session_management::profile::SessionProfile;

/// Wires the configuration into a running Telnet acceptor.
pub struct Controller {
    pub config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Telnet session parameters derived from the configuration.
    pub fn session_profile(&self) -> Result<SessionProfile, ControllerError> {
        let mut profile = SessionProfile::telnet(self.config.session_timeout())
            .with_personas(self.config.personas()?);
        profile.negotiation = self.config.negotiation();
        profile.show_issue = self.config.telnet.show_issue;
        profile.requires_auth = self.config.telnet.require_login;
        Ok(profile)
    }

    pub fn transcript_store(&self) -> Arc<dyn TranscriptStore> {
        Arc::new(FileTranscriptStore::new(
            &self.config.transcript.log_dir,
            self.config.transcript.per_host_dirs,
        ))
    }

    fn listener_rng(&self) -> StdRng {
        match self.config.session.seed {
            Some(seed) => {
                info!("Persona selection seeded with {}", seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        }
    }

    pub async fn bind(&self) -> Result<NetworkListener, ControllerError> {
        let addr = self.config.listen_address()?;
        let listener = NetworkListener::bind(
            addr,
            Arc::new(self.session_profile()?),
            self.transcript_store(),
            self.listener_rng(),
        )
        .await?;
        Ok(listener)
    }

    /// Binds and serves until the task is dropped.
    pub async fn run(&self) -> Result<(), ControllerError> {
        info!(
            "Transcripts go to {}",
            self.config.transcript.log_dir.display()
        );
        let mut listener = self.bind().await?;
        listener.start_listening().await;
        Ok(())
    }
}
