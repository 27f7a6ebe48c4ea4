pub mod network_listener;
pub mod session_request;
pub mod ssh_handoff;
pub mod telnet_codec;
pub mod types;

pub use network_listener::NetworkListener;
pub use session_request::SessionRequest;
pub use telnet_codec::{TelnetReader, TelnetWriter};
