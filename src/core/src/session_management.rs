//! Session management core module.
//!
//! One [`session_driver::SessionDriver`] runs per accepted connection. It
//! owns the [`session::Session`] state, reads through the line discipline,
//! answers through the persona and races a watchdog for the right to close.

use serde::{Deserialize, Serialize};

/// One-shot close signal and session watchdog.
pub mod closer;
/// Line assembly from raw input bytes.
pub mod line_discipline;
/// Per-transport session parameters.
pub mod profile;
/// Per-connection session state.
pub mod session;
/// The state machine driving a session over a duplex stream.
pub mod session_driver;


pub use closer::{CloseReason, SessionCloser};
pub use profile::SessionProfile;
pub use session_driver::{SessionDriver, SessionOutcome};

/// Where a session stands in the fake login flow.
///
/// Stages only move forward; `Shell` loops on itself for every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Greeting,
    AwaitingUsername,
    AwaitingPassword,
    Shell,
    Closed,
}
