//! Fake shell: persona catalog and command interpreter.

pub mod interpreter;
pub mod persona;

pub use interpreter::{interpret, run_line, CommandLine};
pub use persona::{Persona, PersonaSelector};
