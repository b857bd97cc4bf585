//! Foley CLI internals
//!
//! Board file parsing, the per-group instance registry and the interactive
//! command syntax. `main.rs` wires them to the engine and the desktop output.

pub mod board;
pub mod command;
pub mod registry;

pub use board::Board;
pub use command::{Command, ParseError};
pub use registry::{Registry, Triggered};
