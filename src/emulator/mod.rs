//! Emulator process management
//!
//! The emulator is an opaque background process: the harness starts it,
//! reads the log it writes and asks it to quit over its control socket.

pub mod control;
mod session;

pub use session::{EmulationSession, Termination};
