//! PTY (Pseudo-Terminal) handling for smux
//!
//! Provides pty allocation and child process management for Unix-like
//! systems: each multiplexed session is a child program running as the
//! session leader of its own pty.

pub mod pty;

pub use pty::{Pty, PtyMaster, PtyProcess, PtyRead};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to allocate PTY: {0}")]
    AllocationFailed(String),

    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("PTY I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
