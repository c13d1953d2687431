//! Session registry for smux
//!
//! A bounded table of running sessions, each pairing a stable display
//! index with the pty-attached child process behind it.

pub mod registry;

pub use registry::{Session, SessionRegistry, MAX_SESSIONS};

use smux_pty::PtyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session table is full")]
    TableFull,

    #[error("no free session index")]
    NoFreeIndex,

    #[error(transparent)]
    Pty(#[from] PtyError),
}
