//! Keyboard byte classification
//!
//! Everything except `ESC` goes straight to the active session. An `ESC`
//! is a potential multiplexer command: its tail is taken from the same
//! input chunk when more bytes are already there, otherwise a short
//! secondary read collects whatever arrives within
//! [`ESCAPE_TAIL_TIMEOUT_MS`], so a lone ESC keystroke is never held up.
//!
//! Only an exactly one-byte tail can form a command. Anything else —
//! a bare ESC, a CSI/SS3 sequence from an arrow or function key, a
//! longer burst — is replayed to the active session byte-for-byte.

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::os::unix::io::{BorrowedFd, RawFd};

/// Escape byte prefixing every multiplexer command
pub const ESC: u8 = 0x1b;

/// How long a command tail may trail its ESC
pub const ESCAPE_TAIL_TIMEOUT_MS: u16 = 15;

/// A recognized multiplexer command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `ESC n` — spawn a new session and make it active
    Spawn,
    /// `ESC 1`..`ESC 9` — switch to that session if it exists
    Switch(usize),
    /// `ESC d` — close the active session
    CloseActive,
    /// `ESC q` — shut the multiplexer down
    Quit,
}

/// What to do with the bytes following an ESC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeOutcome {
    Run(Command),
    /// Not a command: forward ESC and the tail verbatim
    PassThrough,
}

/// Classify the tail of a possible command sequence
pub fn classify_escape(tail: &[u8]) -> EscapeOutcome {
    match tail {
        [b'n' | b'N'] => EscapeOutcome::Run(Command::Spawn),
        [b'd' | b'D'] => EscapeOutcome::Run(Command::CloseActive),
        [b'q' | b'Q'] => EscapeOutcome::Run(Command::Quit),
        [b @ b'1'..=b'9'] => EscapeOutcome::Run(Command::Switch((b - b'0') as usize)),
        _ => EscapeOutcome::PassThrough,
    }
}

/// Collect the bytes trailing a chunk-final ESC
///
/// Polls `fd` for up to [`ESCAPE_TAIL_TIMEOUT_MS`] and reads once.
/// Returns how many bytes landed in `scratch`; zero means the ESC stood
/// alone.
pub fn read_escape_tail(fd: RawFd, scratch: &mut [u8]) -> usize {
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];

    match poll(&mut fds, PollTimeout::from(ESCAPE_TAIL_TIMEOUT_MS)) {
        Ok(n) if n > 0 => nix::unistd::read(fd, scratch).unwrap_or(0),
        _ => 0,
    }
}
