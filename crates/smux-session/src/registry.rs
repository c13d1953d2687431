//! Bounded session table with stable, reusable display indices
//!
//! Slots hold at most [`MAX_SESSIONS`] sessions. Each session carries an
//! index in `[1, MAX_SESSIONS]`, unique among live sessions; a closed or
//! exited session frees its index for the next spawn, which always takes
//! the lowest one available.

use crate::SessionError;
use smux_pty::{Pty, PtyProcess};
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Upper bound on concurrently running sessions
pub const MAX_SESSIONS: usize = 9;

/// One child program and the pty it is attached to
pub struct Session {
    index: usize,
    process: PtyProcess,
}

impl Session {
    /// Display/selection index, stable for the session's lifetime
    pub fn index(&self) -> usize {
        self.index
    }

    /// The pty-attached child behind this session
    pub fn process(&self) -> &PtyProcess {
        &self.process
    }
}

/// Fixed-capacity table of live sessions
#[derive(Default)]
pub struct SessionRegistry {
    slots: [Option<Session>; MAX_SESSIONS],
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest index in `[1, MAX_SESSIONS]` not taken by a live session
    fn allocate_index(&self) -> Option<usize> {
        (1..=MAX_SESSIONS).find(|idx| !self.contains(*idx))
    }

    /// An unoccupied slot position, if any
    fn find_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Spawn `target` (no arguments) in a fresh pty and install it
    ///
    /// Returns the new session's index. A failed spawn leaves the table
    /// exactly as it was.
    pub fn spawn_session(
        &mut self,
        target: &Path,
        rows: u16,
        cols: u16,
    ) -> Result<usize, SessionError> {
        let slot = self.find_free_slot().ok_or(SessionError::TableFull)?;
        let index = self.allocate_index().ok_or(SessionError::NoFreeIndex)?;

        let pty = Pty::open(rows, cols)?;

        let mut command = Command::new(target);
        if std::env::var_os("TERM").is_none() {
            command.env("TERM", "xterm-256color");
        }

        let process = pty.spawn(command)?;
        debug!(index, pid = %process.pid(), "spawned session");

        self.slots[slot] = Some(Session { index, process });
        Ok(index)
    }

    /// Terminate and reap the session at `index`, freeing its slot
    ///
    /// Unknown indices are a no-op, not an error.
    pub fn close_session(&mut self, index: usize) {
        let Some(session) = self.take(index) else {
            return;
        };

        if let Err(e) = session.process().kill() {
            debug!(index, "kill failed (child already gone): {e}");
        }
        if let Err(e) = session.process().wait() {
            debug!(index, "wait failed (child already reaped): {e}");
        }
        debug!(index, "closed session");
        // fd released when `session` drops
    }

    /// Free a slot whose child was discovered dead via end-of-stream
    ///
    /// The child has already torn down its side of the pty, so the reap
    /// completes promptly. Converges with [`Self::reap_exited`]; freeing
    /// an already-freed index is a no-op.
    pub fn release(&mut self, index: usize) {
        let Some(session) = self.take(index) else {
            return;
        };

        if let Err(e) = session.process().wait() {
            debug!(index, "wait failed (child already reaped): {e}");
        }
        debug!(index, "released session after end-of-stream");
    }

    /// Non-blocking reap of every live session
    ///
    /// Returns the indices freed this pass.
    pub fn reap_exited(&mut self) -> Vec<usize> {
        let mut freed = Vec::new();

        for slot in self.slots.iter_mut() {
            let exited = match slot {
                Some(session) => match session.process().try_wait() {
                    Some(status) => {
                        debug!(index = session.index(), status, "session exited");
                        true
                    }
                    None => false,
                },
                None => false,
            };
            if exited {
                if let Some(session) = slot.take() {
                    freed.push(session.index());
                }
            }
        }

        freed
    }

    /// Apply a window size to every live session
    pub fn resize_all(&self, rows: u16, cols: u16) {
        for session in self.sessions() {
            if let Err(e) = session.process().resize(rows, cols) {
                warn!(index = session.index(), "resize failed: {e}");
            }
        }
    }

    /// Look up a session by index; absence is a normal outcome
    pub fn get(&self, index: usize) -> Option<&Session> {
        self.sessions().find(|s| s.index() == index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Live session indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.sessions().map(Session::index).collect();
        out.sort_unstable();
        out
    }

    /// Lowest live index, used for fallback activation
    pub fn lowest_index(&self) -> Option<usize> {
        self.sessions().map(Session::index).min()
    }

    pub fn len(&self) -> usize {
        self.sessions().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over live sessions in slot order
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().flatten()
    }

    fn take(&mut self, index: usize) -> Option<Session> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.as_ref().map(Session::index) == Some(index))?;
        self.slots[slot].take()
    }
}
