//! The event multiplexer: one thread, one poll set, one tick at a time
//!
//! Each tick renders the status bar, waits for readiness on real stdin
//! plus every session master, pumps ready fds, then consumes the signal
//! flags. All session-table mutation happens here; nothing else ever
//! touches a master fd.

use crate::input::{self, Command, EscapeOutcome};
use crate::signals;
use crate::status;
use anyhow::{Context, Result};
use crossterm::terminal;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use smux_pty::PtyRead;
use smux_session::{SessionError, SessionRegistry};
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, BorrowedFd, RawFd};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Poll timeout per tick; bounds how stale a signal flag can get
pub const TICK_MS: u16 = 50;

/// Upper bound on bytes moved per fd per tick
const IO_CHUNK: usize = 4096;

const STATUS_LABEL: &str = "smux";

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Every session is gone
    NoSessions,
    /// The quit command drained the table
    Quit,
}

/// Single-owner multiplexer state: the session table, the active index,
/// the terminal geometry, and the spawn target.
pub struct Multiplexer {
    registry: SessionRegistry,
    active: Option<usize>,
    cols: u16,
    rows: u16,
    target: PathBuf,
}

impl Multiplexer {
    pub fn new(target: PathBuf, cols: u16, rows: u16) -> Self {
        Self {
            registry: SessionRegistry::new(),
            active: None,
            cols,
            rows,
            target,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Index of the session receiving keyboard input
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Session rows: the full height minus the status row
    fn session_rows(&self) -> u16 {
        self.rows.saturating_sub(1).max(1)
    }

    /// Spawn a session from the configured target; it becomes active
    pub fn spawn_session(&mut self) -> Result<usize, SessionError> {
        let index = self
            .registry
            .spawn_session(&self.target, self.session_rows(), self.cols)?;
        self.active = Some(index);
        Ok(index)
    }

    /// Execute one multiplexer command; `false` means quit was requested
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Spawn => {
                if let Err(e) = self.spawn_session() {
                    warn!("failed to spawn session: {e}");
                }
            }
            Command::Switch(index) => {
                if self.registry.contains(index) {
                    self.active = Some(index);
                }
            }
            Command::CloseActive => {
                if let Some(index) = self.active.take() {
                    self.registry.close_session(index);
                }
            }
            Command::Quit => return false,
        }
        true
    }

    /// Apply a fresh terminal geometry and push it to every session
    pub fn resize_to(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        self.registry.resize_all(self.session_rows(), self.cols);
    }

    /// Non-blocking reap of every session, clearing `active` if it died
    pub fn reap(&mut self) {
        for index in self.registry.reap_exited() {
            if self.active == Some(index) {
                self.active = None;
            }
        }
    }

    /// Fall back to the lowest live index; `false` when none remain
    pub fn ensure_active(&mut self) -> bool {
        if self.active.is_none() {
            self.active = self.registry.lowest_index();
        }
        self.active.is_some()
    }

    /// Run ticks until quit or the last session disappears
    pub fn run(&mut self) -> Result<ExitReason> {
        let mut stdout = io::stdout();
        let mut buf = [0u8; IO_CHUNK];

        loop {
            status::render(
                &mut stdout,
                STATUS_LABEL,
                &self.registry.indices(),
                self.active,
                self.rows,
            )
            .context("failed to draw status bar")?;

            let (stdin_ready, ready) = self.wait_for_readiness()?;

            for index in ready {
                self.pump_session(index, &mut buf, &mut stdout)?;
            }

            if stdin_ready {
                match nix::unistd::read(libc::STDIN_FILENO, &mut buf) {
                    Ok(0) => {
                        // Real stdin is gone; nothing can ever reach a
                        // session again, so drain as if quit was typed
                        info!("stdin closed, shutting down");
                        self.drain();
                        return Ok(ExitReason::Quit);
                    }
                    Ok(n) => {
                        if !self.route_stdin(&buf[..n]) {
                            self.drain();
                            return Ok(ExitReason::Quit);
                        }
                    }
                    Err(Errno::EAGAIN | Errno::EINTR) => {}
                    Err(e) => return Err(e).context("failed to read stdin"),
                }
            }

            if signals::take_resize_request() {
                match terminal::size() {
                    Ok((cols, rows)) => self.resize_to(cols, rows),
                    Err(e) => warn!("failed to query terminal size: {e}"),
                }
            }

            if signals::take_child_exit() {
                self.reap();
            }

            if !self.ensure_active() {
                info!("no sessions remain");
                return Ok(ExitReason::NoSessions);
            }
        }
    }

    /// Block on stdin plus every master fd, up to [`TICK_MS`]
    ///
    /// Returns stdin readiness and the session indices with pending
    /// events. `EINTR` — a signal landed mid-wait — is an idle tick; the
    /// flag consumption below picks the work up immediately.
    fn wait_for_readiness(&self) -> Result<(bool, Vec<usize>)> {
        let members: Vec<(usize, RawFd)> = self
            .registry
            .sessions()
            .map(|s| (s.index(), s.process().master().as_raw_fd()))
            .collect();

        // The raw fds are owned by registry slots that are not touched
        // until the poll set is gone again
        let stdin_fd = unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) };
        let mut fds = Vec::with_capacity(members.len() + 1);
        fds.push(PollFd::new(stdin_fd, PollFlags::POLLIN));
        for (_, raw) in &members {
            let fd = unsafe { BorrowedFd::borrow_raw(*raw) };
            fds.push(PollFd::new(fd, PollFlags::POLLIN));
        }

        match poll(&mut fds, PollTimeout::from(TICK_MS)) {
            Ok(0) => Ok((false, Vec::new())),
            Ok(_) => {
                let wanted =
                    PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL;
                let stdin_ready = fds[0]
                    .revents()
                    .is_some_and(|r| r.intersects(PollFlags::POLLIN));
                let ready = members
                    .iter()
                    .zip(fds.iter().skip(1))
                    .filter(|(_, pollfd)| pollfd.revents().is_some_and(|r| r.intersects(wanted)))
                    .map(|((index, _), _)| *index)
                    .collect();
                Ok((stdin_ready, ready))
            }
            Err(Errno::EINTR) => Ok((false, Vec::new())),
            Err(e) => Err(e).context("poll failed"),
        }
    }

    /// Forward one chunk of session output, or free the slot on EOF
    fn pump_session(
        &mut self,
        index: usize,
        buf: &mut [u8],
        stdout: &mut impl Write,
    ) -> Result<()> {
        let Some(session) = self.registry.get(index) else {
            return Ok(());
        };

        match session.process().master().read(buf) {
            Ok(PtyRead::Data(n)) => {
                stdout
                    .write_all(&buf[..n])
                    .and_then(|_| stdout.flush())
                    .context("failed to write session output")?;
            }
            Ok(PtyRead::WouldBlock) => {}
            Ok(PtyRead::Eof) | Err(_) => {
                debug!(index, "session stream ended");
                self.registry.release(index);
                if self.active == Some(index) {
                    self.active = None;
                }
            }
        }
        Ok(())
    }

    /// Feed one stdin chunk through the input router
    ///
    /// Returns `false` once a quit command fires. Pass-through bytes are
    /// batched and always flushed to the session that was active when
    /// they were typed, before any command takes effect.
    fn route_stdin(&mut self, chunk: &[u8]) -> bool {
        let mut pending: Vec<u8> = Vec::with_capacity(chunk.len());
        let mut scratch = [0u8; 8];
        let mut i = 0;

        while i < chunk.len() {
            let byte = chunk[i];
            i += 1;

            if byte != input::ESC {
                pending.push(byte);
                continue;
            }

            let tail: &[u8] = if i < chunk.len() {
                let tail = &chunk[i..i + 1];
                i += 1;
                tail
            } else {
                let n = input::read_escape_tail(libc::STDIN_FILENO, &mut scratch);
                &scratch[..n]
            };

            match input::classify_escape(tail) {
                EscapeOutcome::Run(command) => {
                    self.forward_to_active(&mut pending);
                    if !self.apply(command) {
                        return false;
                    }
                }
                EscapeOutcome::PassThrough => {
                    // Unrecognized or partial sequence: replay verbatim so
                    // arrow and function keys reach the child intact
                    pending.push(input::ESC);
                    pending.extend_from_slice(tail);
                }
            }
        }

        self.forward_to_active(&mut pending);
        true
    }

    /// Write the batched keyboard bytes to the active session, if any
    fn forward_to_active(&mut self, pending: &mut Vec<u8>) {
        if pending.is_empty() {
            return;
        }
        if let Some(session) = self.active.and_then(|idx| self.registry.get(idx)) {
            match session.process().master().write(pending) {
                Ok(n) if n < pending.len() => {
                    debug!("session input buffer full, dropped {} bytes", pending.len() - n);
                }
                Ok(_) => {}
                Err(e) => debug!("failed to forward input: {e}"),
            }
        }
        pending.clear();
    }

    /// Close every session in turn; the Draining half of shutdown
    fn drain(&mut self) {
        for index in self.registry.indices() {
            self.registry.close_session(index);
        }
        self.active = None;
    }
}
