//! Low-level PTY allocation and child process management
//!
//! A [`Pty`] is a freshly opened master/slave pair. Spawning a command
//! consumes it and yields a [`PtyProcess`]: the child runs as a session
//! leader with the slave as its controlling terminal, while the parent
//! keeps the non-blocking master for all further I/O.

use crate::PtyError;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::pty::{openpty, OpenptyResult, Winsize};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, setsid, ForkResult};
use std::io;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::Command;

/// A pseudo-terminal pair
pub struct Pty {
    /// Master file descriptor
    master: PtyMaster,

    /// Slave file descriptor
    slave: RawFd,
}

/// Master side of a PTY
pub struct PtyMaster {
    fd: RawFd,
}

/// Outcome of a read from the non-blocking master side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtyRead {
    /// This many bytes were read into the buffer
    Data(usize),
    /// End of stream: every slave descriptor is gone
    Eof,
    /// Nothing available right now
    WouldBlock,
}

fn winsize(rows: u16, cols: u16) -> Winsize {
    Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    }
}

impl Pty {
    /// Allocate a new PTY pair with the given initial window size
    pub fn open(rows: u16, cols: u16) -> Result<Self, PtyError> {
        let size = winsize(rows, cols);

        let OpenptyResult { master, slave } = openpty(Some(&size), None)
            .map_err(|e| PtyError::AllocationFailed(format!("openpty failed: {e}")))?;

        let master_fd = master.into_raw_fd();
        let slave_fd = slave.into_raw_fd();

        // Set non-blocking mode on master
        fcntl(master_fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK))
            .map_err(|e| PtyError::AllocationFailed(format!("Failed to set non-blocking: {e}")))?;

        // The master must not leak into children spawned for other sessions
        fcntl(master_fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
            .map_err(|e| PtyError::AllocationFailed(format!("Failed to set close-on-exec: {e}")))?;

        Ok(Self {
            master: PtyMaster { fd: master_fd },
            slave: slave_fd,
        })
    }

    /// Spawn a process in the PTY
    ///
    /// The child becomes a session leader with the slave as controlling
    /// terminal and fds 0/1/2 redirected onto it. If the exec itself
    /// fails the child exits with a nonzero status; the parent observes
    /// that only as an ordinary session exit.
    pub fn spawn(mut self, mut command: Command) -> Result<PtyProcess, PtyError> {
        let slave_fd = self.slave;
        let master_fd = self.master.fd;

        // Mark FDs as invalid so Drop doesn't close them
        self.slave = -1;
        self.master.fd = -1;

        let master = PtyMaster { fd: master_fd };

        match unsafe { fork() }.map_err(|e| PtyError::SpawnFailed(format!("Fork failed: {e}")))? {
            ForkResult::Parent { child } => {
                // In parent process
                // Close slave FD as we don't need it
                unsafe {
                    libc::close(slave_fd);
                }

                Ok(PtyProcess {
                    master,
                    child_pid: child,
                })
            }
            ForkResult::Child => {
                // In child process
                // Close master FD
                unsafe {
                    libc::close(master.fd);
                }

                // Create new session
                if setsid().is_err() {
                    std::process::exit(1);
                }

                // Set up slave as stdin/stdout/stderr
                unsafe {
                    libc::dup2(slave_fd, 0);
                    libc::dup2(slave_fd, 1);
                    libc::dup2(slave_fd, 2);
                    libc::close(slave_fd);
                }

                // Set controlling terminal
                unsafe {
                    if libc::ioctl(0, libc::TIOCSCTTY as libc::c_ulong, 0) < 0 {
                        std::process::exit(1);
                    }
                }

                // Execute the command
                let err = command.exec();
                eprintln!("Failed to execute command: {err}");
                std::process::exit(1);
            }
        }
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        if self.slave != -1 {
            unsafe {
                libc::close(self.slave);
            }
        }
        // Master will be dropped by its own Drop impl
    }
}

impl PtyMaster {
    /// Read available bytes from the master
    ///
    /// The master is non-blocking; an empty pipe is [`PtyRead::WouldBlock`],
    /// not an error. `EIO` is reported as [`PtyRead::Eof`]: Linux returns it
    /// from a master read once the slave side has been torn down.
    pub fn read(&self, buf: &mut [u8]) -> Result<PtyRead, PtyError> {
        match nix::unistd::read(self.fd, buf) {
            Ok(0) => Ok(PtyRead::Eof),
            Ok(n) => Ok(PtyRead::Data(n)),
            Err(Errno::EAGAIN) => Ok(PtyRead::WouldBlock),
            Err(Errno::EIO) => Ok(PtyRead::Eof),
            Err(e) => Err(PtyError::IoError(io::Error::from_raw_os_error(e as i32))),
        }
    }

    /// Write bytes to the master (keyboard input -> child)
    ///
    /// Returns the number of bytes accepted. A full kernel buffer counts
    /// as zero bytes written rather than an error.
    pub fn write(&self, buf: &[u8]) -> Result<usize, PtyError> {
        match nix::unistd::write(self.as_fd(), buf) {
            Ok(n) => Ok(n),
            Err(Errno::EAGAIN) => Ok(0),
            Err(e) => Err(PtyError::IoError(io::Error::from_raw_os_error(e as i32))),
        }
    }
}

impl AsRawFd for PtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl AsFd for PtyMaster {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // The fd stays open for as long as the PtyMaster owning it lives
        unsafe { BorrowedFd::borrow_raw(self.fd) }
    }
}

impl Drop for PtyMaster {
    fn drop(&mut self) {
        if self.fd != -1 {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

/// A process running in a PTY
pub struct PtyProcess {
    master: PtyMaster,
    child_pid: nix::unistd::Pid,
}

impl PtyProcess {
    /// Get the process ID
    pub fn pid(&self) -> nix::unistd::Pid {
        self.child_pid
    }

    /// Get the master PTY
    pub fn master(&self) -> &PtyMaster {
        &self.master
    }

    /// Resize the PTY
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), PtyError> {
        let size = winsize(rows, cols);

        unsafe {
            let ret = libc::ioctl(self.master.fd, libc::TIOCSWINSZ, &size as *const _);
            if ret < 0 {
                return Err(PtyError::IoError(io::Error::last_os_error()));
            }
        }

        Ok(())
    }

    /// Query the window size currently applied to the PTY
    pub fn window_size(&self) -> Result<(u16, u16), PtyError> {
        let mut size = winsize(0, 0);

        unsafe {
            let ret = libc::ioctl(self.master.fd, libc::TIOCGWINSZ, &mut size as *mut _);
            if ret < 0 {
                return Err(PtyError::IoError(io::Error::last_os_error()));
            }
        }

        Ok((size.ws_row, size.ws_col))
    }

    /// Wait for the process to exit
    pub fn wait(&self) -> Result<i32, PtyError> {
        match waitpid(self.child_pid, None)
            .map_err(|e| PtyError::IoError(io::Error::from_raw_os_error(e as i32)))?
        {
            WaitStatus::Exited(_, code) => Ok(code),
            WaitStatus::Signaled(_, signal, _) => Ok(128 + signal as i32),
            _ => Ok(-1),
        }
    }

    /// Reap the process without blocking
    ///
    /// Returns `None` while the child is still running. An already-reaped
    /// child (`ECHILD`) reports exit status `-1`.
    pub fn try_wait(&self) -> Option<i32> {
        match waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => Some(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => Some(128 + signal as i32),
            Ok(WaitStatus::StillAlive) => None,
            Ok(_) => None,
            Err(Errno::ECHILD) => Some(-1),
            Err(_) => None,
        }
    }

    /// Kill the process
    pub fn kill(&self) -> Result<(), PtyError> {
        nix::sys::signal::kill(self.child_pid, nix::sys::signal::Signal::SIGTERM)
            .map_err(|e| PtyError::IoError(io::Error::from_raw_os_error(e as i32)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_allocation() {
        let pty = Pty::open(24, 80).unwrap();
        assert!(pty.master.as_raw_fd() > 0);
        assert!(pty.slave > 0);
    }

    #[test]
    fn test_pty_initial_window_size() {
        let pty = Pty::open(30, 100).unwrap();
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let process = pty.spawn(cmd).unwrap();
        assert_eq!(process.window_size().unwrap(), (30, 100));
        process.kill().unwrap();
        let _ = process.wait();
    }

    #[test]
    fn test_pty_spawn_true() {
        let pty = Pty::open(24, 80).unwrap();
        let process = pty.spawn(Command::new("true")).unwrap();
        let exit_code = process.wait().unwrap();
        assert_eq!(exit_code, 0);
    }
}
