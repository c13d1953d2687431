//! Async-signal-safe resize and child-exit notification
//!
//! Handlers store into process-global flags and nothing else; the event
//! loop consumes each flag at most once per tick and does the real work
//! (ioctl, reaping, table mutation) there.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};

static RESIZE_REQUESTED: AtomicBool = AtomicBool::new(false);
static CHILD_EXITED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigwinch(_: libc::c_int) {
    RESIZE_REQUESTED.store(true, Ordering::Relaxed);
}

extern "C" fn on_sigchld(_: libc::c_int) {
    CHILD_EXITED.store(true, Ordering::Relaxed);
}

/// Install the SIGWINCH and SIGCHLD handlers
pub fn install() -> nix::Result<()> {
    let winch = SigAction::new(
        SigHandler::Handler(on_sigwinch),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe { sigaction(Signal::SIGWINCH, &winch)? };

    let chld = SigAction::new(
        SigHandler::Handler(on_sigchld),
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );
    unsafe { sigaction(Signal::SIGCHLD, &chld)? };

    Ok(())
}

/// Consume the pending resize request, if any
pub fn take_resize_request() -> bool {
    RESIZE_REQUESTED.swap(false, Ordering::Relaxed)
}

/// Consume the pending child-exit notification, if any
pub fn take_child_exit() -> bool {
    CHILD_EXITED.swap(false, Ordering::Relaxed)
}
