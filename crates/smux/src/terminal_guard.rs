//! RAII guard for terminal ownership during raw mode operations

use anyhow::Result;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io;
use tracing::subscriber::NoSubscriber;
use tracing_subscriber::util::SubscriberInitExt;

/// RAII guard that ensures exclusive ownership of the terminal for raw
/// mode operations. Stray log output would corrupt the raw screen, so
/// acquiring the guard suppresses tracing unless a subscriber (the
/// `--log-file` one) is already installed. Dropping the guard restores
/// the terminal.
pub struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen: bool,
    // Marker to ensure this type is !Send and !Sync
    _marker: std::marker::PhantomData<*const ()>,
}

impl TerminalGuard {
    /// Acquire exclusive access to the terminal.
    pub fn acquire() -> Result<Self> {
        // A no-op subscriber keeps tracing away from the terminal; if a
        // file subscriber is already active, this fails and logging stays
        let _ = NoSubscriber::default().try_init();

        Ok(Self {
            raw_mode_enabled: false,
            alternate_screen: false,
            _marker: std::marker::PhantomData,
        })
    }

    /// Enter raw mode on the alternate screen.
    pub fn enter(&mut self) -> Result<()> {
        if !self.raw_mode_enabled {
            terminal::enable_raw_mode()?;
            self.raw_mode_enabled = true;
        }
        if !self.alternate_screen {
            execute!(io::stdout(), EnterAlternateScreen, cursor::MoveTo(0, 0), cursor::Show)?;
            self.alternate_screen = true;
        }
        Ok(())
    }

    /// Hand the terminal back: leave the alternate screen, drop raw mode.
    pub fn restore(&mut self) -> Result<()> {
        if self.alternate_screen {
            execute!(io::stdout(), LeaveAlternateScreen, cursor::Show)?;
            self.alternate_screen = false;
        }
        if self.raw_mode_enabled {
            terminal::disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        Ok(())
    }

    /// Check if raw mode is currently enabled
    pub fn is_raw_mode(&self) -> bool {
        self.raw_mode_enabled
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Always try to restore terminal state
        if self.alternate_screen {
            let _ = execute!(io::stdout(), LeaveAlternateScreen, cursor::Show);
        }
        if self.raw_mode_enabled {
            let _ = terminal::disable_raw_mode();
        }
    }
}
