//! One-row status bar
//!
//! Drawn into the bottom terminal row each tick: save cursor, move,
//! clear the line, write the session indicator, restore cursor. The
//! content area above and the cursor the active child left behind are
//! never disturbed.

use crossterm::{
    cursor,
    queue,
    style::{Attribute, SetAttribute},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};

/// Render the session indicator onto the status row (`rows` is the full
/// terminal height; the bar owns the last row).
pub fn render(
    out: &mut impl Write,
    label: &str,
    indices: &[usize],
    active: Option<usize>,
    rows: u16,
) -> io::Result<()> {
    queue!(
        out,
        cursor::SavePosition,
        cursor::MoveTo(0, rows.saturating_sub(1)),
        Clear(ClearType::CurrentLine),
    )?;

    write!(out, " {label} ")?;
    for index in indices {
        if active == Some(*index) {
            queue!(out, SetAttribute(Attribute::Bold))?;
            write!(out, "[{index}]*")?;
            queue!(out, SetAttribute(Attribute::Reset))?;
        } else {
            write!(out, "[{index}]")?;
        }
        write!(out, " ")?;
    }

    queue!(out, cursor::RestorePosition)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_session_is_marked() {
        let mut out: Vec<u8> = Vec::new();
        render(&mut out, "smux", &[1, 2, 3], Some(2), 24).unwrap();

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("smux"));
        assert!(text.contains("[1]"));
        assert!(text.contains("[2]*"));
        assert!(text.contains("[3]"));
        assert!(!text.contains("[1]*"));
    }

    #[test]
    fn test_cursor_is_saved_and_restored() {
        let mut out: Vec<u8> = Vec::new();
        render(&mut out, "smux", &[1], Some(1), 24).unwrap();

        // DECSC ... DECRC bracket the whole bar
        let text = String::from_utf8_lossy(&out);
        assert!(text.starts_with('\u{1b}'));
        assert!(out.windows(2).any(|w| w == b"\x1b7"));
        assert!(out.windows(2).any(|w| w == b"\x1b8"));
    }

    #[test]
    fn test_empty_registry_renders_label_only() {
        let mut out: Vec<u8> = Vec::new();
        render(&mut out, "smux", &[], None, 24).unwrap();

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("smux"));
        // No session brackets; '[' alone would also match escape sequences
        assert!(!text.contains(']'));
    }
}
