//! smux: a terminal session multiplexer
//!
//! Spawns child programs on their own ptys and multiplexes one real
//! terminal's keyboard and display between them. Child output is a
//! transparent byte pipe; the only thing smux draws itself is a one-row
//! status bar, and the only bytes it swallows are its own `ESC`-prefixed
//! commands.
//!
//! # Architecture
//!
//! - [`mux`] — the single-threaded event loop over a poll readiness set.
//! - [`input`] — classification of keyboard bytes into commands vs
//!   pass-through.
//! - [`status`] — the status bar renderer.
//! - [`signals`] — SIGWINCH/SIGCHLD flags, consumed once per loop tick.
//! - [`terminal_guard`] — RAII raw-mode/alternate-screen ownership.
//! - [`app`] — CLI, logging, target resolution, startup and teardown.

pub mod app;
pub mod input;
pub mod mux;
pub mod signals;
pub mod status;
pub mod terminal_guard;
