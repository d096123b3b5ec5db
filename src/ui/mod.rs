//! User interface capabilities and backends.
//!
//! The session core talks to the screen and the keyboard only through the
//! [`Display`] and [`Keyboard`] traits defined here. Backends:
//!
//! - **console**: crossterm-backed interactive terminal (raw mode)
//! - **keymapper**: crossterm key events to key names
//! - **style**: SGR attribute state shared by backends
//!
//! # Key names
//!
//! Keys travel through the session as plain strings: a single printable
//! character (`"a"`, `"\n"`) or a name such as `"F5"`, `"Ctrl+A"`, `"Up"`
//! or `"Shift+Page Up"`.

use std::io;

pub mod console;
pub mod keymapper;
pub mod style;

pub use console::{ConsoleDisplay, ConsoleKeyboard};
pub use keymapper::KeyMapper;

/// Abstract display surface.
///
/// All coordinates are 0-based and relative to the viewport. Implementations
/// are shared between the reader and writer threads and must serialize their
/// own mutations.
pub trait Display: Send + Sync {
    /// Write text at the cursor, advancing it
    fn write(&self, text: &str);

    /// Write raw bytes (control characters such as BEL or LF)
    fn write_bytes(&self, bytes: &[u8]);

    /// Current cursor position and viewport size: `(x, y, width, height)`
    fn get_position_and_size(&self) -> (u16, u16, u16, u16);

    fn set_cursor_position(&self, x: u16, y: u16);

    /// Erase a rectangular area. `selective` only erases characters and keeps
    /// attribute data where the backend distinguishes the two.
    fn erase(&self, x: u16, y: u16, width: u16, height: u16, selective: bool);

    /// Apply a list of SGR codes to subsequent writes
    fn set_ansi_color(&self, codes: &[u16]);
}

/// Keyboard input.
pub trait Keyboard: Send + Sync {
    /// Block until a key is pressed.
    ///
    /// Returns `Ok(None)` when the read was cancelled through
    /// [`Keyboard::cancel_pending_read`].
    fn get_key(&self) -> io::Result<Option<String>>;

    /// Best-effort wake-up of a blocked [`Keyboard::get_key`]. Idempotent.
    fn cancel_pending_read(&self);
}
