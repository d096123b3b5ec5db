//! serterm - serial terminal with VT220 escape sequence support
//!
//! Connects the console to a serial port (or a raw TCP socket) and renders
//! the remote side's escape sequences onto the local display.
//!
//! - **core**: escape decoding/encoding, transforms, transports, session threads
//! - **ui**: display and keyboard capabilities, console backend, SGR attributes
//! - **features**: exit key, menu hotkey, startup banner and modem line forcing
//! - **config**: configuration file and command line

pub mod config;
pub mod core;
pub mod features;
pub mod ui;

#[cfg(test)]
mod testing;
