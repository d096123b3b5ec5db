//! Core terminal session components.
//!
//! - **term**: VT escape decoding, emulation onto a display, key encoding
//! - **transform**: EOL handling and text filters between the two ends
//! - **transport**: serial and TCP byte channels
//! - **session**: reader/writer threads tying it all together
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── reader: Transport -> EscapeDecoder -> TerminalEmulator -> Display
//! └── writer: Keyboard -> HotkeyRegistry | EscapeEncoder -> TransformChain -> Transport
//! ```

pub mod session;
pub mod term;
pub mod transform;
pub mod transport;
