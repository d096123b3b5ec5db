//! Terminal protocol engine: VT decoding, emulation and key encoding.

pub mod codec;
pub mod emulator;
pub mod encoder;
pub mod parser;

pub use codec::{Encoding, TextDecoder, Utf8Decoder};
pub use emulator::{EmulatorError, TerminalEmulator};
pub use encoder::{EscapeEncoder, KeyLookupError, Modifiers};
pub use parser::{ControlEvent, DecoderState, EscapeDecoder};
