//! Key name to VT byte sequence encoding
//!
//! Names follow the keyboard backends: `"F5"`, `"Up"`, `"Page Down"`,
//! `"Ctrl+A"`, `"Shift+Up"`, `"Alt+x"`. Plain keys use VT220 sequences,
//! modified cursor and editing keys use the xterm `CSI 1 ; m X` /
//! `CSI n ; m ~` forms.

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl Modifiers {
    /// Split leading `Ctrl+` / `Shift+` / `Alt+` prefixes off a key name
    pub fn split(name: &str) -> (Modifiers, &str) {
        let mut mods = Modifiers::empty();
        let mut rest = name;
        loop {
            let (flag, tail) = if let Some(tail) = rest.strip_prefix("Ctrl+") {
                (Modifiers::CTRL, tail)
            } else if let Some(tail) = rest.strip_prefix("Shift+") {
                (Modifiers::SHIFT, tail)
            } else if let Some(tail) = rest.strip_prefix("Alt+") {
                (Modifiers::ALT, tail)
            } else {
                break;
            };
            // A bare "Ctrl+" has no key left to modify
            if tail.is_empty() {
                break;
            }
            mods |= flag;
            rest = tail;
        }
        (mods, rest)
    }

    /// xterm modifier parameter
    fn code(self) -> u8 {
        1 + if self.contains(Modifiers::SHIFT) { 1 } else { 0 }
            + if self.contains(Modifiers::ALT) { 2 } else { 0 }
            + if self.contains(Modifiers::CTRL) { 4 } else { 0 }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown key name: {0:?}")]
pub struct KeyLookupError(pub String);

/// How a named key is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sequence {
    /// Literal bytes, no modified form
    Fixed(&'static [u8]),
    /// `ESC [ c`
    Letter(u8),
    /// `ESC [ n ~`
    Tilde(u8),
    /// `ESC O c`
    Ss3(u8),
}

impl Sequence {
    fn plain(self) -> Vec<u8> {
        match self {
            Sequence::Fixed(bytes) => bytes.to_vec(),
            Sequence::Letter(c) => vec![0x1B, b'[', c],
            Sequence::Tilde(n) => format!("\x1b[{}~", n).into_bytes(),
            Sequence::Ss3(c) => vec![0x1B, b'O', c],
        }
    }

    fn modified(self, mods: Modifiers) -> Option<Vec<u8>> {
        let code = mods.code();
        match self {
            Sequence::Letter(c) | Sequence::Ss3(c) => {
                Some(format!("\x1b[1;{}{}", code, c as char).into_bytes())
            }
            Sequence::Tilde(n) => Some(format!("\x1b[{};{}~", n, code).into_bytes()),
            Sequence::Fixed(_) => None,
        }
    }
}

fn lookup(name: &str) -> Option<Sequence> {
    use Sequence::*;

    let seq = match name {
        "Ctrl+Space" | "Ctrl+@" => Fixed(b"\x00"),
        "Ctrl+A" => Fixed(b"\x01"),
        "Ctrl+B" => Fixed(b"\x02"),
        "Ctrl+C" => Fixed(b"\x03"),
        "Ctrl+D" => Fixed(b"\x04"),
        "Ctrl+E" => Fixed(b"\x05"),
        "Ctrl+F" => Fixed(b"\x06"),
        "Ctrl+G" => Fixed(b"\x07"),
        "Ctrl+H" => Fixed(b"\x08"),
        "Ctrl+I" | "Tab" => Fixed(b"\x09"),
        "Ctrl+J" => Fixed(b"\x0a"),
        "Ctrl+K" => Fixed(b"\x0b"),
        "Ctrl+L" => Fixed(b"\x0c"),
        "Ctrl+M" | "Enter" => Fixed(b"\x0d"),
        "Ctrl+N" => Fixed(b"\x0e"),
        "Ctrl+O" => Fixed(b"\x0f"),
        "Ctrl+P" => Fixed(b"\x10"),
        "Ctrl+Q" => Fixed(b"\x11"),
        "Ctrl+R" => Fixed(b"\x12"),
        "Ctrl+S" => Fixed(b"\x13"),
        "Ctrl+T" => Fixed(b"\x14"),
        "Ctrl+U" => Fixed(b"\x15"),
        "Ctrl+V" => Fixed(b"\x16"),
        "Ctrl+W" => Fixed(b"\x17"),
        "Ctrl+X" => Fixed(b"\x18"),
        "Ctrl+Y" => Fixed(b"\x19"),
        "Ctrl+Z" => Fixed(b"\x1a"),
        "Ctrl+[" | "Esc" => Fixed(b"\x1b"),
        "Ctrl+\\" => Fixed(b"\x1c"),
        "Ctrl+]" => Fixed(b"\x1d"),
        "Ctrl+^" => Fixed(b"\x1e"),
        "Ctrl+_" => Fixed(b"\x1f"),
        "Backspace" => Fixed(b"\x08"),
        "Remove" => Fixed(b"\x7f"),
        "Shift+Tab" => Fixed(b"\x1b[Z"),

        "PF1" => Ss3(b'P'),
        "PF2" => Ss3(b'Q'),
        "PF3" => Ss3(b'R'),
        "PF4" => Ss3(b'S'),

        "F1" => Tilde(11),
        "F2" => Tilde(12),
        "F3" => Tilde(13),
        "F4" => Tilde(14),
        "F5" => Tilde(15),
        "F6" => Tilde(17),
        "F7" => Tilde(18),
        "F8" => Tilde(19),
        "F9" => Tilde(20),
        "F10" => Tilde(21),
        "F11" => Tilde(23),
        "F12" => Tilde(24),
        "F13" => Tilde(25),
        "F14" => Tilde(26),
        "F15" => Tilde(28),
        "F16" => Tilde(29),
        "F17" => Tilde(31),
        "F18" => Tilde(32),
        "F19" => Tilde(33),
        "F20" => Tilde(34),

        "Up" => Letter(b'A'),
        "Down" => Letter(b'B'),
        "Right" => Letter(b'C'),
        "Left" => Letter(b'D'),
        "Home" => Letter(b'H'),
        "End" => Letter(b'F'),
        "Find" => Tilde(1),
        "Insert" => Tilde(2),
        "Delete" => Tilde(3),
        "Select" => Tilde(4),
        "Page Up" => Tilde(5),
        "Page Down" => Tilde(6),

        "Num Lock" => Fixed(b"\x1bOP"),
        "KP_Divide" => Fixed(b"\x1bOQ"),
        "KP_Multiply" => Fixed(b"\x1bOR"),
        "KP_Minus" => Fixed(b"\x1bOS"),
        "Caps Lock" => Fixed(b"\x1bOm"),
        "KP_Plus" => Fixed(b"\x1bOl"),
        "KP_Dot" => Fixed(b"\x1bOn"),
        "KP_Enter" => Fixed(b"\x1bOM"),
        "KP_0" => Fixed(b"\x1bOp"),
        "KP_1" => Fixed(b"\x1bOq"),
        "KP_2" => Fixed(b"\x1bOr"),
        "KP_3" => Fixed(b"\x1bOs"),
        "KP_4" => Fixed(b"\x1bOt"),
        "KP_5" => Fixed(b"\x1bOu"),
        "KP_6" => Fixed(b"\x1bOv"),
        "KP_7" => Fixed(b"\x1bOw"),
        "KP_8" => Fixed(b"\x1bOx"),
        "KP_9" => Fixed(b"\x1bOy"),
        _ => return None,
    };
    Some(seq)
}

/// Translates key names into the bytes a VT220 keyboard would send
pub struct EscapeEncoder;

impl EscapeEncoder {
    pub fn translate(key_name: &str) -> Result<Vec<u8>, KeyLookupError> {
        if let Some(seq) = lookup(key_name) {
            return Ok(seq.plain());
        }

        let (mods, base) = Modifiers::split(key_name);
        if mods.is_empty() {
            return Err(KeyLookupError(key_name.to_string()));
        }

        if let Some(seq) = lookup(base) {
            if let Some(bytes) = seq.modified(mods) {
                return Ok(bytes);
            }
        }

        // Alt (meta) prefixes whatever the rest of the name sends with ESC
        if mods.contains(Modifiers::ALT) {
            let prefix = key_name[..key_name.len() - base.len()].replace("Alt+", "");
            let inner = format!("{}{}", prefix, base);
            let mut bytes = if inner.chars().count() == 1 {
                inner.into_bytes()
            } else {
                Self::translate(&inner)?
            };
            bytes.insert(0, 0x1B);
            return Ok(bytes);
        }

        Err(KeyLookupError(key_name.to_string()))
    }
}
