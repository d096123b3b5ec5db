//! Key mapping for console input
//!
//! Converts crossterm key events to the key names the session works with.
//! Printable keys become the character itself, Enter becomes `"\n"` so the
//! EOL transform can apply, everything else a name the encoder knows.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::core::term::Modifiers;

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Key mapper for converting key events to key names
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to a key name, `None` for keys with no name
    pub fn key_name(event: &KeyEvent) -> Option<String> {
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            KeyCode::Char(ch) => Some(Self::char_name(ch, mods)),
            KeyCode::Null => Some("Ctrl+Space".to_string()),

            KeyCode::Enter => Some("\n".to_string()),
            KeyCode::Backspace => Some("\x7f".to_string()),
            KeyCode::Tab if mods.contains(Modifiers::SHIFT) => Some("Shift+Tab".to_string()),
            KeyCode::Tab => Some("\t".to_string()),
            KeyCode::BackTab => Some("Shift+Tab".to_string()),
            KeyCode::Esc => Some("Esc".to_string()),

            KeyCode::Up => Some(Self::named("Up", mods)),
            KeyCode::Down => Some(Self::named("Down", mods)),
            KeyCode::Right => Some(Self::named("Right", mods)),
            KeyCode::Left => Some(Self::named("Left", mods)),
            KeyCode::Home => Some(Self::named("Home", mods)),
            KeyCode::End => Some(Self::named("End", mods)),
            KeyCode::PageUp => Some(Self::named("Page Up", mods)),
            KeyCode::PageDown => Some(Self::named("Page Down", mods)),
            KeyCode::Insert => Some(Self::named("Insert", mods)),
            KeyCode::Delete => Some(Self::named("Delete", mods)),
            KeyCode::F(n) => Some(Self::named(&format!("F{}", n), mods)),

            _ => None,
        }
    }

    /// `Ctrl+` / `Alt+` / `Shift+` prefixed name
    fn named(base: &str, mods: Modifiers) -> String {
        let mut name = String::new();
        if mods.contains(Modifiers::CTRL) {
            name.push_str("Ctrl+");
        }
        if mods.contains(Modifiers::ALT) {
            name.push_str("Alt+");
        }
        if mods.contains(Modifiers::SHIFT) {
            name.push_str("Shift+");
        }
        name.push_str(base);
        name
    }

    fn char_name(ch: char, mods: Modifiers) -> String {
        let alt = if mods.contains(Modifiers::ALT) { "Alt+" } else { "" };

        if mods.contains(Modifiers::CTRL) {
            // Terminals report Ctrl+\ ] ^ _ as Ctrl+4..7
            let base = match ch {
                'a'..='z' | 'A'..='Z' => Some(ch.to_ascii_uppercase().to_string()),
                ' ' | '@' | '2' => Some("Space".to_string()),
                '[' | '\\' | ']' | '^' | '_' => Some(ch.to_string()),
                '4' => Some("\\".to_string()),
                '5' => Some("]".to_string()),
                '6' => Some("^".to_string()),
                '7' => Some("_".to_string()),
                _ => None,
            };
            if let Some(base) = base {
                return format!("Ctrl+{}{}", alt, base);
            }
        }

        format!("{}{}", alt, ch)
    }
}
