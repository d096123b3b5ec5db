//! Applies decoded control events to a [`Display`].
//!
//! The emulator keeps no geometry of its own. Every positional operation
//! asks the display for the cursor and viewport first, so the display stays
//! the single source of truth and the emulator can be resumed mid-stream.

use std::sync::Arc;

use thiserror::Error;

use super::codec::{Encoding, TextDecoder};
use super::parser::ControlEvent;
use crate::ui::Display;

/// Tab stops are fixed every 8 columns
const TAB_WIDTH: u16 = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmulatorError {
    #[error("bad erase mode selection: {0}")]
    UnsupportedEraseMode(u16),
}

/// Translates control events into display calls
pub struct TerminalEmulator {
    display: Arc<dyn Display>,
    text: TextDecoder,
}

impl TerminalEmulator {
    pub fn new(display: Arc<dyn Display>) -> Self {
        Self {
            display,
            text: TextDecoder::default(),
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.text.encoding()
    }

    /// Switch the text encoding. A pending partial character is dropped.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        if encoding != self.text.encoding() {
            tracing::debug!("Serial input encoding: {}", encoding);
            self.text = TextDecoder::new(encoding);
        }
    }

    /// Apply one event
    pub fn apply(&mut self, event: ControlEvent) -> Result<(), EmulatorError> {
        match event {
            ControlEvent::PlainText(byte) => self.write(&[byte]),
            ControlEvent::CursorUp(n) => self.cursor_up(n),
            ControlEvent::CursorDown(n) => self.cursor_down(n),
            ControlEvent::CursorForward(n) => self.cursor_forward(n),
            ControlEvent::CursorBackward(n) => self.cursor_backward(n),
            ControlEvent::CursorPosition { col, row } => self.cursor_position(col, row),
            ControlEvent::EraseInLine { mode, selective } => self.erase_in_line(mode, selective)?,
            ControlEvent::EraseInDisplay { mode, selective } => {
                self.erase_in_display(mode, selective)?
            }
            ControlEvent::EraseCharacter(n) => self.erase_character(n),
            ControlEvent::SelectGraphicRendition(codes) => self.select_graphic_rendition(codes),
            ControlEvent::LineFeed | ControlEvent::Index => self.line_feed(),
            ControlEvent::NextLine => {
                self.carriage_return();
                self.line_feed();
            }
            ControlEvent::ReverseIndex => self.cursor_up(1),
            ControlEvent::CarriageReturn => self.carriage_return(),
            ControlEvent::Backspace => self.backspace(),
            ControlEvent::Bell => self.display.write_bytes(b"\x07"),
            ControlEvent::HorizontalTab => self.horizontal_tab(),
            other => {
                // No display primitive for these (line/char insertion, modes, ...)
                tracing::trace!("Ignored control event: {:?}", other);
            }
        }
        Ok(())
    }

    /// Feed text bytes through the text decoder to the display
    pub fn write(&mut self, bytes: &[u8]) {
        let text = self.text.decode(bytes);
        if !text.is_empty() {
            self.display.write(&text);
        }
    }

    pub fn select_graphic_rendition(&self, mut codes: Vec<u16>) {
        if codes.is_empty() {
            codes.push(0);
        }
        self.display.set_ansi_color(&codes);
    }

    pub fn carriage_return(&self) {
        let (_, y, _, _) = self.display.get_position_and_size();
        self.display.set_cursor_position(0, y);
    }

    /// Move down one line, scrolling when already on the last row
    pub fn line_feed(&self) {
        let (x, y, _, height) = self.display.get_position_and_size();
        if y.saturating_add(1) < height {
            self.display.set_cursor_position(x, y + 1);
        } else {
            self.display.write_bytes(b"\n");
        }
    }

    /// Erase the cell left of the cursor and step onto it
    pub fn backspace(&self) {
        let (x, y, _, _) = self.display.get_position_and_size();
        if x > 0 {
            self.display.erase(x - 1, y, 1, 1, false);
        }
        self.display.set_cursor_position(x.saturating_sub(1), y);
    }

    pub fn horizontal_tab(&self) {
        let (x, y, width, _) = self.display.get_position_and_size();
        let next = (x / TAB_WIDTH + 1).saturating_mul(TAB_WIDTH);
        self.display.set_cursor_position(next.min(width.saturating_sub(1)), y);
    }

    pub fn cursor_up(&self, count: u16) {
        let count = count.max(1);
        let (x, y, width, height) = self.display.get_position_and_size();
        self.move_clamped(x, y.saturating_sub(count), width, height);
    }

    pub fn cursor_down(&self, count: u16) {
        let count = count.max(1);
        let (x, y, width, height) = self.display.get_position_and_size();
        self.move_clamped(x, y.saturating_add(count), width, height);
    }

    pub fn cursor_forward(&self, count: u16) {
        let count = count.max(1);
        let (x, y, width, height) = self.display.get_position_and_size();
        self.move_clamped(x.saturating_add(count), y, width, height);
    }

    pub fn cursor_backward(&self, count: u16) {
        let count = count.max(1);
        let (x, y, width, height) = self.display.get_position_and_size();
        self.move_clamped(x.saturating_sub(count), y, width, height);
    }

    /// Absolute move, `col`/`row` are 1-based as on the wire
    pub fn cursor_position(&self, col: u16, row: u16) {
        let (_, _, width, height) = self.display.get_position_and_size();
        self.move_clamped(col.saturating_sub(1), row.saturating_sub(1), width, height);
    }

    pub fn erase_in_line(&self, mode: u16, selective: bool) -> Result<(), EmulatorError> {
        let (x, y, width, _) = self.display.get_position_and_size();
        match mode {
            0 => self.display.erase(x, y, width.saturating_sub(x), 1, selective),
            1 => self.display.erase(0, y, x, 1, selective),
            2 => self.display.erase(0, y, width, 1, selective),
            _ => return Err(EmulatorError::UnsupportedEraseMode(mode)),
        }
        self.display.set_cursor_position(x, y);
        Ok(())
    }

    pub fn erase_in_display(&self, mode: u16, selective: bool) -> Result<(), EmulatorError> {
        let (x, y, width, height) = self.display.get_position_and_size();
        match mode {
            0 => {
                self.display.erase(x, y, width.saturating_sub(x), 1, selective);
                let below = height.saturating_sub(y.saturating_add(1));
                if below > 0 {
                    self.display.erase(0, y + 1, width, below, selective);
                }
            }
            1 => {
                if y > 0 {
                    self.display.erase(0, 0, width, y, selective);
                }
                self.display.erase(0, y, x, 1, selective);
            }
            2 => self.display.erase(0, 0, width, height, selective),
            _ => return Err(EmulatorError::UnsupportedEraseMode(mode)),
        }
        self.display.set_cursor_position(x, y);
        Ok(())
    }

    pub fn erase_character(&self, count: u16) {
        let count = count.max(1);
        let (x, y, width, _) = self.display.get_position_and_size();
        let count = count.min(width.saturating_sub(x));
        if count > 0 {
            self.display.erase(x, y, count, 1, false);
        }
        self.display.set_cursor_position(x, y);
    }

    fn move_clamped(&self, x: u16, y: u16, width: u16, height: u16) {
        let x = x.min(width.saturating_sub(1));
        let y = y.min(height.saturating_sub(1));
        self.display.set_cursor_position(x, y);
    }
}
