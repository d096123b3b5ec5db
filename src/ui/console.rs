//! Console backend using crossterm
//!
//! Output goes straight to stdout. The cursor position is tracked locally
//! instead of being queried from the terminal: a position query has to read
//! the reply from stdin, which the keyboard thread is blocked on.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crossterm::{
    cursor::MoveTo,
    event::{self, Event, KeyEventKind},
    queue,
    style::{Attribute, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal,
};
use unicode_width::UnicodeWidthChar;

use super::keymapper::KeyMapper;
use super::style::{AttrFlags, CellAttrs};
use super::{Display, Keyboard};

/// Fallback when the console size cannot be read
const DEFAULT_SIZE: (u16, u16) = (80, 24);

/// Puts the console into raw mode for its lifetime
pub struct RawModeGuard {
    active: bool,
}

impl RawModeGuard {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { active: true })
    }

    pub fn release(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let mut stdout = io::stdout();
        let _ = queue!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = stdout.flush();
        terminal::disable_raw_mode()
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

struct Shadow {
    col: u16,
    row: u16,
    attrs: CellAttrs,
}

impl Shadow {
    /// Advance the tracked cursor over `text` as the terminal would
    fn advance(&mut self, text: &str, (width, height): (u16, u16)) {
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\r' => self.col = 0,
                '\n' => self.row = (self.row + 1).min(height.saturating_sub(1)),
                '\x08' => self.col = self.col.saturating_sub(1),
                '\t' => self.col = ((self.col / 8 + 1) * 8).min(width.saturating_sub(1)),
                '\x1b' => {
                    // Skip CSI sequences written by filters (colors)
                    if chars.peek() == Some(&'[') {
                        chars.next();
                        for c in chars.by_ref() {
                            if ('\x40'..='\x7e').contains(&c) {
                                break;
                            }
                        }
                    }
                }
                c if c.is_control() => {}
                c => {
                    let w = c.width().unwrap_or(0) as u16;
                    if self.col + w > width {
                        self.col = 0;
                        self.row = (self.row + 1).min(height.saturating_sub(1));
                    }
                    self.col += w;
                }
            }
        }
    }
}

/// Interactive display on the process's console
pub struct ConsoleDisplay {
    shadow: Mutex<Shadow>,
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleDisplay {
    /// Must be created while no other thread reads stdin
    pub fn new() -> Self {
        let (col, row) = crossterm::cursor::position().unwrap_or((0, 0));
        Self {
            shadow: Mutex::new(Shadow {
                col,
                row,
                attrs: CellAttrs::default(),
            }),
        }
    }

    fn size() -> (u16, u16) {
        terminal::size().unwrap_or(DEFAULT_SIZE)
    }

    fn with_shadow<R>(&self, f: impl FnOnce(&mut Shadow, &mut io::Stdout) -> io::Result<R>) -> Option<R> {
        let mut shadow = self.shadow.lock().unwrap_or_else(|e| e.into_inner());
        let mut stdout = io::stdout();
        match f(&mut shadow, &mut stdout).and_then(|r| stdout.flush().map(|_| r)) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::debug!("Console output failed: {}", e);
                None
            }
        }
    }
}

/// Reset, then apply style flags and colors
fn apply_attrs<W: Write>(out: &mut W, attrs: &CellAttrs) -> io::Result<()> {
    queue!(out, SetAttribute(Attribute::Reset))?;

    let styles = [
        (AttrFlags::BOLD, Attribute::Bold),
        (AttrFlags::DIM, Attribute::Dim),
        (AttrFlags::ITALIC, Attribute::Italic),
        (AttrFlags::UNDERLINE, Attribute::Underlined),
        (AttrFlags::BLINK, Attribute::SlowBlink),
        (AttrFlags::INVERSE, Attribute::Reverse),
        (AttrFlags::HIDDEN, Attribute::Hidden),
        (AttrFlags::STRIKETHROUGH, Attribute::CrossedOut),
    ];
    for (flag, attribute) in styles {
        if attrs.flags.contains(flag) {
            queue!(out, SetAttribute(attribute))?;
        }
    }

    let fg = attrs.fg.to_crossterm();
    if fg != crossterm::style::Color::Reset {
        queue!(out, SetForegroundColor(fg))?;
    }
    let bg = attrs.bg.to_crossterm();
    if bg != crossterm::style::Color::Reset {
        queue!(out, SetBackgroundColor(bg))?;
    }
    Ok(())
}

impl Display for ConsoleDisplay {
    fn write(&self, text: &str) {
        self.with_shadow(|shadow, out| {
            shadow.advance(text, Self::size());
            queue!(out, Print(text))
        });
    }

    fn write_bytes(&self, bytes: &[u8]) {
        self.with_shadow(|shadow, out| {
            shadow.advance(&String::from_utf8_lossy(bytes), Self::size());
            out.write_all(bytes)
        });
    }

    fn get_position_and_size(&self) -> (u16, u16, u16, u16) {
        let (width, height) = Self::size();
        let shadow = self.shadow.lock().unwrap_or_else(|e| e.into_inner());
        (
            shadow.col.min(width.saturating_sub(1)),
            shadow.row.min(height.saturating_sub(1)),
            width,
            height,
        )
    }

    fn set_cursor_position(&self, x: u16, y: u16) {
        self.with_shadow(|shadow, out| {
            shadow.col = x;
            shadow.row = y;
            queue!(out, MoveTo(x, y))
        });
    }

    fn erase(&self, x: u16, y: u16, width: u16, height: u16, selective: bool) {
        self.with_shadow(|shadow, out| {
            if !selective {
                // Erased cells take the background only
                let blank = CellAttrs {
                    bg: shadow.attrs.bg,
                    ..CellAttrs::default()
                };
                apply_attrs(out, &blank)?;
            }
            let blanks = " ".repeat(width as usize);
            for row in y..y.saturating_add(height) {
                queue!(out, MoveTo(x, row), Print(&blanks))?;
            }
            apply_attrs(out, &shadow.attrs)?;
            queue!(out, MoveTo(shadow.col, shadow.row))
        });
    }

    fn set_ansi_color(&self, codes: &[u16]) {
        self.with_shadow(|shadow, out| {
            shadow.attrs.apply_sgr(codes);
            apply_attrs(out, &shadow.attrs)
        });
    }
}

/// Console keyboard polling crossterm events
pub struct ConsoleKeyboard {
    poll: Duration,
    cancelled: AtomicBool,
}

impl ConsoleKeyboard {
    pub fn new(poll: Duration) -> Self {
        Self {
            poll,
            cancelled: AtomicBool::new(false),
        }
    }
}

impl Keyboard for ConsoleKeyboard {
    fn get_key(&self) -> io::Result<Option<String>> {
        loop {
            if self.cancelled.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            if !event::poll(self.poll)? {
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                if let Some(name) = KeyMapper::key_name(&key) {
                    return Ok(Some(name));
                }
            }
        }
    }

    fn cancel_pending_read(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
