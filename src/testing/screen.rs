//! In-memory screen for end-to-end tests
//!
//! A fixed-size cell grid implementing [`Display`], so decoded output can be
//! checked as text on a screen instead of as a list of display calls.

use std::sync::Mutex;

use unicode_width::UnicodeWidthChar;

use crate::ui::style::CellAttrs;
use crate::ui::Display;

/// A single cell. Width 0 marks the right half of a wide character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub width: u8,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            width: 1,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    fn is_continuation(&self) -> bool {
        self.width == 0
    }
}

struct Grid {
    cols: u16,
    rows: u16,
    cells: Vec<Vec<Cell>>,
    /// Column may equal `cols` after writing the last cell (pending wrap)
    col: u16,
    row: u16,
    attrs: CellAttrs,
    bells: usize,
}

impl Grid {
    fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            cells: (0..rows).map(|_| vec![Cell::default(); cols as usize]).collect(),
            col: 0,
            row: 0,
            attrs: CellAttrs::default(),
            bells: 0,
        }
    }

    fn put_char(&mut self, ch: char) {
        let width = match ch.width() {
            Some(w) if w > 0 => w as u16,
            // Combining marks and other zero-width characters are dropped
            _ => return,
        };

        if self.col + width > self.cols {
            self.col = 0;
            self.linefeed();
        }

        let (row, col) = (self.row as usize, self.col as usize);
        if col > 0 && self.cells[row][col].is_continuation() {
            self.cells[row][col - 1] = Cell::default();
        }
        self.cells[row][col] = Cell {
            ch,
            width: width as u8,
            attrs: self.attrs,
        };
        if width == 2 && col + 1 < self.cols as usize {
            self.cells[row][col + 1] = Cell {
                ch: ' ',
                width: 0,
                attrs: self.attrs,
            };
        }
        self.col += width;
    }

    fn linefeed(&mut self) {
        if self.row + 1 < self.rows {
            self.row += 1;
        } else {
            self.scroll_up();
        }
    }

    fn scroll_up(&mut self) {
        self.cells.remove(0);
        self.cells.push(vec![Cell::default(); self.cols as usize]);
    }

    fn control(&mut self, ch: char) {
        match ch {
            '\r' => self.col = 0,
            '\n' => self.linefeed(),
            '\x08' => self.col = self.col.min(self.cols - 1).saturating_sub(1),
            '\t' => self.col = ((self.col / 8 + 1) * 8).min(self.cols - 1),
            '\x07' => self.bells += 1,
            _ => {}
        }
    }

    fn write(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_control() {
                self.control(ch);
            } else {
                self.put_char(ch);
            }
        }
    }

    fn erase(&mut self, x: u16, y: u16, width: u16, height: u16, selective: bool) {
        let attrs = self.attrs;
        let x_end = x.saturating_add(width).min(self.cols) as usize;
        let y_end = y.saturating_add(height).min(self.rows) as usize;
        for row in &mut self.cells[(y as usize).min(y_end)..y_end] {
            for cell in &mut row[(x as usize).min(x_end)..x_end] {
                cell.ch = ' ';
                cell.width = 1;
                if !selective {
                    cell.attrs = attrs;
                }
            }
        }
    }

    fn line(&self, row: usize) -> String {
        self.cells[row]
            .iter()
            .filter(|c| !c.is_continuation())
            .map(|c| c.ch)
            .collect::<String>()
            .trim_end()
            .to_string()
    }
}

/// [`Display`] over a cell grid
pub struct ScreenDisplay {
    grid: Mutex<Grid>,
}

impl ScreenDisplay {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            grid: Mutex::new(Grid::new(cols, rows)),
        }
    }

    fn with_grid<R>(&self, f: impl FnOnce(&mut Grid) -> R) -> R {
        // A panic while holding the lock leaves the grid usable
        let mut grid = self.grid.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut grid)
    }

    /// Text of one row without trailing blanks
    pub fn line(&self, row: u16) -> String {
        self.with_grid(|g| {
            if row < g.rows {
                g.line(row as usize)
            } else {
                String::new()
            }
        })
    }

    /// All rows joined with newlines, trailing blank rows removed
    pub fn contents(&self) -> String {
        self.with_grid(|g| {
            let lines: Vec<String> = (0..g.rows as usize).map(|r| g.line(r)).collect();
            lines.join("\n").trim_end().to_string()
        })
    }

    pub fn cell(&self, col: u16, row: u16) -> Option<Cell> {
        self.with_grid(|g| {
            g.cells
                .get(row as usize)
                .and_then(|r| r.get(col as usize))
                .cloned()
        })
    }

    /// Attributes applied to the next written character
    pub fn attrs(&self) -> CellAttrs {
        self.with_grid(|g| g.attrs)
    }

    pub fn bell_count(&self) -> usize {
        self.with_grid(|g| g.bells)
    }
}

impl Display for ScreenDisplay {
    fn write(&self, text: &str) {
        self.with_grid(|g| g.write(text));
    }

    fn write_bytes(&self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        self.with_grid(|g| g.write(&text));
    }

    fn get_position_and_size(&self) -> (u16, u16, u16, u16) {
        self.with_grid(|g| (g.col.min(g.cols - 1), g.row, g.cols, g.rows))
    }

    fn set_cursor_position(&self, x: u16, y: u16) {
        self.with_grid(|g| {
            g.col = x.min(g.cols - 1);
            g.row = y.min(g.rows - 1);
        });
    }

    fn erase(&self, x: u16, y: u16, width: u16, height: u16, selective: bool) {
        self.with_grid(|g| g.erase(x, y, width, height, selective));
    }

    fn set_ansi_color(&self, codes: &[u16]) {
        self.with_grid(|g| g.attrs.apply_sgr(codes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::{EscapeDecoder, TerminalEmulator};
    use crate::ui::style::{AttrFlags, Color};
    use std::sync::Arc;

    /// Run bytes through decoder and emulator onto a fresh screen
    fn render(cols: u16, rows: u16, input: &[u8]) -> Arc<ScreenDisplay> {
        let screen = Arc::new(ScreenDisplay::new(cols, rows));
        let mut emulator = TerminalEmulator::new(screen.clone());
        let mut decoder = EscapeDecoder::new();
        for event in decoder.feed(input) {
            let _ = emulator.apply(event);
        }
        screen
    }

    #[test]
    fn test_plain_text_and_newlines() {
        let screen = render(20, 5, b"hello\r\nworld");
        assert_eq!(screen.contents(), "hello\nworld");
        assert_eq!(screen.get_position_and_size(), (5, 1, 20, 5));
    }

    #[test]
    fn test_wraps_at_right_margin() {
        let screen = render(4, 3, b"abcdef");
        assert_eq!(screen.line(0), "abcd");
        assert_eq!(screen.line(1), "ef");
    }

    #[test]
    fn test_scrolls_on_last_row() {
        let screen = render(10, 2, b"one\r\ntwo\r\nthree");
        assert_eq!(screen.contents(), "two\nthree");
    }

    #[test]
    fn test_cursor_addressing_and_erase() {
        let screen = render(10, 3, b"0123456789\x1b[1;4H\x1b[K");
        assert_eq!(screen.line(0), "012");

        let screen = render(10, 3, b"aaaa\r\nbbbb\r\ncccc\x1b[2;2H\x1b[J");
        assert_eq!(screen.contents(), "aaaa\nb");

        let screen = render(10, 3, b"abcdef\x1b[1;2H\x1b[3X");
        assert_eq!(screen.line(0), "a   ef");
    }

    #[test]
    fn test_backspace_erases() {
        let screen = render(10, 2, b"abc\x08\x08");
        assert_eq!(screen.line(0), "a");
        assert_eq!(screen.get_position_and_size().0, 1);
    }

    #[test]
    fn test_sgr_attributes() {
        let screen = render(10, 2, b"\x1b[1;31mR\x1b[0mN\x1b[92m");
        let red = screen.cell(0, 0).unwrap();
        assert_eq!(red.attrs.fg, Color::Indexed(1));
        assert!(red.attrs.flags.contains(AttrFlags::BOLD));
        assert_eq!(screen.cell(1, 0).unwrap().attrs, CellAttrs::default());
        assert_eq!(screen.attrs().fg, Color::Indexed(10));
    }

    #[test]
    fn test_wide_characters() {
        let screen = render(6, 2, "a日b".as_bytes());
        assert_eq!(screen.line(0), "a日b");
        assert_eq!(screen.cell(2, 0).unwrap().width, 0);
        assert_eq!(screen.get_position_and_size().0, 4);
    }

    #[test]
    fn test_bell_and_tab() {
        let screen = render(20, 2, b"\x07a\tb");
        assert_eq!(screen.bell_count(), 1);
        assert_eq!(screen.line(0), "a       b");
    }

    #[test]
    fn test_selective_erase_keeps_attrs() {
        let screen = ScreenDisplay::new(5, 1);
        screen.set_ansi_color(&[4]);
        screen.write("xy");
        screen.set_ansi_color(&[0]);
        screen.erase(0, 0, 5, 1, true);
        let cell = screen.cell(0, 0).unwrap();
        assert_eq!(cell.ch, ' ');
        assert!(cell.attrs.flags.contains(AttrFlags::UNDERLINE));
    }
}
