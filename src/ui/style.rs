//! Character attributes set through SGR

use bitflags::bitflags;

/// Cell attributes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellAttrs {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl CellAttrs {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Apply a list of SGR codes
    pub fn apply_sgr(&mut self, codes: &[u16]) {
        if codes.is_empty() {
            self.reset();
            return;
        }

        let mut iter = codes.iter().copied();
        while let Some(code) = iter.next() {
            match code {
                0 => self.reset(),
                1 => self.flags |= AttrFlags::BOLD,
                2 => self.flags |= AttrFlags::DIM,
                3 => self.flags |= AttrFlags::ITALIC,
                4 => self.flags |= AttrFlags::UNDERLINE,
                5 => self.flags |= AttrFlags::BLINK,
                7 => self.flags |= AttrFlags::INVERSE,
                8 => self.flags |= AttrFlags::HIDDEN,
                9 => self.flags |= AttrFlags::STRIKETHROUGH,

                22 => self.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
                23 => self.flags &= !AttrFlags::ITALIC,
                24 => self.flags &= !AttrFlags::UNDERLINE,
                25 => self.flags &= !AttrFlags::BLINK,
                27 => self.flags &= !AttrFlags::INVERSE,
                28 => self.flags &= !AttrFlags::HIDDEN,
                29 => self.flags &= !AttrFlags::STRIKETHROUGH,

                30..=37 => self.fg = Color::Indexed((code - 30) as u8),
                38 => {
                    if let Some(color) = extended_color(&mut iter) {
                        self.fg = color;
                    }
                }
                39 => self.fg = Color::Default,

                40..=47 => self.bg = Color::Indexed((code - 40) as u8),
                48 => {
                    if let Some(color) = extended_color(&mut iter) {
                        self.bg = color;
                    }
                }
                49 => self.bg = Color::Default,

                // Bright colors
                90..=97 => self.fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => self.bg = Color::Indexed((code - 100 + 8) as u8),

                _ => {}
            }
        }
    }
}

/// `5;n` (256 colors) or `2;r;g;b`. Values above 255 reject the color.
fn extended_color(iter: &mut impl Iterator<Item = u16>) -> Option<Color> {
    let kind = iter.next()?;
    let mut component = || iter.next().and_then(|v| u8::try_from(v).ok());
    match kind {
        5 => component().map(Color::Indexed),
        2 => {
            let r = component()?;
            let g = component()?;
            let b = component()?;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

/// Color definition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    pub fn to_crossterm(self) -> crossterm::style::Color {
        match self {
            Color::Default => crossterm::style::Color::Reset,
            Color::Indexed(n) => crossterm::style::Color::AnsiValue(n),
            Color::Rgb(r, g, b) => crossterm::style::Color::Rgb { r, g, b },
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u16 {
        const BOLD          = 0b0000_0000_0001;
        const DIM           = 0b0000_0000_0010;
        const ITALIC        = 0b0000_0000_0100;
        const UNDERLINE     = 0b0000_0000_1000;
        const BLINK         = 0b0000_0001_0000;
        const INVERSE       = 0b0000_0010_0000;
        const HIDDEN        = 0b0000_0100_0000;
        const STRIKETHROUGH = 0b0000_1000_0000;
    }
}
