//! Text transformations between keyboard, transport and display.
//!
//! A [`TransformChain`] always starts with the end-of-line transform followed
//! by the named filters. Outgoing text runs through the chain front to back,
//! received text back to front.
//!
//! | Filter      | Effect                                                   |
//! |-------------|----------------------------------------------------------|
//! | `direct`    | no change                                                |
//! | `default`   | show control codes other than CR LF BS HT as symbols     |
//! | `nocontrol` | show all control codes (incl. CR LF) and space as symbols|
//! | `printable` | symbols for controls, decimal code for non-ASCII         |
//! | `colorize`  | different colors for received and echoed text            |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One stage of the chain. Every direction defaults to pass-through.
pub trait Transform: Send {
    /// Text received from the transport
    fn rx(&self, text: &str) -> String {
        text.to_string()
    }

    /// Text to be sent to the transport
    fn tx(&self, text: &str) -> String {
        text.to_string()
    }

    /// Text to be sent, as shown by local echo
    fn echo(&self, text: &str) -> String {
        text.to_string()
    }
}

/// End-of-line handling for the Enter key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EolMode {
    #[default]
    Crlf,
    Cr,
    Lf,
}

impl EolMode {
    pub const ALL: [EolMode; 3] = [EolMode::Crlf, EolMode::Cr, EolMode::Lf];

    pub fn name(self) -> &'static str {
        match self {
            EolMode::Crlf => "crlf",
            EolMode::Cr => "cr",
            EolMode::Lf => "lf",
        }
    }

    /// Next mode in menu order (crlf -> cr -> lf -> crlf)
    pub fn next(self) -> Self {
        match self {
            EolMode::Crlf => EolMode::Cr,
            EolMode::Cr => EolMode::Lf,
            EolMode::Lf => EolMode::Crlf,
        }
    }

    fn transform(self) -> Box<dyn Transform> {
        match self {
            EolMode::Crlf => Box::new(Crlf),
            EolMode::Cr => Box::new(Cr),
            EolMode::Lf => Box::new(Direct),
        }
    }
}

impl fmt::Display for EolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crlf" => Ok(EolMode::Crlf),
            "cr" => Ok(EolMode::Cr),
            "lf" => Ok(EolMode::Lf),
            _ => Err(format!("unknown EOL mode: {}", s)),
        }
    }
}

/// Named filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Direct,
    Default,
    NoControl,
    Printable,
    Colorize,
}

impl Filter {
    pub const ALL: [Filter; 5] = [
        Filter::Colorize,
        Filter::Default,
        Filter::Direct,
        Filter::NoControl,
        Filter::Printable,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Filter::Direct => "direct",
            Filter::Default => "default",
            Filter::NoControl => "nocontrol",
            Filter::Printable => "printable",
            Filter::Colorize => "colorize",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Filter::Direct => "do-nothing: forward all data unchanged",
            Filter::Default => "remove typical terminal control codes from input",
            Filter::NoControl => "remove all control codes, incl. CR+LF",
            Filter::Printable => {
                "show decimal code for all non-ASCII characters and replace most control codes"
            }
            Filter::Colorize => "apply different colors for received and echo",
        }
    }

    fn transform(self) -> Box<dyn Transform> {
        match self {
            Filter::Direct => Box::new(Direct),
            Filter::Default => Box::new(NoTerminal { all_controls: false }),
            Filter::NoControl => Box::new(NoTerminal { all_controls: true }),
            Filter::Printable => Box::new(Printable),
            Filter::Colorize => Box::new(Colorize::default()),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::ALL
            .into_iter()
            .find(|filter| filter.name() == s.to_lowercase())
            .ok_or_else(|| format!("unknown filter: {}", s))
    }
}

struct Direct;

impl Transform for Direct {}

/// Enter sends CR+LF
struct Crlf;

impl Transform for Crlf {
    fn tx(&self, text: &str) -> String {
        text.replace('\n', "\r\n")
    }
}

/// Enter sends CR, received CR starts a new line
struct Cr;

impl Transform for Cr {
    fn rx(&self, text: &str) -> String {
        text.replace('\r', "\n")
    }

    fn tx(&self, text: &str) -> String {
        text.replace('\n', "\r")
    }
}

/// Replaces control codes with their Unicode "control picture" symbols
struct NoTerminal {
    /// Also replace CR, LF, BS, HT and space
    all_controls: bool,
}

impl NoTerminal {
    fn replace(&self, c: char) -> char {
        let code = c as u32;
        let mapped = match code {
            0x08 | 0x09 | 0x0A | 0x0D if !self.all_controls => None,
            0x00..=0x1F => Some(0x2400 + code),
            0x20 if self.all_controls => Some(0x2423),
            0x7F => Some(0x2421),
            0x9B => Some(0x2425),
            _ => None,
        };
        mapped.and_then(char::from_u32).unwrap_or(c)
    }
}

impl Transform for NoTerminal {
    fn rx(&self, text: &str) -> String {
        text.chars().map(|c| self.replace(c)).collect()
    }

    fn echo(&self, text: &str) -> String {
        self.rx(text)
    }
}

/// Control pictures for C0, subscript decimal code points for everything else
struct Printable;

impl Transform for Printable {
    fn rx(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                ' '..='~' | '\r' | '\n' | '\x08' | '\t' => out.push(c),
                '\0'..='\x1f' => out.extend(char::from_u32(0x2400 + c as u32)),
                _ => {
                    for digit in (c as u32).to_string().bytes() {
                        out.extend(char::from_u32(0x2080 + (digit - b'0') as u32));
                    }
                    out.push(' ');
                }
            }
        }
        out
    }

    fn echo(&self, text: &str) -> String {
        self.rx(text)
    }
}

struct Colorize {
    input_color: &'static str,
    echo_color: &'static str,
}

impl Default for Colorize {
    fn default() -> Self {
        Self {
            input_color: "\x1b[37m",
            echo_color: "\x1b[31m",
        }
    }
}

impl Transform for Colorize {
    fn rx(&self, text: &str) -> String {
        format!("{}{}", self.input_color, text)
    }

    fn echo(&self, text: &str) -> String {
        format!("{}{}", self.echo_color, text)
    }
}

/// The active EOL transform plus named filters
pub struct TransformChain {
    eol: EolMode,
    filters: Vec<Filter>,
    stages: Vec<Box<dyn Transform>>,
}

impl Default for TransformChain {
    fn default() -> Self {
        Self::new(EolMode::default(), &[Filter::Default])
    }
}

impl TransformChain {
    pub fn new(eol: EolMode, filters: &[Filter]) -> Self {
        let stages = std::iter::once(eol.transform())
            .chain(filters.iter().map(|f| f.transform()))
            .collect();
        Self {
            eol,
            filters: filters.to_vec(),
            stages,
        }
    }

    pub fn eol(&self) -> EolMode {
        self.eol
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Space separated filter names
    pub fn filter_names(&self) -> String {
        self.filters
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Text on its way to the transport, front to back
    pub fn send(&self, text: &str) -> String {
        self.stages
            .iter()
            .fold(text.to_string(), |acc, stage| stage.tx(&acc))
    }

    /// Text received from the transport, back to front
    pub fn receive(&self, text: &str) -> String {
        self.stages
            .iter()
            .rev()
            .fold(text.to_string(), |acc, stage| stage.rx(&acc))
    }

    /// Local echo of sent text, front to back
    pub fn echo(&self, text: &str) -> String {
        self.stages
            .iter()
            .fold(text.to_string(), |acc, stage| stage.echo(&acc))
    }
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformChain")
            .field("eol", &self.eol)
            .field("filters", &self.filters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eol_send() {
        let text = "ls\n";
        assert_eq!(TransformChain::new(EolMode::Crlf, &[]).send(text), "ls\r\n");
        assert_eq!(TransformChain::new(EolMode::Cr, &[]).send(text), "ls\r");
        assert_eq!(TransformChain::new(EolMode::Lf, &[]).send(text), "ls\n");
    }

    #[test]
    fn test_cr_receive() {
        let chain = TransformChain::new(EolMode::Cr, &[Filter::Direct]);
        assert_eq!(chain.receive("a\rb"), "a\nb");
        // CRLF does not strip on receive
        let chain = TransformChain::new(EolMode::Crlf, &[]);
        assert_eq!(chain.receive("a\r\nb"), "a\r\nb");
    }

    #[test]
    fn test_default_filter() {
        let chain = TransformChain::new(EolMode::Lf, &[Filter::Default]);
        assert_eq!(chain.receive("a\x07b\r\n\t\x08"), "a\u{2407}b\r\n\t\x08");
        assert_eq!(chain.receive("\x7f\u{9b}"), "\u{2421}\u{2425}");
        // filters do not touch sent text
        assert_eq!(chain.send("\x07"), "\x07");
        assert_eq!(chain.echo("\x07"), "\u{2407}");
    }

    #[test]
    fn test_nocontrol_filter() {
        let chain = TransformChain::new(EolMode::Lf, &[Filter::NoControl]);
        assert_eq!(chain.receive("a b\r\n"), "a\u{2423}b\u{240d}\u{240a}");
    }

    #[test]
    fn test_printable_filter() {
        let chain = TransformChain::new(EolMode::Lf, &[Filter::Printable]);
        assert_eq!(chain.receive("A\x01é"), "A\u{2401}\u{2082}\u{2083}\u{2083} ");
    }

    #[test]
    fn test_colorize_filter() {
        let chain = TransformChain::new(EolMode::Lf, &[Filter::Colorize]);
        assert_eq!(chain.receive("x"), "\x1b[37mx");
        assert_eq!(chain.echo("x"), "\x1b[31mx");
        assert_eq!(chain.send("x"), "x");
    }

    #[test]
    fn test_receive_runs_in_reverse() {
        // the EOL stage sees received text last
        let chain = TransformChain::new(EolMode::Cr, &[Filter::Printable]);
        assert_eq!(chain.receive("\r"), "\n");
        let chain = TransformChain::new(EolMode::Cr, &[Filter::NoControl]);
        assert_eq!(chain.receive("\r"), "\u{240d}");
    }

    #[test]
    fn test_names_round_trip() {
        for filter in Filter::ALL {
            assert_eq!(filter.name().parse::<Filter>(), Ok(filter));
        }
        assert_eq!("CRLF".parse::<EolMode>(), Ok(EolMode::Crlf));
        assert!("bogus".parse::<Filter>().is_err());
        assert_eq!(EolMode::Lf.next(), EolMode::Crlf);
    }

    #[test]
    fn test_default_chain() {
        let chain = TransformChain::default();
        assert_eq!(chain.eol(), EolMode::Crlf);
        assert_eq!(chain.filter_names(), "default");
    }
}
