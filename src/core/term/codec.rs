//! Character encodings of the serial line.
//!
//! Outgoing text is encoded before it reaches the transport; incoming text
//! bytes are decoded incrementally so a character split across reads
//! survives.

use std::fmt;
use std::str::FromStr;

/// Supported line encodings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl Encoding {
    pub const ALL: [Encoding; 3] = [Encoding::Utf8, Encoding::Latin1, Encoding::Ascii];

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Latin1 => "ISO-8859-1",
            Encoding::Ascii => "ASCII",
        }
    }

    /// Encode text, characters the encoding lacks become `?`
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(c).unwrap_or(b'?'))
                .collect(),
            Encoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "utf8" => Ok(Encoding::Utf8),
            "latin1" | "iso88591" | "l1" => Ok(Encoding::Latin1),
            "ascii" | "usascii" => Ok(Encoding::Ascii),
            _ => Err(format!("invalid encoding name: {}", s)),
        }
    }
}

/// Incremental UTF-8 decoder, invalid input becomes U+FFFD
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much as possible, keeping an incomplete trailing sequence
    pub fn decode(&mut self, input: &[u8]) -> String {
        self.pending.extend_from_slice(input);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            // Incomplete sequence at the end, wait for more
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }
}

/// Decoder for the selected [`Encoding`]
#[derive(Debug, Default)]
pub struct TextDecoder {
    encoding: Encoding,
    utf8: Utf8Decoder,
}

impl TextDecoder {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            utf8: Utf8Decoder::default(),
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn decode(&mut self, input: &[u8]) -> String {
        match self.encoding {
            Encoding::Utf8 => self.utf8.decode(input),
            Encoding::Latin1 => input.iter().map(|&b| char::from(b)).collect(),
            Encoding::Ascii => input
                .iter()
                .map(|&b| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_names() {
        assert_eq!("utf-8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert_eq!("ISO-8859-1".parse::<Encoding>(), Ok(Encoding::Latin1));
        assert_eq!("latin_1".parse::<Encoding>(), Ok(Encoding::Latin1));
        assert_eq!("US-ASCII".parse::<Encoding>(), Ok(Encoding::Ascii));
        assert_eq!(
            "klingon".parse::<Encoding>(),
            Err("invalid encoding name: klingon".to_string())
        );
        for encoding in Encoding::ALL {
            assert_eq!(encoding.name().parse::<Encoding>(), Ok(encoding));
        }
    }

    #[test]
    fn test_encode_replaces_missing_characters() {
        assert_eq!(Encoding::Utf8.encode("é"), vec![0xc3, 0xa9]);
        assert_eq!(Encoding::Latin1.encode("é€"), vec![0xe9, b'?']);
        assert_eq!(Encoding::Ascii.encode("aé"), b"a?".to_vec());
    }

    #[test]
    fn test_single_byte_decoders() {
        let mut latin1 = TextDecoder::new(Encoding::Latin1);
        assert_eq!(latin1.decode(&[b'a', 0xe9]), "aé");

        let mut ascii = TextDecoder::new(Encoding::Ascii);
        assert_eq!(ascii.decode(&[b'a', 0xe9]), "a\u{fffd}");
    }

    #[test]
    fn test_utf8_decoder_incomplete_tail() {
        let mut decoder = TextDecoder::default();
        let bytes = "€".as_bytes();
        assert_eq!(decoder.decode(&bytes[..2]), "");
        assert_eq!(decoder.decode(&bytes[2..]), "€");
        assert_eq!(decoder.decode(&[0xff, b'z']), "\u{fffd}z");
    }
}
