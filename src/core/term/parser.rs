//! VT sequence decoder
//!
//! Turns the inbound byte stream into discrete [`ControlEvent`]s. The decoder
//! is a plain state machine: one byte in, at most one event out. It never
//! fails; anything it does not understand sends it back to ground.

/// Number of numeric CSI parameters kept per sequence
pub const CSI_PARAM_CAPACITY: usize = 3;

/// Control events produced by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// A byte to be shown (may be part of a multi-byte UTF-8 sequence)
    PlainText(u8),
    CursorUp(u16),
    CursorDown(u16),
    CursorForward(u16),
    CursorBackward(u16),
    /// CUP / HVP: 1-based column and row as received
    CursorPosition { col: u16, row: u16 },
    EraseInLine { mode: u16, selective: bool },
    EraseInDisplay { mode: u16, selective: bool },
    EraseCharacter(u16),
    InsertLine(u16),
    DeleteLine(u16),
    InsertCharacter(u16),
    DeleteCharacter(u16),
    SetScrollRegion { top: u16, bottom: u16 },
    SelectGraphicRendition(Vec<u16>),
    /// SM / RM, `private` is set for DEC private modes (`CSI ? n h`)
    SetFlag { code: u16, private: bool, on: bool },
    LineFeed,
    CarriageReturn,
    Backspace,
    Bell,
    HorizontalTab,
    /// IND
    Index,
    /// NEL
    NextLine,
    /// RI
    ReverseIndex,
    SaveCursor,
    RestoreCursor,
    KeypadApplication,
    KeypadNumeric,
    /// S8C1T (`true`) / S7C1T (`false`)
    EightBitControls(bool),
    /// C0 control (or DEL) without a dedicated event
    OtherControl(u8),
    /// Recognized introducer that this decoder does not interpret (OSC, DCS, ...)
    Unhandled,
}

/// Decoder state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecoderState {
    #[default]
    Ground,
    Escape,
    Csi,
    SelectControlTransmission,
    LineAttributes,
    /// Remembers the G0..G3 selector byte (`(`, `)`, `*`, `+`)
    CharacterSetSelection(u8),
}

/// Escape sequence decoder
#[derive(Debug, Default)]
pub struct EscapeDecoder {
    state: DecoderState,
    params: [u16; CSI_PARAM_CAPACITY],
    param_index: usize,
    private_marker: bool,
    eight_bit_controls: bool,
}

impl EscapeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Whether C1 bytes (0x80..0x9F) are interpreted as controls
    pub fn eight_bit_controls(&self) -> bool {
        self.eight_bit_controls
    }

    pub fn set_eight_bit_controls(&mut self, on: bool) {
        self.eight_bit_controls = on;
    }

    /// Feed a single byte to the decoder
    pub fn handle(&mut self, byte: u8) -> Option<ControlEvent> {
        let (next, event) = self.transition(self.state, byte);
        if self.state == DecoderState::Csi && next != DecoderState::Csi {
            self.reset_parameters();
        }
        self.state = next;
        event
    }

    /// Feed a chunk of bytes, collecting every emitted event
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ControlEvent> {
        bytes.iter().filter_map(|&b| self.handle(b)).collect()
    }

    fn transition(&mut self, state: DecoderState, byte: u8) -> (DecoderState, Option<ControlEvent>) {
        match state {
            DecoderState::Ground => self.ground(byte),
            DecoderState::Escape => self.escape(byte),
            DecoderState::Csi => self.csi(byte),
            DecoderState::SelectControlTransmission => {
                let event = match byte {
                    b'G' => Some(true),
                    b'F' => Some(false),
                    _ => None,
                }
                .map(|on| {
                    self.eight_bit_controls = on;
                    ControlEvent::EightBitControls(on)
                });
                (DecoderState::Ground, event)
            }
            // DECDHL / DECSWL / DECDWL and charset designation are consumed
            // without effect
            DecoderState::LineAttributes | DecoderState::CharacterSetSelection(_) => {
                (DecoderState::Ground, None)
            }
        }
    }

    fn reset_parameters(&mut self) {
        self.params = [0; CSI_PARAM_CAPACITY];
        self.param_index = 0;
        self.private_marker = false;
    }

    fn enter_escape(&mut self) -> (DecoderState, Option<ControlEvent>) {
        self.reset_parameters();
        (DecoderState::Escape, None)
    }

    fn enter_csi(&mut self) -> (DecoderState, Option<ControlEvent>) {
        self.reset_parameters();
        (DecoderState::Csi, None)
    }

    fn ground(&mut self, byte: u8) -> (DecoderState, Option<ControlEvent>) {
        let event = match byte {
            0x00 => None,
            0x07 => Some(ControlEvent::Bell),
            0x08 => Some(ControlEvent::Backspace),
            0x09 => Some(ControlEvent::HorizontalTab),
            0x0A => Some(ControlEvent::LineFeed),
            0x0D => Some(ControlEvent::CarriageReturn),
            0x1B => return self.enter_escape(),
            0x01..=0x1F | 0x7F => Some(ControlEvent::OtherControl(byte)),
            0x80..=0x9F if self.eight_bit_controls => match byte {
                0x84 => Some(ControlEvent::Index),
                0x85 => Some(ControlEvent::NextLine),
                0x8D => Some(ControlEvent::ReverseIndex),
                0x9B => return self.enter_csi(),
                // Other C1 codes stay text, they may be UTF-8 continuation bytes
                _ => Some(ControlEvent::PlainText(byte)),
            },
            _ => Some(ControlEvent::PlainText(byte)),
        };
        (DecoderState::Ground, event)
    }

    fn escape(&mut self, byte: u8) -> (DecoderState, Option<ControlEvent>) {
        let event = match byte {
            b'[' => return self.enter_csi(),
            b' ' => return (DecoderState::SelectControlTransmission, None),
            b'#' => return (DecoderState::LineAttributes, None),
            b'(' | b')' | b'*' | b'+' => {
                return (DecoderState::CharacterSetSelection(byte), None)
            }
            b'D' => Some(ControlEvent::Index),
            b'E' => Some(ControlEvent::NextLine),
            b'M' => Some(ControlEvent::ReverseIndex),
            b'7' => Some(ControlEvent::SaveCursor),
            b'8' => Some(ControlEvent::RestoreCursor),
            b'=' => Some(ControlEvent::KeypadApplication),
            b'>' => Some(ControlEvent::KeypadNumeric),
            // OSC, HTS, SS2, SS3, DCS, ST, APC, PM
            b']' | b'H' | b'N' | b'O' | b'P' | b'\\' | b'_' | b'^' => Some(ControlEvent::Unhandled),
            _ => None,
        };
        (DecoderState::Ground, event)
    }

    fn csi(&mut self, byte: u8) -> (DecoderState, Option<ControlEvent>) {
        match byte {
            b'0'..=b'9' => {
                let digit = (byte - b'0') as u16;
                let param = &mut self.params[self.param_index];
                *param = param.saturating_mul(10).saturating_add(digit);
                (DecoderState::Csi, None)
            }
            b';' => {
                if self.param_index + 1 < CSI_PARAM_CAPACITY {
                    self.param_index += 1;
                    self.params[self.param_index] = 0;
                }
                (DecoderState::Csi, None)
            }
            b'?' => {
                self.private_marker = true;
                (DecoderState::Csi, None)
            }
            _ => (DecoderState::Ground, self.execute_csi(byte)),
        }
    }

    fn execute_csi(&self, final_byte: u8) -> Option<ControlEvent> {
        let [p0, p1, _] = self.params;
        let selective = self.private_marker;

        let event = match final_byte {
            b'A' => ControlEvent::CursorUp(p0),
            b'B' => ControlEvent::CursorDown(p0),
            b'C' => ControlEvent::CursorForward(p0),
            b'D' => ControlEvent::CursorBackward(p0),
            b'H' | b'f' => ControlEvent::CursorPosition { col: p1, row: p0 },
            b'K' => ControlEvent::EraseInLine { mode: p0, selective },
            b'J' => ControlEvent::EraseInDisplay { mode: p0, selective },
            b'L' => ControlEvent::InsertLine(p0),
            b'M' => ControlEvent::DeleteLine(p0),
            b'@' => ControlEvent::InsertCharacter(p0),
            b'P' => ControlEvent::DeleteCharacter(p0),
            b'X' => ControlEvent::EraseCharacter(p0),
            // TBC is accepted but tab stops are fixed, so nothing is emitted
            b'g' => return None,
            b'r' => ControlEvent::SetScrollRegion { top: p0, bottom: p1 },
            b'm' => ControlEvent::SelectGraphicRendition(self.params[..=self.param_index].to_vec()),
            b'h' | b'l' => ControlEvent::SetFlag {
                code: p0,
                private: self.private_marker,
                on: final_byte == b'h',
            },
            _ => {
                tracing::debug!(
                    "Unknown CSI: params={:?}, private={}, final={:?}",
                    &self.params[..=self.param_index],
                    self.private_marker,
                    final_byte as char
                );
                return None;
            }
        };
        Some(event)
    }
}
