//! Mock collaborators shared by unit tests

pub mod screen;

pub use screen::ScreenDisplay;

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::core::transport::{ModemLines, PortControl, PortSettings, Transport, TransportError};
use crate::ui::{Display, Keyboard};

const MOCK_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Write(String),
    WriteBytes(Vec<u8>),
    SetCursor(u16, u16),
    Erase(u16, u16, u16, u16, bool),
    Color(Vec<u16>),
}

/// Records every call; always reports the same cursor and viewport
pub struct RecordingDisplay {
    geometry: (u16, u16, u16, u16),
    calls: Mutex<Vec<DisplayCall>>,
}

impl RecordingDisplay {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            geometry: (x, y, width, height),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<DisplayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cursor_moves(&self) -> Vec<(u16, u16)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DisplayCall::SetCursor(x, y) => Some((x, y)),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text of all `write` calls
    pub fn written(&self) -> String {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DisplayCall::Write(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DisplayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Display for RecordingDisplay {
    fn write(&self, text: &str) {
        self.record(DisplayCall::Write(text.to_string()));
    }

    fn write_bytes(&self, bytes: &[u8]) {
        self.record(DisplayCall::WriteBytes(bytes.to_vec()));
    }

    fn get_position_and_size(&self) -> (u16, u16, u16, u16) {
        self.geometry
    }

    fn set_cursor_position(&self, x: u16, y: u16) {
        self.record(DisplayCall::SetCursor(x, y));
    }

    fn erase(&self, x: u16, y: u16, width: u16, height: u16, selective: bool) {
        self.record(DisplayCall::Erase(x, y, width, height, selective));
    }

    fn set_ansi_color(&self, codes: &[u16]) {
        self.record(DisplayCall::Color(codes.to_vec()));
    }
}

/// Hands out scripted keys, then blocks until cancelled
#[derive(Default)]
pub struct MockKeyboard {
    keys: Mutex<VecDeque<String>>,
    ready: Condvar,
    cancelled: AtomicBool,
    fail: AtomicBool,
}

impl MockKeyboard {
    pub fn new(keys: &[&str]) -> Self {
        let keyboard = Self::default();
        keyboard.push(keys);
        keyboard
    }

    pub fn push(&self, keys: &[&str]) {
        self.keys
            .lock()
            .unwrap()
            .extend(keys.iter().map(|k| k.to_string()));
        self.ready.notify_all();
    }

    /// Make the next get_key fail
    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
        self.ready.notify_all();
    }

    pub fn remaining(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

impl Keyboard for MockKeyboard {
    fn get_key(&self) -> io::Result<Option<String>> {
        let mut keys = self.keys.lock().unwrap();
        loop {
            if self.fail.swap(false, Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "keyboard gone"));
            }
            if self.cancelled.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            if let Some(key) = keys.pop_front() {
                return Ok(Some(key));
            }
            keys = self.ready.wait_timeout(keys, MOCK_WAIT).unwrap().0;
        }
    }

    fn cancel_pending_read(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.ready.notify_all();
    }
}

/// In-memory byte channel
#[derive(Default)]
pub struct MockTransport {
    inbound: Mutex<VecDeque<Vec<u8>>>,
    ready: Condvar,
    written: Mutex<Vec<u8>>,
    cancelled: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    port: Option<MockPort>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that also has line settings and modem lines
    pub fn with_port() -> Self {
        Self {
            port: Some(MockPort::default()),
            ..Self::default()
        }
    }

    pub fn port(&self) -> &MockPort {
        self.port.as_ref().expect("transport created without a port")
    }

    /// Queue bytes for the next read
    pub fn push(&self, data: &[u8]) {
        self.inbound.lock().unwrap().push_back(data.to_vec());
        self.ready.notify_all();
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
        self.ready.notify_all();
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn pending(&self) -> usize {
        self.inbound.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    fn read(&self, max: usize) -> Result<Vec<u8>, TransportError> {
        let mut inbound = self.inbound.lock().unwrap();
        if inbound.is_empty() && !self.fail_reads.load(Ordering::SeqCst) {
            inbound = self.ready.wait_timeout(inbound, MOCK_WAIT).unwrap().0;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TransportError::Read(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "line dropped",
            )));
        }
        if self.cancelled.swap(false, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        match inbound.pop_front() {
            Some(mut chunk) if chunk.len() > max => {
                let rest = chunk.split_off(max);
                inbound.push_front(rest);
                Ok(chunk)
            }
            Some(chunk) => Ok(chunk),
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "line dropped",
            )));
        }
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn cancel_pending_read(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.ready.notify_all();
    }

    fn name(&self) -> String {
        "mock".to_string()
    }

    fn control(&self) -> Option<&dyn PortControl> {
        self.port.as_ref().map(|port| port as &dyn PortControl)
    }
}

/// Port control state kept in memory. Baud rate 0 is rejected.
pub struct MockPort {
    settings: Mutex<PortSettings>,
    lines: Mutex<ModemLines>,
    rts: AtomicBool,
    dtr: AtomicBool,
    break_condition: AtomicBool,
    fail_control: AtomicBool,
}

impl Default for MockPort {
    fn default() -> Self {
        Self {
            settings: Mutex::new(PortSettings::default()),
            lines: Mutex::new(ModemLines::default()),
            rts: AtomicBool::new(true),
            dtr: AtomicBool::new(true),
            break_condition: AtomicBool::new(false),
            fail_control: AtomicBool::new(false),
        }
    }
}

impl MockPort {
    pub fn set_lines(&self, lines: ModemLines) {
        *self.lines.lock().unwrap() = lines;
    }

    /// Make modem line access fail from now on
    pub fn fail_control(&self) {
        self.fail_control.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.fail_control.load(Ordering::SeqCst) {
            return Err(TransportError::Control(io::Error::new(
                io::ErrorKind::Unsupported,
                "no modem lines",
            )));
        }
        Ok(())
    }
}

impl PortControl for MockPort {
    fn settings(&self) -> PortSettings {
        self.settings.lock().unwrap().clone()
    }

    fn apply_settings(&self, settings: &PortSettings) -> Result<(), TransportError> {
        if settings.baudrate == 0 {
            return Err(TransportError::Configure("unsupported baud rate 0".into()));
        }
        *self.settings.lock().unwrap() = settings.clone();
        Ok(())
    }

    fn rts(&self) -> bool {
        self.rts.load(Ordering::SeqCst)
    }

    fn set_rts(&self, active: bool) -> Result<(), TransportError> {
        self.check()?;
        self.rts.store(active, Ordering::SeqCst);
        Ok(())
    }

    fn dtr(&self) -> bool {
        self.dtr.load(Ordering::SeqCst)
    }

    fn set_dtr(&self, active: bool) -> Result<(), TransportError> {
        self.check()?;
        self.dtr.store(active, Ordering::SeqCst);
        Ok(())
    }

    fn break_condition(&self) -> bool {
        self.break_condition.load(Ordering::SeqCst)
    }

    fn set_break(&self, active: bool) -> Result<(), TransportError> {
        self.check()?;
        self.break_condition.store(active, Ordering::SeqCst);
        Ok(())
    }

    fn modem_lines(&self) -> Result<ModemLines, TransportError> {
        self.check()?;
        Ok(*self.lines.lock().unwrap())
    }
}
