//! Session management
//!
//! A session couples one transport with one display and keyboard through two
//! threads:
//!
//! - **reader**: transport -> EscapeDecoder -> TerminalEmulator -> display
//! - **writer**: keyboard -> hotkeys or EscapeEncoder -> TransformChain -> transport
//!
//! The threads share only the `alive` flag and the line encoding. The hotkey registry, the
//! transform chain and the echo setting live in [`Outbound`], which the
//! writer thread owns, so hotkey callbacks may change them freely.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use super::term::{ControlEvent, Encoding, EscapeDecoder, EscapeEncoder, TerminalEmulator};
use super::transform::{EolMode, Filter, TransformChain};
use super::transport::{Transport, TransportError};
use crate::ui::{Display, Keyboard};

/// Bytes requested from the transport per read
const READ_CHUNK: usize = 1024;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session already started")]
    AlreadyStarted,

    #[error("session not started")]
    NotStarted,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("keyboard read failed: {0}")]
    Keyboard(#[from] io::Error),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Callback bound to a key name. Runs on the writer thread.
pub type HotkeyCallback =
    Arc<dyn Fn(&mut Outbound, &str) -> Result<(), SessionError> + Send + Sync>;

/// Key name to callback table, consulted before the default send action
#[derive(Clone, Default)]
pub struct HotkeyRegistry {
    bindings: HashMap<String, HotkeyCallback>,
}

impl HotkeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key`, replacing any previous binding
    pub fn register<F>(&mut self, key: &str, callback: F)
    where
        F: Fn(&mut Outbound, &str) -> Result<(), SessionError> + Send + Sync + 'static,
    {
        self.bindings.insert(key.to_string(), Arc::new(callback));
    }

    pub fn unregister(&mut self, key: &str) -> bool {
        self.bindings.remove(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<HotkeyCallback> {
        self.bindings.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Observable session state. `Stopping` is derived from the running flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Closed,
}

/// Writer side of a session, handed to hotkey callbacks
pub struct Outbound {
    transport: Arc<dyn Transport>,
    display: Arc<dyn Display>,
    keyboard: Arc<dyn Keyboard>,
    alive: Arc<AtomicBool>,
    encoding: Arc<RwLock<Encoding>>,
    chain: TransformChain,
    echo: bool,
    hotkeys: HotkeyRegistry,
}

impl Outbound {
    /// Default action for a key: encode, transform, send, optionally echo.
    ///
    /// The transformed text is converted to bytes with the line encoding.
    ///
    /// Unknown key names are reported on the display and skipped; only
    /// transport failures are returned.
    pub fn send_key(&mut self, key: &str) -> Result<(), SessionError> {
        let text = if key.chars().count() > 1 {
            match EscapeEncoder::translate(key) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    tracing::warn!("{}", e);
                    self.message(&format!("\n--- {} ---\n", e));
                    return Ok(());
                }
            }
        } else {
            key.to_string()
        };

        let data = self.chain.send(&text);
        self.transport.write(&self.encoding().encode(&data))?;

        if self.echo {
            self.display.write(&self.chain.echo(&text));
        }
        Ok(())
    }

    /// Write a message to the display, newlines become CR LF
    pub fn message(&self, text: &str) {
        self.display.write(&text.replace('\n', "\r\n"));
    }

    /// Block for the next key. `None` once the session is stopping.
    pub fn get_key(&self) -> Result<Option<String>, SessionError> {
        while self.is_alive() {
            if let Some(key) = self.keyboard.get_key()? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    /// Read a line of text from the keyboard, echoing it on the display.
    ///
    /// Backspace edits, Enter accepts, Esc cancels (`None`).
    pub fn ask_string(&mut self, prompt: &str) -> Result<Option<String>, SessionError> {
        self.message(prompt);
        let mut line = String::new();
        while let Some(key) = self.get_key()? {
            match key.as_str() {
                "\n" | "\r" | "Enter" => {
                    self.message("\n");
                    return Ok(Some(line));
                }
                "\x1b" | "Esc" => {
                    self.message("\n");
                    return Ok(None);
                }
                "\x08" | "\x7f" | "Backspace" => {
                    if line.pop().is_some() {
                        self.display.write("\x08 \x08");
                    }
                }
                k if k.chars().count() == 1 => {
                    line.push_str(k);
                    self.display.write(k);
                }
                _ => {}
            }
        }
        Ok(None)
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn chain(&self) -> &TransformChain {
        &self.chain
    }

    /// Replace the chain, keeping the current filters
    pub fn set_eol(&mut self, eol: EolMode) {
        self.chain = TransformChain::new(eol, self.chain.filters());
    }

    /// Replace the chain, keeping the current EOL mode
    pub fn set_filters(&mut self, filters: &[Filter]) {
        self.chain = TransformChain::new(self.chain.eol(), filters);
    }

    pub fn encoding(&self) -> Encoding {
        read_encoding(&self.encoding)
    }

    /// Change the line encoding for both directions
    pub fn set_encoding(&mut self, encoding: Encoding) {
        *self.encoding.write().unwrap_or_else(|e| e.into_inner()) = encoding;
    }

    pub fn hotkeys(&self) -> &HotkeyRegistry {
        &self.hotkeys
    }

    pub fn hotkeys_mut(&mut self) -> &mut HotkeyRegistry {
        &mut self.hotkeys
    }

    pub fn transport_name(&self) -> String {
        self.transport.name()
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// End the session from a hotkey
    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.transport.cancel_pending_read();
        self.keyboard.cancel_pending_read();
    }

    fn run(&mut self) -> Result<(), SessionError> {
        while let Some(key) = self.get_key()? {
            if !self.is_alive() {
                break;
            }
            match self.hotkeys.get(&key) {
                Some(callback) => callback(self, &key)?,
                None => self.send_key(&key)?,
            }
        }
        Ok(())
    }
}

/// Two-thread terminal session over a transport
pub struct Session {
    transport: Arc<dyn Transport>,
    display: Arc<dyn Display>,
    keyboard: Arc<dyn Keyboard>,
    alive: Arc<AtomicBool>,
    encoding: Arc<RwLock<Encoding>>,
    /// Writer context until start() moves it to the writer thread
    outbound: Option<Outbound>,
    reader_thread: Option<JoinHandle<Result<(), SessionError>>>,
    writer_thread: Option<JoinHandle<Result<(), SessionError>>>,
    closed: bool,
}

impl Session {
    pub fn new(
        transport: Arc<dyn Transport>,
        display: Arc<dyn Display>,
        keyboard: Arc<dyn Keyboard>,
    ) -> Self {
        let alive = Arc::new(AtomicBool::new(false));
        let encoding = Arc::new(RwLock::new(Encoding::default()));
        let outbound = Outbound {
            transport: transport.clone(),
            display: display.clone(),
            keyboard: keyboard.clone(),
            alive: alive.clone(),
            encoding: encoding.clone(),
            chain: TransformChain::default(),
            echo: false,
            hotkeys: HotkeyRegistry::new(),
        };
        Self {
            transport,
            display,
            keyboard,
            alive,
            encoding,
            outbound: Some(outbound),
            reader_thread: None,
            writer_thread: None,
            closed: false,
        }
    }

    /// Writer context, only available before start()
    pub fn outbound_mut(&mut self) -> Result<&mut Outbound, SessionError> {
        self.outbound.as_mut().ok_or(SessionError::AlreadyStarted)
    }

    pub fn set_chain(&mut self, chain: TransformChain) -> Result<(), SessionError> {
        self.outbound_mut()?.chain = chain;
        Ok(())
    }

    pub fn set_echo(&mut self, echo: bool) -> Result<(), SessionError> {
        self.outbound_mut()?.set_echo(echo);
        Ok(())
    }

    pub fn set_encoding(&mut self, encoding: Encoding) -> Result<(), SessionError> {
        self.outbound_mut()?.set_encoding(encoding);
        Ok(())
    }

    pub fn register_hotkey<F>(&mut self, key: &str, callback: F) -> Result<(), SessionError>
    where
        F: Fn(&mut Outbound, &str) -> Result<(), SessionError> + Send + Sync + 'static,
    {
        self.outbound_mut()?.hotkeys.register(key, callback);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        if self.closed {
            SessionState::Closed
        } else if self.outbound.is_some() {
            SessionState::Idle
        } else if self.is_alive() {
            SessionState::Running
        } else {
            SessionState::Stopping
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Launch the reader and writer threads
    pub fn start(&mut self) -> Result<(), SessionError> {
        let mut outbound = self.outbound.take().ok_or(SessionError::AlreadyStarted)?;
        self.alive.store(true, Ordering::SeqCst);
        tracing::info!("Session started on {}", self.transport.name());

        let transport = self.transport.clone();
        let display = self.display.clone();
        let keyboard = self.keyboard.clone();
        let alive = self.alive.clone();
        let encoding = self.encoding.clone();
        self.reader_thread = Some(thread::spawn(move || {
            reader_loop(transport, display, keyboard, alive, encoding)
        }));

        self.writer_thread = Some(thread::spawn(move || {
            let result = outbound.run();
            if let Err(e) = &result {
                report_failure(outbound.display.as_ref(), e);
                outbound.stop();
            }
            result
        }));

        Ok(())
    }

    /// Request shutdown and wake both threads. Idempotent.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.transport.cancel_pending_read();
        self.keyboard.cancel_pending_read();
    }

    /// Wait for both threads, returning the first failure
    pub fn join(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        if self.outbound.is_some() {
            return Err(SessionError::NotStarted);
        }

        let writer = join_thread(self.writer_thread.take(), "writer");
        // The writer may have stopped the session without waking the reader
        self.transport.cancel_pending_read();
        let reader = join_thread(self.reader_thread.take(), "reader");
        self.closed = true;
        tracing::info!("Session closed");

        reader.and(writer)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.outbound.is_none() && !self.closed {
            self.stop();
            let _ = self.join();
        }
    }
}

fn join_thread(
    handle: Option<JoinHandle<Result<(), SessionError>>>,
    name: &'static str,
) -> Result<(), SessionError> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| SessionError::ThreadPanicked(name))?,
        None => Ok(()),
    }
}

fn report_failure(display: &dyn Display, error: &SessionError) {
    tracing::error!("Session failed: {}", error);
    display.write(&format!("\r\n--- {} ---\r\n", error));
}

fn read_encoding(encoding: &RwLock<Encoding>) -> Encoding {
    *encoding.read().unwrap_or_else(|e| e.into_inner())
}

/// Copy transport -> display until stopped or the transport fails
fn reader_loop(
    transport: Arc<dyn Transport>,
    display: Arc<dyn Display>,
    keyboard: Arc<dyn Keyboard>,
    alive: Arc<AtomicBool>,
    encoding: Arc<RwLock<Encoding>>,
) -> Result<(), SessionError> {
    let mut decoder = EscapeDecoder::new();
    let mut emulator = TerminalEmulator::new(display.clone());
    let mut text = Vec::new();

    while alive.load(Ordering::SeqCst) {
        let data = match transport.read(READ_CHUNK) {
            Ok(data) => data,
            Err(e) => {
                alive.store(false, Ordering::SeqCst);
                keyboard.cancel_pending_read();
                let error = SessionError::from(e);
                report_failure(display.as_ref(), &error);
                return Err(error);
            }
        };

        emulator.set_encoding(read_encoding(&encoding));
        for &byte in &data {
            match decoder.handle(byte) {
                Some(ControlEvent::PlainText(b)) => text.push(b),
                Some(event) => {
                    flush_text(&mut emulator, &mut text);
                    if let Err(e) = emulator.apply(event) {
                        tracing::debug!("Dropped sequence: {}", e);
                    }
                }
                None => {}
            }
        }
        flush_text(&mut emulator, &mut text);
    }

    Ok(())
}

/// Runs of plain text go to the display in one write
fn flush_text(emulator: &mut TerminalEmulator, text: &mut Vec<u8>) {
    if !text.is_empty() {
        emulator.write(text);
        text.clear();
    }
}
