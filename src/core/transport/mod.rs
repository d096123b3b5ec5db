//! Byte channels to the remote device.
//!
//! - **serial**: Unix serial device (termios, `poll` based reads)
//! - **tcp**: raw TCP socket, selected with `socket://host:port`
//!
//! Line settings and modem control lines are a separate capability,
//! [`PortControl`], reached through [`Transport::control`]. Only the serial
//! backend has it.
//!
//! Reads block for at most the configured poll timeout and return an empty
//! buffer on timeout or after [`Transport::cancel_pending_read`], so the
//! session reader can re-check its running flag.

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(unix)]
pub mod serial;
pub mod tcp;

#[cfg(unix)]
pub use serial::SerialPort;
pub use tcp::TcpTransport;

/// URL scheme selecting the TCP backend
pub const SOCKET_SCHEME: &str = "socket://";

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("could not open port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("could not configure port: {0}")]
    Configure(String),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("connection closed by remote")]
    Closed,

    #[error("invalid port URL: {0}")]
    InvalidUrl(String),

    #[error("modem control failed: {0}")]
    Control(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Byte channel capability
pub trait Transport: Send + Sync {
    /// Read up to `max` bytes.
    ///
    /// Returns an empty buffer when nothing arrived within the poll timeout
    /// or the read was cancelled.
    fn read(&self, max: usize) -> Result<Vec<u8>>;

    fn write(&self, data: &[u8]) -> Result<()>;

    /// Make a pending [`Transport::read`] return early. Idempotent.
    fn cancel_pending_read(&self);

    /// Port name for messages
    fn name(&self) -> String;

    /// Line settings and modem lines, if the backend has them
    fn control(&self) -> Option<&dyn PortControl> {
        None
    }
}

/// Runtime access to line settings and modem control lines
pub trait PortControl: Send + Sync {
    fn settings(&self) -> PortSettings;

    /// Reconfigure the line. On failure the previous settings stay active.
    fn apply_settings(&self, settings: &PortSettings) -> Result<()>;

    fn rts(&self) -> bool;
    fn set_rts(&self, active: bool) -> Result<()>;

    fn dtr(&self) -> bool;
    fn set_dtr(&self, active: bool) -> Result<()>;

    fn break_condition(&self) -> bool;
    fn set_break(&self, active: bool) -> Result<()>;

    /// Current state of the input lines
    fn modem_lines(&self) -> Result<ModemLines>;
}

/// Modem status inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModemLines {
    pub cts: bool,
    pub dsr: bool,
    pub ri: bool,
    pub cd: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    pub fn bits(self) -> u8 {
        match self {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            _ => Err(format!("invalid data bits: {} (expected 5 to 8)", bits)),
        }
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopBits::One => "1",
            StopBits::OnePointFive => "1.5",
            StopBits::Two => "2",
        })
    }
}

impl FromStr for StopBits {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(StopBits::One),
            "1.5" => Ok(StopBits::OnePointFive),
            "2" => Ok(StopBits::Two),
            _ => Err(format!("invalid stop bits: {} (expected 1, 1.5 or 2)", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    #[serde(rename = "N")]
    None,
    #[serde(rename = "E")]
    Even,
    #[serde(rename = "O")]
    Odd,
    #[serde(rename = "S")]
    Space,
    #[serde(rename = "M")]
    Mark,
}

impl Parity {
    pub fn letter(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
            Parity::Space => 'S',
            Parity::Mark => 'M',
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "N" => Ok(Parity::None),
            "E" => Ok(Parity::Even),
            "O" => Ok(Parity::Odd),
            "S" => Ok(Parity::Space),
            "M" => Ok(Parity::Mark),
            _ => Err(format!("invalid parity: {} (expected N, E, O, S or M)", s)),
        }
    }
}

/// Line settings for the serial backend; the TCP backend only uses `timeout`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    pub baudrate: u32,
    pub bytesize: DataBits,
    pub parity: Parity,
    pub stopbits: StopBits,
    pub rtscts: bool,
    pub xonxoff: bool,
    /// Poll timeout of a single read
    pub timeout: Duration,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baudrate: 9600,
            bytesize: DataBits::Eight,
            parity: Parity::None,
            stopbits: StopBits::One,
            rtscts: false,
            xonxoff: false,
            timeout: Duration::from_millis(200),
        }
    }
}

/// `9600,8,N,1` style summary
impl fmt::Display for PortSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.baudrate, self.bytesize, self.parity, self.stopbits
        )
    }
}

/// Open `port`: `socket://host:port` connects over TCP, anything else is a
/// serial device path
pub fn open(port: &str, settings: &PortSettings) -> Result<Arc<dyn Transport>> {
    if let Some(address) = port.strip_prefix(SOCKET_SCHEME) {
        tracing::info!("Connecting to {}", address);
        return Ok(Arc::new(TcpTransport::connect(address, settings.timeout)?));
    }

    #[cfg(unix)]
    {
        tracing::info!("Opening serial port {} at {} baud", port, settings.baudrate);
        Ok(Arc::new(SerialPort::open(port, settings)?))
    }

    #[cfg(not(unix))]
    {
        Err(TransportError::InvalidUrl(format!(
            "{} (only {}host:port is supported on this platform)",
            port, SOCKET_SCHEME
        )))
    }
}
