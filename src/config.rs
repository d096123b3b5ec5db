//! Configuration management for serterm.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.serterm/config.toml`
//! - Command line arguments
//! - Validation into the typed [`Settings`] the session is built from
//!
//! Command line options override the file, the file overrides defaults.
//!
//! # Configuration File
//!
//! ```toml
//! port = "/dev/ttyUSB0"
//! baudrate = 115200
//! bytesize = 8
//! parity = "N"
//! stopbits = "1"
//! rtscts = false
//! xonxoff = false
//! # Force the modem lines after opening, omit to leave them alone
//! dtr = true
//! rts = false
//! encoding = "UTF-8"
//!
//! echo = false
//! eol = "crlf"
//! filters = ["default"]
//!
//! exit_key = "Ctrl+]"
//! menu_key = "Ctrl+T"
//!
//! # Transport poll timeout in milliseconds
//! poll_timeout_ms = 200
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::term::Encoding;
use crate::core::transform::{EolMode, Filter};
use crate::core::transport::{DataBits, Parity, PortSettings, StopBits};
use crate::features::{SessionKeys, EXIT_KEY, MENU_KEY};

/// Directory under the home directory holding config and log files
const CONFIG_DIR: &str = ".serterm";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    #[error("unknown EOL mode: {0}")]
    UnknownEol(String),

    #[error("invalid parity: {0}")]
    InvalidParity(String),

    #[error("invalid data bits: {0}")]
    InvalidDataBits(u8),

    #[error("invalid stop bits: {0}")]
    InvalidStopBits(String),

    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("invalid hotkey: {0}")]
    InvalidKey(String),

    #[error("could not determine home directory")]
    NoHome,
}

/// Command line arguments
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "serterm")]
#[command(version)]
#[command(about = "Serial terminal with VT220 escape sequence support", long_about = None)]
pub struct CliArgs {
    /// Serial port device, or socket://host:port
    #[arg(value_name = "PORT")]
    pub port: Option<String>,

    /// Baud rate
    #[arg(value_name = "BAUDRATE")]
    pub baudrate: Option<u32>,

    /// Parity: N, E, O, S or M
    #[arg(long, value_name = "N|E|O|S|M")]
    pub parity: Option<String>,

    /// Enable RTS/CTS flow control
    #[arg(long)]
    pub rtscts: bool,

    /// Enable software flow control
    #[arg(long)]
    pub xonxoff: bool,

    /// Set initial RTS line state
    #[arg(long, value_name = "0|1", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub rts: Option<u8>,

    /// Set initial DTR line state
    #[arg(long, value_name = "0|1", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub dtr: Option<u8>,

    /// Encoding of the serial line, e.g. UTF-8, Latin1, ASCII
    #[arg(long, value_name = "CODEC")]
    pub encoding: Option<String>,

    /// Enable local echo
    #[arg(short, long)]
    pub echo: bool,

    /// Text filter (repeatable)
    #[arg(short = 'f', long = "filter", value_name = "NAME")]
    pub filters: Vec<String>,

    /// End of line mode: CR, LF or CRLF
    #[arg(long, value_name = "MODE")]
    pub eol: Option<String>,

    /// Key that exits the program
    #[arg(long, value_name = "KEY")]
    pub exit_key: Option<String>,

    /// Key that opens the menu
    #[arg(long, value_name = "KEY")]
    pub menu_key: Option<String>,

    /// Path to custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// List available filters and exit
    #[arg(long)]
    pub list_filters: bool,
}

/// Main configuration, as stored in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to open when none is given on the command line
    pub port: Option<String>,
    pub baudrate: u32,
    pub bytesize: u8,
    pub parity: String,
    pub stopbits: String,
    pub rtscts: bool,
    pub xonxoff: bool,
    /// RTS state forced after opening
    pub rts: Option<bool>,
    /// DTR state forced after opening
    pub dtr: Option<bool>,
    pub encoding: String,
    /// Local echo
    pub echo: bool,
    pub eol: String,
    pub filters: Vec<String>,
    pub exit_key: String,
    pub menu_key: String,
    pub poll_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: None,
            baudrate: 9600,
            bytesize: 8,
            parity: "N".to_string(),
            stopbits: "1".to_string(),
            rtscts: false,
            xonxoff: false,
            rts: None,
            dtr: None,
            encoding: Encoding::Utf8.name().to_string(),
            echo: false,
            eol: EolMode::Crlf.name().to_string(),
            filters: vec![Filter::Default.name().to_string()],
            exit_key: EXIT_KEY.to_string(),
            menu_key: MENU_KEY.to_string(),
            poll_timeout_ms: 200,
        }
    }
}

/// Validated settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: Option<String>,
    pub port_settings: PortSettings,
    pub rts: Option<bool>,
    pub dtr: Option<bool>,
    pub encoding: Encoding,
    pub echo: bool,
    pub eol: EolMode,
    pub filters: Vec<Filter>,
    pub keys: SessionKeys,
}

impl Settings {
    /// Port line for the startup banner and menu
    pub fn port_info(&self, port: &str) -> String {
        if port.starts_with(crate::core::transport::SOCKET_SCHEME) {
            return port.to_string();
        }
        format!("{}  {}", port, self.port_settings)
    }
}

impl Config {
    /// Load from the default path; a missing file yields the defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoHome)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.serterm`
    pub fn config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(CONFIG_DIR))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("serterm.log"))
    }

    /// Override file values with those given on the command line
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(port) = &args.port {
            self.port = Some(port.clone());
        }
        if let Some(baudrate) = args.baudrate {
            self.baudrate = baudrate;
        }
        if let Some(parity) = &args.parity {
            self.parity = parity.clone();
        }
        self.rtscts |= args.rtscts;
        self.xonxoff |= args.xonxoff;
        if let Some(rts) = args.rts {
            self.rts = Some(rts == 1);
        }
        if let Some(dtr) = args.dtr {
            self.dtr = Some(dtr == 1);
        }
        if let Some(encoding) = &args.encoding {
            self.encoding = encoding.clone();
        }
        self.echo |= args.echo;
        if !args.filters.is_empty() {
            self.filters = args.filters.clone();
        }
        if let Some(eol) = &args.eol {
            self.eol = eol.clone();
        }
        if let Some(key) = &args.exit_key {
            self.exit_key = key.clone();
        }
        if let Some(key) = &args.menu_key {
            self.menu_key = key.clone();
        }
    }

    /// Check names and build typed settings
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let parity = self
            .parity
            .parse::<Parity>()
            .map_err(|_| ConfigError::InvalidParity(self.parity.clone()))?;
        let bytesize = DataBits::try_from(self.bytesize)
            .map_err(|_| ConfigError::InvalidDataBits(self.bytesize))?;
        let stopbits = self
            .stopbits
            .parse::<StopBits>()
            .map_err(|_| ConfigError::InvalidStopBits(self.stopbits.clone()))?;
        let encoding = self
            .encoding
            .parse::<Encoding>()
            .map_err(|_| ConfigError::UnknownEncoding(self.encoding.clone()))?;
        let eol = self
            .eol
            .parse::<EolMode>()
            .map_err(|_| ConfigError::UnknownEol(self.eol.clone()))?;
        let filters = self
            .filters
            .iter()
            .map(|name| {
                name.parse::<Filter>()
                    .map_err(|_| ConfigError::UnknownFilter(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if self.exit_key.is_empty() {
            return Err(ConfigError::InvalidKey("exit key is empty".to_string()));
        }
        if self.menu_key.is_empty() {
            return Err(ConfigError::InvalidKey("menu key is empty".to_string()));
        }
        if self.exit_key == self.menu_key {
            return Err(ConfigError::InvalidKey(format!(
                "exit and menu key are both {}",
                self.exit_key
            )));
        }

        Ok(Settings {
            port: self.port.clone(),
            port_settings: PortSettings {
                baudrate: self.baudrate,
                bytesize,
                parity,
                stopbits,
                rtscts: self.rtscts,
                xonxoff: self.xonxoff,
                timeout: Duration::from_millis(self.poll_timeout_ms),
            },
            rts: self.rts,
            dtr: self.dtr,
            encoding,
            echo: self.echo,
            eol,
            filters,
            keys: SessionKeys {
                exit_key: self.exit_key.clone(),
                menu_key: self.menu_key.clone(),
            },
        })
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
