//! serterm - serial terminal with VT220 escape sequence support
//!
//! # Quick Start
//!
//! ```text
//! serterm /dev/ttyUSB0 115200        # Serial port at 115200 baud
//! serterm socket://192.168.0.7:2217  # Raw TCP connection
//! serterm --list-filters             # Show available text filters
//! ```
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Ctrl+] | Exit |
//! | Ctrl+T | Menu, followed by Ctrl+H for help |

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use serterm::config::{CliArgs, Config, Settings};
use serterm::core::session::Session;
use serterm::core::transform::{Filter, TransformChain};
use serterm::core::transport::{self, Transport};
use serterm::features::{self, startup};
use serterm::ui::console::RawModeGuard;
use serterm::ui::{ConsoleDisplay, ConsoleKeyboard, Display};

/// Keyboard poll interval; bounds how long a cancelled key read may take
const KEY_POLL: Duration = Duration::from_millis(50);

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    if args.list_filters {
        println!("Available filters:");
        for filter in Filter::ALL {
            println!("  {:<10} = {}", filter.name(), filter.description());
        }
        return Ok(());
    }

    init_logging();
    info!("serterm {} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("could not load config {}", path.display()))?,
        None => Config::load()?,
    };
    config.apply_cli(&args);
    let settings = config.resolve()?;

    let port = settings
        .port
        .clone()
        .context("no port given (pass PORT or set `port` in the config file)")?;
    let transport = transport::open(&port, &settings.port_settings)
        .with_context(|| format!("could not open port {}", port))?;

    let result = run_terminal(transport, &settings, &port);
    if let Err(e) = &result {
        error!("serterm exited with error: {:#}", e);
    }
    info!("serterm exiting");
    result
}

/// Log to `~/.serterm/serterm.log`, stdout belongs to the remote side
fn init_logging() {
    let log_path = Config::log_path().unwrap_or_else(|| PathBuf::from("serterm.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Run an interactive session until the exit key or a transport failure
fn run_terminal(
    transport: Arc<dyn Transport>,
    settings: &Settings,
    port: &str,
) -> anyhow::Result<()> {
    let mut raw_mode = RawModeGuard::new().context("could not switch console to raw mode")?;

    // Created before the keyboard thread starts reading stdin
    let display: Arc<dyn Display> = Arc::new(ConsoleDisplay::new());
    let keyboard = Arc::new(ConsoleKeyboard::new(KEY_POLL));

    let forced = startup::force_lines(transport.as_ref(), settings.rts, settings.dtr)
        .context("could not set modem lines")?;
    display.write(&forced);

    let mut session = Session::new(transport, display.clone(), keyboard);
    session.set_chain(TransformChain::new(settings.eol, &settings.filters))?;
    session.set_echo(settings.echo)?;
    session.set_encoding(settings.encoding)?;
    features::install(&mut session, &settings.keys)?;

    let port_info = settings.port_info(port);
    display.write(&startup::banner(&port_info, &settings.keys));
    session.start()?;
    let result = session.join();
    display.write(startup::EXIT_MESSAGE);

    raw_mode.release()?;
    result?;
    Ok(())
}
