//! Startup and exit messages

use super::SessionKeys;
use crate::core::transport::{Transport, TransportError};

/// Banner written before the session starts
pub fn banner(port_info: &str, keys: &SessionKeys) -> String {
    format!(
        "--- serterm on {} ---\r\n--- Quit: {} | Menu: {} | Help: {} followed by Ctrl+H ---\r\n",
        port_info, keys.exit_key, keys.menu_key, keys.menu_key
    )
}

/// Force DTR, then RTS, to the requested state before the session starts.
///
/// Returns the messages to show. A transport without modem lines ignores
/// the request with a note.
pub fn force_lines(
    transport: &dyn Transport,
    rts: Option<bool>,
    dtr: Option<bool>,
) -> Result<String, TransportError> {
    if rts.is_none() && dtr.is_none() {
        return Ok(String::new());
    }
    let Some(control) = transport.control() else {
        tracing::warn!("{} has no modem lines, ignoring --rts/--dtr", transport.name());
        return Ok(format!(
            "--- {} has no modem lines, RTS/DTR unchanged ---\r\n",
            transport.name()
        ));
    };

    let mut text = String::new();
    if let Some(active) = dtr {
        text.push_str(&format!("--- forcing DTR {} ---\r\n", state(active)));
        control.set_dtr(active)?;
    }
    if let Some(active) = rts {
        text.push_str(&format!("--- forcing RTS {} ---\r\n", state(active)));
        control.set_rts(active)?;
    }
    Ok(text)
}

fn state(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "inactive"
    }
}

/// Written after the session ended
pub const EXIT_MESSAGE: &str = "\r\n--- exit ---\r\n";
