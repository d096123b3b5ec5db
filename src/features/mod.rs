//! Session features built on hotkeys: exit key, menu, startup banner.

use crate::core::session::{Session, SessionError};

pub mod menu;
pub mod startup;

pub use menu::Menu;

/// Default exit key
pub const EXIT_KEY: &str = "Ctrl+]";
/// Default menu key
pub const MENU_KEY: &str = "Ctrl+T";

/// Hotkey names used by the session features
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub exit_key: String,
    pub menu_key: String,
}

impl Default for SessionKeys {
    fn default() -> Self {
        Self {
            exit_key: EXIT_KEY.to_string(),
            menu_key: MENU_KEY.to_string(),
        }
    }
}

/// Bind the exit key and the menu to `session`
pub fn install(session: &mut Session, keys: &SessionKeys) -> Result<(), SessionError> {
    session.register_hotkey(&keys.exit_key, |out, _| {
        tracing::info!("Exit key pressed");
        out.stop();
        Ok(())
    })?;

    let menu = Menu::new(keys.clone());
    session.register_hotkey(&keys.menu_key, move |out, _| menu.handle(out))?;
    Ok(())
}
