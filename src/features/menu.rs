//! Menu hotkey
//!
//! The menu key reads one more key and runs the matching command:
//!
//! | Key               | Command                                   |
//! |-------------------|-------------------------------------------|
//! | menu / exit key   | send that key to the remote               |
//! | Ctrl+H, h, H, ?   | show help                                 |
//! | Ctrl+R, D, B      | toggle RTS, DTR, BREAK                    |
//! | Ctrl+E            | toggle local echo                         |
//! | Ctrl+L            | cycle EOL mode                            |
//! | Ctrl+F            | edit filters                              |
//! | Ctrl+A            | change line encoding                      |
//! | Tab               | show settings                             |
//! | b, B              | change baud rate                          |
//! | 7, 8              | data bits                                 |
//! | N E O S M         | parity                                    |
//! | 1, 2, 3           | stop bits 1, 2, 1.5                       |
//! | x / X, r / R      | software / hardware flow control off / on |
//! | q, Q              | quit                                      |
//!
//! Port commands need a transport with [`PortControl`]. A failed port
//! command is reported and the session continues.

use super::SessionKeys;
use crate::core::session::{Outbound, SessionError};
use crate::core::term::Encoding;
use crate::core::transform::Filter;
use crate::core::transport::{DataBits, Parity, PortControl, PortSettings, StopBits};

/// Modem output lines the menu toggles
#[derive(Debug, Clone, Copy)]
enum Line {
    Rts,
    Dtr,
    Break,
}

pub struct Menu {
    keys: SessionKeys,
}

fn state(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "inactive"
    }
}

impl Menu {
    pub fn new(keys: SessionKeys) -> Self {
        Self { keys }
    }

    /// Hotkey callback for the menu key
    pub fn handle(&self, out: &mut Outbound) -> Result<(), SessionError> {
        let Some(key) = out.get_key()? else {
            return Ok(());
        };

        match key.as_str() {
            k if k == self.keys.menu_key || k == self.keys.exit_key => out.send_key(k)?,
            "Ctrl+H" | "h" | "H" | "?" => out.message(&self.help_text()),
            "Ctrl+R" => self.toggle_line(out, Line::Rts),
            "Ctrl+D" => self.toggle_line(out, Line::Dtr),
            "Ctrl+B" => self.toggle_line(out, Line::Break),
            "Ctrl+A" => self.change_encoding(out)?,
            "Ctrl+E" => {
                let echo = !out.echo();
                out.set_echo(echo);
                out.message(&format!(
                    "--- local echo {} ---\n",
                    if echo { "active" } else { "inactive" }
                ));
            }
            "Ctrl+L" => {
                let eol = out.chain().eol().next();
                out.set_eol(eol);
                out.message(&format!("--- EOL: {} ---\n", eol.name().to_uppercase()));
            }
            "Ctrl+F" => self.edit_filters(out)?,
            "Tab" | "\t" => self.dump_settings(out),
            "b" | "B" => self.change_baudrate(out)?,
            "7" => self.change_settings(out, |s| s.bytesize = DataBits::Seven),
            "8" => self.change_settings(out, |s| s.bytesize = DataBits::Eight),
            "n" | "N" => self.change_settings(out, |s| s.parity = Parity::None),
            "e" | "E" => self.change_settings(out, |s| s.parity = Parity::Even),
            "o" | "O" => self.change_settings(out, |s| s.parity = Parity::Odd),
            "s" | "S" => self.change_settings(out, |s| s.parity = Parity::Space),
            "m" | "M" => self.change_settings(out, |s| s.parity = Parity::Mark),
            "1" => self.change_settings(out, |s| s.stopbits = StopBits::One),
            "2" => self.change_settings(out, |s| s.stopbits = StopBits::Two),
            "3" => self.change_settings(out, |s| s.stopbits = StopBits::OnePointFive),
            "x" | "X" => {
                let on = key == "X";
                self.change_settings(out, |s| s.xonxoff = on)
            }
            "r" | "R" => {
                let on = key == "R";
                self.change_settings(out, |s| s.rtscts = on)
            }
            "q" | "Q" => out.stop(),
            other => {
                tracing::debug!("Unknown menu key {:?}", other);
                out.message(&format!("--- unknown menu key {} ---\n", other.escape_debug()));
            }
        }
        Ok(())
    }

    fn toggle_line(&self, out: &Outbound, line: Line) {
        let transport = out.transport();
        let Some(control) = transport.control() else {
            self.no_port_control(out);
            return;
        };

        let (name, result) = match line {
            Line::Rts => ("RTS", control.set_rts(!control.rts()).map(|_| control.rts())),
            Line::Dtr => ("DTR", control.set_dtr(!control.dtr()).map(|_| control.dtr())),
            Line::Break => (
                "BREAK",
                control
                    .set_break(!control.break_condition())
                    .map(|_| control.break_condition()),
            ),
        };
        match result {
            Ok(active) => out.message(&format!("--- {} {} ---\n", name, state(active))),
            Err(e) => {
                tracing::warn!("Toggling {} failed: {}", name, e);
                out.message(&format!("--- ERROR setting {}: {} ---\n", name, e));
            }
        }
    }

    /// Apply `change` to a copy of the port settings, then show them
    fn change_settings(&self, out: &Outbound, change: impl FnOnce(&mut PortSettings)) {
        let transport = out.transport();
        let Some(control) = transport.control() else {
            self.no_port_control(out);
            return;
        };

        let mut settings = control.settings();
        change(&mut settings);
        match control.apply_settings(&settings) {
            Ok(()) => self.dump_settings(out),
            Err(e) => {
                tracing::warn!("Changing port settings failed: {}", e);
                out.message(&format!("--- ERROR setting port: {} ---\n", e));
            }
        }
    }

    fn change_baudrate(&self, out: &mut Outbound) -> Result<(), SessionError> {
        if out.transport().control().is_none() {
            self.no_port_control(out);
            return Ok(());
        }

        let Some(answer) = out.ask_string("\n--- Baudrate: ")? else {
            return Ok(());
        };
        match answer.trim().parse::<u32>() {
            Ok(baudrate) => self.change_settings(out, |s| s.baudrate = baudrate),
            Err(e) => out.message(&format!("--- ERROR setting baudrate: {} ---\n", e)),
        }
        Ok(())
    }

    fn change_encoding(&self, out: &mut Outbound) -> Result<(), SessionError> {
        let prompt = format!("\n--- Enter new encoding name [{}]: ", out.encoding());
        if let Some(answer) = out.ask_string(&prompt)? {
            let name = answer.trim();
            if !name.is_empty() {
                match name.parse::<Encoding>() {
                    Ok(encoding) => out.set_encoding(encoding),
                    Err(e) => out.message(&format!("--- {}\n", e)),
                }
            }
        }
        self.show_encoding(out);
        Ok(())
    }

    fn show_encoding(&self, out: &Outbound) {
        out.message(&format!("--- serial input encoding: {}\n", out.encoding()));
        out.message(&format!("--- serial output encoding: {}\n", out.encoding()));
    }

    fn no_port_control(&self, out: &Outbound) {
        out.message(&format!(
            "--- {} has no port settings ---\n",
            out.transport_name()
        ));
    }

    fn edit_filters(&self, out: &mut Outbound) -> Result<(), SessionError> {
        out.message("\n--- Available Filters:\n");
        for filter in Filter::ALL {
            out.message(&format!("---   {:<10} = {}\n", filter.name(), filter.description()));
        }

        let prompt = format!(
            "--- Enter new filter name(s) [{}]: ",
            out.chain().filter_names()
        );
        if let Some(answer) = out.ask_string(&prompt)? {
            let names: Vec<&str> = answer.split_whitespace().collect();
            if !names.is_empty() {
                match names
                    .iter()
                    .map(|name| name.parse::<Filter>())
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(filters) => out.set_filters(&filters),
                    Err(e) => out.message(&format!("--- {} ---\n", e)),
                }
            }
        }

        out.message(&format!("--- filters: {}\n", out.chain().filter_names()));
        Ok(())
    }

    fn dump_settings(&self, out: &Outbound) {
        let transport = out.transport();
        match transport.control() {
            Some(control) => self.dump_port(out, control),
            None => out.message(&format!("\n--- Settings: {}\n", out.transport_name())),
        }
        self.show_encoding(out);
        out.message(&format!(
            "--- EOL: {}\n",
            out.chain().eol().name().to_uppercase()
        ));
        out.message(&format!("--- filters: {}\n", out.chain().filter_names()));
        out.message(&format!(
            "--- local echo: {}\n",
            if out.echo() { "active" } else { "inactive" }
        ));
    }

    fn dump_port(&self, out: &Outbound, control: &dyn PortControl) {
        let settings = control.settings();
        out.message(&format!(
            "\n--- Settings: {}  {}\n",
            out.transport_name(),
            settings
        ));
        out.message(&format!(
            "--- RTS: {:8}  DTR: {:8}  BREAK: {:8}\n",
            state(control.rts()),
            state(control.dtr()),
            state(control.break_condition())
        ));
        match control.modem_lines() {
            Ok(lines) => out.message(&format!(
                "--- CTS: {:8}  DSR: {:8}  RI: {:8}  CD: {:8}\n",
                state(lines.cts),
                state(lines.dsr),
                state(lines.ri),
                state(lines.cd)
            )),
            // Not every device reports its input lines
            Err(e) => tracing::debug!("Modem lines unavailable: {}", e),
        }
        out.message(&format!(
            "--- software flow control: {}\n",
            state(settings.xonxoff)
        ));
        out.message(&format!(
            "--- hardware flow control: {}\n",
            state(settings.rtscts)
        ));
    }

    fn help_text(&self) -> String {
        let exit = &self.keys.exit_key;
        let menu = &self.keys.menu_key;
        format!(
            "
--- serterm ({version}) - help
---
--- {exit:8} or {menu} Q  Exit program
--- {menu:8} Menu escape key, followed by:
--- Menu keys:
---    {menu:7} Send the menu character itself to remote
---    {exit:7} Send the exit character itself to remote
---    Tab     Show settings
---    Ctrl+A  Change encoding
---    Ctrl+F  Edit filters
--- Toggles:
---    Ctrl+R  RTS    Ctrl+D  DTR    Ctrl+B  BREAK
---    Ctrl+E  echo   Ctrl+L  EOL
---
--- Port settings ({menu} followed by the following):
---    7 8        set data bits
---    N E O S M  change parity (None, Even, Odd, Space, Mark)
---    1 2 3      set stop bits (1, 2, 1.5)
---    b          change baud rate
---    x X        disable/enable software flow control
---    r R        disable/enable hardware flow control
",
            version = env!("CARGO_PKG_VERSION"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::{install, SessionKeys};
    use crate::core::session::Session;
    use crate::core::term::Encoding;
    use crate::core::transport::{
        DataBits, ModemLines, Parity, PortControl, PortSettings, StopBits, Transport,
    };
    use crate::testing::{MockKeyboard, MockTransport, RecordingDisplay};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    struct Run {
        transport: Arc<MockTransport>,
        display: Arc<RecordingDisplay>,
    }

    /// Run the session until all keys are consumed and the effects settle
    fn run(keys: &[&str]) -> Run {
        run_on(MockTransport::with_port(), keys)
    }

    fn run_on(transport: MockTransport, keys: &[&str]) -> Run {
        let transport = Arc::new(transport);
        let keyboard = Arc::new(MockKeyboard::new(keys));
        let display = Arc::new(RecordingDisplay::new(0, 0, 80, 24));
        let mut session = Session::new(transport.clone(), display.clone(), keyboard.clone());
        install(&mut session, &SessionKeys::default()).unwrap();
        session.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while keyboard.remaining() > 0 && session.is_alive() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(5));
        }
        // let the writer finish the last key
        thread::sleep(Duration::from_millis(50));
        session.stop();
        session.join().unwrap();
        Run { transport, display }
    }

    fn chars(text: &str) -> Vec<String> {
        text.chars().map(|c| c.to_string()).collect()
    }

    /// Menu key, `command`, then the typed answer and Enter
    fn prompt_keys(command: &str, answer: &str) -> Vec<String> {
        let mut keys = vec!["Ctrl+T".to_string(), command.to_string()];
        keys.extend(chars(answer));
        keys.push("\n".to_string());
        keys
    }

    fn as_strs(keys: &[String]) -> Vec<&str> {
        keys.iter().map(String::as_str).collect()
    }

    fn port_settings(r: &Run) -> PortSettings {
        r.transport.port().settings()
    }

    #[test]
    fn test_menu_key_twice_sends_it() {
        let r = run(&["Ctrl+T", "Ctrl+T", "Ctrl+T", "Ctrl+]"]);
        assert_eq!(r.transport.written(), b"\x14\x1d");
    }

    #[test]
    fn test_toggle_echo() {
        let r = run(&["Ctrl+T", "Ctrl+E", "x"]);
        let text = r.display.written();
        assert!(text.contains("--- local echo active ---\r\n"));
        assert!(text.ends_with('x'));
        assert_eq!(r.transport.written(), b"x");
    }

    #[test]
    fn test_cycle_eol() {
        let r = run(&["Ctrl+T", "Ctrl+L", "\n", "Ctrl+T", "Ctrl+L", "\n"]);
        assert_eq!(r.transport.written(), b"\r\n");
        let text = r.display.written();
        assert!(text.contains("--- EOL: CR ---"));
        assert!(text.contains("--- EOL: LF ---"));
    }

    #[test]
    fn test_edit_filters() {
        let mut keys = vec!["Ctrl+T".to_string(), "Ctrl+F".to_string()];
        keys.extend(chars("nocontrol direct"));
        keys.push("\n".to_string());
        keys.extend(["Ctrl+T".to_string(), "Tab".to_string()]);
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();

        let r = run(&keys);
        let text = r.display.written();
        assert!(text.contains("---   colorize   = apply different colors"));
        assert!(text.contains("Enter new filter name(s) [default]: "));
        assert!(text.contains("--- filters: nocontrol direct\r\n"));
        assert!(text.contains("--- Settings: mock  9600,8,N,1"));
        assert!(r.transport.written().is_empty());
    }

    #[test]
    fn test_edit_filters_rejects_unknown() {
        let mut keys = vec!["Ctrl+T".to_string(), "Ctrl+F".to_string()];
        keys.extend(chars("bogus"));
        keys.push("\n".to_string());
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();

        let text = run(&keys).display.written();
        assert!(text.contains("--- unknown filter: bogus ---"));
        assert!(text.contains("--- filters: default\r\n"));
    }

    #[test]
    fn test_help_and_unknown_key() {
        let text = run(&["Ctrl+T", "?", "Ctrl+T", "z"]).display.written();
        assert!(text.contains("Ctrl+T followed by") || text.contains("Menu escape key"));
        assert!(text.contains("--- unknown menu key z ---"));
    }

    #[test]
    fn test_quit() {
        let transport = Arc::new(MockTransport::new());
        let keyboard = Arc::new(MockKeyboard::new(&["Ctrl+T", "q", "a"]));
        let display = Arc::new(RecordingDisplay::new(0, 0, 80, 24));
        let mut session = Session::new(transport.clone(), display, keyboard.clone());
        install(&mut session, &SessionKeys::default()).unwrap();
        session.start().unwrap();
        session.join().unwrap();

        assert!(transport.written().is_empty());
        assert_eq!(keyboard.remaining(), 1);
    }

    #[test]
    fn test_toggle_modem_lines() {
        let r = run(&["Ctrl+T", "Ctrl+R", "Ctrl+T", "Ctrl+D", "Ctrl+T", "Ctrl+B"]);
        let text = r.display.written();
        assert!(text.contains("--- RTS inactive ---\r\n"));
        assert!(text.contains("--- DTR inactive ---\r\n"));
        assert!(text.contains("--- BREAK active ---\r\n"));

        let port = r.transport.port();
        assert!(!port.rts());
        assert!(!port.dtr());
        assert!(port.break_condition());
    }

    #[test]
    fn test_toggle_failure_is_reported() {
        let transport = MockTransport::with_port();
        transport.port().fail_control();
        let r = run_on(transport, &["Ctrl+T", "Ctrl+R", "x"]);

        assert!(r.display.written().contains("--- ERROR setting RTS: modem control failed"));
        assert!(r.transport.port().rts());
        // the session keeps going
        assert_eq!(r.transport.written(), b"x");
    }

    #[test]
    fn test_framing_keys() {
        let r = run(&["Ctrl+T", "7", "Ctrl+T", "E", "Ctrl+T", "2"]);
        let settings = port_settings(&r);
        assert_eq!(settings.bytesize, DataBits::Seven);
        assert_eq!(settings.parity, Parity::Even);
        assert_eq!(settings.stopbits, StopBits::Two);
        assert!(r.display.written().contains("--- Settings: mock  9600,7,E,2\r\n"));

        let r = run(&["Ctrl+T", "m", "Ctrl+T", "3", "Ctrl+T", "s", "Ctrl+T", "8"]);
        let settings = port_settings(&r);
        assert_eq!(settings.parity, Parity::Space);
        assert_eq!(settings.stopbits, StopBits::OnePointFive);
        assert_eq!(settings.bytesize, DataBits::Eight);

        let r = run(&["Ctrl+T", "o", "Ctrl+T", "N", "Ctrl+T", "1"]);
        assert_eq!(port_settings(&r), PortSettings::default());
    }

    #[test]
    fn test_flow_control_keys() {
        let r = run(&["Ctrl+T", "X", "Ctrl+T", "R"]);
        let settings = port_settings(&r);
        assert!(settings.xonxoff);
        assert!(settings.rtscts);
        let text = r.display.written();
        assert!(text.contains("--- software flow control: active\r\n"));
        assert!(text.contains("--- hardware flow control: active\r\n"));

        let r = run(&["Ctrl+T", "X", "Ctrl+T", "x", "Ctrl+T", "r"]);
        let settings = port_settings(&r);
        assert!(!settings.xonxoff);
        assert!(!settings.rtscts);
    }

    #[test]
    fn test_change_baudrate() {
        let keys = prompt_keys("b", "115200");
        let r = run(&as_strs(&keys));
        assert_eq!(port_settings(&r).baudrate, 115200);
        let text = r.display.written();
        assert!(text.contains("--- Baudrate: 115200\r\n"));
        assert!(text.contains("--- Settings: mock  115200,8,N,1"));
    }

    #[test]
    fn test_bad_baudrate_keeps_old() {
        let keys = prompt_keys("B", "fast");
        let r = run(&as_strs(&keys));
        assert_eq!(port_settings(&r).baudrate, 9600);
        assert!(r.display.written().contains("--- ERROR setting baudrate: invalid digit"));

        // parses, but the port refuses it
        let keys = prompt_keys("b", "0");
        let r = run(&as_strs(&keys));
        assert_eq!(port_settings(&r).baudrate, 9600);
        assert!(r
            .display
            .written()
            .contains("--- ERROR setting port: could not configure port: unsupported baud rate 0 ---"));
    }

    #[test]
    fn test_change_encoding() {
        let mut keys = prompt_keys("Ctrl+A", "latin1");
        keys.push("é".to_string());
        let r = run(&as_strs(&keys));
        let text = r.display.written();
        assert!(text.contains("--- Enter new encoding name [UTF-8]: latin1\r\n"));
        assert!(text.contains("--- serial input encoding: ISO-8859-1\r\n"));
        assert!(text.contains("--- serial output encoding: ISO-8859-1\r\n"));
        assert_eq!(r.transport.written(), vec![0xe9]);
    }

    #[test]
    fn test_invalid_encoding_name() {
        let keys = prompt_keys("Ctrl+A", "ebcdic");
        let r = run(&as_strs(&keys));
        let text = r.display.written();
        assert!(text.contains("--- invalid encoding name: ebcdic\r\n"));
        assert!(text.contains(&format!("--- serial input encoding: {}\r\n", Encoding::Utf8)));
    }

    #[test]
    fn test_dump_modem_lines() {
        let transport = MockTransport::with_port();
        transport.port().set_lines(ModemLines {
            cts: true,
            cd: true,
            ..ModemLines::default()
        });
        let text = run_on(transport, &["Ctrl+T", "Tab"]).display.written();
        assert!(text.contains("--- RTS: active    DTR: active    BREAK: inactive\r\n"));
        assert!(text.contains("--- CTS: active    DSR: inactive  RI: inactive  CD: active  \r\n"));
        assert!(text.contains("--- serial output encoding: UTF-8\r\n"));
        assert!(text.contains("--- local echo: inactive\r\n"));
    }

    #[test]
    fn test_dump_skips_unavailable_lines() {
        let transport = MockTransport::with_port();
        transport.port().fail_control();
        let text = run_on(transport, &["Ctrl+T", "Tab"]).display.written();
        assert!(text.contains("--- RTS: active"));
        assert!(!text.contains("--- CTS:"));
        assert!(text.contains("--- software flow control: inactive"));
    }

    #[test]
    fn test_port_keys_without_port_control() {
        let r = run_on(MockTransport::new(), &["Ctrl+T", "7", "Ctrl+T", "Ctrl+R", "Ctrl+T", "Tab"]);
        let text = r.display.written();
        assert_eq!(text.matches("--- mock has no port settings ---").count(), 2);
        assert!(text.contains("--- Settings: mock\r\n"));
        assert!(r.transport.control().is_none());
    }
}
