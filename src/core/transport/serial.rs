//! Serial device transport (Unix)
//!
//! The device is opened non-blocking and switched to raw mode. Reads wait in
//! `poll` for at most the configured timeout. Modem lines go through the
//! `TIOCM*` ioctls, which nix does not wrap.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::termios::{
    self, BaudRate, ControlFlags, InputFlags, SetArg, SpecialCharacterIndices,
};

use super::{
    DataBits, ModemLines, Parity, PortControl, PortSettings, Result, StopBits, Transport,
    TransportError,
};

/// Write readiness wait per attempt
const WRITE_POLL: Duration = Duration::from_millis(100);

#[cfg(target_os = "linux")]
const CMSPAR: ControlFlags = ControlFlags::from_bits_retain(libc::CMSPAR);

pub struct SerialPort {
    file: File,
    path: String,
    timeout: Duration,
    cancelled: AtomicBool,
    settings: Mutex<PortSettings>,
    rts: AtomicBool,
    dtr: AtomicBool,
    break_condition: AtomicBool,
}

impl SerialPort {
    pub fn open(path: &str, settings: &PortSettings) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags((OFlag::O_NOCTTY | OFlag::O_NONBLOCK).bits())
            .open(path)
            .map_err(|source| TransportError::Open {
                port: path.to_string(),
                source,
            })?;

        configure(&file, settings)?;

        let port = Self {
            file,
            path: path.to_string(),
            timeout: settings.timeout,
            cancelled: AtomicBool::new(false),
            settings: Mutex::new(settings.clone()),
            rts: AtomicBool::new(true),
            dtr: AtomicBool::new(true),
            break_condition: AtomicBool::new(false),
        };

        // Assert DTR and RTS like a freshly opened port. Devices without
        // modem lines (ptys, some USB bridges) reject the ioctl.
        for bit in [libc::TIOCM_DTR, libc::TIOCM_RTS] {
            if let Err(e) = port.modem_bit(bit, true) {
                tracing::debug!("{}: modem lines not available: {}", path, e);
                break;
            }
        }

        Ok(port)
    }

    /// Wait until the device is ready for `events`. Returns false on timeout.
    fn wait(&self, events: PollFlags, timeout: Duration) -> io::Result<bool> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let mut fds = [PollFd::new(self.file.as_fd(), events)];
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => Ok(false),
            Ok(_) => {
                let revents = fds[0].revents().unwrap_or(PollFlags::empty());
                if revents.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL) {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device error"));
                }
                Ok(true)
            }
            Err(Errno::EINTR) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Set or clear one `TIOCM_*` output bit
    fn modem_bit(&self, bit: libc::c_int, active: bool) -> io::Result<()> {
        let request = if active { libc::TIOCMBIS } else { libc::TIOCMBIC };
        let result = unsafe { libc::ioctl(self.file.as_raw_fd(), request, &bit) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn lock_settings(&self) -> std::sync::MutexGuard<'_, PortSettings> {
        self.settings.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for SerialPort {
    fn read(&self, max: usize) -> Result<Vec<u8>> {
        if self.cancelled.swap(false, Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        let ready = self
            .wait(PollFlags::POLLIN, self.timeout)
            .map_err(TransportError::Read)?;
        if !ready || self.cancelled.swap(false, Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; max.max(1)];
        match (&self.file).read(&mut buffer) {
            // Readable but no data: device went away (e.g. USB adapter unplugged)
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(TransportError::Read(e)),
        }
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < data.len() {
            match (&self.file).write(&data[written..]) {
                Ok(0) => {
                    return Err(TransportError::Write(io::Error::from(
                        io::ErrorKind::WriteZero,
                    )))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.wait(PollFlags::POLLOUT, WRITE_POLL)
                        .map_err(TransportError::Write)?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(TransportError::Write(e)),
            }
        }
        Ok(())
    }

    fn cancel_pending_read(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> String {
        self.path.clone()
    }

    fn control(&self) -> Option<&dyn PortControl> {
        Some(self)
    }
}

impl PortControl for SerialPort {
    fn settings(&self) -> PortSettings {
        self.lock_settings().clone()
    }

    fn apply_settings(&self, settings: &PortSettings) -> Result<()> {
        let mut current = self.lock_settings();
        configure(&self.file, settings)?;
        *current = settings.clone();
        Ok(())
    }

    fn rts(&self) -> bool {
        self.rts.load(Ordering::SeqCst)
    }

    fn set_rts(&self, active: bool) -> Result<()> {
        self.modem_bit(libc::TIOCM_RTS, active)
            .map_err(TransportError::Control)?;
        self.rts.store(active, Ordering::SeqCst);
        Ok(())
    }

    fn dtr(&self) -> bool {
        self.dtr.load(Ordering::SeqCst)
    }

    fn set_dtr(&self, active: bool) -> Result<()> {
        self.modem_bit(libc::TIOCM_DTR, active)
            .map_err(TransportError::Control)?;
        self.dtr.store(active, Ordering::SeqCst);
        Ok(())
    }

    fn break_condition(&self) -> bool {
        self.break_condition.load(Ordering::SeqCst)
    }

    fn set_break(&self, active: bool) -> Result<()> {
        let request = if active { libc::TIOCSBRK } else { libc::TIOCCBRK };
        let result = unsafe { libc::ioctl(self.file.as_raw_fd(), request) };
        if result < 0 {
            return Err(TransportError::Control(io::Error::last_os_error()));
        }
        self.break_condition.store(active, Ordering::SeqCst);
        Ok(())
    }

    fn modem_lines(&self) -> Result<ModemLines> {
        let mut bits: libc::c_int = 0;
        let result = unsafe { libc::ioctl(self.file.as_raw_fd(), libc::TIOCMGET, &mut bits) };
        if result < 0 {
            return Err(TransportError::Control(io::Error::last_os_error()));
        }
        Ok(ModemLines {
            cts: bits & libc::TIOCM_CTS != 0,
            dsr: bits & libc::TIOCM_DSR != 0,
            ri: bits & libc::TIOCM_RI != 0,
            cd: bits & libc::TIOCM_CD != 0,
        })
    }
}

fn baud_rate(baudrate: u32) -> Option<BaudRate> {
    let rate = match baudrate {
        50 => BaudRate::B50,
        75 => BaudRate::B75,
        110 => BaudRate::B110,
        134 => BaudRate::B134,
        150 => BaudRate::B150,
        200 => BaudRate::B200,
        300 => BaudRate::B300,
        600 => BaudRate::B600,
        1200 => BaudRate::B1200,
        1800 => BaudRate::B1800,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        #[cfg(target_os = "linux")]
        460800 => BaudRate::B460800,
        #[cfg(target_os = "linux")]
        921600 => BaudRate::B921600,
        _ => return None,
    };
    Some(rate)
}

/// Raw mode with the requested framing, speed and flow control
fn configure(file: &File, settings: &PortSettings) -> Result<()> {
    let configure_error = |e: Errno| TransportError::Configure(e.desc().to_string());

    let speed = baud_rate(settings.baudrate).ok_or_else(|| {
        TransportError::Configure(format!("unsupported baud rate {}", settings.baudrate))
    })?;

    let mut tio = termios::tcgetattr(file).map_err(configure_error)?;
    termios::cfmakeraw(&mut tio);
    tio.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;
    tio.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    tio.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

    tio.control_flags &= !ControlFlags::CSIZE;
    tio.control_flags |= match settings.bytesize {
        DataBits::Five => ControlFlags::CS5,
        DataBits::Six => ControlFlags::CS6,
        DataBits::Seven => ControlFlags::CS7,
        DataBits::Eight => ControlFlags::CS8,
    };

    // 1.5 stop bits only exist with 5 data bits, where CSTOPB selects them
    match settings.stopbits {
        StopBits::One => tio.control_flags &= !ControlFlags::CSTOPB,
        StopBits::OnePointFive | StopBits::Two => tio.control_flags |= ControlFlags::CSTOPB,
    }

    tio.control_flags &= !(ControlFlags::PARENB | ControlFlags::PARODD);
    #[cfg(target_os = "linux")]
    {
        tio.control_flags &= !CMSPAR;
    }
    match settings.parity {
        Parity::None => {}
        Parity::Even => tio.control_flags |= ControlFlags::PARENB,
        Parity::Odd => tio.control_flags |= ControlFlags::PARENB | ControlFlags::PARODD,
        #[cfg(target_os = "linux")]
        Parity::Mark => tio.control_flags |= ControlFlags::PARENB | CMSPAR | ControlFlags::PARODD,
        #[cfg(target_os = "linux")]
        Parity::Space => tio.control_flags |= ControlFlags::PARENB | CMSPAR,
        #[cfg(not(target_os = "linux"))]
        other => {
            return Err(TransportError::Configure(format!(
                "parity {} is not supported on this platform",
                other
            )))
        }
    }

    tio.control_flags.set(ControlFlags::CRTSCTS, settings.rtscts);
    if settings.xonxoff {
        tio.input_flags |= InputFlags::IXON | InputFlags::IXOFF;
    } else {
        tio.input_flags &= !(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);
    }

    termios::cfsetspeed(&mut tio, speed).map_err(configure_error)?;
    termios::tcsetattr(file, SetArg::TCSANOW, &tio).map_err(configure_error)?;

    tracing::debug!("Configured {:?}: {}", file, settings);
    Ok(())
}
