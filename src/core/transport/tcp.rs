//! Raw TCP transport (`socket://host:port`)

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{Result, Transport, TransportError};

pub struct TcpTransport {
    stream: TcpStream,
    address: String,
    /// Set by cancel_pending_read, consumed by the next read
    cancelled: AtomicBool,
}

impl TcpTransport {
    /// Connect to `host:port`
    pub fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let valid = address
            .rsplit_once(':')
            .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
            .unwrap_or(false);
        if !valid {
            return Err(TransportError::InvalidUrl(address.to_string()));
        }

        let stream = TcpStream::connect(address).map_err(|source| TransportError::Open {
            port: address.to_string(),
            source,
        })?;
        Self::from_stream(stream, address, timeout)
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream, address: &str, timeout: Duration) -> Result<Self> {
        // A zero timeout would mean "block forever"
        let timeout = timeout.max(Duration::from_millis(1));
        stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| TransportError::Configure(e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::Configure(e.to_string()))?;

        Ok(Self {
            stream,
            address: address.to_string(),
            cancelled: AtomicBool::new(false),
        })
    }
}

impl Transport for TcpTransport {
    fn read(&self, max: usize) -> Result<Vec<u8>> {
        if self.cancelled.swap(false, Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; max.max(1)];
        match (&self.stream).read(&mut buffer) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                self.cancelled.store(false, Ordering::SeqCst);
                Ok(Vec::new())
            }
            Err(e) => Err(TransportError::Read(e)),
        }
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        (&self.stream).write_all(data).map_err(TransportError::Write)?;
        (&self.stream).flush().map_err(TransportError::Write)
    }

    fn cancel_pending_read(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> String {
        format!("socket://{}", self.address)
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
