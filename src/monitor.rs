use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("unable to connect to monitor at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("monitor i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("monitor did not answer within {0:?}")]
    Timeout(Duration),
    #[error("screendump did not produce {0}")]
    Missing(PathBuf),
}

/// Client for the emulator's line-oriented human monitor on a Unix socket.
///
/// Each command opens a fresh connection, writes one line, half-closes and
/// collects whatever the monitor prints until it hangs up.
#[derive(Debug, Clone)]
pub struct MonitorClient {
    socket: PathBuf,
    timeout: Duration,
}

impl MonitorClient {
    pub fn new(socket: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket: socket.into(),
            timeout,
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Ask the emulator to write the current framebuffer to `target`.
    pub fn screendump(&self, target: &Path) -> Result<String, CaptureError> {
        self.command(&format!("screendump {}", target.display()))
    }

    #[cfg(unix)]
    pub fn command(&self, cmd: &str) -> Result<String, CaptureError> {
        use std::net::Shutdown;
        use std::os::unix::net::UnixStream;

        let deadline = Instant::now() + self.timeout;
        let mut stream =
            UnixStream::connect(&self.socket).map_err(|source| CaptureError::Connect {
                path: self.socket.clone(),
                source,
            })?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream
            .write_all(format!("{cmd}\n").as_bytes())
            .map_err(|e| self.io_error(e))?;
        // The monitor keeps reading until EOF, so signal that we are done.
        let _ = stream.shutdown(Shutdown::Write);

        let mut reply = Vec::new();
        let mut buf = [0u8; 1024];
        let mut timed_out = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                timed_out = true;
                break;
            }
            stream.set_read_timeout(Some(remaining))?;
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => reply.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    timed_out = true;
                    break;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(CaptureError::Io(e)),
            }
        }

        if reply.is_empty() && timed_out {
            return Err(CaptureError::Timeout(self.timeout));
        }
        let text = String::from_utf8_lossy(&reply).into_owned();
        tracing::trace!(cmd, reply = %text.trim(), "monitor command");
        Ok(text)
    }

    #[cfg(not(unix))]
    pub fn command(&self, _cmd: &str) -> Result<String, CaptureError> {
        Err(CaptureError::Connect {
            path: self.socket.clone(),
            source: std::io::Error::new(ErrorKind::Unsupported, "unix sockets unavailable"),
        })
    }

    fn io_error(&self, e: std::io::Error) -> CaptureError {
        match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => CaptureError::Timeout(self.timeout),
            _ => CaptureError::Io(e),
        }
    }
}
