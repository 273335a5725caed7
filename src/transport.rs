//! Unix socket transport to prussd
//!
//! One `Transport` carries exactly one request/reply pair: connect, write
//! the request line, read until the daemon closes the stream, disconnect.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use log::debug;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag that aborts a cancellable read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How long a read may block and what can interrupt it.
#[derive(Debug, Clone, Copy)]
pub struct ReadPolicy<'a> {
    /// Total time allowed for the reply; `None` waits indefinitely
    pub budget: Option<Duration>,
    pub cancel: Option<&'a CancelToken>,
}

pub struct Transport {
    socket_path: PathBuf,
    stream: Option<UnixStream>,
    read_timeout: Duration,
    poll_interval: Duration,
    max_reply_bytes: usize,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Self {
        Transport {
            socket_path: config.socket_path.clone(),
            stream: None,
            read_timeout: config.read_timeout(),
            poll_interval: config.poll_interval(),
            max_reply_bytes: config.max_reply_bytes,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Single connection attempt, no retries.
    pub fn connect(&mut self) -> Result<()> {
        self.stream = None;
        let stream = UnixStream::connect(&self.socket_path).map_err(|source| Error::Connect {
            path: self.socket_path.clone(),
            source,
        })?;
        debug!("Connected to {}", self.socket_path.display());
        self.stream = Some(stream);
        Ok(())
    }

    /// Send one command and read its reply, bounded by the configured read
    /// timeout and reply size.
    pub fn send_and_receive(&mut self, command: &str) -> Result<String> {
        let policy = ReadPolicy {
            budget: Some(self.read_timeout),
            cancel: None,
        };
        self.send_and_receive_with(command, policy)
    }

    pub fn send_and_receive_with(&mut self, command: &str, policy: ReadPolicy<'_>) -> Result<String> {
        let limit = self.max_reply_bytes;
        let poll = self.poll_interval;
        let stream = self.stream.as_mut().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport is not connected",
            ))
        })?;

        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');
        stream.write_all(line.as_bytes())?;
        debug!("Sent {:?}", command);

        let raw = read_reply(stream, limit, poll, policy)?;
        let reply = String::from_utf8(raw)
            .map_err(|e| Error::Protocol(format!("reply is not UTF-8: {}", e)))?;
        debug!("Received {} byte reply", reply.len());
        Ok(reply)
    }

    /// Close the connection. Returns `false` if there was none.
    pub fn disconnect(&mut self) -> bool {
        match self.stream.take() {
            Some(_) => {
                debug!("Disconnected from {}", self.socket_path.display());
                true
            }
            None => false,
        }
    }
}

// A zero read timeout is rejected by the socket.
const MIN_READ_SLICE: Duration = Duration::from_millis(1);

fn read_reply(
    stream: &mut UnixStream,
    limit: usize,
    poll: Duration,
    policy: ReadPolicy<'_>,
) -> Result<Vec<u8>> {
    let started = Instant::now();
    let mut reply = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        if policy.cancel.map_or(false, CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }

        let remaining = match policy.budget {
            Some(budget) => {
                let elapsed = started.elapsed();
                if elapsed >= budget {
                    return Err(Error::Timeout(budget));
                }
                Some(budget - elapsed)
            }
            None => None,
        };
        // With a token the read wakes up periodically to look at it.
        let slice = match (policy.cancel, remaining) {
            (Some(_), Some(r)) => Some(r.min(poll)),
            (Some(_), None) => Some(poll),
            (None, r) => r,
        }
        .map(|d| d.max(MIN_READ_SLICE));
        stream.set_read_timeout(slice)?;

        match stream.read(&mut chunk) {
            Ok(0) => return Ok(reply),
            Ok(n) => {
                if reply.len() + n > limit {
                    return Err(Error::ReplyTooLarge { limit });
                }
                reply.extend_from_slice(&chunk[..n]);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e.into()),
        }
    }
}
