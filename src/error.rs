use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for daemon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Io,
    Timeout,
    ReplyTooLarge,
    Protocol,
    Daemon,
    InvalidArgument,
    Cancelled,
    AlreadyOpen,
    Config,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The daemon socket could not be reached.
    #[error("cannot connect to daemon at {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("no reply from daemon within {0:?}")]
    Timeout(std::time::Duration),

    #[error("daemon reply exceeds {limit} bytes")]
    ReplyTooLarge { limit: usize },

    #[error("malformed daemon reply: {0}")]
    Protocol(String),

    /// The daemon answered with a negative errno.
    #[error("daemon rejected {command}: {message} (errno {code})")]
    Daemon {
        command: String,
        code: i32,
        message: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("a subsystem handle for {} is already open", .0.display())]
    AlreadyOpen(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connect { .. } => ErrorKind::Connection,
            Error::Io(_) => ErrorKind::Io,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::ReplyTooLarge { .. } => ErrorKind::ReplyTooLarge,
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Daemon { .. } => ErrorKind::Daemon,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::AlreadyOpen(_) => ErrorKind::AlreadyOpen,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Underlying OS or daemon errno, when there is one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Connect { source, .. } => source.raw_os_error(),
            Error::Io(source) => source.raw_os_error(),
            Error::Daemon { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn daemon(command: &str, code: i32) -> Self {
        Error::Daemon {
            command: command.to_string(),
            code,
            message: io::Error::from_raw_os_error(code).to_string(),
        }
    }
}
