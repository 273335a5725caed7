//! Client for prussd, the daemon that owns the PRU subsystem.
//!
//! Every operation is one text command over the daemon's Unix socket. The
//! library keeps a cached view of each core's state and never touches the
//! hardware itself.
//!
//! ```no_run
//! use prussd_client::{ClientConfig, Pruss};
//!
//! let pruss = Pruss::open(ClientConfig::default())?;
//! pruss.boot_up()?;
//! let pru0 = pruss.pru0();
//! pru0.load("/lib/firmware/rpmsg_echo.out")?;
//! pru0.enable()?;
//! pru0.send_message("Hi there")?;
//! println!("{}", pru0.get_message()?);
//! pruss.shut_down()?;
//! # Ok::<(), prussd_client::Error>(())
//! ```

pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod pru;
pub mod pruss;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use codec::{Channel, Command, Reply};
pub use command::CommandExecutor;
pub use config::ClientConfig;
pub use error::{Error, ErrorKind, Result};
pub use pru::{EventOutcome, Pru, State};
pub use pruss::Pruss;
pub use transport::CancelToken;
