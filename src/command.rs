use crate::codec::{decode_reply, Command, Reply};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::transport::{ReadPolicy, Transport};
use log::{debug, warn};

/// Issues commands to prussd, one fresh connection per command.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    config: ClientConfig,
}

impl CommandExecutor {
    pub fn new(config: ClientConfig) -> Self {
        CommandExecutor { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a raw command line and return the daemon's reply verbatim.
    /// An unreachable daemon is reported as `Error::Connect`, never as a
    /// reply string.
    pub fn issue(&self, command: &str) -> Result<String> {
        let policy = ReadPolicy {
            budget: Some(self.config.read_timeout()),
            cancel: None,
        };
        self.issue_with(command, policy)
    }

    pub fn issue_with(&self, command: &str, policy: ReadPolicy<'_>) -> Result<String> {
        let mut transport = Transport::new(&self.config);
        transport.connect().map_err(|e| {
            warn!("Failed to reach daemon for {:?}: {}", command, e);
            e
        })?;
        let reply = transport.send_and_receive_with(command, policy);
        transport.disconnect();
        reply
    }

    /// Encode, send, and classify the reply.
    pub fn execute(&self, command: &Command) -> Result<Reply> {
        let policy = ReadPolicy {
            budget: Some(self.config.read_timeout()),
            cancel: None,
        };
        self.execute_with(command, policy)
    }

    pub fn execute_with(&self, command: &Command, policy: ReadPolicy<'_>) -> Result<Reply> {
        let line = command.encode()?;
        debug!("Executing command: {}", line);
        let raw = self.issue_with(&line, policy)?;
        decode_reply(&command.token(), raw)
    }
}
