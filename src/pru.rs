//! PRU core handle
//!
//! Tracks a cached copy of one core's run state. The daemon owns the real
//! state: commands are issued without checking the cache first, and the
//! cache moves only after the daemon acknowledges.

use crate::codec::{timeout_secs, Channel, Command};
use crate::command::CommandExecutor;
use crate::error::{Error, Result};
use crate::transport::{CancelToken, ReadPolicy};
use log::{debug, info};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Cached run state of a PRU core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Not yet initialized against the daemon
    #[default]
    None,
    Stopped,
    Running,
    Halted,
}

impl State {
    /// Map a remoteproc sysfs state word.
    fn from_remoteproc(word: &str) -> Option<Self> {
        match word {
            "offline" => Some(State::Stopped),
            "running" => Some(State::Running),
            "suspended" => Some(State::Halted),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::None => "none",
            State::Stopped => "stopped",
            State::Running => "running",
            State::Halted => "halted",
        };
        f.write_str(name)
    }
}

/// Result of waiting on a core's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Event,
    TimedOut,
}

struct Core {
    state: State,
    channel: Channel,
}

pub struct Pru {
    number: u8,
    executor: Arc<CommandExecutor>,
    // Held for the whole round trip so commands to one core never interleave.
    core: Mutex<Core>,
}

impl Pru {
    pub(crate) fn new(number: u8, executor: Arc<CommandExecutor>) -> Self {
        let channel = default_channel_for(number, &executor);
        Pru {
            number,
            executor,
            core: Mutex::new(Core {
                state: State::None,
                channel,
            }),
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn state(&self) -> State {
        self.core.lock().state
    }

    pub fn channel(&self) -> Channel {
        self.core.lock().channel.clone()
    }

    /// Point the message channel at `/dev/<name><port>`.
    pub fn set_channel(&self, port: u32, name: &str) -> Result<()> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::InvalidArgument(format!("invalid channel name {:?}", name)));
        }
        self.core.lock().channel = Channel::new(name, port);
        Ok(())
    }

    /// Restore the configured channel for this core.
    pub fn default_channel(&self) {
        self.core.lock().channel = default_channel_for(self.number, &self.executor);
    }

    /// Confirm the daemon sees this core and mark it stopped.
    pub(crate) fn init(&self) -> Result<()> {
        let mut core = self.core.lock();
        self.executor.execute(&Command::State(self.number))?;
        core.channel = default_channel_for(self.number, &self.executor);
        core.state = State::Stopped;
        info!("PRU{} initialized", self.number);
        Ok(())
    }

    pub fn enable(&self) -> Result<()> {
        self.transition(Command::Enable(self.number), State::Running)
    }

    pub fn disable(&self) -> Result<()> {
        self.transition(Command::Disable(self.number), State::Stopped)
    }

    /// Stop the core; the firmware image is reloaded on the next enable.
    pub fn reset(&self) -> Result<()> {
        self.transition(Command::Disable(self.number), State::Stopped)
    }

    pub fn pause(&self) -> Result<()> {
        self.transition(Command::Pause(self.number), State::Halted)
    }

    pub fn resume(&self) -> Result<()> {
        self.transition(Command::Resume(self.number), State::Running)
    }

    /// Ask the daemon to load the firmware at `path`. The state is left
    /// alone; a rejected image is reported as `Error::Daemon`.
    pub fn load(&self, path: &str) -> Result<()> {
        let _core = self.core.lock();
        let command = Command::Load {
            pru: self.number,
            path: path.to_string(),
        };
        self.executor.execute(&command)?;
        info!("PRU{} loaded firmware {}", self.number, path);
        Ok(())
    }

    pub fn send_message(&self, text: &str) -> Result<()> {
        let core = self.core.lock();
        let command = Command::SendMsg {
            channel: core.channel.clone(),
            text: text.to_string(),
        };
        self.executor.execute(&command)?;
        debug!("PRU{} sent {} bytes on {}", self.number, text.len(), core.channel);
        Ok(())
    }

    /// Next pending message on the channel, or an empty string if none.
    ///
    /// prussd sends messages and errors over the same reply, so a message
    /// that reads as a negative integer (`-5`) comes back as
    /// `Error::Daemon` with that errno.
    pub fn get_message(&self) -> Result<String> {
        let core = self.core.lock();
        let reply = self.executor.execute(&Command::GetMsg(core.channel.clone()))?;
        let text = reply.into_string();
        Ok(text.strip_suffix('\n').unwrap_or(&text).to_string())
    }

    pub fn show_registers(&self) -> Result<String> {
        let _core = self.core.lock();
        let reply = self.executor.execute(&Command::GetRegs(self.number))?;
        Ok(reply.into_string())
    }

    /// Block until firmware signals on the channel. With no timeout this
    /// waits as long as the daemon does.
    pub fn wait_for_event(&self, timeout: Option<Duration>) -> Result<EventOutcome> {
        self.wait_inner(timeout, None)
    }

    /// Like [`Pru::wait_for_event`], but returns `Error::Cancelled` once
    /// `token` is cancelled.
    pub fn wait_for_event_cancellable(
        &self,
        timeout: Option<Duration>,
        token: &CancelToken,
    ) -> Result<EventOutcome> {
        self.wait_inner(timeout, Some(token))
    }

    /// Refresh the cached state from the daemon's remoteproc state.
    pub fn query_state(&self) -> Result<State> {
        let mut core = self.core.lock();
        let reply = self.executor.execute(&Command::State(self.number))?;
        let word = reply.as_str().trim();
        let state = State::from_remoteproc(word)
            .ok_or_else(|| Error::Protocol(format!("unknown remoteproc state {:?}", word)))?;
        core.state = state;
        Ok(state)
    }

    fn wait_inner(
        &self,
        timeout: Option<Duration>,
        cancel: Option<&CancelToken>,
    ) -> Result<EventOutcome> {
        // Not held while blocked, so the channel stays usable for messages.
        let channel = self.core.lock().channel.clone();
        let command = Command::EventWait { channel, timeout };
        // Leave the daemon its full timeout plus one ordinary read window.
        // A sum too large to represent means no client-side limit.
        let budget = timeout.and_then(|t| {
            Duration::from_secs(timeout_secs(t)).checked_add(self.executor.config().read_timeout())
        });
        let policy = ReadPolicy { budget, cancel };
        match self.executor.execute_with(&command, policy) {
            Ok(_) => Ok(EventOutcome::Event),
            Err(Error::Daemon { code, .. }) if code == libc::ETIME => {
                debug!("PRU{} event wait timed out", self.number);
                Ok(EventOutcome::TimedOut)
            }
            Err(e) => Err(e),
        }
    }

    fn transition(&self, command: Command, next: State) -> Result<()> {
        let mut core = self.core.lock();
        self.executor.execute(&command)?;
        if core.state != next {
            info!("PRU{}: {} -> {}", self.number, core.state, next);
        }
        core.state = next;
        Ok(())
    }
}

impl fmt::Debug for Pru {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("Pru")
            .field("number", &self.number)
            .field("state", &core.state)
            .field("channel", &core.channel)
            .finish()
    }
}

fn default_channel_for(number: u8, executor: &CommandExecutor) -> Channel {
    let channel = &executor.config().channel;
    Channel::new(channel.name.clone(), channel.base_port + u32::from(number))
}
