//! PRU subsystem handle
//!
//! `Pruss::open` is the only way to obtain PRU handles. Both cores are owned
//! by the subsystem and borrowed from it, so a core handle cannot outlive
//! the subsystem. At most one subsystem handle per daemon socket is open in
//! a process at a time.

use crate::codec::Command;
use crate::command::CommandExecutor;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::pru::Pru;
use log::{info, warn};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

// Socket paths with a live `Pruss` in this process.
static OPEN_SUBSYSTEMS: Mutex<Vec<PathBuf>> = parking_lot::const_mutex(Vec::new());

#[derive(Debug)]
pub struct Pruss {
    socket_path: PathBuf,
    executor: Arc<CommandExecutor>,
    // Held across boot/shutdown so concurrent callers never interleave them.
    on: Mutex<bool>,
    pru0: Pru,
    pru1: Pru,
}

impl Pruss {
    /// Claim the subsystem served by the daemon at `config.socket_path`.
    /// Does not contact the daemon; call [`Pruss::boot_up`] for that.
    pub fn open(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let socket_path = config.socket_path.clone();
        {
            let mut open = OPEN_SUBSYSTEMS.lock();
            if open.contains(&socket_path) {
                return Err(Error::AlreadyOpen(socket_path));
            }
            open.push(socket_path.clone());
        }

        let executor = Arc::new(CommandExecutor::new(config));
        Ok(Pruss {
            socket_path,
            pru0: Pru::new(0, Arc::clone(&executor)),
            pru1: Pru::new(1, Arc::clone(&executor)),
            executor,
            on: Mutex::new(false),
        })
    }

    pub fn pru0(&self) -> &Pru {
        &self.pru0
    }

    pub fn pru1(&self) -> &Pru {
        &self.pru1
    }

    pub fn pru(&self, number: u8) -> Option<&Pru> {
        match number {
            0 => Some(&self.pru0),
            1 => Some(&self.pru1),
            _ => None,
        }
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Cached flag only; the daemon is not asked.
    pub fn is_on(&self) -> bool {
        *self.on.lock()
    }

    /// Probe the remoteproc driver and initialize both cores. Does nothing
    /// if the subsystem is already on.
    pub fn boot_up(&self) -> Result<()> {
        let mut on = self.on.lock();
        self.boot_locked(&mut on)
    }

    /// Disable both cores and unprobe the driver. Every step is attempted
    /// and the subsystem is marked off regardless; the first failure is
    /// returned.
    ///
    /// The disables are sent even if the subsystem was never booted here,
    /// since the daemon may have been started by another process. Cores
    /// that acknowledge end up `Stopped`, including ones still at `None`.
    pub fn shut_down(&self) -> Result<()> {
        let mut on = self.on.lock();
        self.shut_down_locked(&mut on)
    }

    /// `shut_down` then `boot_up`. Shutdown failures are logged and do not
    /// stop the boot.
    pub fn restart(&self) -> Result<()> {
        let mut on = self.on.lock();
        if let Err(e) = self.shut_down_locked(&mut on) {
            warn!("Restart continuing after shutdown error: {}", e);
        }
        self.boot_locked(&mut on)
    }

    fn boot_locked(&self, on: &mut bool) -> Result<()> {
        if *on {
            return Ok(());
        }
        info!("Booting PRU subsystem via {}", self.socket_path.display());
        self.executor.execute(&Command::ProbeRproc)?;
        self.pru0.init()?;
        self.pru1.init()?;
        *on = true;
        info!("PRU subsystem is on");
        Ok(())
    }

    fn shut_down_locked(&self, on: &mut bool) -> Result<()> {
        info!("Shutting down PRU subsystem");
        let results = [
            self.pru0.disable(),
            self.pru1.disable(),
            self.executor.execute(&Command::UnprobeRproc).map(|_| ()),
        ];
        *on = false;

        let mut first = None;
        for result in results {
            if let Err(e) = result {
                warn!("Shutdown step failed: {}", e);
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// Releases the claim only; the cores keep whatever state the daemon has.
impl Drop for Pruss {
    fn drop(&mut self) {
        OPEN_SUBSYSTEMS.lock().retain(|p| p != &self.socket_path);
    }
}
