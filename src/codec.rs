//! Wire codec for the prussd line protocol
//!
//! A request is a single line of space separated tokens. The target core is
//! part of the first token (`ENABLE_0`), channel commands carry the rpmsg
//! channel name and port as separate tokens. The daemon answers with the
//! string form of its result: `0` on success, `-errno` on failure, or free
//! text (register dumps, messages, remoteproc state words).

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// A named rpmsg endpoint, `/dev/<name><port>` on the daemon's side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub port: u32,
}

impl Channel {
    pub fn new(name: impl Into<String>, port: u32) -> Self {
        Channel {
            name: name.into(),
            port,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ProbeRproc,
    UnprobeRproc,
    Enable(u8),
    Disable(u8),
    Pause(u8),
    Resume(u8),
    State(u8),
    GetRegs(u8),
    Load { pru: u8, path: String },
    SendMsg { channel: Channel, text: String },
    GetMsg(Channel),
    EventWait {
        channel: Channel,
        timeout: Option<Duration>,
    },
}

impl Command {
    /// First token of the request, which names the operation.
    pub fn token(&self) -> String {
        match self {
            Command::ProbeRproc => "PROBE_RPROC".to_string(),
            Command::UnprobeRproc => "UNPROBE_RPROC".to_string(),
            Command::Enable(n) => format!("ENABLE_{}", n),
            Command::Disable(n) => format!("DISABLE_{}", n),
            Command::Pause(n) => format!("PAUSE_{}", n),
            Command::Resume(n) => format!("RESUME_{}", n),
            Command::State(n) => format!("STATE_{}", n),
            Command::GetRegs(n) => format!("GETREGS_{}", n),
            Command::Load { pru, .. } => format!("LOAD_{}", pru),
            Command::SendMsg { .. } => "SENDMSG".to_string(),
            Command::GetMsg(_) => "GETMSG".to_string(),
            Command::EventWait { .. } => "EVENTWAIT".to_string(),
        }
    }

    /// Render the request line, without the terminator.
    pub fn encode(&self) -> Result<String> {
        let token = self.token();
        let line = match self {
            Command::Load { path, .. } => {
                if path.is_empty() || path.contains(char::is_whitespace) {
                    return Err(Error::InvalidArgument(format!(
                        "firmware path {:?} must be a single non-empty token",
                        path
                    )));
                }
                format!("{} {}", token, path)
            }
            Command::SendMsg { channel, text } => {
                if text.contains(['\n', '\r']) {
                    return Err(Error::InvalidArgument(
                        "message must fit on one line".to_string(),
                    ));
                }
                if text.trim().is_empty() {
                    return Err(Error::InvalidArgument("message is empty".to_string()));
                }
                format!("{} {} {} {}", token, channel.name, channel.port, text)
            }
            Command::GetMsg(channel) => format!("{} {} {}", token, channel.name, channel.port),
            Command::EventWait { channel, timeout } => match timeout {
                Some(t) => format!(
                    "{} {} {} {}",
                    token,
                    channel.name,
                    channel.port,
                    timeout_secs(*t)
                ),
                None => format!("{} {} {}", token, channel.name, channel.port),
            },
            _ => token,
        };
        Ok(line)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// The daemon counts event timeouts in whole seconds.
pub fn timeout_secs(timeout: Duration) -> u64 {
    let secs = timeout
        .as_secs()
        .saturating_add(u64::from(timeout.subsec_nanos() > 0));
    secs.max(1)
}

/// A reply the daemon did not flag as a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply(String);

impl Reply {
    /// Plain `0` acknowledgment with no payload.
    pub fn is_ack(&self) -> bool {
        self.0.trim() == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Classify a raw reply to `command`. Negative integers become
/// [`Error::Daemon`]; everything else is passed through untouched.
pub fn decode_reply(command: &str, raw: String) -> Result<Reply> {
    if raw.is_empty() {
        return Err(Error::Protocol(format!("empty reply to {}", command)));
    }
    let trimmed = raw.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');
    if let Ok(code) = trimmed.parse::<i32>() {
        if code < 0 {
            let errno = code
                .checked_neg()
                .ok_or_else(|| Error::Protocol(format!("errno {} out of range", code)))?;
            return Err(Error::daemon(command, errno));
        }
    }
    Ok(Reply(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn chan() -> Channel {
        Channel::new("rpmsg_pru", 30)
    }

    #[test]
    fn test_index_baked_into_token() {
        assert_eq!(Command::Enable(0).encode().unwrap(), "ENABLE_0");
        assert_eq!(Command::Disable(1).encode().unwrap(), "DISABLE_1");
        assert_eq!(Command::GetRegs(1).encode().unwrap(), "GETREGS_1");
        assert_eq!(Command::ProbeRproc.encode().unwrap(), "PROBE_RPROC");
    }

    #[test]
    fn test_load_line() {
        let cmd = Command::Load {
            pru: 0,
            path: "/lib/firmware/am335x-pru0-fw".to_string(),
        };
        assert_eq!(cmd.encode().unwrap(), "LOAD_0 /lib/firmware/am335x-pru0-fw");
    }

    #[test]
    fn test_load_rejects_split_path() {
        let cmd = Command::Load {
            pru: 1,
            path: "my firmware.out".to_string(),
        };
        assert_eq!(cmd.encode().unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_channel_commands() {
        let send = Command::SendMsg {
            channel: chan(),
            text: "Hi there".to_string(),
        };
        assert_eq!(send.encode().unwrap(), "SENDMSG rpmsg_pru 30 Hi there");
        assert_eq!(
            Command::GetMsg(chan()).encode().unwrap(),
            "GETMSG rpmsg_pru 30"
        );
    }

    #[test]
    fn test_send_rejects_multiline() {
        let send = Command::SendMsg {
            channel: chan(),
            text: "one\ntwo".to_string(),
        };
        assert!(send.encode().is_err());
    }

    #[test]
    fn test_event_wait_rounds_up_to_seconds() {
        let wait = |timeout| Command::EventWait {
            channel: chan(),
            timeout,
        };
        assert_eq!(wait(None).encode().unwrap(), "EVENTWAIT rpmsg_pru 30");
        assert_eq!(
            wait(Some(Duration::from_millis(1500))).encode().unwrap(),
            "EVENTWAIT rpmsg_pru 30 2"
        );
        assert_eq!(
            wait(Some(Duration::from_millis(10))).encode().unwrap(),
            "EVENTWAIT rpmsg_pru 30 1"
        );
        assert_eq!(
            wait(Some(Duration::from_secs(3))).encode().unwrap(),
            "EVENTWAIT rpmsg_pru 30 3"
        );
    }

    #[test]
    fn test_decode_ack_and_text() {
        assert!(decode_reply("ENABLE_0", "0".to_string()).unwrap().is_ack());
        let reply = decode_reply("ENABLE_0", "OK".to_string()).unwrap();
        assert!(!reply.is_ack());
        assert_eq!(reply.as_str(), "OK");
        let regs = "R0: 0x00000000\nR1: 0x00000001\n";
        assert_eq!(
            decode_reply("GETREGS_0", regs.to_string()).unwrap().into_string(),
            regs
        );
    }

    #[test]
    fn test_decode_negative_errno() {
        let err = decode_reply("LOAD_0", "-2".to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Daemon);
        assert_eq!(err.code(), Some(libc::ENOENT));
    }

    #[test]
    fn test_decode_unrepresentable_errno() {
        let err = decode_reply("GETREGS_0", i32::MIN.to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_timeout_secs_saturates() {
        assert_eq!(timeout_secs(Duration::MAX), u64::MAX);
        assert_eq!(timeout_secs(Duration::from_secs(u64::MAX)), u64::MAX);
    }

    #[test]
    fn test_decode_empty_is_protocol_error() {
        let err = decode_reply("STATE_0", String::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
