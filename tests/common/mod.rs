//! Scripted prussd stand-ins for the integration tests.

#[allow(dead_code)]
#[path = "../../src/test_support.rs"]
mod test_support;

pub use test_support::StubDaemon;

use std::collections::VecDeque;

impl StubDaemon {
    /// Acknowledges everything with `0`.
    pub fn acking() -> Self {
        Self::spawn(|_| "0".to_string())
    }

    /// Behaves like prussd with echo firmware on every rpmsg channel:
    /// `SENDMSG` queues the text, `GETMSG` drains the queue.
    pub fn loopback() -> Self {
        let mut mailbox: VecDeque<String> = VecDeque::new();
        Self::spawn(move |cmd| {
            let mut tokens = cmd.split_whitespace();
            match tokens.next() {
                Some("SENDMSG") => {
                    let text: Vec<&str> = tokens.skip(2).collect();
                    mailbox.push_back(text.join(" ") + "\n");
                    "0".to_string()
                }
                Some("GETMSG") => {
                    let reply: String = mailbox.drain(..).collect();
                    if reply.is_empty() {
                        "\n".to_string()
                    } else {
                        reply
                    }
                }
                Some(token) if token.starts_with("STATE_") => "offline".to_string(),
                _ => "0".to_string(),
            }
        })
    }
}
