//! In-process stand-in for prussd, shared by the unit and integration tests.

use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

pub struct StubDaemon {
    _dir: TempDir,
    socket_path: PathBuf,
    received: Arc<Mutex<Vec<String>>>,
}

impl StubDaemon {
    pub fn spawn<F>(handler: F) -> Self
    where
        F: FnMut(&str) -> String + Send + 'static,
    {
        Self::spawn_with_delay(Duration::ZERO, handler)
    }

    /// Answers each request line with `handler`, after `delay`, then closes
    /// the connection the way prussd does.
    pub fn spawn_with_delay<F>(delay: Duration, mut handler: F) -> Self
    where
        F: FnMut(&str) -> String + Send + 'static,
    {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("prussd.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut line = String::new();
                let read = BufReader::new(&mut stream).read_line(&mut line);
                if !matches!(read, Ok(n) if n > 0) {
                    continue;
                }
                let command = line.trim_end().to_string();
                log.lock().push(command.clone());
                let reply = handler(&command);
                thread::sleep(delay);
                let _ = stream.write_all(reply.as_bytes());
            }
        });

        StubDaemon {
            _dir: dir,
            socket_path,
            received,
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone()
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}
