//! In-memory connector for tests.
//!
//! # Why a scripted connector?
//!
//! The real [`super::TcpSlipConnector`] needs a listening server, and the
//! interesting bridge behaviours (retrying refused connects, reacting to the
//! server hanging up, surviving a failed write) are awkward to provoke over a
//! real socket.  `ScriptedConnector` stands in for the server:
//!
//! - The first `n` connect attempts can be made to fail.
//! - Every successful attempt opens a new *session*.  Frames passed to
//!   [`ScriptedConnector::inject`] are delivered to the newest session's
//!   reader as if the server had sent them.
//! - Every frame the bridge writes is recorded and can be inspected with
//!   [`ScriptedConnector::sent_frames`].
//!
//! # Usage in tests
//!
//! ```ignore
//! let server = Arc::new(ScriptedConnector::failing_first(3));
//! let mut bridge = Bridge::connect(server.clone(), settings)?;
//! assert_eq!(server.attempts(), 4);
//!
//! server.inject(vec![0x01, 0x01, 0x01, 0x00, 0x00, 0x00]);
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::transport::{
    ConnectError, Connector, FrameReader, FrameWriter, Link, TransportError,
};

// `None` on the channel means "server closed the connection".
type Inbound = mpsc::UnboundedSender<Option<Vec<u8>>>;

/// A connector whose server side is driven by the test.
#[derive(Default)]
pub struct ScriptedConnector {
    failures_remaining: AtomicUsize,
    attempts: AtomicUsize,
    sessions: Mutex<Vec<Inbound>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl ScriptedConnector {
    /// A connector that accepts every attempt.
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector that refuses the first `failures` attempts.
    pub fn failing_first(failures: usize) -> Self {
        let connector = Self::default();
        connector.failures_remaining.store(failures, Ordering::SeqCst);
        connector
    }

    /// Refuses the next `count` attempts, as if the server went away.
    pub fn refuse_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Opens a new session without counting a connect attempt.
    pub fn open_session(&self) -> Link {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.sessions).push(tx);
        Link {
            reader: Box::new(ChannelReader { rx }),
            writer: Box::new(RecordingWriter {
                sent: Arc::clone(&self.sent),
                fail: Arc::clone(&self.fail_writes),
            }),
        }
    }

    /// Delivers `frame` to the newest session.  Returns `false` if there is
    /// no session or its reader is gone.
    pub fn inject(&self, frame: impl Into<Vec<u8>>) -> bool {
        match lock(&self.sessions).last() {
            Some(session) => session.send(Some(frame.into())).is_ok(),
            None => false,
        }
    }

    /// Makes the newest session's reader report end-of-stream.
    pub fn close_session(&self) -> bool {
        match lock(&self.sessions).last() {
            Some(session) => session.send(None).is_ok(),
            None => false,
        }
    }

    /// When set, every write fails with a broken-pipe error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Total connect attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of sessions opened so far.
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Every frame written by the bridge, across all sessions, in order.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, addr: SocketAddr) -> Result<Link, ConnectError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ConnectError::Connect {
                addr,
                source: std::io::ErrorKind::ConnectionRefused.into(),
            });
        }
        Ok(self.open_session())
    }
}

struct ChannelReader {
    rx: mpsc::UnboundedReceiver<Option<Vec<u8>>>,
}

#[async_trait]
impl FrameReader for ChannelReader {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.rx.recv().await.flatten())
    }
}

struct RecordingWriter {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    fail: Arc<AtomicBool>,
}

#[async_trait]
impl FrameWriter for RecordingWriter {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        lock(&self.sent).push(frame.to_vec());
        Ok(())
    }
}

// A panicking test thread must not cascade into every other assertion.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
