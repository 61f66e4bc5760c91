//! Server connection supervisor (the "receiver unit").
//!
//! [`Connection::start`] spawns one background task that owns the read side
//! of the link.  The task:
//!
//! 1. Connects to the server, retrying every [`RetryPolicy::interval`] until
//!    it succeeds or is told to stop.
//! 2. Publishes the write side so the polling unit can send responses.
//! 3. Reads frames and pushes every non-empty one onto the request queue.
//! 4. When the server closes the link or a read fails, goes back to step 1.
//!
//! # Shutdown
//!
//! Stopping is cooperative.  [`Connection::disconnect`] flips a
//! `tokio::sync::watch` flag that every wait in the task selects on (the
//! retry sleep, the connect attempt and the frame read), then awaits the
//! task's `JoinHandle`.  By the time it returns the link is closed and the
//! request producer has been dropped.
//!
//! # Link state
//!
//! The task reports its progress through a second `watch` channel so callers
//! can block until the link is up (see [`Connection::wait_connected`]) or
//! query it cheaply from any thread.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use smartport_core::protocol::hexdump;
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::request_queue::RequestProducer;
use crate::application::transport::{Connector, FrameReader, FrameWriter, Link, TransportError};

/// How the supervisor retries failed connect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between two connect attempts.
    pub interval: Duration,
    /// Log a progress line every this many failed attempts.
    pub progress_every: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            progress_every: 1000,
        }
    }
}

/// Observable state of the server link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No supervisor is running.
    Disconnected,
    /// The supervisor is trying to (re)connect.
    AwaitingConnection,
    /// A link is up and frames are being received.
    Connected,
}

type WriterSlot = Arc<Mutex<Option<Box<dyn FrameWriter>>>>;

/// Handle to a running connection supervisor.
pub struct Connection {
    writer: WriterSlot,
    state: watch::Receiver<LinkState>,
    shutdown: watch::Sender<bool>,
    supervisor: Option<JoinHandle<()>>,
}

impl Connection {
    /// Spawns the supervisor on `runtime` and returns immediately.
    ///
    /// Frames received from `addr` are pushed into `queue` in arrival order.
    pub fn start(
        runtime: &Handle,
        connector: Arc<dyn Connector>,
        addr: SocketAddr,
        retry: RetryPolicy,
        queue: RequestProducer,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(LinkState::AwaitingConnection);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let writer: WriterSlot = Arc::new(Mutex::new(None));

        let supervisor = Supervisor {
            connector,
            addr,
            retry,
            queue,
            writer: Arc::clone(&writer),
            state: state_tx,
            shutdown: shutdown_rx,
        };
        let handle = runtime.spawn(supervisor.run());

        Self {
            writer,
            state: state_rx,
            shutdown: shutdown_tx,
            supervisor: Some(handle),
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Waits until the link is up.
    ///
    /// Returns `false` if the supervisor stopped before connecting.
    pub async fn wait_connected(&mut self) -> bool {
        self.state
            .wait_for(|state| *state == LinkState::Connected)
            .await
            .is_ok()
    }

    /// Writes one frame on the current link.
    ///
    /// # Errors
    ///
    /// [`TransportError::Closed`] while the supervisor is replacing a link
    /// the server closed, [`TransportError::NotConnected`] when no link is up
    /// for any other reason, otherwise whatever the writer reports.
    pub async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let mut slot = self.writer.lock().await;
        match slot.as_mut() {
            Some(writer) => writer.write_frame(frame).await,
            None if self.state() == LinkState::AwaitingConnection => Err(TransportError::Closed),
            None => Err(TransportError::NotConnected),
        }
    }

    /// Stops the supervisor and closes the link.  Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        let Some(handle) = self.supervisor.take() else {
            return;
        };
        self.shutdown.send_replace(true);
        if let Err(e) = handle.await {
            warn!("connection supervisor ended abnormally: {e}");
        }
        // The supervisor clears the slot itself unless it panicked.
        self.writer.lock().await.take();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Without an await point here the task is only signalled; it exits on
        // its own at the next select.
        self.shutdown.send_replace(true);
    }
}

enum ReceiveOutcome {
    Shutdown,
    LinkLost,
}

struct Supervisor {
    connector: Arc<dyn Connector>,
    addr: SocketAddr,
    retry: RetryPolicy,
    queue: RequestProducer,
    writer: WriterSlot,
    state: watch::Sender<LinkState>,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    async fn run(mut self) {
        loop {
            self.state.send_replace(LinkState::AwaitingConnection);
            let Some(Link { reader, writer }) = self.connect_with_retry().await else {
                break;
            };

            *self.writer.lock().await = Some(writer);
            self.state.send_replace(LinkState::Connected);
            info!("connected to server at {}", self.addr);

            let outcome = self.receive_until_closed(reader).await;
            self.writer.lock().await.take();
            match outcome {
                ReceiveOutcome::Shutdown => break,
                ReceiveOutcome::LinkLost => {
                    info!("link to {} lost; reconnecting", self.addr);
                }
            }
        }

        self.writer.lock().await.take();
        self.state.send_replace(LinkState::Disconnected);
        debug!("connection supervisor for {} stopped", self.addr);
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Returns `None` if shutdown was requested before a link came up.
    async fn connect_with_retry(&mut self) -> Option<Link> {
        let progress_every = u64::from(self.retry.progress_every.max(1));
        let mut failures: u64 = 0;

        loop {
            if self.is_shutdown() {
                return None;
            }

            let attempt = tokio::select! {
                result = self.connector.connect(self.addr) => result,
                _ = self.shutdown.changed() => return None,
            };

            match attempt {
                Ok(link) => {
                    if failures > 0 {
                        debug!("connected after {failures} failed attempts");
                    }
                    return Some(link);
                }
                Err(e) => {
                    failures += 1;
                    debug!("connect attempt {failures} failed: {e}");
                    if failures % progress_every == 0 {
                        info!(
                            "still waiting for server at {} ({failures} attempts)",
                            self.addr
                        );
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.retry.interval) => {}
                _ = self.shutdown.changed() => return None,
            }
        }
    }

    async fn receive_until_closed(&mut self, mut reader: Box<dyn FrameReader>) -> ReceiveOutcome {
        loop {
            if self.is_shutdown() {
                return ReceiveOutcome::Shutdown;
            }

            let frame = tokio::select! {
                frame = reader.read_frame() => frame,
                _ = self.shutdown.changed() => return ReceiveOutcome::Shutdown,
            };

            match frame {
                Ok(Some(frame)) if frame.is_empty() => continue,
                Ok(Some(frame)) => {
                    debug!(
                        "new request frame ({} bytes):\n{}",
                        frame.len(),
                        hexdump(&frame)
                    );
                    if !self.queue.push(frame) {
                        debug!("request queue consumer gone; stopping receiver");
                        return ReceiveOutcome::Shutdown;
                    }
                }
                Ok(None) => {
                    info!("server at {} closed the connection", self.addr);
                    return ReceiveOutcome::LinkLost;
                }
                Err(e) => {
                    warn!("receive from {} failed: {e}", self.addr);
                    return ReceiveOutcome::LinkLost;
                }
            }
        }
    }
}
