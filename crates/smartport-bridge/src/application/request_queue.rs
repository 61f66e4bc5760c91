//! FIFO of raw request frames between the receiver and polling units.
//!
//! The receiver unit owns the [`RequestProducer`] and pushes every frame it
//! reads; the polling unit owns the [`RequestConsumer`] and pops at most one
//! frame per bus tick.  Both sides are non-blocking, so the polling unit can
//! answer "idle" immediately when nothing is queued.
//!
//! The queue is an unbounded `tokio::sync::mpsc` channel.  Tearing down a
//! connection drops the producer; starting a new one creates a fresh pair,
//! which is how stale frames are discarded on reboot.

use tokio::sync::mpsc;

/// An undecoded frame exactly as it arrived from the transport.
pub type RawRequest = Vec<u8>;

/// Creates a connected producer/consumer pair.
pub fn request_queue() -> (RequestProducer, RequestConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RequestProducer { tx }, RequestConsumer { rx })
}

/// Receiver-unit side of the queue.
#[derive(Debug, Clone)]
pub struct RequestProducer {
    tx: mpsc::UnboundedSender<RawRequest>,
}

impl RequestProducer {
    /// Appends a frame.  Returns `false` if the consumer has been dropped.
    pub fn push(&self, raw: RawRequest) -> bool {
        self.tx.send(raw).is_ok()
    }
}

/// Polling-unit side of the queue.
#[derive(Debug)]
pub struct RequestConsumer {
    rx: mpsc::UnboundedReceiver<RawRequest>,
}

impl RequestConsumer {
    /// Pops the oldest frame, or returns `None` immediately if there is none.
    pub fn pop_or_empty(&mut self) -> Option<RawRequest> {
        self.rx.try_recv().ok()
    }

    /// Drops every queued frame, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
